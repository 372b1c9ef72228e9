//! Session state snapshots
//!
//! A `StateSnapshot` is the application-observable session state the runner
//! captures before a case and restores before the next one. Restoring the
//! snapshot must be indistinguishable from a fresh session for the fields
//! captured here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Captured session state: cookies, storage entries and the session
/// credential. Owned exclusively by the runner for the duration of a case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub cookies: BTreeMap<String, String>,
    pub storage: BTreeMap<String, String>,
    pub auth_token: Option<String>,
}

impl StateSnapshot {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.storage.is_empty() && self.auth_token.is_none()
    }

    /// Human-readable differences between this snapshot (the expected
    /// baseline) and an observed one. Empty means identical.
    pub fn diff(&self, observed: &Self) -> Vec<String> {
        let mut out = Vec::new();
        diff_maps("cookie", &self.cookies, &observed.cookies, &mut out);
        diff_maps("storage entry", &self.storage, &observed.storage, &mut out);
        if self.auth_token != observed.auth_token {
            out.push(format!(
                "auth token: expected {:?}, found {:?}",
                self.auth_token, observed.auth_token
            ));
        }
        out
    }
}

fn diff_maps(
    label: &str,
    expected: &BTreeMap<String, String>,
    observed: &BTreeMap<String, String>,
    out: &mut Vec<String>,
) {
    for (key, value) in expected {
        match observed.get(key) {
            None => out.push(format!("{label} `{key}` missing (expected {value:?})")),
            Some(found) if found != value => {
                out.push(format!("{label} `{key}`: expected {value:?}, found {found:?}"))
            }
            Some(_) => {}
        }
    }
    for key in observed.keys() {
        if !expected.contains_key(key) {
            out.push(format!("residual {label} `{key}`"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(cookies: &[(&str, &str)]) -> StateSnapshot {
        StateSnapshot {
            cookies: cookies.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_snapshots_have_no_diff() {
        let a = snapshot_with(&[("session", "abc")]);
        assert!(a.diff(&a.clone()).is_empty());
    }

    #[test]
    fn test_residual_cookie_is_reported() {
        let baseline = snapshot_with(&[]);
        let observed = snapshot_with(&[("theme", "dark")]);
        let diff = baseline.diff(&observed);
        assert_eq!(diff.len(), 1);
        assert!(diff[0].contains("residual"));
        assert!(diff[0].contains("theme"));
    }

    #[test]
    fn test_changed_value_is_reported() {
        let baseline = snapshot_with(&[("lang", "en")]);
        let observed = snapshot_with(&[("lang", "pt")]);
        let diff = baseline.diff(&observed);
        assert_eq!(diff.len(), 1);
        assert!(diff[0].contains("lang"));
    }
}
