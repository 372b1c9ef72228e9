//! Selector model
//!
//! A `SelectorDescriptor` is the declarative form of an element query. Only
//! data-attribute selectors are considered stable: css classes, text content
//! and tag names all change for reasons unrelated to the test suite, so the
//! strict policy rejects them before the first query is issued.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// How a selector addresses an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// A custom data attribute, e.g. `data-cy=link`
    Attribute,
    /// A css class or id selector
    Css,
    /// Visible text content
    Text,
    /// A bare tag name
    Tag,
}

impl SelectorKind {
    /// Data attributes exist solely for testing, so they are the only kind
    /// that survives styling or markup refactors.
    pub fn is_stable(&self) -> bool {
        matches!(self, SelectorKind::Attribute)
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelectorKind::Attribute => "attribute",
            SelectorKind::Css => "css",
            SelectorKind::Text => "text",
            SelectorKind::Tag => "tag",
        };
        f.write_str(s)
    }
}

/// Declarative element query, created once per resolve call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorDescriptor {
    pub kind: SelectorKind,
    pub value: String,
}

impl SelectorDescriptor {
    pub fn attribute(value: impl Into<String>) -> Self {
        Self { kind: SelectorKind::Attribute, value: value.into() }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self { kind: SelectorKind::Css, value: value.into() }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self { kind: SelectorKind::Text, value: value.into() }
    }

    pub fn tag(value: impl Into<String>) -> Self {
        Self { kind: SelectorKind::Tag, value: value.into() }
    }

    /// Reject non-stable selectors under the strict policy.
    pub fn check_policy(&self, policy: SelectorPolicy) -> Result<()> {
        if policy == SelectorPolicy::Strict && !self.kind.is_stable() {
            return Err(Error::UnstableSelector {
                kind: self.kind,
                value: self.value.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for SelectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Suite-wide selector policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorPolicy {
    /// Data-attribute selectors only
    Strict,
    /// Any selector kind accepted
    #[default]
    Lenient,
}

impl std::str::FromStr for SelectorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" => Ok(SelectorPolicy::Strict),
            "lenient" => Ok(SelectorPolicy::Lenient),
            other => Err(Error::InvalidConfig(format!(
                "unknown selector policy: {other} (expected strict|lenient)"
            ))),
        }
    }
}

/// The driver's view of a matched element at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier, opaque to the orchestrator
    pub id: u64,
    pub tag: String,
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ElementHandle {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
