//! Declarative YAML case specifications
//!
//! Suites can be written as YAML files and compiled into [`TestCase`]
//! bodies, so a run needs no Rust beyond the harness. The step vocabulary
//! mirrors the orchestration operations one to one.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::Path;

use casekit_common::driver::StateMutation;
use casekit_common::error::{Error, Result};
use casekit_common::selector::{SelectorDescriptor, SelectorKind};

use crate::case::{CaseContext, Suite, TestCase};
use crate::intercept::RequestMatcher;

/// A complete case specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSpec {
    /// Unique name for this case
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in order
    pub steps: Vec<CaseStep>,
}

/// Selector reference inside a spec; kind defaults to the stable form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSpec {
    #[serde(default = "default_kind")]
    pub kind: SelectorKind,
    pub value: String,
}

fn default_kind() -> SelectorKind {
    SelectorKind::Attribute
}

impl From<SelectorSpec> for SelectorDescriptor {
    fn from(spec: SelectorSpec) -> Self {
        SelectorDescriptor { kind: spec.kind, value: spec.value }
    }
}

/// A single step in a case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CaseStep {
    /// Navigate to a URL (relative to the base URL)
    Visit { url: String },

    /// Apply a state mutation through the backend API
    Seed {
        endpoint: String,
        payload: serde_json::Value,
    },

    /// Register a network interception alias
    RegisterAlias {
        tag: String,
        method: String,
        path: String,
    },

    /// Wait for an interception registered under a tag
    WaitAlias {
        tag: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Wait until a selector matches
    WaitVisible { selector: SelectorSpec },

    /// Dispatch a DOM event on a resolved element
    Dispatch { selector: SelectorSpec, event: String },

    /// Assert how many elements match (zero is a valid expectation)
    AssertCount { selector: SelectorSpec, expected: usize },

    /// Assert on an element's text content
    AssertText {
        selector: SelectorSpec,
        #[serde(default)]
        equals: Option<String>,
        #[serde(default)]
        contains: Option<String>,
    },

    /// Assert an attribute value on an element
    AssertAttribute {
        selector: SelectorSpec,
        name: String,
        value: String,
    },
}

impl CaseSpec {
    /// Parse a case spec from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        if spec.steps.is_empty() {
            return Err(Error::SpecParse(format!("case {:?} has no steps", spec.name)));
        }
        Ok(spec)
    }

    /// Parse a case spec from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all case specs from a directory, in path order
    pub fn load_all(dir: &Path) -> Result<Vec<Self>> {
        let mut specs = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }
        Ok(specs)
    }

    /// Compile this spec into an executable case.
    pub fn into_case(self) -> TestCase {
        let steps = self.steps;
        let body = move |ctx: CaseContext| -> BoxFuture<'static, Result<()>> {
            let steps = steps.clone();
            Box::pin(async move {
                for step in &steps {
                    run_step(&ctx, step).await?;
                }
                Ok(())
            })
        };
        TestCase::new(self.name, body).with_tags(self.tags)
    }

    /// Build a suite from a list of specs, preserving order.
    pub fn into_suite(specs: Vec<Self>) -> Suite {
        let mut suite = Suite::new();
        for spec in specs {
            suite.register(spec.into_case());
        }
        suite
    }
}

async fn run_step(ctx: &CaseContext, step: &CaseStep) -> Result<()> {
    match step {
        CaseStep::Visit { url } => ctx.visit(url).await,

        CaseStep::Seed { endpoint, payload } => {
            ctx.seed(StateMutation::new(endpoint.clone(), payload.clone())).await
        }

        CaseStep::RegisterAlias { tag, method, path } => {
            ctx.register_alias(tag.clone(), RequestMatcher::new(method.clone(), path.clone()));
            Ok(())
        }

        CaseStep::WaitAlias { tag, timeout_ms } => {
            match timeout_ms {
                Some(ms) => {
                    ctx.wait_for_alias_within(tag, std::time::Duration::from_millis(*ms)).await?
                }
                None => ctx.wait_for_alias(tag).await?,
            };
            Ok(())
        }

        CaseStep::WaitVisible { selector } => {
            ctx.wait_visible(&selector.clone().into()).await
        }

        CaseStep::Dispatch { selector, event } => {
            let handle = ctx.resolve_one(&selector.clone().into()).await?;
            ctx.dispatch(&handle, event).await
        }

        CaseStep::AssertCount { selector, expected } => {
            let descriptor: SelectorDescriptor = selector.clone().into();
            let actual = ctx.query_count(&descriptor).await?;
            ctx.assert_count(&descriptor, actual, *expected)
        }

        CaseStep::AssertText { selector, equals, contains } => {
            let handle = ctx.resolve_one(&selector.clone().into()).await?;
            if let Some(expected) = equals {
                ctx.assert_text_eq(&handle, expected)?;
            }
            if let Some(needle) = contains {
                ctx.assert_text_contains(&handle, needle)?;
            }
            Ok(())
        }

        CaseStep::AssertAttribute { selector, name, value } => {
            let handle = ctx.resolve_one(&selector.clone().into()).await?;
            ctx.assert_attribute(&handle, name, value)
        }
    }
}
