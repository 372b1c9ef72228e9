//! Casekit Runner
//!
//! The orchestration core for end-to-end browser test suites. Cases run
//! against an external DOM driver through a narrow trait; this crate owns
//! everything around that seam:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  TestRunner                                                  │
//! │    ├── Snapshotter    capture/restore/seed session state     │
//! │    ├── CaseContext    per-case facade handed to bodies       │
//! │    │     ├── SelectorResolver   retry + backoff + policy     │
//! │    │     ├── ConditionWaiter    explicit waits, no sleeps    │
//! │    │     └── AliasRegistry      named network interceptions  │
//! │    └── RunReporter    one record per assertion               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each case starts from a restored baseline snapshot, so no case can depend
//! on mutations made by another; residual state is detected and flagged as
//! an isolation violation against the case that leaked it.

pub mod backend;
pub mod case;
pub mod intercept;
pub mod remote;
pub mod reporter;
pub mod resolver;
pub mod runner;
pub mod snapshot;
pub mod spec;
pub mod waiter;

pub use backend::HttpStateBackend;
pub use case::{CaseContext, Suite, TestCase};
pub use intercept::{AliasRegistry, InterceptedRequest, RequestMatcher};
pub use remote::RemoteDriver;
pub use reporter::RunReporter;
pub use resolver::{ResolveOptions, SelectorResolver};
pub use runner::TestRunner;
pub use snapshot::Snapshotter;
pub use spec::{CaseSpec, CaseStep};
pub use waiter::{Condition, ConditionPoll, ConditionWaiter, WaitOutcome};

pub use casekit_common as common;
