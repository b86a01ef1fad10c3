//! Untrusted-code execution sandbox.
//!
//! Pipeline: [`validator`] rejects obviously dangerous submissions,
//! [`harness`] wraps the code into a runnable program, [`evaluator`] drives
//! one [`engine::SandboxRunner`] invocation per test case and [`verdict`]
//! turns the first failure into a [`Verdict`](judge_common::types::Verdict).
//! [`executor::ExecutionService`] glues the stages together.

pub mod config;
pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod harness;
pub mod invocation;
pub mod validator;
pub mod verdict;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
pub(crate) mod testing;

pub use config::{LanguageProfile, SandboxConfig, SandboxLimits};
pub use engine::{DockerEngine, RawOutcome, RunState, SandboxError, SandboxRunner};
pub use executor::ExecutionService;
pub use harness::Artifact;
pub use validator::Rejection;
