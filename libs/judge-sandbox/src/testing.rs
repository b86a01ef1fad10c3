/// Test doubles for the sandbox pipeline.
use crate::config::SandboxLimits;
use crate::engine::{RawOutcome, SandboxError, SandboxRunner};
use crate::harness::Artifact;
use async_trait::async_trait;
use judge_common::types::TestCase;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn test_case(input: &str, expected: &str) -> TestCase {
    TestCase {
        input: input.to_string(),
        expected_output: expected.to_string(),
        is_hidden: false,
    }
}

pub fn test_limits() -> SandboxLimits {
    SandboxLimits {
        timeout: Duration::from_secs(10),
        memory_limit_mb: 128,
        cpu_limit: 0.5,
    }
}

/// Replays a fixed script of outcomes, one per invocation, and counts calls.
/// Once the script is exhausted every further call echoes the input back.
pub struct ScriptedRunner {
    script: Mutex<VecDeque<RawOutcome>>,
    calls: AtomicUsize,
    fail_after: Option<usize>,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(script: Vec<RawOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            fail_after: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Echo the input of every invocation
    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    /// Return an infrastructure error once `n` calls have succeeded
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SandboxRunner for ScriptedRunner {
    async fn run(
        &self,
        _artifact: &Artifact,
        input: &str,
        _limits: &SandboxLimits,
    ) -> Result<RawOutcome, SandboxError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(input.to_string());

        if self.fail_after.is_some_and(|n| call >= n) {
            return Err(SandboxError::Workspace(io::Error::new(
                io::ErrorKind::Other,
                "no space left on device",
            )));
        }

        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| RawOutcome::completed(format!("{}\n", input), 1)))
    }
}
