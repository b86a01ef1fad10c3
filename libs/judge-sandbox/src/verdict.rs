/// Verdict classification for a failing test case.
///
/// The default classifier sniffs the failing test's output text. That keeps
/// the observed behavior of the judge, including its blind spot: a program
/// that legitimately prints "timeout" or "memory" is classified by that text.
/// The trait is the seam for a classifier driven by structured signals
/// (exit status, measured RSS) instead.
use crate::engine::{RawOutcome, RunState, TIMEOUT_SENTINEL};
use judge_common::types::{TestOutcome, Verdict};

pub trait VerdictClassifier: Send + Sync {
    /// Verdict for a test case that did not pass
    fn classify(&self, outcome: &TestOutcome, raw: &RawOutcome) -> Verdict;
}

/// Substring sniffing over the failing test's actual output
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputSniffer;

impl VerdictClassifier for OutputSniffer {
    fn classify(&self, outcome: &TestOutcome, raw: &RawOutcome) -> Verdict {
        // An environment that never started is an infrastructure fault, not a program outcome
        if raw.state == RunState::LaunchFailed {
            return Verdict::InternalError;
        }
        classify_output(&outcome.actual_output)
    }
}

pub fn classify_output(actual_output: &str) -> Verdict {
    if actual_output.contains(TIMEOUT_SENTINEL) {
        Verdict::TimeLimitExceeded
    } else if actual_output.contains("memory") {
        Verdict::MemoryLimitExceeded
    } else if actual_output.contains("error") || actual_output.contains("Error") {
        Verdict::RuntimeError
    } else {
        Verdict::WrongAnswer
    }
}
