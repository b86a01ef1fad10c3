/// Test Evaluator - Per-Test-Case Loop and Aggregation
///
/// **Core Responsibility:**
/// Run the artifact against each test case in order, compare outputs and
/// aggregate the telemetry into one `ExecutionResult`.
///
/// **Critical Properties:**
/// - Knows nothing about Docker (talks to a `SandboxRunner`)
/// - Stops at the first test case that does not pass; later cases are never run
/// - runtime_ms = mean over the test cases actually run
/// - memory_kb = max over the test cases actually run
///
/// **Normalization Rules:**
/// - Trim leading and trailing whitespace on both sides
/// - Case sensitive, exact match otherwise
use crate::config::SandboxLimits;
use crate::engine::{RawOutcome, SandboxRunner};
use crate::harness::Artifact;
use crate::verdict::VerdictClassifier;
use judge_common::types::{ExecutionResult, TestCase, TestOutcome, Verdict};
use tracing::{debug, error};

fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Build the outcome of one test case from the runner's report
pub fn evaluate_test(test_case: &TestCase, raw: &RawOutcome) -> TestOutcome {
    let expected = normalize_output(&test_case.expected_output);
    let actual = normalize_output(&raw.output);

    TestOutcome {
        input: test_case.input.clone(),
        expected_output: expected.to_string(),
        actual_output: actual.to_string(),
        passed: raw.succeeded() && expected == actual,
        runtime_ms: raw.wall_clock_ms,
        memory_kb: raw.memory_kb,
    }
}

pub struct TestEvaluator<'a> {
    runner: &'a dyn SandboxRunner,
    classifier: &'a dyn VerdictClassifier,
}

impl<'a> TestEvaluator<'a> {
    pub fn new(runner: &'a dyn SandboxRunner, classifier: &'a dyn VerdictClassifier) -> Self {
        Self { runner, classifier }
    }

    pub async fn evaluate(
        &self,
        artifact: &Artifact,
        test_cases: &[TestCase],
        limits: &SandboxLimits,
    ) -> ExecutionResult {
        let total_test_cases = test_cases.len();
        let mut test_results = Vec::with_capacity(total_test_cases);
        let mut test_cases_passed = 0;
        let mut status = None;
        let mut error_message = None;

        for (test_index, test_case) in test_cases.iter().enumerate() {
            let raw = match self.runner.run(artifact, &test_case.input, limits).await {
                Ok(raw) => raw,
                Err(e) => {
                    error!(test_index, error = %e, "Sandbox infrastructure fault");
                    status = Some(Verdict::InternalError);
                    error_message = Some(e.to_string());
                    break;
                }
            };

            let outcome = evaluate_test(test_case, &raw);
            debug!(
                test_index,
                passed = outcome.passed,
                runtime_ms = outcome.runtime_ms,
                memory_kb = outcome.memory_kb,
                "Test case evaluated"
            );

            if outcome.passed {
                test_cases_passed += 1;
                test_results.push(outcome);
                continue;
            }

            let verdict = self.classifier.classify(&outcome, &raw);
            error_message = Some(format!(
                "Test case failed: expected {}, got {}",
                outcome.expected_output, outcome.actual_output
            ));
            status = Some(verdict);
            test_results.push(outcome);
            break;
        }

        // Falling out of the loop means every test case passed
        let status = status.unwrap_or(Verdict::Accepted);

        aggregate(status, error_message, test_cases_passed, total_test_cases, test_results)
    }
}

/// Fold per-test telemetry into the final result
pub fn aggregate(
    status: Verdict,
    error_message: Option<String>,
    test_cases_passed: usize,
    total_test_cases: usize,
    test_results: Vec<TestOutcome>,
) -> ExecutionResult {
    let evaluated = test_results.len() as u64;
    let total_runtime: u64 = test_results.iter().map(|r| r.runtime_ms).sum();
    let runtime_ms = if evaluated == 0 { 0 } else { total_runtime / evaluated };
    let memory_kb = test_results.iter().map(|r| r.memory_kb).max().unwrap_or(0);

    ExecutionResult {
        status,
        error_message,
        runtime_ms,
        memory_kb,
        test_cases_passed,
        total_test_cases,
        test_results,
    }
}
