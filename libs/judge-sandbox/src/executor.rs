/// Execution Service - High-Level Orchestration
///
/// **Responsibility:**
/// Coordinate validator, harness, runner and evaluator to turn one
/// `ExecutionRequest` into one `ExecutionResult`.
///
/// **Architecture:**
/// 1. Resolve the language and screen the code (validator.rs)
/// 2. Wrap the code into a runnable harness (harness.rs)
/// 3. Run every test case through the `SandboxRunner` (evaluator.rs, engine.rs)
/// 4. Return the aggregated result
///
/// This module is the glue layer - it knows nothing about:
/// - How code executes (engine's job)
/// - How outputs are compared and verdicts chosen (evaluator's and verdict's job)
///
/// `execute` never fails: rejections and infrastructure faults come back as
/// an `InternalError` result.
use crate::config::SandboxConfig;
use crate::engine::{DockerEngine, SandboxRunner};
use crate::evaluator::TestEvaluator;
use crate::harness;
use crate::validator;
use crate::verdict::OutputSniffer;
use anyhow::Result;
use judge_common::types::{ExecutionRequest, ExecutionResult, Language};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Why a request was turned away before reaching the sandbox
pub fn precheck(request: &ExecutionRequest) -> Result<Language, String> {
    let language = Language::parse(&request.language)
        .ok_or_else(|| format!("Unsupported language: {}", request.language))?;
    validator::validate(&request.code, language).map_err(|rejection| rejection.to_string())?;
    Ok(language)
}

pub struct ExecutionService<R: SandboxRunner = DockerEngine> {
    config: Arc<SandboxConfig>,
    runner: R,
    classifier: OutputSniffer,
}

impl ExecutionService<DockerEngine> {
    /// Production service backed by the local Docker daemon
    pub fn connect(config: Arc<SandboxConfig>) -> Result<Self> {
        let runner = DockerEngine::connect(Arc::clone(&config))?;
        Ok(Self::new(config, runner))
    }
}

impl<R: SandboxRunner> ExecutionService<R> {
    pub fn new(config: Arc<SandboxConfig>, runner: R) -> Self {
        Self {
            config,
            runner,
            classifier: OutputSniffer,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    #[instrument(skip(self, request), fields(language = %request.language, test_count = request.test_cases.len()))]
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let total_test_cases = request.test_cases.len();

        let language = match precheck(request) {
            Ok(language) => language,
            Err(reason) => {
                info!(reason = %reason, "Submission rejected before execution");
                return ExecutionResult::internal_error(reason, total_test_cases);
            }
        };

        let started = Instant::now();
        let artifact = harness::wrap(&request.code, language);
        let limits = self.config.limits_for(language);

        let result = TestEvaluator::new(&self.runner, &self.classifier)
            .evaluate(&artifact, &request.test_cases, &limits)
            .await;

        info!(
            verdict = %result.status,
            passed = result.test_cases_passed,
            total = result.total_test_cases,
            runtime_ms = result.runtime_ms,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Submission evaluated"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RawOutcome;
    use crate::testing::{test_case, ScriptedRunner};
    use judge_common::types::Verdict;

    fn service(runner: ScriptedRunner) -> ExecutionService<ScriptedRunner> {
        ExecutionService::new(Arc::new(SandboxConfig::default()), runner)
    }

    fn request(code: &str, language: &str, cases: Vec<(&str, &str)>) -> ExecutionRequest {
        ExecutionRequest {
            code: code.to_string(),
            language: language.to_string(),
            test_cases: cases.into_iter().map(|(i, e)| test_case(i, e)).collect(),
        }
    }

    #[tokio::test]
    async fn test_accepts_echo_solution() {
        let service = service(ScriptedRunner::echo());
        let req = request(
            "function solution(input){return input.trim();}",
            "javascript",
            vec![("hello", "hello")],
        );

        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::Accepted);
        assert_eq!(result.test_cases_passed, 1);
        assert_eq!(result.total_test_cases, 1);
        assert_eq!(result.test_results.len(), 1);
        assert!(result.test_results[0].passed);
        assert_eq!(service.runner().inputs(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_validation_short_circuits_before_sandbox() {
        let service = service(ScriptedRunner::echo());
        let req = request(
            "IMPORT OS\ndef solution(x):\n    return x",
            "python",
            vec![("1", "1"), ("2", "2")],
        );

        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::InternalError);
        assert!(result.error_message.as_deref().unwrap().contains("import os"));
        assert_eq!(result.total_test_cases, 2);
        assert!(result.test_results.is_empty());
        assert_eq!(service.runner().calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_code_is_rejected() {
        let service = service(ScriptedRunner::echo());
        let req = request(&"a".repeat(60_000), "javascript", vec![("1", "1")]);

        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::InternalError);
        assert!(result.error_message.unwrap().contains("maximum length"));
        assert_eq!(service.runner().calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let service = service(ScriptedRunner::echo());
        let req = request("fn main() {}", "rust", vec![("1", "1")]);

        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::InternalError);
        assert_eq!(result.error_message.as_deref(), Some("Unsupported language: rust"));
        assert_eq!(result.total_test_cases, 1);
        assert_eq!(service.runner().calls(), 0);
    }

    #[tokio::test]
    async fn test_rejection_without_test_cases_reports_zero_of_zero() {
        let service = service(ScriptedRunner::echo());
        let req = request("import subprocess", "python", vec![]);

        let result = service.execute(&req).await;

        // Not Accepted even though passed == total
        assert_eq!(result.status, Verdict::InternalError);
        assert_eq!(result.test_cases_passed, 0);
        assert_eq!(result.total_test_cases, 0);
        assert_eq!(service.runner().calls(), 0);
    }

    #[tokio::test]
    async fn test_wrong_answer_never_runs_second_case() {
        let service = service(ScriptedRunner::new(vec![RawOutcome::completed("3", 5)]));
        let req = request(
            "def solution(x):\n    return 3",
            "python",
            vec![("1", "2"), ("2", "3")],
        );

        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::WrongAnswer);
        assert_eq!(result.test_results.len(), 1);
        assert_eq!(service.runner().calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_verdict() {
        let service = service(ScriptedRunner::new(vec![RawOutcome::timed_out(0, 1002)]));
        let req = request("while(true){}", "javascript", vec![("1", "1")]);

        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::TimeLimitExceeded);
        assert_eq!(result.test_results[0].actual_output, "timeout");
        assert!(!result.test_results[0].passed);
    }

    #[tokio::test]
    async fn test_infrastructure_fault_is_internal_error() {
        let service = service(ScriptedRunner::echo().failing_after(0));
        let req = request("function solution(i){return i;}", "javascript", vec![("1", "1")]);

        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::InternalError);
        assert!(result.error_message.is_some());
        assert!(result.test_results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_test_case_list() {
        let service = service(ScriptedRunner::echo());
        let req = request("function solution(i){return i;}", "javascript", vec![]);

        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::Accepted);
        assert_eq!(result.total_test_cases, 0);
        assert_eq!(result.runtime_ms, 0);
    }

    #[tokio::test]
    async fn test_same_request_twice_gives_same_result() {
        let service = service(ScriptedRunner::echo());
        let req = request(
            "function solution(input){return input.trim();}",
            "javascript",
            vec![("a", "a"), ("b", "c")],
        );

        let first = service.execute(&req).await;
        let second = service.execute(&req).await;

        assert_eq!(first.status, Verdict::WrongAnswer);
        assert_eq!(first.status, second.status);
        assert_eq!(first.test_cases_passed, second.test_cases_passed);
        assert_eq!(first.test_results.len(), second.test_results.len());
        for (a, b) in first.test_results.iter().zip(&second.test_results) {
            assert_eq!(a.passed, b.passed);
            assert_eq!(a.actual_output, b.actual_output);
        }
    }

    #[test]
    fn test_precheck_resolves_language() {
        let req = request("def solution(x): return x", "python", vec![]);
        assert_eq!(precheck(&req), Ok(Language::Python));
    }
}
