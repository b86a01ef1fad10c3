/// End-to-end tests against a real Docker daemon
///
/// These tests verify the full pipeline with real containers:
/// 1. Each language harness runs and is accepted
/// 2. Crashes and caught exceptions surface as runtime errors
/// 3. Non-terminating programs are killed at the deadline
/// 4. The isolation profile holds (no network, read-only workspace)
/// 5. Working directories and containers are removed after every run
///
/// Run with `cargo test -p judge-sandbox -- --ignored`.

#[cfg(test)]
mod docker_tests {
    use crate::config::SandboxConfig;
    use crate::executor::ExecutionService;
    use bollard::container::ListContainersOptions;
    use bollard::Docker;
    use judge_common::types::{ExecutionRequest, TestCase, Verdict};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    fn config(work_root: &Path, timeout_seconds: u64) -> Arc<SandboxConfig> {
        Arc::new(SandboxConfig {
            timeout_seconds,
            work_root: work_root.to_path_buf(),
            ..SandboxConfig::default()
        })
    }

    /// Sandbox containers, running or not, whose workspace lives under `work_root`
    async fn leftover_containers(work_root: &Path) -> Vec<String> {
        let docker = Docker::connect_with_local_defaults().expect("Failed to connect to Docker");
        let options = ListContainersOptions::<String> {
            all: true,
            filters: HashMap::from([("name".to_string(), vec!["judge-".to_string()])]),
            ..Default::default()
        };
        let containers = docker
            .list_containers(Some(options))
            .await
            .expect("Failed to list containers");

        containers
            .into_iter()
            .filter(|container| {
                container.mounts.iter().flatten().any(|mount| {
                    mount
                        .source
                        .as_deref()
                        .is_some_and(|source| Path::new(source).starts_with(work_root))
                })
            })
            .filter_map(|container| container.id)
            .collect()
    }

    fn request(language: &str, code: &str, cases: &[(&str, &str)]) -> ExecutionRequest {
        ExecutionRequest {
            code: code.to_string(),
            language: language.to_string(),
            test_cases: cases
                .iter()
                .map(|(input, expected)| TestCase {
                    input: input.to_string(),
                    expected_output: expected.to_string(),
                    is_hidden: false,
                })
                .collect(),
        }
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_javascript_echo_accepted() {
        let root = tempfile::tempdir().unwrap();
        let service = ExecutionService::connect(config(root.path(), 10))
            .expect("Failed to connect to Docker");

        let req = request(
            "javascript",
            "function solution(input){return input.trim();}",
            &[("hello", "hello")],
        );
        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::Accepted, "{:?}", result);
        assert_eq!(result.test_cases_passed, 1);
        assert_eq!(result.total_test_cases, 1);
        assert!(result.memory_kb >= 1024);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
        assert!(leftover_containers(root.path()).await.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_python_multiple_cases() {
        let root = tempfile::tempdir().unwrap();
        let service = ExecutionService::connect(config(root.path(), 10))
            .expect("Failed to connect to Docker");

        let req = request(
            "python",
            "def solution(input_data):\n    return int(input_data) * 2\n",
            &[("5", "10"), ("21", "42"), ("0", "0")],
        );
        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::Accepted, "{:?}", result);
        assert_eq!(result.test_cases_passed, 3);
        assert_eq!(result.test_results.len(), 3);
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_java_compiles_into_scratch() {
        let root = tempfile::tempdir().unwrap();
        let service = ExecutionService::connect(config(root.path(), 30))
            .expect("Failed to connect to Docker");

        let req = request(
            "java",
            "public String solution(String input) { return new StringBuilder(input).reverse().toString(); }",
            &[("abc", "cba")],
        );
        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::Accepted, "{:?}", result);
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_infinite_loop_times_out() {
        let root = tempfile::tempdir().unwrap();
        let service = ExecutionService::connect(config(root.path(), 1))
            .expect("Failed to connect to Docker");

        let req = request(
            "javascript",
            "function solution(input){ while(true){} }",
            &[("1", "1"), ("2", "2")],
        );
        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::TimeLimitExceeded);
        assert_eq!(result.test_results.len(), 1);
        assert_eq!(result.test_results[0].actual_output, "timeout");
        assert!(!result.test_results[0].passed);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);

        // The killed container is force-removed before the run returns
        let leftovers = leftover_containers(root.path()).await;
        assert!(leftovers.is_empty(), "leaked containers: {:?}", leftovers);
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_thrown_exception_is_runtime_error() {
        let root = tempfile::tempdir().unwrap();
        let service = ExecutionService::connect(config(root.path(), 10))
            .expect("Failed to connect to Docker");

        let req = request(
            "python",
            "def solution(input_data):\n    return 1 // 0\n",
            &[("1", "1")],
        );
        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::RuntimeError);
        assert!(result.test_results[0].actual_output.starts_with("Runtime Error:"));
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_network_is_unreachable() {
        let root = tempfile::tempdir().unwrap();
        let service = ExecutionService::connect(config(root.path(), 10))
            .expect("Failed to connect to Docker");

        // Anything but a clean "offline" means the container reached the network
        let code = r#"
function solution(input) {
    const dns = require('dns');
    dns.lookup('example.com', (err) => { console.log(err ? 'offline' : 'online'); });
    return '';
}"#;
        let req = request("javascript", code, &[("", "offline")]);
        let result = service.execute(&req).await;

        assert_eq!(result.status, Verdict::Accepted, "{:?}", result);
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_deterministic_request_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let service = ExecutionService::connect(config(root.path(), 10))
            .expect("Failed to connect to Docker");

        let req = request(
            "python",
            "def solution(input_data):\n    return input_data.upper()\n",
            &[("a", "A"), ("b", "x"), ("c", "C")],
        );
        let first = service.execute(&req).await;
        let second = service.execute(&req).await;

        assert_eq!(first.status, Verdict::WrongAnswer);
        assert_eq!(first.status, second.status);
        assert_eq!(first.test_cases_passed, second.test_cases_passed);
        let summary = |r: &judge_common::types::ExecutionResult| {
            r.test_results
                .iter()
                .map(|t| (t.passed, t.actual_output.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(summary(&first), summary(&second));
    }
}
