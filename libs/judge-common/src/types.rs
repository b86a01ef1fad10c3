use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Languages the sandbox knows how to wrap and run.
///
/// The set is closed: every harness and sandbox profile is chosen by an
/// exhaustive `match` on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    Python,
    Java,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::JavaScript, Language::Python, Language::Java];

    /// Resolve a wire identifier. Matching is exact and case-sensitive.
    pub fn parse(identifier: &str) -> Option<Self> {
        match identifier {
            "javascript" => Some(Language::JavaScript),
            "python" => Some(Language::Python),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::Python => "Python",
            Language::Java => "Java",
        }
    }

    /// Source file extension, with the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Language::JavaScript => ".js",
            Language::Python => ".py",
            Language::Java => ".java",
        }
    }

    /// Empty `solution` entry point shown to users before they write anything
    pub fn starter_template(&self) -> &'static str {
        match self {
            Language::JavaScript => "function solution(input) {\n    // Your code here\n    return \"\";\n}",
            Language::Python => "def solution(input_data):\n    # Your code here\n    return \"\"",
            Language::Java => {
                "public String solution(String input) {\n    // Your code here\n    return \"\";\n}"
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One test case from the caller's problem catalog. Read-only to the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub is_hidden: bool,
}

/// A submission to be judged.
///
/// `language` stays the raw identifier so an unsupported value can be
/// reported back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub test_cases: Vec<TestCase>,
}

/// Closed verdict taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Compile Error")]
    CompileError,
    #[serde(rename = "Internal Error")]
    InternalError,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::CompileError => "Compile Error",
            Verdict::InternalError => "Internal Error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    pub runtime_ms: u64,
    pub memory_kb: u64,
}

/// Aggregated verdict for one submission.
///
/// `test_results` stops at the first failing test case, so it is never
/// longer than `total_test_cases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub runtime_ms: u64,
    pub memory_kb: u64,
    pub test_cases_passed: usize,
    pub total_test_cases: usize,
    #[serde(default)]
    pub test_results: Vec<TestOutcome>,
}

impl ExecutionResult {
    /// A result for a request that never reached the sandbox.
    pub fn internal_error(message: impl Into<String>, total_test_cases: usize) -> Self {
        Self {
            status: Verdict::InternalError,
            error_message: Some(message.into()),
            runtime_ms: 0,
            memory_kb: 0,
            test_cases_passed: 0,
            total_test_cases,
            test_results: Vec::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == Verdict::Accepted
    }
}

/// Queue envelope for a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub request: ExecutionRequest,
}

impl Job {
    pub fn new(request: ExecutionRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            submitted_at: Utc::now(),
            request,
        }
    }
}

/// Queue envelope for a finished submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub result: ExecutionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_identifiers() {
        for language in Language::ALL {
            assert_eq!(Language::parse(language.as_str()), Some(language));
        }
        assert_eq!(Language::parse("cpp"), None);
        assert_eq!(Language::parse("Python"), None);
        assert_eq!(Language::parse(""), None);
    }

    #[test]
    fn test_language_catalog() {
        assert_eq!(Language::JavaScript.display_name(), "JavaScript");
        assert_eq!(Language::Python.extension(), ".py");
        assert_eq!(Language::Java.extension(), ".java");
        for language in Language::ALL {
            assert!(language.starter_template().contains("solution("));
        }
        assert!(Language::Python.starter_template().starts_with("def solution(input_data):"));
    }

    #[test]
    fn test_language_serde_matches_identifier() {
        let json = serde_json::to_string(&Language::JavaScript).unwrap();
        assert_eq!(json, "\"javascript\"");
    }

    #[test]
    fn test_verdict_wire_names() {
        assert_eq!(
            serde_json::to_string(&Verdict::TimeLimitExceeded).unwrap(),
            "\"Time Limit Exceeded\""
        );
        let parsed: Verdict = serde_json::from_str("\"Wrong Answer\"").unwrap();
        assert_eq!(parsed, Verdict::WrongAnswer);
        assert_eq!(Verdict::InternalError.to_string(), "Internal Error");
    }

    #[test]
    fn test_internal_error_keeps_total() {
        let result = ExecutionResult::internal_error("boom", 3);
        assert_eq!(result.status, Verdict::InternalError);
        assert_eq!(result.total_test_cases, 3);
        assert_eq!(result.test_cases_passed, 0);
        assert!(!result.is_accepted());
    }

    #[test]
    fn test_result_omits_missing_error_message() {
        let result = ExecutionResult {
            status: Verdict::Accepted,
            error_message: None,
            runtime_ms: 12,
            memory_kb: 1024,
            test_cases_passed: 1,
            total_test_cases: 1,
            test_results: Vec::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("error_message").is_none());
        assert_eq!(json["status"], "Accepted");
    }

    #[test]
    fn test_case_hidden_defaults_to_false() {
        let tc: TestCase =
            serde_json::from_str(r#"{"input":"1","expected_output":"2"}"#).unwrap();
        assert!(!tc.is_hidden);
    }
}
