/// Harness Templater - wraps user code into a runnable program
///
/// Every harness reads `/workspace/input.txt`, calls the user's `solution`
/// entry point with the trimmed contents and prints the return value.
/// Exceptions are caught and reported on stderr as `Runtime Error: <message>`.
///
/// The user code is embedded verbatim; file and class names come from the
/// language alone.
use judge_common::types::Language;

/// Mount point of the invocation directory inside the container
pub const WORKSPACE_DIR: &str = "/workspace";
pub const INPUT_FILE: &str = "input.txt";
pub const INPUT_PATH: &str = "/workspace/input.txt";
pub const RUNTIME_ERROR_PREFIX: &str = "Runtime Error:";
/// Top-level class of the Java harness
pub const JAVA_CLASS: &str = "Solution";

/// A runnable program ready to be placed in a sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub language: Language,
    pub filename: &'static str,
    pub content: String,
}

pub fn filename(language: Language) -> &'static str {
    match language {
        Language::JavaScript => "solution.js",
        Language::Python => "solution.py",
        Language::Java => "Solution.java",
    }
}

const JS_PRELUDE: &str = r#"
const fs = require('fs');

const input = fs.readFileSync('/workspace/input.txt', 'utf8').trim();

"#;

const JS_EPILOGUE: &str = r#"

try {
    const result = solution(input);
    console.log(result);
} catch (error) {
    console.error('Runtime Error:', error && error.message !== undefined ? error.message : error);
}
"#;

const PY_PRELUDE: &str = r#"
import sys

with open('/workspace/input.txt', 'r') as f:
    input_data = f.read().strip()

"#;

const PY_EPILOGUE: &str = r#"

try:
    result = solution(input_data)
    print(result)
except Exception as error:
    print(f'Runtime Error: {error}', file=sys.stderr)
"#;

const JAVA_PRELUDE: &str = r#"
import java.io.*;
import java.nio.charset.StandardCharsets;
import java.nio.file.*;
import java.util.*;

public class Solution {
"#;

const JAVA_EPILOGUE: &str = r#"

    public static void main(String[] args) {
        try {
            String input = new String(
                Files.readAllBytes(Paths.get("/workspace/input.txt")),
                StandardCharsets.UTF_8
            ).trim();

            Solution sol = new Solution();
            System.out.println(String.valueOf(sol.solution(input)));
        } catch (Throwable error) {
            System.err.println("Runtime Error: " + error.getMessage());
        }
    }
}
"#;

/// Wrap user code into the language's harness
pub fn wrap(code: &str, language: Language) -> Artifact {
    let (prelude, epilogue) = match language {
        Language::JavaScript => (JS_PRELUDE, JS_EPILOGUE),
        Language::Python => (PY_PRELUDE, PY_EPILOGUE),
        Language::Java => (JAVA_PRELUDE, JAVA_EPILOGUE),
    };

    let mut content = String::with_capacity(prelude.len() + code.len() + epilogue.len());
    content.push_str(prelude);
    content.push_str(code);
    content.push_str(epilogue);

    Artifact {
        language,
        filename: filename(language),
        content,
    }
}
