/// Code Validator - Static Pre-Execution Screen
///
/// Rejects oversized submissions and submissions containing well-known
/// escape idioms before any sandbox resource is allocated.
///
/// This is a coarse substring filter, not a security boundary: the isolation
/// profile applied by the engine is what actually contains the program.
use judge_common::types::Language;
use thiserror::Error;

/// Maximum submission size in characters
pub const MAX_CODE_CHARS: usize = 50_000;

/// Substrings rejected regardless of the declared language.
/// Matched against the lowercased code, in this order.
pub const DENIED_PATTERNS: &[&str] = &[
    "import os",
    "import sys",
    "import subprocess",
    "import socket",
    "exec(",
    "eval(",
    "__import__",
    "open(",
    "file(",
    "System.exit",
    "Runtime.getRuntime",
    "ProcessBuilder",
    "require('fs')",
    "require('os')",
    "require('child_process')",
    "process.exit",
    "require('net')",
    "require('http')",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("code exceeds maximum length limit of {limit} characters (got {actual})")]
    TooLong { actual: usize, limit: usize },
    #[error("code contains potentially dangerous pattern: {0}")]
    DeniedPattern(&'static str),
}

/// Screen a submission. Pure and deterministic.
///
/// `_language` is accepted for the contract's sake; the same deny-list
/// applies to every language.
pub fn validate(code: &str, _language: Language) -> Result<(), Rejection> {
    let actual = code.chars().count();
    if actual > MAX_CODE_CHARS {
        return Err(Rejection::TooLong {
            actual,
            limit: MAX_CODE_CHARS,
        });
    }

    let lowered = code.to_lowercase();
    match DENIED_PATTERNS
        .iter()
        .find(|pattern| lowered.contains(&pattern.to_lowercase()))
    {
        Some(pattern) => Err(Rejection::DeniedPattern(pattern)),
        None => Ok(()),
    }
}
