//! Data model and queue semantics shared by the judge worker and CLI.

pub mod redis;
pub mod types;
