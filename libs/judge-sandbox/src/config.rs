/// Sandbox configuration: fixed at construction, shared read-only.
use anyhow::{bail, Context, Result};
use judge_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config/sandbox.json";
pub const CONFIG_PATH_ENV: &str = "SANDBOX_CONFIG";

/// Per-language sandbox profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub language: Language,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_mb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<f64>,
}

impl LanguageProfile {
    pub fn builtin(language: Language) -> Self {
        Self {
            language,
            image: default_image(language).to_string(),
            memory_limit_mb: None,
            cpu_limit: None,
        }
    }
}

/// Base image used when no profile overrides it
pub fn default_image(language: Language) -> &'static str {
    match language {
        Language::JavaScript => "node:18-alpine",
        Language::Python => "python:3.11-alpine",
        Language::Java => "eclipse-temurin:17-jdk-alpine",
    }
}

/// Operational parameters of the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Wall-clock limit per test case
    pub timeout_seconds: u64,
    pub memory_limit_mb: u32,
    /// Fraction of one CPU
    pub cpu_limit: f64,
    /// Size of the writable /tmp inside the container
    pub scratch_size_mb: u32,
    /// Parent directory for per-invocation working directories
    pub work_root: PathBuf,
    pub run_as_user: String,
    pub languages: Vec<LanguageProfile>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            memory_limit_mb: 128,
            cpu_limit: 0.5,
            scratch_size_mb: 10,
            work_root: PathBuf::from("/tmp/judge-sandbox"),
            run_as_user: "nobody".to_string(),
            languages: Language::ALL.into_iter().map(LanguageProfile::builtin).collect(),
        }
    }
}

/// Resource limits applied to a single sandboxed run
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxLimits {
    pub timeout: Duration,
    pub memory_limit_mb: u32,
    pub cpu_limit: f64,
}

impl SandboxLimits {
    pub fn memory_bytes(&self) -> i64 {
        i64::from(self.memory_limit_mb) * 1024 * 1024
    }

    pub fn nano_cpus(&self) -> i64 {
        (self.cpu_limit * 1_000_000_000.0) as i64
    }
}

impl SandboxConfig {
    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Sandbox config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: SandboxConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to the built-in defaults when the file is absent
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }
        info!(path = %config_path.display(), "No sandbox config file, using defaults");
        Ok(Self::default())
    }

    /// Config path from `SANDBOX_CONFIG`, or `config/sandbox.json`
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            bail!("timeout_seconds must be greater than zero");
        }
        if self.memory_limit_mb == 0 {
            bail!("memory_limit_mb must be greater than zero");
        }
        if !(self.cpu_limit > 0.0) {
            bail!("cpu_limit must be positive, got {}", self.cpu_limit);
        }
        if self.scratch_size_mb == 0 {
            bail!("scratch_size_mb must be greater than zero");
        }

        let mut seen = HashSet::new();
        for profile in &self.languages {
            if !seen.insert(profile.language) {
                bail!("Duplicate sandbox profile for language: {}", profile.language);
            }
            if profile.image.trim().is_empty() {
                bail!("Empty image for language: {}", profile.language);
            }
            if profile.memory_limit_mb == Some(0) {
                bail!("memory_limit_mb for {} must be greater than zero", profile.language);
            }
            if let Some(cpu) = profile.cpu_limit {
                if !(cpu > 0.0) {
                    bail!("cpu_limit for {} must be positive, got {}", profile.language, cpu);
                }
            }
        }

        Ok(())
    }

    /// Profile for a language, or the built-in one when none is configured
    pub fn profile(&self, language: Language) -> LanguageProfile {
        self.languages
            .iter()
            .find(|p| p.language == language)
            .cloned()
            .unwrap_or_else(|| LanguageProfile::builtin(language))
    }

    pub fn image(&self, language: Language) -> String {
        self.profile(language).image
    }

    pub fn limits_for(&self, language: Language) -> SandboxLimits {
        let profile = self.profile(language);
        SandboxLimits {
            timeout: Duration::from_secs(self.timeout_seconds),
            memory_limit_mb: profile.memory_limit_mb.unwrap_or(self.memory_limit_mb),
            cpu_limit: profile.cpu_limit.unwrap_or(self.cpu_limit),
        }
    }
}
