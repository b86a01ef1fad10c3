/// CLI commands for running and queueing submissions
use anyhow::{bail, Context, Result};
use judge_common::redis;
use judge_common::types::{ExecutionRequest, Job, Language, TestCase};
use judge_sandbox::executor::precheck;
use judge_sandbox::{harness, ExecutionService, SandboxConfig};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn read_code(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read code file {}", path.display()))
}

/// Load a JSON array of test cases
fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read test file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test cases in {}", path.display()))
}

fn parse_language(language: &str) -> Result<Language> {
    match Language::parse(language) {
        Some(language) => Ok(language),
        None => bail!(
            "Unsupported language: {} (expected one of: {})",
            language,
            Language::ALL.map(|l| l.as_str()).join(", ")
        ),
    }
}

fn build_request(language: &str, code: &Path, tests: &Path) -> Result<ExecutionRequest> {
    Ok(ExecutionRequest {
        code: read_code(code)?,
        language: language.to_string(),
        test_cases: load_test_cases(tests)?,
    })
}

/// Run a submission against the local Docker daemon
pub async fn run(language: &str, code: &Path, tests: &Path, config: Option<&Path>) -> Result<()> {
    let request = build_request(language, code, tests)?;

    let config_path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(SandboxConfig::default_path);
    let config = SandboxConfig::load_or_default(&config_path)?;
    let service = ExecutionService::connect(Arc::new(config))?;

    eprintln!(
        "🚀 Running {} test case(s) for {} (timeout {}s)",
        request.test_cases.len(),
        request.language,
        service.config().timeout_seconds
    );

    let result = service.execute(&request).await;

    eprintln!(
        "{} {} ({}/{})",
        if result.is_accepted() { "✅" } else { "❌" },
        result.status,
        result.test_cases_passed,
        result.total_test_cases
    );
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

/// Screen a submission and report why it would be rejected
pub fn validate(language: &str, code: &Path) -> Result<()> {
    let request = ExecutionRequest {
        code: read_code(code)?,
        language: language.to_string(),
        test_cases: Vec::new(),
    };

    match precheck(&request) {
        Ok(language) => {
            println!("✅ Submission passes validation for {}", language);
            Ok(())
        }
        Err(reason) => bail!("Submission rejected: {}", reason),
    }
}

/// Print the generated harness to stdout
pub fn wrap(language: &str, code: &Path) -> Result<()> {
    let language = parse_language(language)?;
    let artifact = harness::wrap(&read_code(code)?, language);

    eprintln!("📝 {}", artifact.filename);
    println!("{}", artifact.content);
    Ok(())
}

/// Push a job to the queue and optionally wait for its outcome
pub async fn submit(
    language: &str,
    code: &Path,
    tests: &Path,
    redis_url: &str,
    wait_secs: u64,
) -> Result<()> {
    let request = build_request(language, code, tests)?;
    parse_language(&request.language)?;

    let client = ::redis::Client::open(redis_url)?;
    let mut conn = ::redis::aio::ConnectionManager::new(client)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", redis_url))?;

    let job = Job::new(request);
    redis::push_job(&mut conn, &job).await?;
    println!("📤 Submitted job {}", job.id);

    if wait_secs == 0 {
        return Ok(());
    }

    let deadline = Instant::now() + Duration::from_secs(wait_secs);
    while Instant::now() < deadline {
        if let Some(outcome) = redis::get_result(&mut conn, &job.id).await? {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    bail!(
        "No result for job {} after {}s (check later under {})",
        job.id,
        wait_secs,
        redis::result_key(&job.id)
    )
}

/// Catalog entry for one supported language
fn language_entry(language: Language) -> serde_json::Value {
    serde_json::json!({
        "id": language.as_str(),
        "name": language.display_name(),
        "extension": language.extension(),
        "template": language.starter_template(),
    })
}

/// Print the supported languages
pub fn languages(json: bool) -> Result<()> {
    if json {
        let entries: Vec<_> = Language::ALL.into_iter().map(language_entry).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "languages": entries }))?
        );
        return Ok(());
    }

    for language in Language::ALL {
        println!(
            "📋 {} ({}, {})",
            language.display_name(),
            language.as_str(),
            language.extension()
        );
        for line in language.starter_template().lines() {
            println!("    {}", line);
        }
        println!();
    }
    Ok(())
}

/// Write the default sandbox configuration as JSON
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json_content = serde_json::to_string_pretty(&SandboxConfig::default())
        .context("Failed to serialize sandbox config")?;
    fs::write(path, json_content).with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Wrote default sandbox config to {}", path.display());
    Ok(())
}
