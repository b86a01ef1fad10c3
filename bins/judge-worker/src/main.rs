use anyhow::{bail, Context};
use judge_common::redis;
use judge_common::types::{Job, JobOutcome};
use judge_sandbox::{ExecutionService, SandboxConfig};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_CONCURRENCY: usize = 4;
/// BLPOP timeout, bounds how long shutdown waits for the next poll
const POP_TIMEOUT_SECONDS: f64 = 5.0;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

fn parse_concurrency(value: Option<&str>) -> anyhow::Result<usize> {
    let Some(raw) = value else {
        return Ok(DEFAULT_CONCURRENCY);
    };
    let concurrency: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid WORKER_CONCURRENCY: {}", raw))?;
    if concurrency == 0 {
        bail!("WORKER_CONCURRENCY must be at least 1");
    }
    Ok(concurrency)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Judge worker booting...");

    let config_path = SandboxConfig::default_path();
    let config = SandboxConfig::load_or_default(&config_path).map_err(|e| {
        error!(path = %config_path.display(), "Failed to load sandbox configuration: {:#}", e);
        e
    })?;
    info!(
        timeout_seconds = config.timeout_seconds,
        memory_limit_mb = config.memory_limit_mb,
        cpu_limit = config.cpu_limit,
        languages = ?config.languages.iter().map(|p| p.language.as_str()).collect::<Vec<_>>(),
        "Sandbox configuration loaded"
    );

    let service = Arc::new(ExecutionService::connect(Arc::new(config))?);
    info!("Connected to Docker");

    let concurrency = parse_concurrency(std::env::var("WORKER_CONCURRENCY").ok().as_deref())?;

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());
    let client = ::redis::Client::open(redis_url.as_str())?;
    let redis_conn = ::redis::aio::ConnectionManager::new(client)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", redis_url))?;

    info!(redis_url = %redis_url, concurrency, queue = redis::QUEUE_KEY, "Connected to Redis");

    // Setup graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received shutdown signal, draining in-flight jobs...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!(error = %e, "Failed to install CTRL+C signal handler"),
        }
    });

    worker_loop(service, redis_conn, concurrency, shutdown_rx).await;

    info!("Worker shutdown complete");
    Ok(())
}

#[instrument(skip(service, redis_conn, shutdown))]
async fn worker_loop(
    service: Arc<ExecutionService>,
    mut redis_conn: ::redis::aio::ConnectionManager,
    concurrency: usize,
    shutdown: watch::Receiver<bool>,
) {
    let permits = Arc::new(Semaphore::new(concurrency));
    let mut in_flight = JoinSet::new();

    while !*shutdown.borrow() {
        // Only take a job off the queue once there is capacity to run it
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        match redis::pop_job(&mut redis_conn, POP_TIMEOUT_SECONDS).await {
            Ok(Some(job)) => {
                let service = Arc::clone(&service);
                let conn = redis_conn.clone();
                in_flight.spawn(async move {
                    process_job(&service, conn, job).await;
                    drop(permit);
                });
            }
            Ok(None) => {
                // Timeout - check for shutdown
            }
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
        }

        while let Some(joined) = in_flight.try_join_next() {
            if let Err(e) = joined {
                error!(error = %e, "Job task panicked");
            }
        }
    }

    info!(in_flight = in_flight.len(), "Waiting for in-flight jobs");
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Job task panicked");
        }
    }
}

#[instrument(skip_all, fields(job_id = %job.id))]
async fn process_job(
    service: &ExecutionService,
    mut redis_conn: ::redis::aio::ConnectionManager,
    job: Job,
) {
    info!(
        language = %job.request.language,
        test_cases = job.request.test_cases.len(),
        source_size = job.request.code.len(),
        queued_ms = (chrono::Utc::now() - job.submitted_at).num_milliseconds(),
        "Received job"
    );

    let start = Instant::now();
    let result = service.execute(&job.request).await;

    info!(
        verdict = %result.status,
        passed = result.test_cases_passed,
        total = result.total_test_cases,
        runtime_ms = result.runtime_ms,
        memory_kb = result.memory_kb,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Execution completed"
    );

    for (idx, test_result) in result.test_results.iter().enumerate() {
        debug!(
            test_index = idx,
            passed = test_result.passed,
            runtime_ms = test_result.runtime_ms,
            "Test result"
        );
    }

    let outcome = JobOutcome {
        job_id: job.id,
        completed_at: chrono::Utc::now(),
        result,
    };

    // Non-fatal - the worker keeps consuming
    match redis::store_result(&mut redis_conn, &outcome).await {
        Ok(()) => info!("Result persisted to Redis"),
        Err(e) => error!(error = %e, "Failed to persist result"),
    }
}
