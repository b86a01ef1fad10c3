/// Execution Engine - Sandboxed Process Runner
///
/// **Core Responsibility:**
/// Run one wrapped program against one input inside an isolated,
/// resource-capped container and report what happened.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (Docker)
/// - Engine does NOT compare outputs or assign verdicts
/// - Engine returns a `RawOutcome` for the evaluator to judge
///
/// **Invocation lifecycle:**
/// `Prepared` (working directory written) → `Running` (container started,
/// waiting under the wall-clock deadline) → one of the terminal
/// [`RunState`]s. The working directory and the container are released on
/// every path, including timeout, error and panic.
use crate::config::{SandboxConfig, SandboxLimits};
use crate::harness::{Artifact, JAVA_CLASS, WORKSPACE_DIR};
use crate::invocation::SandboxInvocation;
use anyhow::bail;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::stream::StreamExt;
use judge_common::types::Language;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Output reported for a run that hit the wall-clock limit
pub const TIMEOUT_SENTINEL: &str = "timeout";
/// Prefix of the output reported for a crashed or unlaunchable run
pub const ERROR_SENTINEL_PREFIX: &str = "error: ";

/// Fixed base of the memory estimate, in KB
pub const BASE_MEMORY_KB: u64 = 1024;

/// Captured output beyond this is dropped (but still counted)
const MAX_CAPTURED_OUTPUT_BYTES: usize = 1024 * 1024;

/// Terminal state of one sandboxed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// The process exited on its own, with any status
    Completed,
    /// The wall-clock deadline fired and the process was killed
    TimedOut,
    /// The isolated environment could not be started or observed
    LaunchFailed,
}

/// What the evaluator gets back from one run.
///
/// `output` holds stdout and stderr interleaved in arrival order, or a
/// sentinel: `"timeout"` on timeout, `"error: <cause>"` on non-zero exit or
/// launch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutcome {
    pub output: String,
    pub wall_clock_ms: u64,
    pub timed_out: bool,
    pub process_error: Option<String>,
    pub state: RunState,
    pub memory_kb: u64,
}

impl RawOutcome {
    pub fn completed(output: impl Into<String>, wall_clock_ms: u64) -> Self {
        let output = output.into();
        let memory_kb = estimate_memory_kb(output.len());
        Self {
            output,
            wall_clock_ms,
            timed_out: false,
            process_error: None,
            state: RunState::Completed,
            memory_kb,
        }
    }

    pub fn crashed(cause: impl Into<String>, raw_output_len: usize, wall_clock_ms: u64) -> Self {
        let cause = cause.into();
        Self {
            output: format!("{}{}", ERROR_SENTINEL_PREFIX, cause),
            wall_clock_ms,
            timed_out: false,
            process_error: Some(cause),
            state: RunState::Completed,
            memory_kb: estimate_memory_kb(raw_output_len),
        }
    }

    pub fn timed_out(raw_output_len: usize, wall_clock_ms: u64) -> Self {
        Self {
            output: TIMEOUT_SENTINEL.to_string(),
            wall_clock_ms,
            timed_out: true,
            process_error: None,
            state: RunState::TimedOut,
            memory_kb: estimate_memory_kb(raw_output_len),
        }
    }

    pub fn launch_failed(cause: impl Into<String>, wall_clock_ms: u64) -> Self {
        let cause = cause.into();
        Self {
            output: format!("{}{}", ERROR_SENTINEL_PREFIX, cause),
            wall_clock_ms,
            timed_out: false,
            process_error: Some(cause),
            state: RunState::LaunchFailed,
            memory_kb: estimate_memory_kb(0),
        }
    }

    /// True when the process ran to completion with exit status 0
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Completed && self.process_error.is_none()
    }
}

/// Memory estimate derived from output volume.
/// Not a measurement; the container runtime's usage is not sampled.
pub fn estimate_memory_kb(raw_output_len: usize) -> u64 {
    BASE_MEMORY_KB + (raw_output_len / 100) as u64
}

/// Infrastructure faults that prevent a run from happening at all
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to prepare sandbox working directory: {0}")]
    Workspace(#[from] std::io::Error),
}

/// Runs a single artifact against a single input.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(
        &self,
        artifact: &Artifact,
        input: &str,
        limits: &SandboxLimits,
    ) -> Result<RawOutcome, SandboxError>;
}

/// How the container run ended, before it is turned into a `RawOutcome`
#[derive(Debug)]
enum Execution {
    Exited {
        output: Vec<u8>,
        output_len: usize,
        exit_code: i64,
        oom_killed: bool,
    },
    /// `output_len` counts what was streamed before the kill
    TimedOut { output_len: usize },
    LaunchFailed(String),
}

impl Execution {
    fn into_outcome(self, wall_clock_ms: u64) -> RawOutcome {
        match self {
            Execution::Exited {
                output,
                output_len,
                exit_code: 0,
                ..
            } => {
                let mut outcome =
                    RawOutcome::completed(String::from_utf8_lossy(&output), wall_clock_ms);
                outcome.memory_kb = estimate_memory_kb(output_len);
                outcome
            }
            Execution::Exited {
                output_len,
                exit_code,
                oom_killed,
                ..
            } => RawOutcome::crashed(exit_cause(exit_code, oom_killed), output_len, wall_clock_ms),
            Execution::TimedOut { output_len } => RawOutcome::timed_out(output_len, wall_clock_ms),
            Execution::LaunchFailed(cause) => RawOutcome::launch_failed(cause, wall_clock_ms),
        }
    }
}

/// Human-readable cause of a non-zero exit.
/// 137 is SIGKILL, which inside a memory-capped container is almost always the OOM killer.
pub fn exit_cause(exit_code: i64, oom_killed: bool) -> String {
    if oom_killed || exit_code == 137 {
        format!("exit status {} (killed: memory limit exceeded)", exit_code)
    } else {
        format!("exit status {}", exit_code)
    }
}

/// Container command for an artifact mounted at `/workspace`
pub fn command(artifact: &Artifact) -> Vec<String> {
    match artifact.language {
        Language::JavaScript => vec!["node".to_string(), artifact.filename.to_string()],
        Language::Python => vec!["python3".to_string(), artifact.filename.to_string()],
        // /workspace is read-only: compile into the scratch tmpfs
        Language::Java => vec![
            "sh".to_string(),
            "-c".to_string(),
            format!(
                "javac -d /tmp {} && java -cp /tmp {}",
                artifact.filename, JAVA_CLASS
            ),
        ],
    }
}

/// Container definition carrying the fixed isolation profile
pub fn container_config(
    config: &SandboxConfig,
    image: &str,
    bind: String,
    artifact: &Artifact,
    limits: &SandboxLimits,
) -> Config<String> {
    let memory = limits.memory_bytes();
    let tmpfs = HashMap::from([(
        "/tmp".to_string(),
        format!("rw,noexec,nosuid,size={}m", config.scratch_size_mb),
    )]);

    Config {
        image: Some(image.to_string()),
        cmd: Some(command(artifact)),
        env: Some(vec![
            "HOME=/tmp".to_string(),
            "PYTHONDONTWRITEBYTECODE=1".to_string(),
        ]),
        user: Some(config.run_as_user.clone()),
        working_dir: Some(WORKSPACE_DIR.to_string()),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(false),
        network_disabled: Some(true),
        host_config: Some(HostConfig {
            binds: Some(vec![bind]),
            network_mode: Some("none".to_string()),
            readonly_rootfs: Some(true),
            tmpfs: Some(tmpfs),
            memory: Some(memory),
            memory_swap: Some(memory),
            nano_cpus: Some(limits.nano_cpus()),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

async fn remove_container(docker: &Docker, container_id: &str) -> Result<(), bollard::errors::Error> {
    let options = RemoveContainerOptions {
        force: true,
        ..Default::default()
    };
    docker.remove_container(container_id, Some(options)).await
}

/// Container cleanup guard.
/// `release` removes the container and waits for it; if the guard is dropped
/// instead (error, cancellation, panic) removal is spawned on the runtime.
struct ContainerGuard {
    docker: Docker,
    container_id: Option<String>,
}

impl ContainerGuard {
    fn new(docker: &Docker, container_id: String) -> Self {
        Self {
            docker: docker.clone(),
            container_id: Some(container_id),
        }
    }

    async fn release(mut self) {
        if let Some(container_id) = self.container_id.take() {
            if let Err(e) = remove_container(&self.docker, &container_id).await {
                warn!(container_id = %container_id, error = %e, "Failed to remove container");
            }
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let Some(container_id) = self.container_id.take() else {
            return;
        };
        let docker = self.docker.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = remove_container(&docker, &container_id).await {
                        warn!(container_id = %container_id, error = %e, "Failed to cleanup container");
                    }
                });
            }
            Err(_) => {
                warn!(container_id = %container_id, "No runtime available, container left behind");
            }
        }
    }
}

/// Docker-backed sandbox runner.
///
/// One fresh container per run, created from the language's image with the
/// isolation profile from [`container_config`]: no network, read-only root,
/// small `noexec,nosuid` scratch, memory and CPU caps, unprivileged user.
pub struct DockerEngine {
    docker: Docker,
    config: Arc<SandboxConfig>,
}

impl DockerEngine {
    pub fn connect(config: Arc<SandboxConfig>) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| anyhow::anyhow!("Failed to connect to Docker daemon: {}", e))?;
        Ok(Self { docker, config })
    }

    /// Pull the image if it is not in the local cache
    async fn ensure_image(&self, image: &str) -> Result<(), bollard::errors::Error> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image = %image, "Image cache hit");
            return Ok(());
        }

        warn!(image = %image, "Image cache miss, pulling");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress?;
        }

        info!(image = %image, "Image pulled");
        Ok(())
    }

    /// Drain the container's combined output, then collect its exit status.
    /// `streamed` keeps the byte count even if this future is dropped at the deadline.
    async fn collect(
        &self,
        container_id: &str,
        streamed: &AtomicUsize,
    ) -> anyhow::Result<(Vec<u8>, i64)> {
        let mut output = Vec::new();

        let logs_options = Some(LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        });
        let mut logs = self.docker.logs(container_id, logs_options);

        while let Some(chunk) = logs.next().await {
            let message = match chunk? {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message } => message,
                LogOutput::StdIn { .. } => continue,
            };
            streamed.fetch_add(message.len(), Ordering::Relaxed);
            let room = MAX_CAPTURED_OUTPUT_BYTES.saturating_sub(output.len());
            output.extend_from_slice(&message[..message.len().min(room)]);
        }

        let wait_options = Some(WaitContainerOptions {
            condition: "not-running",
        });
        let mut wait = self.docker.wait_container(container_id, wait_options);

        let exit_code = match wait.next().await {
            Some(Ok(response)) => response.status_code,
            // bollard reports non-zero exits as an error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => code,
            Some(Err(e)) => return Err(e.into()),
            None => bail!("container wait stream ended without an exit status"),
        };

        Ok((output, exit_code))
    }

    async fn oom_killed(&self, container_id: &str) -> bool {
        match self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => details
                .state
                .and_then(|state| state.oom_killed)
                .unwrap_or(false),
            Err(e) => {
                debug!(container_id = %container_id, error = %e, "Could not inspect container");
                false
            }
        }
    }

    async fn execute(
        &self,
        invocation: &SandboxInvocation,
        artifact: &Artifact,
        limits: &SandboxLimits,
    ) -> Execution {
        let image = self.config.image(artifact.language);

        if let Err(e) = self.ensure_image(&image).await {
            return Execution::LaunchFailed(format!("failed to pull image {}: {}", image, e));
        }

        let container_name = format!("judge-{}", uuid::Uuid::new_v4());
        let config = container_config(&self.config, &image, invocation.bind_spec(), artifact, limits);
        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = match self.docker.create_container(Some(create_options), config).await {
            Ok(container) => container,
            Err(e) => return Execution::LaunchFailed(format!("failed to create container: {}", e)),
        };
        let container_id = container.id;

        // Set up cleanup immediately after creation
        let guard = ContainerGuard::new(&self.docker, container_id.clone());

        if let Err(e) = self
            .docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
        {
            guard.release().await;
            return Execution::LaunchFailed(format!("failed to start container: {}", e));
        }

        let streamed = AtomicUsize::new(0);
        let collected =
            tokio::time::timeout(limits.timeout, self.collect(&container_id, &streamed)).await;
        let output_len = streamed.load(Ordering::Relaxed);

        let execution = match collected {
            Ok(Ok((output, exit_code))) => {
                let oom_killed = exit_code != 0 && self.oom_killed(&container_id).await;
                Execution::Exited {
                    output,
                    output_len,
                    exit_code,
                    oom_killed,
                }
            }
            Ok(Err(e)) => Execution::LaunchFailed(format!("lost track of container: {}", e)),
            Err(_) => {
                if let Err(e) = self
                    .docker
                    .kill_container(&container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(container_id = %container_id, error = %e, "Failed to kill timed-out container");
                }
                Execution::TimedOut { output_len }
            }
        };

        guard.release().await;
        execution
    }
}

#[async_trait]
impl SandboxRunner for DockerEngine {
    #[instrument(skip(self, artifact, input, limits), fields(language = %artifact.language, timeout_ms = limits.timeout.as_millis() as u64))]
    async fn run(
        &self,
        artifact: &Artifact,
        input: &str,
        limits: &SandboxLimits,
    ) -> Result<RawOutcome, SandboxError> {
        let invocation = SandboxInvocation::prepare(&self.config.work_root, artifact, input)?;
        debug!(dir = %invocation.path().display(), "Sandbox prepared");

        let start = Instant::now();
        let execution = self.execute(&invocation, artifact, limits).await;
        let wall_clock_ms = start.elapsed().as_millis() as u64;

        let outcome = execution.into_outcome(wall_clock_ms);

        match outcome.state {
            RunState::Completed => debug!(
                wall_clock_ms,
                process_error = outcome.process_error.as_deref().unwrap_or(""),
                "Sandbox run completed"
            ),
            RunState::TimedOut => warn!(wall_clock_ms, "Sandbox run timed out"),
            RunState::LaunchFailed => error!(
                wall_clock_ms,
                cause = outcome.process_error.as_deref().unwrap_or(""),
                "Sandbox launch failed"
            ),
        }

        if let Err(e) = invocation.close() {
            warn!(error = %e, "Failed to remove sandbox working directory");
        }

        Ok(outcome)
    }
}
