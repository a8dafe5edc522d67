//! Worker process launching.
//!
//! [`WorkerLauncher`] is the narrow capability seam between the
//! orchestration logic and the execution substrate: start one named process
//! bound to a worker's URL, stream its output to the run log, block until it
//! exits, return the exit status. [`DockerLauncher`] is the production
//! implementation; tests substitute the fakes from [`crate::fakes`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{CONTAINER_MOUNT_PATH, CONTAINER_NAME_PREFIX, WORKER_IMAGE};
use crate::error::RunError;
use crate::plan::WorkerSpec;
use crate::sink::LogSink;

/// Ambient context shared by every launch in a run.
///
/// The working directory is mounted read-write into every worker process;
/// the environment snapshot is copied by value into each process and never
/// mutated by the orchestrator.
pub struct LaunchContext {
    /// Working directory exposed to every worker.
    pub workdir: PathBuf,

    /// Environment variables supplied to each worker process.
    pub env: Vec<(String, String)>,

    /// Sink receiving worker output and run progress lines.
    pub sink: Arc<dyn LogSink>,

    /// Cancellation hook checked at the blocking wait and between launches.
    pub cancel: CancellationToken,
}

impl LaunchContext {
    /// Context with an explicit environment snapshot.
    pub fn new(
        workdir: impl Into<PathBuf>,
        env: Vec<(String, String)>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            env,
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Context capturing the current process environment.
    pub fn with_current_env(workdir: impl Into<PathBuf>, sink: Arc<dyn LogSink>) -> Self {
        Self::new(workdir, std::env::vars().collect(), sink)
    }

    /// Replace the cancellation token, e.g. to wire an external shutdown signal.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Capability interface for starting one worker process and awaiting it.
///
/// Implementations must block until the process has fully completed; the
/// orchestrator relies on this to launch workers strictly one at a time.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Start the worker described by `spec` and return its exit status.
    ///
    /// Fails with [`RunError::Launch`] when the process cannot be started
    /// at all, and with [`RunError::Cancelled`] when the context token is
    /// cancelled while the process is in flight.
    async fn launch(&self, spec: &WorkerSpec, ctx: &LaunchContext) -> Result<i32, RunError>;
}

/// Launches each worker as a docker container.
///
/// The container is named from the worker key (so concurrent runs on the
/// same host cannot collide), given the run's working directory at the
/// conventional mount path, and handed the worker URL as its sole argument.
#[derive(Debug, Clone)]
pub struct DockerLauncher {
    image: String,
}

impl DockerLauncher {
    /// Launcher using a specific worker image.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// The image workers are started from.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Argument list for `docker`, one worker invocation.
    fn docker_args(&self, spec: &WorkerSpec, workdir: &Path) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:{}", workdir.display(), CONTAINER_MOUNT_PATH),
            format!("--name={}{}", CONTAINER_NAME_PREFIX, spec.key),
            self.image.clone(),
            spec.url.clone(),
        ]
    }
}

impl Default for DockerLauncher {
    fn default() -> Self {
        Self::new(WORKER_IMAGE)
    }
}

#[async_trait]
impl WorkerLauncher for DockerLauncher {
    async fn launch(&self, spec: &WorkerSpec, ctx: &LaunchContext) -> Result<i32, RunError> {
        let args = self.docker_args(spec, &ctx.workdir);
        debug!(worker = %spec.key, ?args, "Spawning worker container");

        let mut child = Command::new("docker")
            .args(&args)
            .current_dir(&ctx.workdir)
            .envs(ctx.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RunError::Launch {
                key: spec.key.clone(),
                source: e,
            })?;

        // Forward both output streams to the run log as they arrive. The
        // host listener treats them as one merged, line-oriented log.
        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(tokio::spawn(forward_lines(stdout, Arc::clone(&ctx.sink))));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(tokio::spawn(forward_lines(stderr, Arc::clone(&ctx.sink))));
        }

        // The one blocking point of a run. No timeout: a hung worker hangs
        // the run, and cancellation is the only way out.
        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| RunError::Launch {
                key: spec.key.clone(),
                source: e,
            })?,
            _ = ctx.cancel.cancelled() => {
                warn!(worker = %spec.key, "Cancellation requested, terminating worker");
                let _ = child.kill().await;
                return Err(RunError::Cancelled);
            }
        };

        // Drain whatever output is still buffered before reporting.
        for forwarder in forwarders {
            let _ = forwarder.await;
        }

        Ok(status.code().unwrap_or(-1))
    }
}

/// Forward one child output stream to the run log, line by line, verbatim.
async fn forward_lines<R>(stream: R, sink: Arc<dyn LogSink>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => sink.line(line.trim_end_matches(['\r', '\n'])),
            Err(e) => {
                warn!(error = %e, "Error reading worker output");
                break;
            }
        }
    }
}
