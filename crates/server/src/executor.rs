use crate::error::{Result, ServiceError};
use crate::plan::CommandPlan;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Everything observed from one external-tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `None` when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Spawn the plan's program and capture both output streams.
///
/// Only a spawn or wait failure is an error here; exit status and timeout are
/// reported in the result. A run exceeding `timeout` is killed.
pub async fn execute(plan: &CommandPlan, timeout: Duration) -> Result<ExecutionResult> {
    let started = Instant::now();

    let mut cmd = Command::new(plan.program());
    cmd.args(plan.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        ServiceError::Internal(format!("failed to spawn {}: {}", plan.program(), e))
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ExecutionResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            timed_out: false,
            elapsed: started.elapsed(),
        }),
        Ok(Err(e)) => Err(ServiceError::Internal(format!(
            "failed to wait for {}: {}",
            plan.program(),
            e
        ))),
        // Dropping the wait future drops the child, which kills it
        Err(_elapsed) => Ok(ExecutionResult {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
            elapsed: started.elapsed(),
        }),
    }
}

/// Run a plan and classify the outcome.
///
/// - timeout → `TimedOut`
/// - non-zero exit → `ProcessingFailed` carrying stderr verbatim
/// - zero exit but no file at the plan's output path → `OutputMissing`
pub async fn run(plan: &CommandPlan, timeout: Duration) -> Result<ExecutionResult> {
    info!(command = %plan, "Running external tool");
    let result = execute(plan, timeout).await?;

    if result.timed_out {
        error!(
            timeout_secs = timeout.as_secs(),
            program = plan.program(),
            "External tool timed out"
        );
        return Err(ServiceError::TimedOut {
            seconds: timeout.as_secs(),
        });
    }

    if result.exit_code != Some(0) {
        error!(
            exit_code = ?result.exit_code,
            stderr = %result.stderr,
            "External tool failed"
        );
        return Err(ServiceError::ProcessingFailed {
            exit_code: result.exit_code,
            stderr: result.stderr,
        });
    }

    let output_path = plan.output_path();
    if !tokio::fs::try_exists(output_path).await.unwrap_or(false) {
        error!(output = %output_path.display(), "External tool succeeded without output");
        return Err(ServiceError::OutputMissing(output_path.to_path_buf()));
    }

    debug!(elapsed_ms = result.elapsed.as_millis() as u64, "External tool finished");
    Ok(result)
}

/// JobExecutor bounds how many external-tool runs happen at once
#[derive(Debug, Clone)]
pub struct JobExecutor {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl JobExecutor {
    /// Create a new JobExecutor with the specified maximum concurrent jobs
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent: max_concurrent_jobs,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Execute `job_fn` once a slot is free, holding the slot until it finishes
    pub async fn execute_job<F, Fut, T>(&self, job_fn: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ServiceError::Internal(format!("executor closed: {}", e)))?;

        job_fn().await
    }

    /// [`run`] a plan inside a concurrency slot
    pub async fn run(&self, plan: &CommandPlan, timeout: Duration) -> Result<ExecutionResult> {
        self.execute_job(|| run(plan, timeout)).await
    }
}
