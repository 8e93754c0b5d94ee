//! Per-job scratch storage.
//!
//! Every job gets `<root>/input/<job id>` and `<root>/output/<job id>`. Input
//! directories are removed as soon as the tool has exited; output directories
//! are removed either immediately or, when their file is still being streamed
//! to a client, by a delayed background task. Uploads are stored as
//! `input/<job id>/<encoded logical name>/<original name>`.

use crate::error::{Result, ServiceError};
use crate::jobs::{Job, UploadedAsset};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::{Display, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct JobWorkspace {
    input_root: PathBuf,
    output_root: PathBuf,
    cleanup: CleanupScheduler,
}

impl JobWorkspace {
    /// Create (if needed) the input and output roots below `root`
    pub fn open(root: &Path) -> Result<Self> {
        let input_root = root.join("input");
        let output_root = root.join("output");

        for dir in [&input_root, &output_root] {
            std::fs::create_dir_all(dir).map_err(|e| {
                ServiceError::storage(format!("failed to create {}", dir.display()), e)
            })?;
        }

        Ok(Self {
            input_root,
            output_root,
            cleanup: CleanupScheduler::new(),
        })
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Allocate a fresh job id and create its two empty directories
    pub async fn create_job(&self) -> Result<Job> {
        let job = Job::new(&self.input_root, &self.output_root);

        for dir in [&job.input_dir, &job.output_dir] {
            tokio::fs::create_dir(dir).await.map_err(|e| {
                ServiceError::storage(format!("failed to create {}", dir.display()), e)
            })?;
        }

        debug!(job_id = %job.id, "Created job directories");
        Ok(job)
    }

    /// Write an upload's bytes into the job's input directory.
    ///
    /// Each upload gets its own subdirectory named by [`encode_logical_name`],
    /// so distinct logical names never collide and may be persisted
    /// concurrently. Reusing a logical name within a job is rejected.
    pub async fn persist<S, E>(
        &self,
        job: &Job,
        logical_name: &str,
        original_filename: &str,
        chunks: S,
    ) -> Result<UploadedAsset>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Display,
    {
        let mut chunks = std::pin::pin!(chunks);
        let dir_name = encode_logical_name(logical_name);
        if dir_name.len() > MAX_ENCODED_NAME_LEN {
            return Err(ServiceError::invalid(format!(
                "upload name '{}' is too long",
                logical_name
            )));
        }

        let asset_dir = job.input_dir.join(&dir_name);
        tokio::fs::create_dir(&asset_dir)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => ServiceError::invalid(format!(
                    "upload name '{}' was used more than once",
                    logical_name
                )),
                _ => ServiceError::storage(format!("failed to create {}", asset_dir.display()), e),
            })?;

        let path = asset_dir.join(sanitize_file_name(original_filename, "upload"));
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| ServiceError::storage(format!("failed to create {}", path.display()), e))?;

        let mut size_bytes: u64 = 0;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| {
                ServiceError::invalid(format!("failed to read upload '{}': {}", logical_name, e))
            })?;
            file.write_all(&chunk).await.map_err(|e| {
                ServiceError::storage(format!("failed to write {}", path.display()), e)
            })?;
            size_bytes = size_bytes.saturating_add(chunk.len() as u64);
        }
        file.flush()
            .await
            .map_err(|e| ServiceError::storage(format!("failed to flush {}", path.display()), e))?;

        debug!(
            job_id = %job.id,
            logical_name,
            size_bytes,
            path = %path.display(),
            "Persisted upload"
        );

        Ok(UploadedAsset {
            logical_name: logical_name.to_string(),
            original_filename: original_filename.to_string(),
            path,
            size_bytes,
        })
    }

    /// Remove the job's input directory; failures are logged, never raised
    pub async fn destroy_input(&self, job: &Job) {
        remove_job_dir(&job.input_dir, &job.id).await;
    }

    /// Remove the job's output directory; failures are logged, never raised
    pub async fn destroy_output(&self, job: &Job) {
        remove_job_dir(&job.output_dir, &job.id).await;
    }

    /// Remove the job's output directory after `delay` on a background task,
    /// without holding up the caller.
    pub fn schedule_delayed_destroy_output(&self, job: &Job, delay: Duration) {
        self.cleanup
            .schedule(job.id.clone(), job.output_dir.clone(), delay);
    }

    pub fn cleanup(&self) -> &CleanupScheduler {
        &self.cleanup
    }

    /// Remove per-job directories left behind by a previous process.
    ///
    /// Returns how many directories were removed.
    pub async fn purge_stale(&self) -> usize {
        let mut removed = 0;
        for root in [&self.input_root, &self.output_root] {
            let mut entries = match tokio::fs::read_dir(root).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Failed to list workspace root");
                    continue;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(root = %root.display(), error = %e, "Failed to list workspace root");
                        break;
                    }
                };
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                if !is_dir {
                    continue;
                }
                let path = entry.path();
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to purge stale job dir")
                    }
                }
            }
        }
        if removed > 0 {
            info!(removed, "Purged stale job directories");
        }
        removed
    }
}

async fn remove_job_dir(dir: &Path, job_id: &str) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(job_id, dir = %dir.display(), "Removed job directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            job_id,
            dir = %dir.display(),
            error = %e,
            "Failed to remove job directory"
        ),
    }
}

/// Longest per-upload directory name accepted; most filesystems cap a
/// single component at 255 bytes.
const MAX_ENCODED_NAME_LEN: usize = 240;

/// Location of an upload relative to its job's input directory:
/// `<encoded logical name>/<sanitized original name>`
pub fn stored_path(logical_name: &str, original_filename: &str) -> PathBuf {
    PathBuf::from(encode_logical_name(logical_name))
        .join(sanitize_file_name(original_filename, "upload"))
}

/// Reversible directory name for a logical upload name.
///
/// ASCII alphanumerics and `-` are kept; every other byte becomes `_XX`
/// (uppercase hex), `_` itself included. The empty name maps to a lone `_`,
/// which no other name can produce.
pub fn encode_logical_name(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            // Writing to a String cannot fail
            let _ = write!(out, "_{:02X}", byte);
        }
    }
    out
}

/// Keep ASCII alphanumerics, `.`, `-`, `_` and spaces; everything else
/// (including path separators) becomes `_`. Leading dots and spaces are
/// stripped.
pub fn sanitize_file_name(name: &str, fallback: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let out: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | ' ') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let out = out
        .trim_start_matches(['.', ' '])
        .trim_end()
        .to_string();
    if out.is_empty() {
        fallback.to_string()
    } else {
        out
    }
}

/// Delayed job-directory removal on tracked background tasks.
///
/// The delay is a grace period for responses still streaming the output
/// file; nothing confirms the stream finished first.
#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Default for CleanupScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanupScheduler {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn schedule(&self, job_id: String, dir: PathBuf, delay: Duration) {
        let shutdown = self.shutdown.clone();
        debug!(job_id = %job_id, delay_secs = delay.as_secs(), "Scheduled directory cleanup");
        self.tracker.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    debug!(job_id = %job_id, "Running directory cleanup early for shutdown");
                }
            }
            remove_job_dir(&dir, &job_id).await;
        });
    }

    /// Number of cleanups not yet finished
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every cleanup scheduled so far has run
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Skip the remaining delays, run every pending cleanup now and wait for them
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.flush().await;
    }
}
