use super::error::ApiError;
use super::upload::{self, Binding, JobForm};
use super::AppState;
use crate::adapt;
use crate::error::{Result, ServiceError};
use crate::health::{check_tool_version, HealthReport, ServiceInfo};
use crate::jobs::{Job, UploadedAsset};
use crate::plan::{CommandPlan, PlanRequest};
use crate::workspace::{sanitize_file_name, JobWorkspace};
use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

const DEFAULT_OUTPUT_EXTENSION: &str = "mp4";

pub async fn index() -> Json<ServiceInfo> {
    Json(ServiceInfo::current())
}

/// Always 200; an unavailable tool is reported in the body
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    let check = check_tool_version(&state.config.ffmpeg_bin, state.config.health_timeout()).await;
    if let Err(e) = &check {
        warn!(error = %e, "Health check failed");
    }
    Json(HealthReport::from_check(check))
}

/// `POST /process`: one upload plus `command`, or any uploads plus `operation`
pub async fn process(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let dirs = JobDirs::create(&state.workspace).await?;
    info!(job_id = %dirs.job.id, "Starting job");

    let outcome = async {
        let form = upload::collect(&state.workspace, &dirs.job, multipart, Binding::Positional)
            .await?;
        let (plan, timeout) = plan_uploads(&state, &dirs.job, &form)?;
        state.executor.run(&plan, timeout).await?;
        Ok::<_, ServiceError>(plan.output_path().to_path_buf())
    }
    .await;

    dirs.deliver(&state, outcome).await
}

/// `POST /process-named`: uploads referenced as `{field}` inside `command`
pub async fn process_named(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let dirs = JobDirs::create(&state.workspace).await?;
    info!(job_id = %dirs.job.id, "Starting named job");

    let outcome = async {
        let form =
            upload::collect(&state.workspace, &dirs.job, multipart, Binding::Named).await?;
        let command = form.required("command")?;
        let command = adapt_to_first_upload(&state, &dirs.job, command, &form.uploads).await;

        let output = dirs.job.output_file(&output_file_name(form.output_format()));
        let plan = state.planner.plan(
            PlanRequest::Named {
                command: &command,
                uploads: &form.uploads,
            },
            &output,
        )?;
        state.executor.run(&plan, state.config.multi_timeout()).await?;
        Ok::<_, ServiceError>(plan.output_path().to_path_buf())
    }
    .await;

    dirs.deliver(&state, outcome).await
}

fn plan_uploads(state: &AppState, job: &Job, form: &JobForm) -> Result<(CommandPlan, Duration)> {
    let operation = form.field("operation").filter(|op| !op.trim().is_empty());

    match (form.uploads.as_slice(), operation) {
        ([], _) => Err(ServiceError::invalid("at least one file is required")),
        ([single], None) => {
            let command = form
                .field("command")
                .ok_or_else(|| ServiceError::invalid("command is required"))?;
            let extension = form.output_format().or_else(|| single.extension());
            let output = job.output_file(&output_file_name(extension));
            let plan = state.planner.plan(
                PlanRequest::Single {
                    input: &single.path,
                    command,
                },
                &output,
            )?;
            Ok((plan, state.config.single_timeout()))
        }
        (_, None) => Err(ServiceError::invalid(
            "operation is required when more than one file is uploaded",
        )),
        (uploads, Some(operation)) => {
            info!(
                job_id = %job.id,
                operation = operation.trim(),
                inputs = uploads.len(),
                "Planning multi-input job"
            );
            let inputs: Vec<PathBuf> = uploads.iter().map(|u| u.path.clone()).collect();
            let output = job.output_file(&output_file_name(form.output_format()));
            let plan = state.planner.plan_operation(
                operation,
                &inputs,
                form.field("command"),
                form.field("options"),
                &output,
            )?;
            Ok((plan, state.config.multi_timeout()))
        }
    }
}

/// Drop the audio side of concat/crossfade graphs when the first upload has
/// no audio. Only that upload is probed.
async fn adapt_to_first_upload(
    state: &AppState,
    job: &Job,
    command: &str,
    uploads: &[UploadedAsset],
) -> String {
    let Some(first) = uploads.first() else {
        return command.to_string();
    };
    if !adapt::references_audio_graph(command) {
        return command.to_string();
    }

    let presence = state.introspector.detect_streams(&first.path).await;
    if presence.has_audio {
        return command.to_string();
    }

    info!(
        job_id = %job.id,
        upload = %first.logical_name,
        "First upload has no audio, dropping audio side of command"
    );
    adapt::strip_audio_side(command)
}

fn output_file_name(extension: Option<&str>) -> String {
    format!(
        "output.{}",
        sanitize_file_name(
            extension.unwrap_or(DEFAULT_OUTPUT_EXTENSION),
            DEFAULT_OUTPUT_EXTENSION
        )
    )
}

/// Owns one job's directories for the lifetime of a request.
///
/// `deliver` removes the input directory, and the output directory too
/// unless a response is streaming from it. A handler abandoned mid-way by a
/// disconnected client never reaches `deliver`; dropping the guard then hands
/// both directories to the cleanup scheduler.
struct JobDirs<'a> {
    workspace: &'a JobWorkspace,
    job: Job,
    released: bool,
}

impl<'a> JobDirs<'a> {
    async fn create(workspace: &'a JobWorkspace) -> Result<Self> {
        Ok(Self {
            workspace,
            job: workspace.create_job().await?,
            released: false,
        })
    }

    async fn deliver(
        mut self,
        state: &AppState,
        outcome: Result<PathBuf>,
    ) -> std::result::Result<Response, ApiError> {
        let opened = match outcome {
            Ok(path) => tokio::fs::File::open(&path)
                .await
                .map(|file| (path.clone(), file))
                .map_err(|e| {
                    ServiceError::storage(format!("failed to open {}", path.display()), e)
                }),
            Err(e) => Err(e),
        };

        let (path, file) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.release(false).await;
                return Err(ApiError::from(e).with_job_id(&self.job.id));
            }
        };

        self.release(true).await;
        self.workspace
            .schedule_delayed_destroy_output(&self.job, state.config.output_cleanup_delay());

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| output_file_name(None));
        info!(job_id = %self.job.id, output = %path.display(), "Job completed");

        Ok(attachment(file, &file_name))
    }

    async fn release(&mut self, keep_output: bool) {
        self.workspace.destroy_input(&self.job).await;
        if !keep_output {
            self.workspace.destroy_output(&self.job).await;
        }
        self.released = true;
    }
}

impl Drop for JobDirs<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(job_id = %self.job.id, "Job abandoned, scheduling directory cleanup");
        let cleanup = self.workspace.cleanup();
        cleanup.schedule(self.job.id.clone(), self.job.input_dir.clone(), Duration::ZERO);
        cleanup.schedule(self.job.id.clone(), self.job.output_dir.clone(), Duration::ZERO);
    }
}

fn attachment(file: tokio::fs::File, file_name: &str) -> Response {
    let body = Body::from_stream(ReaderStream::new(file));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name(None), "output.mp4");
        assert_eq!(output_file_name(Some("wav")), "output.wav");
        assert_eq!(output_file_name(Some("../../x")), "output.x");
        assert_eq!(output_file_name(Some("")), "output.mp4");
    }
}
