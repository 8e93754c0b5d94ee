//! HTTP surface: router, shared state and server lifecycle.

mod error;
mod handlers;
mod middleware;
mod upload;

pub use error::ApiError;
pub use upload::{Binding, JobForm};

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::executor::JobExecutor;
use crate::plan::Planner;
use crate::probe::StreamIntrospector;
use crate::workspace::JobWorkspace;
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Everything a request handler needs, shared across requests
#[derive(Debug)]
pub struct AppState {
    pub config: ServiceConfig,
    pub workspace: JobWorkspace,
    pub planner: Planner,
    pub executor: JobExecutor,
    pub introspector: StreamIntrospector,
}

impl AppState {
    /// Open the workspace under `config.temp_root` and wire up the collaborators
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let workspace = JobWorkspace::open(&config.temp_root)?;
        Ok(Self {
            planner: Planner::new(config.ffmpeg_bin.clone()),
            executor: JobExecutor::new(config.max_concurrent_jobs),
            introspector: StreamIntrospector::new(
                config.ffprobe_bin.clone(),
                config.probe_timeout(),
            ),
            workspace,
            config,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/process", post(handlers::process))
        .route("/process-named", post(handlers::process_named))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(middleware::log_request_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.bind_addr` and serve until `shutdown` resolves.
///
/// Stale job directories are purged before listening. On shutdown every
/// pending output cleanup runs immediately and is awaited.
pub async fn serve<F>(config: ServiceConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState::new(config).context("Failed to open job workspace")?);
    state.workspace.purge_stale().await;

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", state.config.bind_addr))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    let cleanup = state.workspace.cleanup();
    info!(pending = cleanup.pending(), "Running pending output cleanups");
    cleanup.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}
