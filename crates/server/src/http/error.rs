//! Error-to-HTTP response conversion.

use crate::error::ServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// A [`ServiceError`] plus the job it happened in, if one had been created
#[derive(Debug)]
pub struct ApiError {
    inner: ServiceError,
    job_id: Option<String>,
}

impl ApiError {
    pub fn new(inner: ServiceError) -> Self {
        Self {
            inner,
            job_id: None,
        }
    }

    pub fn with_job_id(mut self, id: impl Into<String>) -> Self {
        self.job_id = Some(id.into());
        self
    }

    pub fn inner(&self) -> &ServiceError {
        &self.inner
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                job_id = self.job_id.as_deref().unwrap_or("-"),
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let detail = match &self.inner {
            ServiceError::ProcessingFailed { stderr, .. } => Some(stderr.clone()),
            _ => None,
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "job_id": self.job_id,
            "detail": detail,
        });

        (status, axum::Json(body)).into_response()
    }
}
