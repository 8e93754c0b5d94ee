use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds surfaced by planning, storage and execution.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing field, unknown operation, malformed options or command quoting
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The external tool exited non-zero; `stderr` is kept verbatim
    #[error("processing failed with exit code {exit_code:?}")]
    ProcessingFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("processing timed out after {seconds} seconds")]
    TimedOut { seconds: u64 },

    /// The tool reported success but produced nothing at the output path
    #[error("output file was not created: {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    /// HTTP status code for this error kind
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::ProcessingFailed { .. } => 400,
            Self::TimedOut { .. } => 408,
            Self::OutputMissing(_) | Self::Storage { .. } | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for response bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::ProcessingFailed { .. } => "processing_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::OutputMissing(_) => "output_missing",
            Self::Storage { .. } => "storage_error",
            Self::Internal(_) => "internal_error",
        }
    }
}
