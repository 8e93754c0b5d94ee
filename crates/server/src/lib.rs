// Media job service library modules

pub mod adapt;
pub mod config;
pub mod error;
pub mod executor;
pub mod filters;
pub mod health;
pub mod http;
pub mod jobs;
pub mod options;
pub mod plan;
pub mod probe;
pub mod workspace;

// Re-export commonly used types
pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use http::{router, serve, AppState};
pub use jobs::{Job, UploadedAsset};
pub use plan::{CommandPlan, PlanRequest, Planner};
