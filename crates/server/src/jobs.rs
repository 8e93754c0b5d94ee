use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One request's isolated unit of work.
///
/// Owns exactly one input and one output directory, both named by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn new(input_root: &Path, output_root: &Path) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            input_dir: input_root.join(&id),
            output_dir: output_root.join(&id),
            id,
            created_at: Utc::now(),
        }
    }

    /// Path for a produced artifact inside this job's output directory
    pub fn output_file(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// A persisted upload and the name it is addressed by within its job.
///
/// `logical_name` is the positional index for list uploads or the form field
/// name for named uploads; it is unique within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub logical_name: String,
    pub original_filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl UploadedAsset {
    /// Extension of the original filename, without the dot
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
    }
}
