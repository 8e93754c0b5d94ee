use crate::error::{Result, ServiceError};
use crate::jobs::{Job, UploadedAsset};
use crate::workspace::JobWorkspace;
use axum::extract::Multipart;
use std::collections::HashMap;
use tracing::debug;

/// How file parts get their logical names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// `0`, `1`, ... in submission order
    Positional,
    /// The form field name the part was submitted under
    Named,
}

/// A multipart form after every file part has been written to the job's
/// input directory.
#[derive(Debug, Default)]
pub struct JobForm {
    pub uploads: Vec<UploadedAsset>,
    fields: HashMap<String, String>,
}

impl JobForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// A text field that must be present and non-blank
    pub fn required(&self, name: &str) -> Result<&str> {
        match self.field(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ServiceError::invalid(format!("{} is required", name))),
        }
    }

    /// `output_format` trimmed, leading dots stripped, blank treated as absent
    pub fn output_format(&self) -> Option<&str> {
        self.field("output_format")
            .map(|f| f.trim().trim_start_matches('.'))
            .filter(|f| !f.is_empty())
    }
}

/// Read every multipart part, streaming file parts (those with a filename)
/// to disk and keeping the rest as text fields.
pub async fn collect(
    workspace: &JobWorkspace,
    job: &Job,
    mut multipart: Multipart,
    binding: Binding,
) -> Result<JobForm> {
    let mut form = JobForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::invalid(format!("malformed multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        let Some(original_filename) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(|e| {
                ServiceError::invalid(format!("failed to read field '{}': {}", field_name, e))
            })?;
            form.fields.insert(field_name, value);
            continue;
        };

        let logical_name = match binding {
            Binding::Positional => form.uploads.len().to_string(),
            Binding::Named => {
                if field_name.is_empty() {
                    return Err(ServiceError::invalid("file fields must be named"));
                }
                if form.uploads.iter().any(|u| u.logical_name == field_name) {
                    return Err(ServiceError::invalid(format!(
                        "upload name '{}' was used more than once",
                        field_name
                    )));
                }
                field_name
            }
        };

        let asset = workspace
            .persist(job, &logical_name, &original_filename, field)
            .await?;
        form.uploads.push(asset);
    }

    debug!(
        job_id = %job.id,
        uploads = form.uploads.len(),
        fields = form.fields.len(),
        "Collected multipart form"
    );
    Ok(form)
}
