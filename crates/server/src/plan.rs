use crate::error::{Result, ServiceError};
use crate::filters::build_command;
use crate::jobs::UploadedAsset;
use crate::options::{Operation, OperationOptions};
use regex::{Captures, Regex};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Ordered argument vector handed to the external tool.
///
/// Always `[tool, -y, ..., output]`; the last token is the output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    argv: Vec<String>,
}

impl CommandPlan {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.len() < 2 {
            return Err(ServiceError::Internal(
                "command plan needs a program and an output path".to_string(),
            ));
        }
        Ok(Self { argv })
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn output_path(&self) -> &Path {
        Path::new(&self.argv[self.argv.len() - 1])
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl fmt::Display for CommandPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}

/// How the caller described the work for one job
#[derive(Debug, Clone, Copy)]
pub enum PlanRequest<'a> {
    /// One upload plus whitespace-separated tool arguments
    Single { input: &'a Path, command: &'a str },
    /// Several uploads combined by a named operation
    Multi {
        operation: Operation,
        options: &'a OperationOptions,
        inputs: &'a [PathBuf],
        command: Option<&'a str>,
    },
    /// Command text referencing uploads through `{field}` placeholders
    Named {
        command: &'a str,
        uploads: &'a [UploadedAsset],
    },
}

/// Turns job requests into command plans for one tool executable
#[derive(Debug, Clone)]
pub struct Planner {
    tool: String,
}

impl Planner {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn plan(&self, request: PlanRequest<'_>, output_path: &Path) -> Result<CommandPlan> {
        let output = path_arg(output_path);
        let argv = match request {
            PlanRequest::Single { input, command } => {
                let mut argv = vec![
                    self.tool.clone(),
                    "-y".to_string(),
                    "-i".to_string(),
                    path_arg(input),
                ];
                argv.extend(command.split_whitespace().map(str::to_string));
                argv.push(output);
                argv
            }
            PlanRequest::Multi {
                operation,
                options,
                inputs,
                command,
            } => {
                validate_multi(operation, options, inputs.len(), command)?;
                let inputs: Vec<String> = inputs.iter().map(|p| path_arg(p)).collect();
                build_command(
                    &self.tool,
                    options,
                    &inputs,
                    &output,
                    command.unwrap_or_default(),
                )
            }
            PlanRequest::Named { command, uploads } => {
                if command.trim().is_empty() {
                    return Err(ServiceError::invalid("command is required"));
                }
                let substituted = substitute_placeholders(command, uploads);
                let mut argv = vec![self.tool.clone(), "-y".to_string()];
                argv.extend(tokenize_command(&substituted)?);
                argv.push(output);
                argv
            }
        };

        CommandPlan::new(argv)
    }

    /// Resolve the raw multi-input form fields and plan them.
    ///
    /// Fails with `InvalidRequest` for an unknown operation name or malformed
    /// options before anything is executed.
    pub fn plan_operation(
        &self,
        operation: &str,
        inputs: &[PathBuf],
        command: Option<&str>,
        raw_options: Option<&str>,
        output_path: &Path,
    ) -> Result<CommandPlan> {
        let operation: Operation = operation.parse()?;
        let options = OperationOptions::parse(operation, raw_options)?;
        self.plan(
            PlanRequest::Multi {
                operation,
                options: &options,
                inputs,
                command,
            },
            output_path,
        )
    }
}

fn validate_multi(
    operation: Operation,
    options: &OperationOptions,
    input_count: usize,
    command: Option<&str>,
) -> Result<()> {
    if input_count == 0 {
        return Err(ServiceError::invalid("at least one input file is required"));
    }

    match options {
        OperationOptions::Custom => {
            if command.map(str::trim).unwrap_or_default().is_empty() {
                return Err(ServiceError::invalid(
                    "command is required for the custom operation",
                ));
            }
        }
        OperationOptions::Concat(opts) => {
            if opts.is_fade() && !(opts.duration.is_finite() && opts.duration > 0.0) {
                return Err(ServiceError::invalid("duration must be a positive number"));
            }
        }
        OperationOptions::Mix(opts) => {
            if opts.volumes.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(ServiceError::invalid(
                    "volumes must be non-negative numbers",
                ));
            }
        }
        OperationOptions::Merge(opts) => {
            for (name, index) in [
                ("video_index", opts.video_index),
                ("audio_index", opts.audio_index),
            ] {
                if index >= input_count {
                    return Err(ServiceError::invalid(format!(
                        "{} {} is out of range for {} input(s)",
                        name, index, input_count
                    )));
                }
            }
        }
        OperationOptions::Overlay(_) => {}
    }

    if options.operation() != operation {
        return Err(ServiceError::Internal(format!(
            "options do not belong to operation {}",
            operation
        )));
    }

    Ok(())
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}\s]+)\}").unwrap())
}

/// Replace every `{name}` bound to an upload with that upload's quoted
/// absolute path. Unbound placeholders stay as written.
pub fn substitute_placeholders(command: &str, uploads: &[UploadedAsset]) -> String {
    placeholder_pattern()
        .replace_all(command, |caps: &Captures<'_>| {
            match uploads.iter().find(|u| u.logical_name == caps[1]) {
                Some(upload) => quote_path(&upload.path),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Split command text into arguments, keeping quoted segments whole
pub fn tokenize_command(command: &str) -> Result<Vec<String>> {
    shell_words::split(command)
        .map_err(|e| ServiceError::invalid(format!("malformed command quoting: {}", e)))
}

fn quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for ch in raw.chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
