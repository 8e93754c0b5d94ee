use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

use crate::options::Operation;

/// What `<tool> -version` reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    /// First line of the version output, verbatim
    pub banner: String,
    /// Dotted version number, or the banner when none could be parsed
    pub version: String,
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"ffmpeg version[^\d]*(\d+(?:\.\d+)*)").unwrap())
}

/// Parse output like "ffmpeg version 7.1.1 Copyright ..." or "ffmpeg version n6.0"
pub fn parse_version_output(stdout: &str) -> Option<ToolVersion> {
    let banner = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let version = version_pattern()
        .captures(banner)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| banner.to_string());

    Some(ToolVersion {
        banner: banner.to_string(),
        version,
    })
}

/// Query `<bin> -version` within `timeout`
pub async fn check_tool_version(bin: &str, timeout: Duration) -> Result<ToolVersion> {
    let query = Command::new(bin)
        .arg("-version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, query)
        .await
        .map_err(|_| anyhow!("{} -version timed out after {:?}", bin, timeout))?
        .with_context(|| format!("Failed to execute {} -version. Is it installed and in PATH?", bin))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} -version failed: {}", bin, stderr.trim()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_version_output(&stdout).ok_or_else(|| anyhow!("{} -version printed nothing", bin))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub ffmpeg_available: bool,
    pub ffmpeg_version: Option<String>,
    /// Version of this service
    pub version: String,
    pub error: Option<String>,
}

impl HealthReport {
    pub fn from_check(check: Result<ToolVersion>) -> Self {
        let version = env!("CARGO_PKG_VERSION").to_string();
        match check {
            Ok(tool) => Self {
                status: HealthStatus::Healthy,
                ffmpeg_available: true,
                ffmpeg_version: Some(tool.version),
                version,
                error: None,
            },
            Err(e) => Self {
                status: HealthStatus::Unhealthy,
                ffmpeg_available: false,
                ffmpeg_version: None,
                version,
                error: Some(format!("{:#}", e)),
            },
        }
    }
}

/// Body of `GET /`
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<EndpointInfo>,
    pub operations: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

impl ServiceInfo {
    pub fn current() -> Self {
        let endpoint = |method, path, description| EndpointInfo {
            method,
            path,
            description,
        };
        Self {
            service: "ffsvc",
            version: env!("CARGO_PKG_VERSION"),
            endpoints: vec![
                endpoint(
                    "POST",
                    "/process",
                    "One file with `command`, or several files with `operation`",
                ),
                endpoint(
                    "POST",
                    "/process-named",
                    "Named file fields referenced as {field} in `command`",
                ),
                endpoint("GET", "/health", "External tool availability"),
                endpoint("GET", "/", "This listing"),
            ],
            operations: Operation::ALL.iter().map(|op| op.as_str()).collect(),
        }
    }
}
