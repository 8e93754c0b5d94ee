use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Which media stream kinds a file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPresence {
    pub has_video: bool,
    pub has_audio: bool,
}

impl StreamPresence {
    /// Assumed when probing fails, so no user-specified stream gets stripped
    pub const FAIL_OPEN: StreamPresence = StreamPresence {
        has_video: true,
        has_audio: true,
    };
}

// Internal FFprobe JSON structures
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
}

/// Runs the probing tool against uploads
#[derive(Debug, Clone)]
pub struct StreamIntrospector {
    ffprobe_bin: String,
    timeout: Duration,
}

impl StreamIntrospector {
    pub fn new(ffprobe_bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
            timeout,
        }
    }

    /// Detect video/audio presence. Never fails: any probe problem yields
    /// [`StreamPresence::FAIL_OPEN`].
    pub async fn detect_streams(&self, path: &Path) -> StreamPresence {
        match self.probe_streams(path).await {
            Ok(presence) => {
                debug!(path = %path.display(), ?presence, "Probed streams");
                presence
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Stream probe failed, assuming video and audio");
                StreamPresence::FAIL_OPEN
            }
        }
    }

    async fn probe_streams(&self, path: &Path) -> Result<StreamPresence> {
        let probe = Command::new(&self.ffprobe_bin)
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, probe)
            .await
            .map_err(|_| anyhow::anyhow!("ffprobe timed out after {:?}", self.timeout))?
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed: {}", stderr);
        }

        let stdout = String::from_utf8(output.stdout).context("ffprobe output is not valid UTF-8")?;
        parse_stream_presence(&stdout)
    }
}

/// Classify the streams listed in ffprobe's JSON by their declared type
pub fn parse_stream_presence(json: &str) -> Result<StreamPresence> {
    let output: FfprobeOutput =
        serde_json::from_str(json).context("Failed to parse ffprobe JSON output")?;

    let mut presence = StreamPresence {
        has_video: false,
        has_audio: false,
    };
    for stream in output.streams.unwrap_or_default() {
        match stream.codec_type.as_deref() {
            Some("video") => presence.has_video = true,
            Some("audio") => presence.has_audio = true,
            _ => {}
        }
    }

    Ok(presence)
}
