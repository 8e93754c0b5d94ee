use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Multi-input operations understood by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Concat,
    MixAudio,
    Overlay,
    MergeAv,
    Custom,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Concat,
        Operation::MixAudio,
        Operation::Overlay,
        Operation::MergeAv,
        Operation::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Concat => "concat",
            Operation::MixAudio => "mix_audio",
            Operation::Overlay => "overlay",
            Operation::MergeAv => "merge_av",
            Operation::Custom => "custom",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s.trim())
            .ok_or_else(|| ServiceError::invalid(format!("unknown operation: {}", s.trim())))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConcatOptions {
    /// Only `"fade"` changes the graph; any other value keeps the plain concat
    pub transition: Option<String>,
    /// Fade length in seconds
    pub duration: f64,
}

impl ConcatOptions {
    pub fn is_fade(&self) -> bool {
        self.transition.as_deref() == Some("fade")
    }
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            transition: None,
            duration: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MixOptions {
    pub volumes: Vec<f64>,
    pub normalize: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Position {
    #[serde(default = "default_offset")]
    pub x: i64,
    #[serde(default = "default_offset")]
    pub y: i64,
}

fn default_offset() -> i64 {
    10
}

impl Default for Position {
    fn default() -> Self {
        Self { x: 10, y: 10 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub video_index: usize,
    pub audio_index: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            video_index: 0,
            audio_index: 1,
        }
    }
}

/// Options bag resolved against the operation it belongs to
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOptions {
    Concat(ConcatOptions),
    Mix(MixOptions),
    Overlay(OverlayOptions),
    Merge(MergeOptions),
    Custom,
}

impl OperationOptions {
    pub fn defaults_for(operation: Operation) -> Self {
        match operation {
            Operation::Concat => Self::Concat(ConcatOptions::default()),
            Operation::MixAudio => Self::Mix(MixOptions::default()),
            Operation::Overlay => Self::Overlay(OverlayOptions::default()),
            Operation::MergeAv => Self::Merge(MergeOptions::default()),
            Operation::Custom => Self::Custom,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Concat(_) => Operation::Concat,
            Self::Mix(_) => Operation::MixAudio,
            Self::Overlay(_) => Operation::Overlay,
            Self::Merge(_) => Operation::MergeAv,
            Self::Custom => Operation::Custom,
        }
    }

    /// Parse the raw JSON `options` field for `operation`.
    ///
    /// Absent or blank text yields the operation's defaults. Unknown keys are
    /// ignored; a non-object payload or a wrongly typed known key is rejected.
    pub fn parse(operation: Operation, raw: Option<&str>) -> Result<Self> {
        let raw = match raw.map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(Self::defaults_for(operation)),
        };

        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ServiceError::invalid(format!("options is not valid JSON: {}", e)))?;
        if !value.is_object() {
            return Err(ServiceError::invalid("options must be a JSON object"));
        }

        let invalid = |e: serde_json::Error| {
            ServiceError::invalid(format!("invalid options for {}: {}", operation, e))
        };

        Ok(match operation {
            Operation::Concat => Self::Concat(serde_json::from_value(value).map_err(invalid)?),
            Operation::MixAudio => Self::Mix(serde_json::from_value(value).map_err(invalid)?),
            Operation::Overlay => Self::Overlay(serde_json::from_value(value).map_err(invalid)?),
            Operation::MergeAv => Self::Merge(serde_json::from_value(value).map_err(invalid)?),
            Operation::Custom => Self::Custom,
        })
    }
}
