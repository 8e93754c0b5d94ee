// Audio/video merge command builder

use super::common::input_flags;
use crate::options::MergeOptions;

/// Codec the selected audio stream is re-encoded to
pub const MERGE_AUDIO_CODEC: &str = "aac";

pub fn build_merge_av_command(
    tool: &str,
    inputs: &[String],
    output_path: &str,
    options: &MergeOptions,
) -> Vec<String> {
    let mut command = input_flags(tool, inputs);

    command.push("-map".to_string());
    command.push(format!("{}:v:0", options.video_index));
    command.push("-map".to_string());
    command.push(format!("{}:a:0", options.audio_index));

    // Video passes through untouched, audio is re-encoded
    command.push("-c:v".to_string());
    command.push("copy".to_string());
    command.push("-c:a".to_string());
    command.push(MERGE_AUDIO_CODEC.to_string());

    command.push(output_path.to_string());
    command
}
