// Concatenation command builder

use super::common::{filter_complex, input_flags, map_labels, seconds_to_frames};
use crate::options::ConcatOptions;

pub fn build_concat_command(
    tool: &str,
    inputs: &[String],
    output_path: &str,
    options: &ConcatOptions,
) -> Vec<String> {
    let mut command = input_flags(tool, inputs);

    if options.is_fade() {
        command.extend(filter_complex(fade_graph(inputs.len(), options.duration)));
        command.extend(map_labels(&["[outv]"]));
    } else {
        let pads: String = (0..inputs.len())
            .map(|i| format!("[{i}:v][{i}:a]"))
            .collect();
        command.extend(filter_complex(format!(
            "{}concat=n={}:v=1:a=1[outv][outa]",
            pads,
            inputs.len()
        )));
        command.extend(map_labels(&["[outv]", "[outa]"]));
    }

    command.push(output_path.to_string());
    command
}

/// Video-only fade-in chain: every input fades in over `duration` seconds
/// (frame count assumes 30fps, so timing is approximate for other rates) and
/// the faded streams are stacked through successive overlay stages.
fn fade_graph(count: usize, duration: f64) -> String {
    let frames = seconds_to_frames(duration);

    if count == 1 {
        return format!("[0:v]fade=t=in:s=0:n={}[outv]", frames);
    }

    let mut stages: Vec<String> = (0..count)
        .map(|i| format!("[{i}:v]fade=t=in:s=0:n={frames}[f{i}]"))
        .collect();

    for i in 1..count {
        let base = if i == 1 {
            "[f0]".to_string()
        } else {
            format!("[ov{}]", i - 1)
        };
        let target = if i == count - 1 {
            "[outv]".to_string()
        } else {
            format!("[ov{}]", i)
        };
        stages.push(format!("{}[f{}]overlay{}", base, i, target));
    }

    stages.join(";")
}
