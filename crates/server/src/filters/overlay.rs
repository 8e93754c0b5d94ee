// Overlay (picture-in-picture) command builder

use super::common::{amix_expression, filter_complex, input_flags, map_labels};
use crate::options::{OverlayOptions, Position};

pub fn build_overlay_command(
    tool: &str,
    inputs: &[String],
    output_path: &str,
    options: &OverlayOptions,
) -> Vec<String> {
    let mut command = input_flags(tool, inputs);
    let count = inputs.len();

    if count < 2 {
        command.extend(filter_complex("[0:v]null[outv]".to_string()));
        command.extend(map_labels(&["[outv]"]));
        command.push(output_path.to_string());
        return command;
    }

    let mut stages = Vec::with_capacity(count);
    for i in 1..count {
        let canvas = if i == 1 {
            "[0:v]".to_string()
        } else {
            format!("[tmp{}]", i - 1)
        };
        let target = if i == count - 1 {
            "[outv]".to_string()
        } else {
            format!("[tmp{}]", i)
        };
        let position = options
            .positions
            .get(i - 1)
            .copied()
            .unwrap_or_default();
        stages.push(format!(
            "{}[{}:v]overlay={}{}",
            canvas,
            i,
            position_expr(position),
            target
        ));
    }
    stages.push(format!("{}[outa]", amix_expression(count)));

    command.extend(filter_complex(stages.join(";")));
    command.extend(map_labels(&["[outv]", "[outa]"]));
    command.push(output_path.to_string());
    command
}

fn position_expr(position: Position) -> String {
    format!("{}:{}", position.x, position.y)
}
