// Common command components shared by every builder

/// Frame rate assumed when converting a duration into a frame count
pub const ASSUMED_FPS: f64 = 30.0;

/// Returns `[tool, -y, -i, input0, -i, input1, ...]`
pub fn input_flags(tool: &str, inputs: &[String]) -> Vec<String> {
    let mut command = vec![tool.to_string(), "-y".to_string()];
    for input in inputs {
        command.push("-i".to_string());
        command.push(input.clone());
    }
    command
}

/// Returns the `-filter_complex <graph>` pair
pub fn filter_complex(graph: String) -> Vec<String> {
    vec!["-filter_complex".to_string(), graph]
}

/// Returns `-map <label>` for each label, in order
pub fn map_labels(labels: &[&str]) -> Vec<String> {
    labels
        .iter()
        .flat_map(|label| ["-map".to_string(), label.to_string()])
        .collect()
}

/// Renders a number the way filter arguments expect: whole numbers keep one
/// decimal place (`1.0`), fractions print in shortest form (`0.8`).
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Converts seconds into a whole frame count at [`ASSUMED_FPS`], at least one frame
pub fn seconds_to_frames(seconds: f64) -> u64 {
    let frames = (seconds * ASSUMED_FPS).round();
    if frames.is_finite() && frames >= 1.0 {
        frames as u64
    } else {
        1
    }
}

/// `[0:a][1:a]...amix=inputs=<n>:duration=longest`, without an output label
pub fn amix_expression(count: usize) -> String {
    let pads: String = (0..count).map(|i| format!("[{}:a]", i)).collect();
    format!("{}amix=inputs={}:duration=longest", pads, count)
}
