// Audio mixing command builder

use super::common::{filter_complex, format_number, input_flags, map_labels};
use crate::options::MixOptions;

pub fn build_mix_audio_command(
    tool: &str,
    inputs: &[String],
    output_path: &str,
    options: &MixOptions,
) -> Vec<String> {
    let mut command = input_flags(tool, inputs);
    let volumes = resolve_volumes(&options.volumes, inputs.len());

    let mut stages: Vec<String> = volumes
        .iter()
        .enumerate()
        .map(|(i, volume)| format!("[{i}:a]volume={}[a{i}]", format_number(*volume)))
        .collect();

    let labels: String = (0..inputs.len()).map(|i| format!("[a{}]", i)).collect();
    let amix = format!("{}amix=inputs={}:duration=longest", labels, inputs.len());
    if options.normalize {
        stages.push(format!("{}[mixed]", amix));
        stages.push("[mixed]loudnorm[outa]".to_string());
    } else {
        stages.push(format!("{}[outa]", amix));
    }

    command.extend(filter_complex(stages.join(";")));
    command.extend(map_labels(&["[outa]"]));
    command.push(output_path.to_string());
    command
}

/// One volume per input: missing entries are 1.0, extra entries are dropped
pub fn resolve_volumes(volumes: &[f64], count: usize) -> Vec<f64> {
    volumes
        .iter()
        .copied()
        .chain(std::iter::repeat(1.0))
        .take(count)
        .collect()
}
