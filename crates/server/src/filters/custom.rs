// Free-form command builder: caller-supplied arguments after the inputs

use super::common::input_flags;

pub fn build_custom_command(
    tool: &str,
    inputs: &[String],
    output_path: &str,
    arguments: &str,
) -> Vec<String> {
    let mut command = input_flags(tool, inputs);
    command.extend(arguments.split_whitespace().map(str::to_string));
    command.push(output_path.to_string());
    command
}
