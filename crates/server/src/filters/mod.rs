pub mod common;
pub mod concat;
pub mod custom;
pub mod merge;
pub mod mix;
pub mod overlay;

use crate::options::OperationOptions;

/// Build the full argument vector for a multi-input operation.
///
/// Pure: the same inputs always yield the same vector. `custom_args` is only
/// read for [`OperationOptions::Custom`]. Input-count and index checks belong
/// to the planner; builders assume they already passed.
pub fn build_command(
    tool: &str,
    options: &OperationOptions,
    inputs: &[String],
    output_path: &str,
    custom_args: &str,
) -> Vec<String> {
    match options {
        OperationOptions::Concat(opts) => {
            concat::build_concat_command(tool, inputs, output_path, opts)
        }
        OperationOptions::Mix(opts) => mix::build_mix_audio_command(tool, inputs, output_path, opts),
        OperationOptions::Overlay(opts) => {
            overlay::build_overlay_command(tool, inputs, output_path, opts)
        }
        OperationOptions::Merge(opts) => {
            merge::build_merge_av_command(tool, inputs, output_path, opts)
        }
        OperationOptions::Custom => {
            custom::build_custom_command(tool, inputs, output_path, custom_args)
        }
    }
}
