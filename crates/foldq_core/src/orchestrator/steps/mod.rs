//! External steps run for each job.

mod postprocess;
mod predict;

pub use postprocess::{postprocess_args, PostProcessStep, NON_INTERACTIVE_FLAG, POSTPROCESS_LOG_NAME};
pub use predict::{pipeline_args, render_fasta, write_input_file, PredictStep, PIPELINE_LOG_NAME};
