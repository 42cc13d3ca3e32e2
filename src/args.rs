use clap::Parser;

const CMD_NAME: &str = "pw";
const DEFAULT_CONFIG_DIR: &str = "config";

/// Stores our command-line args format.
///
/// Everything after the pipeline name belongs to the pipeline:
/// `pw [OPTIONS] <PIPELINE> [--arg value...] [--task [--arg value...]]`.
#[derive(Parser, Debug, Default)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Pipeline or tool to run
    #[arg(value_name = "PIPELINE")]
    pub pipeline: String,

    /// Arguments of the pipeline, and `--task [ ... ]` blocks
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub pipeline_args: Vec<String>,

    /// Directory holding tools/ and pipes/ configuration files
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_CONFIG_DIR)]
    #[arg(env = "PIPEWRIGHT_CONFIG_DIR")]
    pub config_dir: String,

    /// Directory prepended to tool executable paths
    #[arg(short, long, value_name = "DIR")]
    #[arg(env = "PIPEWRIGHT_RESOURCES")]
    pub resources: Option<String>,

    /// Parameter set of the pipeline to apply
    #[arg(short = 's', long, value_name = "SET")]
    pub parameter_set: Option<String>,

    /// Directory for constructed output files
    #[arg(short, long, value_name = "DIR")]
    pub output_path: Option<String>,

    /// Makefile to write (default: <PIPELINE>.make)
    #[arg(short, long, value_name = "FILE")]
    pub makefile: Option<String>,

    /// Number of parallel jobs when executing
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    pub jobs: usize,

    /// Run the Makefile once it's written
    #[arg(short = 'x', long)]
    pub execute: bool,

    /// Don't check that input files exist
    #[arg(long)]
    pub no_input_check: bool,

    /// Save the resolved pipeline arguments as a new parameter set
    #[arg(long, value_name = "NAME")]
    pub export_parameter_set: Option<String>,

    /// Write a Graphviz rendering of the pipeline graph
    #[arg(long, value_name = "FILE")]
    pub dot: Option<String>,

    /// Leave option nodes out of the --dot rendering
    #[arg(long, requires = "dot")]
    pub dot_reduced: bool,

    /// Seed for the random text in intermediate filenames
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Print additional info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
