use std::path::PathBuf;

use anyhow::Result;

use graph::Request;

use crate::args::Args;
use crate::cmdline::split_pipeline_args;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Configuration directory \"{0}\" doesn't exist")]
    ConfigDirNotFound(String),
    #[error("Resources directory \"{0}\" doesn't exist")]
    ResourcesNotFound(String),
    #[error("Number of jobs must be at least 1")]
    NoJobs,
}

impl util::Categorize for Error {
    fn category(&self) -> util::ErrorCategory {
        util::ErrorCategory::CommandLine
    }
}

const MAKEFILE_EXT: &str = "make";

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in.
#[derive(Debug)]
pub struct Settings {
    pub config_dir: PathBuf,
    pub resources: Option<PathBuf>,
    pub pipeline: String,
    pub request: Request,
    /// Prefix for constructed output filenames; empty for the working directory.
    pub output_path: String,
    pub makefile: PathBuf,
    pub jobs: usize,
    pub execute: bool,
    pub input_check: bool,
    pub export_parameter_set: Option<String>,
    pub dot: Option<PathBuf>,
    pub dot_reduced: bool,
    pub seed: Option<u64>,
    pub verbose: u8,
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let config_dir = PathBuf::from(&args.config_dir);
        if !config_dir.is_dir() {
            return Err(Error::ConfigDirNotFound(args.config_dir).into());
        }
        let resources = match args.resources {
            Some(dir) if !PathBuf::from(&dir).is_dir() => {
                return Err(Error::ResourcesNotFound(dir).into())
            }
            Some(dir) => Some(PathBuf::from(dir)),
            None => None,
        };
        if args.jobs == 0 {
            return Err(Error::NoJobs.into());
        }

        let mut request = split_pipeline_args(&args.pipeline_args)?;
        request.parameter_set = args.parameter_set;

        let output_path = args
            .output_path
            .map(|p| p.trim_end_matches('/').to_owned())
            .unwrap_or_default();
        let makefile = match args.makefile {
            Some(file) => PathBuf::from(file),
            None => PathBuf::from(format!("{}.{MAKEFILE_EXT}", args.pipeline)),
        };

        Ok(Self {
            config_dir,
            resources,
            pipeline: args.pipeline,
            request,
            output_path,
            makefile,
            jobs: args.jobs,
            execute: args.execute,
            input_check: !args.no_input_check,
            export_parameter_set: args.export_parameter_set,
            dot: args.dot.map(PathBuf::from),
            dot_reduced: args.dot_reduced,
            seed: args.seed,
            verbose: args.verbose,
        })
    }
}
