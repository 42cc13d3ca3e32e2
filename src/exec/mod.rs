use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

/// Run a subprocess
mod run_cmd;
use run_cmd::run_cmd;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("make failed; see {0:?} for its output")]
    MakeFailed(std::path::PathBuf),
}

impl util::Categorize for Error {
    fn category(&self) -> util::ErrorCategory {
        util::ErrorCategory::Makefile
    }
}

const MAKE: &str = "make";

/// Run `make` on the written Makefile with `jobs` parallel jobs.
/// Its output is shown and also kept in `<makefile>.log`.
pub fn run_make(makefile: &Path, jobs: usize, verbose: bool) -> Result<()> {
    let log_path = makefile.with_extension("log");
    let mut cmd = Command::new(MAKE);
    cmd.arg("-j").arg(jobs.to_string()).arg("-f").arg(makefile);
    log::info!("running {cmd:?}");

    let success = run_cmd(&mut cmd, &log_path, verbose)
        .with_context(|| format!("while running make on {makefile:?}"))?;
    if success {
        Ok(())
    } else {
        Err(Error::MakeFailed(log_path).into())
    }
}
