use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::PathEncodingError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Specified output directory \"{0}\" is not a directory")]
    NotDirectory(String),
    #[error("{} required input file(s) don't exist: {}", .0.len(), .0.join(", "))]
    MissingInputs(Vec<String>),
}

impl util::Categorize for Error {
    fn category(&self) -> util::ErrorCategory {
        match self {
            Self::NotDirectory(..) => util::ErrorCategory::CommandLine,
            Self::MissingInputs(..) => util::ErrorCategory::Argument,
        }
    }
}

/// All file operations in the crate should go through this struct.
///
/// Relative paths named in the pipeline (inputs, the output directory) are
/// resolved against `base`, the directory the Makefile will run in.
#[derive(Debug)]
pub struct Fs {
    base: PathBuf,
}

impl Fs {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base.join(path)
    }

    /// Check whether the output dir exists, and create it if not.
    pub fn ensure_output_dir_exists(&self, output: &str, verbose: bool) -> Result<()> {
        if output.is_empty() {
            return Ok(());
        }
        let dir = self.resolve(output);
        if !dir.exists() {
            eprintln!("Output directory {:?} doesn't exist. Creating.", dir);
            fs::create_dir_all(&dir).context("creating output directory")?;
        } else if !dir.is_dir() {
            return Err(Error::NotDirectory(dir.to_str().ok_or(PathEncodingError)?.to_owned()).into());
        } else if verbose {
            eprintln!("Output directory {:?} already exists. Not creating.", dir);
        }
        Ok(())
    }

    /// Check if path exists on disk.
    pub fn exists<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = self.base.join(path);
        path.exists() || path.is_symlink()
    }

    /// Fail, listing every file in `files` that doesn't exist.
    pub fn check_inputs_exist(&self, files: &[String]) -> Result<()> {
        let missing: Vec<String> = files.iter().filter(|f| !self.exists(f)).cloned().collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingInputs(missing).into())
        }
    }

    /// Write entire str to a file, creating its parent directory if needed.
    pub fn write_file<T: AsRef<Path>>(&self, path: T, text: &str) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("creating parent dir")?;
        }
        fs::write(path, text).with_context(|| format!("writing file {path:?}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_check_inputs() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.fq"), "")?;
        let fs = Fs::new(dir.path());
        fs.check_inputs_exist(&["a.fq".to_owned()])?;

        let err = fs
            .check_inputs_exist(&["a.fq".to_owned(), "b.fq".to_owned()])
            .unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::MissingInputs(files)) => assert_eq!(files, &["b.fq"]),
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_output_dir() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(dir.path());
        fs.ensure_output_dir_exists("out/nested", false)?;
        assert!(dir.path().join("out/nested").is_dir());

        std::fs::write(dir.path().join("file"), "")?;
        assert!(fs.ensure_output_dir_exists("file", false).is_err());
        Ok(())
    }
}
