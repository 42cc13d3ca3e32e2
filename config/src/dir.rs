use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::{hash_map, HashMap, PathEncodingError};

use crate::{Error, PipelineConfig, ToolConfig};

const TOOLS_DIR: &str = "tools";
const PIPES_DIR: &str = "pipes";
const CONFIG_EXT: &str = "json";

/// Index of the configuration files in a config directory,
/// laid out as `<root>/tools/*.json` and `<root>/pipes/*.json`.
/// Files are only read when asked for.
#[derive(Debug, Default)]
pub struct ConfigDir {
    root: PathBuf,
    tools: HashMap<String, PathBuf>,
    pipes: HashMap<String, PathBuf>,
}

impl ConfigDir {
    /// Scan `root` for configuration files.
    pub fn index(root: &Path) -> Result<Self> {
        let tools = index_subdir(root, TOOLS_DIR)?;
        let pipes = index_subdir(root, PIPES_DIR)?;
        log::debug!(
            "indexed {} tools and {} pipelines in {root:?}",
            tools.len(),
            pipes.len()
        );
        Ok(Self {
            root: root.to_path_buf(),
            tools,
            pipes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn has_pipeline(&self, name: &str) -> bool {
        self.pipes.contains_key(name)
    }

    /// Sorted names of every indexed tool.
    pub fn tool_names(&self) -> Vec<&str> {
        sorted_keys(&self.tools)
    }

    /// Sorted names of every indexed pipeline.
    pub fn pipeline_names(&self) -> Vec<&str> {
        sorted_keys(&self.pipes)
    }

    /// Read and validate the named tool, or `None` if there's no such file.
    pub fn load_tool(&self, name: &str) -> Result<Option<ToolConfig>> {
        let Some(path) = self.tools.get(name) else {
            return Ok(None);
        };
        let text = read(path)?;
        let tool = ToolConfig::from_json_str(&text, path_str(path)?)?;
        check_id("Tool", path, name, &tool.id)?;
        Ok(Some(tool))
    }

    /// Read and validate the named pipeline, or `None` if there's no such file.
    pub fn load_pipeline(&self, name: &str) -> Result<Option<PipelineConfig>> {
        let Some(path) = self.pipes.get(name) else {
            return Ok(None);
        };
        let text = read(path)?;
        let pipe = PipelineConfig::from_json_str(&text, path_str(path)?)?;
        check_id("Pipeline", path, name, &pipe.id)?;
        Ok(Some(pipe))
    }
}

fn index_subdir(root: &Path, subdir: &'static str) -> Result<HashMap<String, PathBuf>> {
    let dir = root.join(subdir);
    if !dir.is_dir() {
        return Err(Error::MissingConfigDir(path_str(root)?.to_owned(), subdir).into());
    }
    let mut map = hash_map(64);
    let entries = fs::read_dir(&dir).with_context(|| format!("reading directory {dir:?}"))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(CONFIG_EXT) {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or(PathEncodingError)?
            .to_owned();
        log::trace!("found {subdir} config {stem}");
        map.insert(stem, path);
    }
    Ok(map)
}

fn sorted_keys(map: &HashMap<String, PathBuf>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading configuration file {path:?}"))
}

fn path_str(path: &Path) -> Result<&str, PathEncodingError> {
    path.to_str().ok_or(PathEncodingError)
}

fn check_id(kind: &'static str, path: &Path, name: &str, id: &str) -> Result<()> {
    if id != name {
        return Err(Error::IdMismatch {
            kind,
            file: path_str(path)?.to_owned(),
            id: id.to_owned(),
        }
        .into());
    }
    Ok(())
}
