use std::path::Path;
use std::rc::Rc;

use anyhow::Result;

use config::{ConfigDir, PipelineConfig, ToolConfig};
use util::{hash_map, HashMap, Suggestion};

use crate::Error;

/// All the tools and pipelines available to a run.
/// Configurations are read from the config directory the first time they're asked for,
/// then shared.
#[derive(Debug, Default)]
pub struct Library {
    dir: ConfigDir,
    tools: HashMap<String, Rc<ToolConfig>>,
    pipes: HashMap<String, Rc<PipelineConfig>>,
}

impl Library {
    /// Create a library backed by the config directory at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        Ok(Self {
            dir: ConfigDir::index(root)?,
            tools: hash_map(32),
            pipes: hash_map(16),
        })
    }

    /// Add an already-loaded tool, replacing any tool of the same name.
    pub fn add_tool(&mut self, tool: ToolConfig) -> Rc<ToolConfig> {
        let tool = Rc::new(tool);
        self.tools.insert(tool.id.clone(), tool.clone());
        tool
    }

    /// Add an already-loaded pipeline, replacing any pipeline of the same name.
    pub fn add_pipeline(&mut self, pipe: PipelineConfig) -> Rc<PipelineConfig> {
        let pipe = Rc::new(pipe);
        self.pipes.insert(pipe.id.clone(), pipe.clone());
        pipe
    }

    pub fn is_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name) || self.dir.has_tool(name)
    }

    pub fn is_pipeline(&self, name: &str) -> bool {
        self.pipes.contains_key(name) || self.dir.has_pipeline(name)
    }

    /// Get the named tool, loading it if necessary.
    pub fn tool(&mut self, name: &str) -> Result<Rc<ToolConfig>> {
        if let Some(tool) = self.tools.get(name) {
            return Ok(tool.clone());
        }
        match self.dir.load_tool(name)? {
            Some(tool) => {
                log::debug!("loaded tool {name}");
                Ok(self.add_tool(tool))
            }
            None => {
                let names = self.tool_names();
                let suggestion = Suggestion::closest(name, names.iter().map(String::as_str));
                Err(Error::UnknownTool(name.to_owned(), suggestion).into())
            }
        }
    }

    /// Get the named pipeline, loading it if necessary.
    pub fn pipeline(&mut self, name: &str) -> Result<Rc<PipelineConfig>> {
        if let Some(pipe) = self.pipes.get(name) {
            return Ok(pipe.clone());
        }
        match self.dir.load_pipeline(name)? {
            Some(pipe) => {
                log::debug!("loaded pipeline {name}");
                Ok(self.add_pipeline(pipe))
            }
            None => {
                let names = self.pipeline_names();
                let suggestion = Suggestion::closest(name, names.iter().map(String::as_str));
                Err(Error::UnknownPipeline(name.to_owned(), suggestion).into())
            }
        }
    }

    /// Get the pipeline to run for a name given on the command line.
    /// A tool name runs that tool on its own, as a single-task pipeline.
    pub fn runnable(&mut self, name: &str) -> Result<Rc<PipelineConfig>> {
        if self.is_pipeline(name) {
            if self.is_tool(name) {
                log::warn!("\"{name}\" is both a tool and a pipeline; running the pipeline");
            }
            self.pipeline(name)
        } else if self.is_tool(name) {
            let tool = self.tool(name)?;
            Ok(self.add_pipeline(PipelineConfig::for_tool(&tool)?))
        } else {
            let mut names = self.tool_names();
            names.extend(self.pipeline_names());
            let suggestion = Suggestion::closest(name, names.iter().map(String::as_str));
            Err(Error::UnknownTarget(name.to_owned(), suggestion).into())
        }
    }

    /// Sorted names of every known tool, loaded or not.
    pub fn tool_names(&self) -> Vec<String> {
        merged_names(self.tools.keys(), self.dir.tool_names())
    }

    /// Sorted names of every known pipeline, loaded or not.
    pub fn pipeline_names(&self) -> Vec<String> {
        merged_names(self.pipes.keys(), self.dir.pipeline_names())
    }
}

fn merged_names<'a>(loaded: impl Iterator<Item = &'a String>, indexed: Vec<&str>) -> Vec<String> {
    let mut names: Vec<String> = loaded.cloned().collect();
    names.extend(indexed.into_iter().map(str::to_owned));
    names.sort_unstable();
    names.dedup();
    names
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    const INDEX: &str = r#"{"id": "index", "executable": "samtools", "modifier": "index",
        "arguments": {"inputs": [{"long form argument": "--in", "data type": "string",
                                  "extensions": ["bam"]}]}}"#;

    #[test]
    fn test_lazy_loading() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("tools"))?;
        fs::create_dir(dir.path().join("pipes"))?;
        fs::write(dir.path().join("tools").join("index.json"), INDEX)?;

        let mut lib = Library::open(dir.path())?;
        assert!(lib.is_tool("index"));
        assert!(!lib.is_pipeline("index"));
        let first = lib.tool("index")?;
        let second = lib.tool("index")?;
        assert!(Rc::ptr_eq(&first, &second));
        Ok(())
    }

    #[test]
    fn test_unknown_names_suggest() -> Result<()> {
        let mut lib = Library::default();
        lib.add_tool(ToolConfig::from_json_str(INDEX, "index.json")?);
        let err = lib.tool("indx").unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool \"indx\" (did you mean 'index'?)");

        let err = lib.runnable("indexx").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::UnknownTarget(..))));
        Ok(())
    }

    #[test]
    fn test_tool_is_runnable() -> Result<()> {
        let mut lib = Library::default();
        lib.add_tool(ToolConfig::from_json_str(INDEX, "index.json")?);
        let pipe = lib.runnable("index")?;
        assert_eq!(pipe.tasks.len(), 1);
        assert!(lib.is_pipeline("index"));
        Ok(())
    }
}
