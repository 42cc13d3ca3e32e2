use std::rc::Rc;

use anyhow::{Context, Result};

use config::{PipelineConfig, PipelineTask, TaskTarget, ToolConfig};
use util::{hash_map, HashMap, IdVec};

use crate::{join_address, Error, Library, PipelineId, TaskId};

/// One pipeline in a super-pipeline, with its position in the nesting hierarchy.
#[derive(Debug)]
pub struct TieredPipeline {
    pub config: Rc<PipelineConfig>,
    /// 1 for the root, 2 for pipelines nested directly inside it, etc.
    pub tier: usize,
    /// Address of the task that runs this pipeline; empty for the root.
    pub prefix: String,
    /// Pipeline containing the task that runs this one.
    pub parent: Option<PipelineId>,
}

impl TieredPipeline {
    /// Full address of a task or node declared in this pipeline.
    pub fn address(&self, local: &str) -> String {
        join_address(&self.prefix, local)
    }
}

/// A task that runs a tool, anywhere in a super-pipeline.
#[derive(Debug)]
pub struct AssembledTask {
    pub address: String,
    /// Pipeline that declares this task.
    pub pipeline: PipelineId,
    pub config: PipelineTask,
    pub tool: Rc<ToolConfig>,
}

impl AssembledTask {
    pub fn name(&self) -> &str {
        &self.config.task
    }
}

/// A root pipeline plus the transitive closure of the pipelines nested inside it.
#[derive(Debug)]
pub struct SuperPipeline {
    pipelines: IdVec<PipelineId, TieredPipeline>,
    tasks: IdVec<TaskId, AssembledTask>,
    task_index: HashMap<String, TaskId>,
    /// address of a nested pipeline task -> the pipeline it runs
    nested: HashMap<String, PipelineId>,
    node_addresses: Vec<String>,
    num_tiers: usize,
}

impl SuperPipeline {
    /// Load `root` (a pipeline or tool name) and everything nested inside it,
    /// one tier at a time.
    pub fn assemble(library: &mut Library, root: &str) -> Result<Self> {
        let config = library.runnable(root)?;
        let mut sp = Self {
            pipelines: IdVec::with_capacity(8),
            tasks: IdVec::with_capacity(32),
            task_index: hash_map(32),
            nested: hash_map(8),
            node_addresses: Vec::with_capacity(64),
            num_tiers: 0,
        };
        let root_id = sp.pipelines.push(TieredPipeline {
            config,
            tier: 1,
            prefix: String::new(),
            parent: None,
        });

        let mut frontier = vec![root_id];
        while !frontier.is_empty() {
            sp.num_tiers += 1;
            log::debug!("assembling tier {} ({} pipelines)", sp.num_tiers, frontier.len());
            let mut next = Vec::with_capacity(frontier.len());
            for pipe_id in frontier {
                sp.expand(library, pipe_id, &mut next).with_context(|| {
                    let pipe = sp.pipelines.get(pipe_id);
                    format!(
                        "while assembling pipeline \"{}\" (tier {})",
                        pipe.config.id, pipe.tier
                    )
                })?;
            }
            frontier = next;
        }
        log::info!(
            "assembled {} pipelines in {} tiers, running {} tasks",
            sp.pipelines.len(),
            sp.num_tiers,
            sp.tasks.len()
        );
        Ok(sp)
    }

    fn expand(
        &mut self,
        library: &mut Library,
        pipe_id: PipelineId,
        next: &mut Vec<PipelineId>,
    ) -> Result<()> {
        let pipe = self.pipelines.get(pipe_id);
        let config = pipe.config.clone();
        let tier = pipe.tier;
        let prefix = pipe.prefix.clone();

        for task in &config.tasks {
            let address = join_address(&prefix, &task.task);
            match task.target() {
                TaskTarget::Tool(name) => {
                    let tool = library
                        .tool(name)
                        .with_context(|| format!("used by task \"{}\"", task.task))?;
                    log::trace!("task {address} runs tool {name}");
                    let id = self.tasks.push(AssembledTask {
                        address: address.clone(),
                        pipeline: pipe_id,
                        config: task.clone(),
                        tool,
                    });
                    self.task_index.insert(address, id);
                }
                TaskTarget::Pipeline(name) => {
                    self.check_cycle(pipe_id, name)?;
                    let nested = library
                        .pipeline(name)
                        .with_context(|| format!("used by task \"{}\"", task.task))?;
                    log::trace!("task {address} runs pipeline {name}");
                    let child = self.pipelines.push(TieredPipeline {
                        config: nested,
                        tier: tier + 1,
                        prefix: address.clone(),
                        parent: Some(pipe_id),
                    });
                    self.nested.insert(address, child);
                    next.push(child);
                }
            }
        }

        self.node_addresses
            .extend(config.node_ids().map(|id| join_address(&prefix, id)));
        Ok(())
    }

    /// Fail if `name` already appears in the chain of pipelines leading to `from`.
    fn check_cycle(&self, from: PipelineId, name: &str) -> Result<()> {
        let mut chain = vec![name.to_owned()];
        let mut cur = Some(from);
        let mut cycle = false;
        while let Some(id) = cur {
            let pipe = self.pipelines.get(id);
            chain.push(pipe.config.id.clone());
            cycle |= pipe.config.id == name;
            cur = pipe.parent;
        }
        if cycle {
            chain.reverse();
            return Err(Error::NestingCycle(name.to_owned(), chain.join(" -> ")).into());
        }
        Ok(())
    }

    pub fn root(&self) -> &TieredPipeline {
        self.pipelines.get(PipelineId::from(0))
    }

    pub fn num_tiers(&self) -> usize {
        self.num_tiers
    }

    pub fn pipeline(&self, id: PipelineId) -> &TieredPipeline {
        self.pipelines.get(id)
    }

    /// Every pipeline, in tier order (root first).
    pub fn pipelines(&self) -> impl Iterator<Item = (PipelineId, &TieredPipeline)> + '_ {
        self.pipelines.iter_ids()
    }

    /// Pipelines in the given tier (1-based).
    pub fn tier(&self, tier: usize) -> impl Iterator<Item = (PipelineId, &TieredPipeline)> + '_ {
        self.pipelines.iter_ids().filter(move |(_, p)| p.tier == tier)
    }

    /// Every task that runs a tool, in the order the tasks were declared (tier by tier).
    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &AssembledTask)> + '_ {
        self.tasks.iter_ids()
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn task(&self, id: TaskId) -> &AssembledTask {
        self.tasks.get(id)
    }

    /// Look up a tool task by its full address.
    pub fn task_at(&self, address: &str) -> Option<TaskId> {
        self.task_index.get(address).copied()
    }

    /// The pipeline run by the nested pipeline task at `address`.
    pub fn nested_at(&self, address: &str) -> Option<PipelineId> {
        self.nested.get(address).copied()
    }

    /// Full addresses of every unique and shared node in every pipeline.
    pub fn node_addresses(&self) -> &[String] {
        &self.node_addresses
    }

    /// Addresses of every task, including nested pipeline tasks, for suggestions.
    pub fn task_addresses(&self) -> impl Iterator<Item = &str> + '_ {
        self.task_index
            .keys()
            .chain(self.nested.keys())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tool(id: &str) -> Result<ToolConfig> {
        ToolConfig::from_json_str(
            &format!(
                r#"{{"id": "{id}", "executable": "{id}", "arguments": {{
                    "inputs": [{{"long form argument": "--in", "data type": "string"}}],
                    "outputs": [{{"long form argument": "--out", "data type": "string"}}]}}}}"#
            ),
            "tool.json",
        )
    }

    fn pipe(text: &str) -> Result<PipelineConfig> {
        PipelineConfig::from_json_str(text, "pipe.json")
    }

    fn library() -> Result<Library> {
        let mut lib = Library::default();
        lib.add_tool(tool("bwa")?);
        lib.add_tool(tool("sort")?);
        lib.add_tool(tool("call")?);
        lib.add_pipeline(pipe(
            r#"{"id": "variants", "pipeline tasks": [{"task": "call", "tool": "call"}],
                "unique graph nodes": [{"id": "vcf", "task": "call", "task argument": "--out"}]}"#,
        )?);
        lib.add_pipeline(pipe(
            r#"{"id": "process", "pipeline tasks": [
                    {"task": "sort", "tool": "sort"},
                    {"task": "var", "pipeline": "variants"}],
                "shared graph nodes": [{"id": "sorted", "arguments sharing node": [
                    {"task": "sort", "task argument": "--out"},
                    {"task": "var", "node id": "in"}]}]}"#,
        )?);
        lib.add_pipeline(pipe(
            r#"{"id": "align", "pipeline tasks": [
                    {"task": "map", "tool": "bwa"},
                    {"task": "proc", "pipeline": "process"}],
                "unique graph nodes": [{"id": "fq", "task": "map", "task argument": "--in"}]}"#,
        )?);
        Ok(lib)
    }

    #[test]
    fn test_tiers() -> Result<()> {
        let mut lib = library()?;
        let sp = SuperPipeline::assemble(&mut lib, "align")?;
        assert_eq!(sp.num_tiers(), 3);
        let tiers: Vec<(usize, &str)> = sp
            .pipelines()
            .map(|(_, p)| (p.tier, p.config.id.as_str()))
            .collect();
        assert_eq!(tiers, vec![(1, "align"), (2, "process"), (3, "variants")]);

        let addresses: Vec<&str> = sp.tasks().map(|(_, t)| t.address.as_str()).collect();
        assert_eq!(addresses, vec!["map", "proc.sort", "proc.var.call"]);
        assert!(sp.task_at("proc.var.call").is_some());
        assert!(sp.nested_at("proc.var").is_some());
        assert_eq!(sp.node_addresses(), &["fq", "proc.sorted", "proc.var.vcf"]);
        Ok(())
    }

    #[test]
    fn test_unknown_tool() -> Result<()> {
        let mut lib = library()?;
        lib.add_pipeline(pipe(r#"{"id": "bad", "pipeline tasks": [{"task": "x", "tool": "sortt"}]}"#)?);
        let err = SuperPipeline::assemble(&mut lib, "bad").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("did you mean 'sort'"), "{msg}");
        Ok(())
    }

    #[test]
    fn test_nesting_cycle() -> Result<()> {
        let mut lib = library()?;
        lib.add_pipeline(pipe(
            r#"{"id": "loop", "pipeline tasks": [{"task": "again", "pipeline": "loop2"}]}"#,
        )?);
        lib.add_pipeline(pipe(
            r#"{"id": "loop2", "pipeline tasks": [{"task": "back", "pipeline": "loop"}]}"#,
        )?);
        let err = SuperPipeline::assemble(&mut lib, "loop").unwrap_err();
        assert!(err.chain().any(|e| matches!(
            e.downcast_ref::<Error>(),
            Some(Error::NestingCycle(name, chain)) if name == "loop" && chain == "loop -> loop2 -> loop"
        )));
        Ok(())
    }
}
