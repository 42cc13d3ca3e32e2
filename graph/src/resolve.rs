use std::path::Path;

use anyhow::{Context, Result};

use config::{matching_extension, ParameterSet, ParameterTarget, DEFAULT_PARAMETER_SET, LIST_EXTENSION};
use util::Suggestion;
use workflow::{PipelineId, SuperPipeline};

use crate::builder::{bound_nodes, tool_argument};
use crate::{Binding, Error, Interface, NodeId, PipelineGraph, ValueSource};

/// Values given for one task inside a `--task [ ... ]` block on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskBlock {
    /// Address of a tool or nested pipeline task, relative to the root pipeline.
    pub task: String,
    pub args: Vec<(String, Vec<String>)>,
}

/// Everything the user asked for, apart from the pipeline itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Named parameter set of the root pipeline.
    pub parameter_set: Option<String>,
    /// Root pipeline arguments, in command line order.
    pub args: Vec<(String, Vec<String>)>,
    pub task_blocks: Vec<TaskBlock>,
}

/// Applies values to graph nodes, lowest precedence first:
/// tool defaults, pipeline defaults (deepest tier first), the named parameter set,
/// root arguments, then task blocks. Each level replaces the values of the one before.
pub struct Resolver<'a> {
    sp: &'a SuperPipeline,
    graph: &'a mut PipelineGraph,
}

impl<'a> Resolver<'a> {
    pub fn new(sp: &'a SuperPipeline, graph: &'a mut PipelineGraph) -> Self {
        Self { sp, graph }
    }

    pub fn resolve(&mut self, request: &Request) -> Result<()> {
        self.apply_tool_defaults()
            .context("while applying tool default parameter sets")?;
        self.apply_pipeline_defaults()
            .context("while applying pipeline default parameter sets")?;

        if let Some(name) = &request.parameter_set {
            self.apply_named_set(name)
                .with_context(|| format!("while applying parameter set \"{name}\""))?;
        }

        let root = Interface::for_pipeline(self.sp, PipelineId::from(0))?;
        for (name, values) in &request.args {
            let arg = root.require(name)?;
            let bindings = arg.bindings.clone();
            self.assign_all(&bindings, values, ValueSource::CommandLine)
                .with_context(|| format!("while setting argument \"{}\"", arg.long_form))?;
        }

        for block in &request.task_blocks {
            self.apply_task_block(block)
                .with_context(|| format!("while setting arguments of task \"{}\"", block.task))?;
        }
        Ok(())
    }

    fn apply_tool_defaults(&mut self) -> Result<()> {
        let sp = self.sp;
        for (id, task) in sp.tasks() {
            let Some(set) = task.tool.parameter_set(DEFAULT_PARAMETER_SET) else {
                continue;
            };
            for data in &set.data {
                if let Some(ParameterTarget::Argument(name)) = data.target() {
                    let binding = Binding::TaskArgument {
                        task: id,
                        argument: name.to_owned(),
                    };
                    self.assign(&binding, &data.string_values(), ValueSource::ParameterSet)?;
                }
            }
        }
        Ok(())
    }

    fn apply_pipeline_defaults(&mut self) -> Result<()> {
        let sp = self.sp;
        let mut pipes: Vec<_> = sp.pipelines().collect();
        pipes.sort_by(|(_, a), (_, b)| b.tier.cmp(&a.tier));
        for (id, pipe) in pipes {
            if let Some(set) = pipe.config.parameter_set(DEFAULT_PARAMETER_SET) {
                self.apply_set(id, set)
                    .with_context(|| format!("in pipeline \"{}\"", pipe.config.id))?;
            }
        }
        Ok(())
    }

    fn apply_named_set(&mut self, name: &str) -> Result<()> {
        let sp = self.sp;
        let root = sp.root();
        let set = root.config.parameter_set(name).ok_or_else(|| Error::UnknownParameterSet {
            owner: root.config.id.clone(),
            set: name.to_owned(),
            suggestion: Suggestion::closest(
                name,
                root.config.parameter_sets.iter().map(|s| s.id.as_str()),
            ),
        })?;
        self.apply_set(PipelineId::from(0), set)
    }

    fn apply_set(&mut self, pipeline: PipelineId, set: &ParameterSet) -> Result<()> {
        let sp = self.sp;
        let pipe = sp.pipeline(pipeline);
        let iface = Interface::for_pipeline(sp, pipeline)?;
        for data in &set.data {
            let values = data.string_values();
            match data.target() {
                Some(ParameterTarget::Argument(name)) => {
                    let bindings = iface.require(name)?.bindings.clone();
                    self.assign_all(&bindings, &values, ValueSource::ParameterSet)?;
                }
                Some(ParameterTarget::Node(id)) => {
                    let binding = Binding::Node(pipe.address(id));
                    self.assign(&binding, &values, ValueSource::ParameterSet)?;
                }
                None => {}
            }
        }
        Ok(())
    }

    fn apply_task_block(&mut self, block: &TaskBlock) -> Result<()> {
        let sp = self.sp;
        if let Some(task) = sp.task_at(&block.task) {
            let assembled = sp.task(task);
            for (name, values) in &block.args {
                let arg = tool_argument(sp, assembled, "command line", name).map_err(|_| {
                    Error::UnknownToolArgument {
                        task: block.task.clone(),
                        argument: name.clone(),
                        suggestion: Suggestion::closest(name, assembled.tool.long_forms()),
                    }
                })?;
                let binding = Binding::TaskArgument {
                    task,
                    argument: arg.long_form.clone(),
                };
                self.assign(&binding, values, ValueSource::CommandLine)?;
            }
            return Ok(());
        }

        let nested = sp.nested_at(&block.task).ok_or_else(|| Error::UnknownTaskAddress {
            task: block.task.clone(),
            suggestion: Suggestion::closest(&block.task, sp.task_addresses()),
        })?;
        let iface = Interface::for_pipeline(sp, nested)?;
        for (name, values) in &block.args {
            let bindings = iface.require(name)?.bindings.clone();
            self.assign_all(&bindings, values, ValueSource::CommandLine)?;
        }
        Ok(())
    }

    fn assign_all(&mut self, bindings: &[Binding], values: &[String], source: ValueSource) -> Result<()> {
        for binding in bindings {
            self.assign(binding, values, source)?;
        }
        Ok(())
    }

    fn assign(&mut self, binding: &Binding, values: &[String], source: ValueSource) -> Result<()> {
        let nodes = bound_nodes(self.graph, self.sp, binding)?;
        let values = if accepts_list_files(self.graph, &nodes) {
            expand_lists(values)?
        } else {
            values.to_vec()
        };
        assign_nodes(self.graph, &nodes, values, source);
        Ok(())
    }
}

/// Put `values` on a node, or on every member of a stub group with each member's extension.
pub fn assign_nodes(graph: &mut PipelineGraph, nodes: &[NodeId], values: Vec<String>, source: ValueSource) {
    let stub_exts: Vec<String> = nodes
        .iter()
        .filter_map(|n| graph.node(*n).stub.as_ref().map(|s| s.extension.clone()))
        .collect();
    if nodes.len() == 1 || stub_exts.len() < nodes.len() {
        for node in nodes {
            log::trace!("{} = {values:?}", graph.address(*node));
            graph.node_mut(*node).set_values(values.clone(), source);
        }
        return;
    }

    let bases: Vec<&str> = values
        .iter()
        .map(|v| match matching_extension(v, &stub_exts) {
            Some(ext) => &v[..v.len() - ext.len() - 1],
            None => v.as_str(),
        })
        .collect();
    for node in nodes {
        let Some(ext) = graph.node(*node).stub.as_ref().map(|s| s.extension.clone()) else {
            continue;
        };
        let member_values: Vec<String> = bases.iter().map(|b| format!("{b}.{ext}")).collect();
        log::trace!("{} = {member_values:?}", graph.address(*node));
        graph.node_mut(*node).set_values(member_values, source);
    }
}

/// Whether a `.list` value for these nodes names a file of values
/// rather than being a value itself.
fn accepts_list_files(graph: &PipelineGraph, nodes: &[NodeId]) -> bool {
    nodes.iter().all(|n| {
        graph
            .edges_of(*n)
            .filter_map(|e| e.argument)
            .all(|arg| arg.accepts_list_files())
    })
}

/// Replace every value ending in `.list` with the lines of that file.
pub fn expand_lists(values: &[String]) -> Result<Vec<String>> {
    let suffix = format!(".{LIST_EXTENSION}");
    let mut expanded = Vec::with_capacity(values.len());
    for value in values {
        if !value.ends_with(&suffix) {
            expanded.push(value.clone());
            continue;
        }
        let text = std::fs::read_to_string(Path::new(value))
            .with_context(|| format!("failed to read list file \"{value}\""))?;
        let before = expanded.len();
        expanded.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_owned),
        );
        if expanded.len() == before {
            return Err(Error::EmptyListFile(value.clone()).into());
        }
        log::debug!("read {} values from {value}", expanded.len() - before);
    }
    Ok(expanded)
}
