use anyhow::{Context, Result};

use config::{Direction, PipelineTask, SharedMember, TaskTarget, ToolArgument};
use util::Suggestion;
use workflow::{AssembledTask, SuperPipeline, TaskId, TieredPipeline, ADDRESS_DELIM};

use crate::{
    Binding, EdgeArgument, Error, Evaluation, Interface, NodeId, NodeKind, PipelineGraph,
    StubMember,
};

/// Separates a stub group's address from the extension of one of its files.
pub const STUB_DELIM: char = ':';

/// A declared node that stands for node(s) inside nested pipelines,
/// which can't be resolved until those pipelines' tiers are built.
#[derive(Debug)]
struct Deferred {
    tier: usize,
    address: String,
    targets: Vec<String>,
}

/// Builds a [`PipelineGraph`] from a super-pipeline, one tier at a time.
pub struct GraphBuilder<'a> {
    sp: &'a SuperPipeline,
    graph: PipelineGraph,
    deferred: Vec<Deferred>,
    /// addresses of nodes declared with "delete files"
    intermediates: Vec<String>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(sp: &'a SuperPipeline) -> Self {
        Self {
            sp,
            graph: PipelineGraph::with_capacity(sp.num_tasks() * 6),
            deferred: Vec::with_capacity(8),
            intermediates: Vec::new(),
        }
    }

    pub fn build(mut self) -> Result<PipelineGraph> {
        let sp = self.sp;
        for (id, task) in sp.tasks() {
            self.graph.add_node(&task.address, NodeKind::Task(id))?;
        }

        for tier in 1..=sp.num_tiers() {
            for (_, pipe) in sp.tier(tier) {
                self.add_declared_nodes(pipe).with_context(|| {
                    format!("while building nodes of pipeline \"{}\"", pipe.config.id)
                })?;
            }
        }
        self.resolve_deferred()?;
        for address in std::mem::take(&mut self.intermediates) {
            for node in self.graph.resolve_address(&address).unwrap_or_default() {
                self.graph.node_mut(node).intermediate = true;
            }
        }

        for (_, pipe) in sp.pipelines() {
            self.add_connections(pipe)
                .and_then(|_| self.add_evaluations(pipe))
                .with_context(|| {
                    format!("while connecting nodes of pipeline \"{}\"", pipe.config.id)
                })?;
        }

        log::info!(
            "built graph with {} nodes for {} tasks",
            self.graph.num_nodes(),
            sp.num_tasks()
        );
        Ok(self.graph)
    }

    fn add_declared_nodes(&mut self, pipe: &TieredPipeline) -> Result<()> {
        let sp = self.sp;
        for task in &pipe.config.tasks {
            if let (Some(greedy), TaskTarget::Tool(_)) = (&task.greedy_argument, task.target()) {
                let id = task_at(sp, &pipe.address(&task.task))?;
                tool_argument(sp, sp.task(id), "pipeline tasks", greedy)?;
            }
        }
        for node in &pipe.config.unique_nodes {
            let bindings = self.member_bindings(pipe, "unique graph nodes", &node.member())?;
            self.declare(pipe, &pipe.address(&node.id), bindings)?;
            if node.delete_files {
                self.intermediates.push(pipe.address(&node.id));
            }
        }
        for node in &pipe.config.shared_nodes {
            let mut bindings = Vec::with_capacity(node.members.len());
            for member in &node.members {
                bindings.extend(self.member_bindings(pipe, "shared graph nodes", member)?);
            }
            self.declare(pipe, &pipe.address(&node.id), bindings)?;
            if node.delete_files {
                self.intermediates.push(pipe.address(&node.id));
            }
        }
        Ok(())
    }

    /// What one entry of a unique or shared node points at.
    fn member_bindings(
        &self,
        pipe: &TieredPipeline,
        section: &'static str,
        member: &SharedMember,
    ) -> Result<Vec<Binding>> {
        let sp = self.sp;
        let config = &pipe.config;
        let address = pipe.address(&member.task);

        match config.task(&member.task).map(PipelineTask::target) {
            Some(TaskTarget::Tool(_)) => {
                let task = task_at(sp, &address)?;
                let name = match (&member.task_argument, &member.node_id) {
                    (Some(arg), _) => arg.as_str(),
                    (None, Some(node)) => node.as_str(),
                    (None, None) => "",
                };
                let arg = tool_argument(sp, sp.task(task), section, name)?;
                Ok(vec![Binding::TaskArgument {
                    task,
                    argument: arg.long_form.clone(),
                }])
            }
            Some(TaskTarget::Pipeline(_)) => {
                let nested = sp.nested_at(&address).ok_or_else(|| unknown_task(sp, &address))?;
                let nested_pipe = sp.pipeline(nested);
                if let Some(node) = &member.node_id {
                    if !nested_pipe.config.node_ids().any(|n| n == node) {
                        return Err(Error::UnknownNestedNode {
                            pipeline: config.id.clone(),
                            section,
                            task: member.task.clone(),
                            node: node.clone(),
                            suggestion: Suggestion::closest(node, nested_pipe.config.node_ids()),
                        }
                        .into());
                    }
                    return Ok(vec![Binding::Node(nested_pipe.address(node))]);
                }
                let name = member.task_argument.as_deref().unwrap_or_default();
                let iface = Interface::for_pipeline(sp, nested)?;
                let arg = iface.argument(name).ok_or_else(|| Error::UnknownTaskArgument {
                    pipeline: config.id.clone(),
                    section,
                    task: member.task.clone(),
                    argument: name.to_owned(),
                    suggestion: Suggestion::closest(name, iface.long_forms()),
                })?;
                Ok(arg.bindings.clone())
            }
            None => Err(unknown_task(sp, &address)),
        }
    }

    /// Create (or find) the nodes behind a declared address.
    fn declare(&mut self, pipe: &TieredPipeline, address: &str, bindings: Vec<Binding>) -> Result<()> {
        let mut nested = Vec::new();
        for binding in bindings {
            match binding {
                Binding::TaskArgument { task, argument } => {
                    self.bind_task_argument(address, task, &argument)?
                }
                Binding::Node(target) => nested.push(target),
            }
        }
        if !nested.is_empty() {
            log::trace!("deferring {address} -> {nested:?}");
            self.deferred.push(Deferred {
                tier: pipe.tier,
                address: address.to_owned(),
                targets: nested,
            });
        }
        Ok(())
    }

    fn bind_task_argument(&mut self, address: &str, task: TaskId, long_form: &str) -> Result<()> {
        let sp = self.sp;
        let assembled = sp.task(task);
        let arg = tool_argument(sp, assembled, "task arguments", long_form)?;
        let task_node = task_node(&self.graph, assembled, task)?;
        let existing = self.graph.argument_nodes(task_node, long_form);

        match (self.graph.resolve_address(address), existing.is_empty()) {
            (None, true) => {
                create_argument_nodes(&mut self.graph, address, assembled, task_node, arg, false)?;
            }
            (None, false) => self.graph.register_group(address, existing)?,
            (Some(group), true) => {
                connect_group(&mut self.graph, address, &group, assembled, task_node, arg, false)?;
            }
            (Some(group), false) => {
                let merged = merge_groups(&mut self.graph, &group, &existing)?;
                self.graph.register_group(address, merged)?;
            }
        }
        Ok(())
    }

    /// Merge declared nodes into the nested nodes they stand for, deepest tier first,
    /// so a chain of nodes through several tiers collapses into one.
    fn resolve_deferred(&mut self) -> Result<()> {
        let mut deferred = std::mem::take(&mut self.deferred);
        deferred.sort_by(|a, b| b.tier.cmp(&a.tier));
        for d in deferred {
            let mut group = self.graph.resolve_address(&d.address).unwrap_or_default();
            for target in &d.targets {
                let nodes = self
                    .graph
                    .resolve_address(target)
                    .ok_or_else(|| Error::UnresolvedNode(target.clone()))?;
                group = merge_groups(&mut self.graph, &group, &nodes)
                    .with_context(|| format!("while merging node \"{}\" into \"{target}\"", d.address))?;
            }
            self.graph.register_group(&d.address, group)?;
        }
        Ok(())
    }

    fn add_connections(&mut self, pipe: &TieredPipeline) -> Result<()> {
        let sp = self.sp;
        let config = &pipe.config;
        for conn in &config.connections {
            let source_address = pipe.address(&conn.source);
            let source_is_task = config.task(&conn.source).is_some();
            let sources = if source_is_task {
                task_nodes_under(&self.graph, sp, &source_address)
            } else {
                self.graph
                    .resolve_address(&source_address)
                    .ok_or_else(|| Error::UnresolvedNode(source_address.clone()))?
            };
            let target_address = pipe.address(&conn.target);

            let argument = match &conn.argument {
                Some(arg) if !source_is_task => arg,
                _ => {
                    for target in task_nodes_under(&self.graph, sp, &target_address) {
                        for source in &sources {
                            self.graph.add_edge(*source, target, None, true);
                        }
                    }
                    continue;
                }
            };

            match config.task(&conn.target).map(PipelineTask::target) {
                Some(TaskTarget::Tool(_)) => {
                    let task = task_at(sp, &target_address)?;
                    let assembled = sp.task(task);
                    let arg = tool_argument(sp, assembled, "connect nodes", argument)?;
                    let task_node = task_node(&self.graph, assembled, task)?;
                    let group = connect_group(
                        &mut self.graph,
                        &source_address,
                        &sources,
                        assembled,
                        task_node,
                        arg,
                        conn.link_only,
                    )?;
                    self.graph.register_group(&source_address, group)?;
                }
                Some(TaskTarget::Pipeline(_)) => {
                    let nested = sp
                        .nested_at(&target_address)
                        .ok_or_else(|| unknown_task(sp, &target_address))?;
                    let iface = Interface::for_pipeline(sp, nested)?;
                    let arg = iface.argument(argument).ok_or_else(|| Error::UnknownTaskArgument {
                        pipeline: config.id.clone(),
                        section: "connect nodes",
                        task: conn.target.clone(),
                        argument: argument.clone(),
                        suggestion: Suggestion::closest(argument, iface.long_forms()),
                    })?;
                    let mut group = sources;
                    for binding in &arg.bindings {
                        let nodes = bound_nodes(&mut self.graph, sp, binding)?;
                        group = merge_groups(&mut self.graph, &group, &nodes)?;
                    }
                    self.graph.register_group(&source_address, group)?;
                }
                None => return Err(unknown_task(sp, &target_address)),
            }
        }
        Ok(())
    }

    fn add_evaluations(&mut self, pipe: &TieredPipeline) -> Result<()> {
        for eval in &pipe.config.evaluate_commands {
            let node = resolve_one(&self.graph, &pipe.address(&eval.node_id))?;
            if self.graph.node(node).kind != NodeKind::Option {
                return Err(Error::EvaluatedFile {
                    pipeline: pipe.config.id.clone(),
                    node: eval.node_id.clone(),
                }
                .into());
            }
            let mut placeholders = Vec::with_capacity(eval.values.len());
            for value in &eval.values {
                let n = resolve_one(&self.graph, &pipe.address(&value.node_id))?;
                placeholders.push((value.id.clone(), n));
            }

            // whatever reads the evaluated option must wait for the files it reads.
            let consumers: Vec<NodeId> = self.graph.consumers(node).collect();
            for (_, n) in &placeholders {
                for consumer in &consumers {
                    self.graph.add_edge(*n, *consumer, None, true);
                }
            }
            self.graph.node_mut(node).evaluation = Some(Evaluation {
                command: eval.command.clone(),
                placeholders,
            });
        }
        Ok(())
    }
}

/// Address given to nodes created for a task argument that no declared node covers.
pub fn argument_address(task_address: &str, long_form: &str) -> String {
    format!(
        "{task_address}{ADDRESS_DELIM}{}",
        long_form.trim_start_matches('-')
    )
}

/// The nodes behind a binding, creating nodes for an unconnected task argument.
pub fn bound_nodes(
    graph: &mut PipelineGraph,
    sp: &SuperPipeline,
    binding: &Binding,
) -> Result<Vec<NodeId>> {
    match binding {
        Binding::Node(address) => graph
            .resolve_address(address)
            .ok_or_else(|| Error::UnresolvedNode(address.clone()).into()),
        Binding::TaskArgument { task, argument } => materialize(graph, sp, *task, argument),
    }
}

/// The nodes connected to a task argument, created if there aren't any yet.
pub fn materialize(
    graph: &mut PipelineGraph,
    sp: &SuperPipeline,
    task: TaskId,
    long_form: &str,
) -> Result<Vec<NodeId>> {
    let assembled = sp.task(task);
    let task_node = task_node(graph, assembled, task)?;
    let existing = graph.argument_nodes(task_node, long_form);
    if !existing.is_empty() {
        return Ok(existing);
    }
    let arg = tool_argument(sp, assembled, "task arguments", long_form)?;
    let address = argument_address(&assembled.address, &arg.long_form);
    create_argument_nodes(graph, &address, assembled, task_node, arg, false)
}

fn create_argument_nodes(
    graph: &mut PipelineGraph,
    address: &str,
    task: &AssembledTask,
    task_node: NodeId,
    arg: &ToolArgument,
    link_only: bool,
) -> Result<Vec<NodeId>> {
    let greedy = is_greedy(task, arg);
    let members = if arg.is_stub {
        let primary = arg.primary_stub_extension();
        let mut members = Vec::with_capacity(arg.stub_extensions.len());
        for ext in &arg.stub_extensions {
            let id = graph.add_node(&format!("{address}{STUB_DELIM}{ext}"), NodeKind::File)?;
            graph.node_mut(id).stub = Some(StubMember {
                extension: ext.clone(),
                primary: primary == Some(ext.as_str()),
            });
            connect(graph, id, task_node, EdgeArgument::new(arg, greedy, Some(ext)), link_only);
            members.push(id);
        }
        members
    } else {
        let kind = if arg.direction.is_file() {
            NodeKind::File
        } else {
            NodeKind::Option
        };
        let id = graph.add_node(address, kind)?;
        connect(graph, id, task_node, EdgeArgument::new(arg, greedy, None), link_only);
        vec![id]
    };
    graph.register_group(address, members.clone())?;
    Ok(members)
}

/// Wire an existing group of nodes to another task argument.
fn connect_group(
    graph: &mut PipelineGraph,
    address: &str,
    group: &[NodeId],
    task: &AssembledTask,
    task_node: NodeId,
    arg: &ToolArgument,
    link_only: bool,
) -> Result<Vec<NodeId>> {
    let greedy = is_greedy(task, arg);
    let mut group = group.to_vec();
    if !arg.is_stub {
        let member = pick_member(graph, &group, &arg.extensions)
            .ok_or_else(|| Error::UnresolvedNode(address.to_owned()))?;
        connect(graph, member, task_node, EdgeArgument::new(arg, greedy, None), link_only);
        return Ok(group);
    }

    let primary = arg.primary_stub_extension();
    for ext in &arg.stub_extensions {
        let found = group.iter().copied().find(|n| {
            graph
                .node(*n)
                .stub
                .as_ref()
                .is_some_and(|s| &s.extension == ext)
        });
        let member = match found {
            Some(m) => m,
            None if group.len() == 1
                && graph.node(group[0]).stub.is_none()
                && primary == Some(ext.as_str()) =>
            {
                // a plain file becomes the primary file of the group.
                let m = group[0];
                graph.node_mut(m).stub = Some(StubMember {
                    extension: ext.clone(),
                    primary: true,
                });
                m
            }
            None => {
                let id = graph.add_node(&format!("{address}{STUB_DELIM}{ext}"), NodeKind::File)?;
                graph.node_mut(id).stub = Some(StubMember {
                    extension: ext.clone(),
                    primary: false,
                });
                group.push(id);
                id
            }
        };
        connect(graph, member, task_node, EdgeArgument::new(arg, greedy, Some(ext)), link_only);
    }
    Ok(group)
}

fn connect(
    graph: &mut PipelineGraph,
    node: NodeId,
    task_node: NodeId,
    arg: EdgeArgument,
    link_only: bool,
) {
    if arg.direction == Direction::Output {
        graph.add_edge(task_node, node, Some(arg), link_only);
    } else {
        graph.add_edge(node, task_node, Some(arg), link_only);
    }
}

/// Merge two groups of nodes standing for the same thing, matching stub files by extension.
pub fn merge_groups(graph: &mut PipelineGraph, a: &[NodeId], b: &[NodeId]) -> Result<Vec<NodeId>> {
    let merged = match (a.len(), b.len()) {
        (_, 0) => a.to_vec(),
        (0, _) => b.to_vec(),
        (1, 1) => vec![graph.merge(a[0], b[0])?],
        (1, _) => merge_single(graph, a[0], b)?,
        (_, 1) => merge_single(graph, b[0], a)?,
        _ => {
            let mut result = a.to_vec();
            for m in b {
                let ext = graph.node(*m).stub.as_ref().map(|s| s.extension.clone());
                let pos = result
                    .iter()
                    .position(|r| graph.node(*r).stub.as_ref().map(|s| &s.extension) == ext.as_ref());
                match pos {
                    Some(i) => result[i] = graph.merge(result[i], *m)?,
                    None => result.push(*m),
                }
            }
            result
        }
    };
    let mut canonical: Vec<NodeId> = Vec::with_capacity(merged.len());
    for n in merged {
        let c = graph.canonical(n);
        if !canonical.contains(&c) {
            canonical.push(c);
        }
    }
    Ok(canonical)
}

fn merge_single(graph: &mut PipelineGraph, single: NodeId, group: &[NodeId]) -> Result<Vec<NodeId>> {
    let member = match graph.node(single).stub.clone() {
        Some(stub) => group
            .iter()
            .copied()
            .find(|n| graph.node(*n).stub.as_ref().is_some_and(|s| s.extension == stub.extension)),
        None => {
            let exts: Vec<String> = graph
                .edges_of(single)
                .filter_map(|e| e.argument)
                .flat_map(|a| a.extensions.iter().cloned())
                .collect();
            pick_member(graph, group, &exts)
        }
    };
    let Some(member) = member else {
        let mut result = group.to_vec();
        result.push(single);
        return Ok(result);
    };
    let merged = graph.merge(single, member)?;
    Ok(group
        .iter()
        .map(|n| if *n == member { merged } else { *n })
        .collect())
}

/// The member of a group a plain (non-stub) argument should use:
/// the one whose extension the argument accepts, else the primary file.
fn pick_member(graph: &PipelineGraph, group: &[NodeId], extensions: &[String]) -> Option<NodeId> {
    if group.len() <= 1 {
        return group.first().copied();
    }
    let stub_ext = |n: NodeId| graph.node(n).stub.clone();
    group
        .iter()
        .find(|n| stub_ext(**n).is_some_and(|s| extensions.contains(&s.extension)))
        .or_else(|| group.iter().find(|n| stub_ext(**n).is_some_and(|s| s.primary)))
        .or_else(|| group.first())
        .copied()
}

/// A greedy task reads every value of every input in one run.
pub(crate) fn is_greedy(task: &AssembledTask, arg: &ToolArgument) -> bool {
    task.config.is_greedy() && arg.direction == Direction::Input
}

fn resolve_one(graph: &PipelineGraph, address: &str) -> Result<NodeId> {
    graph
        .resolve_address(address)
        .and_then(|nodes| nodes.first().copied())
        .ok_or_else(|| Error::UnresolvedNode(address.to_owned()).into())
}

/// Task nodes at `address` or nested anywhere beneath it.
fn task_nodes_under(graph: &PipelineGraph, sp: &SuperPipeline, address: &str) -> Vec<NodeId> {
    let prefix = format!("{address}{ADDRESS_DELIM}");
    sp.tasks()
        .filter(|(_, t)| t.address == address || t.address.starts_with(&prefix))
        .filter_map(|(id, _)| graph.task_node(id))
        .collect()
}

fn task_node(graph: &PipelineGraph, task: &AssembledTask, id: TaskId) -> Result<NodeId> {
    graph
        .task_node(id)
        .ok_or_else(|| Error::UnresolvedNode(task.address.clone()).into())
}

fn task_at(sp: &SuperPipeline, address: &str) -> Result<TaskId> {
    sp.task_at(address).ok_or_else(|| unknown_task(sp, address))
}

fn unknown_task(sp: &SuperPipeline, address: &str) -> anyhow::Error {
    Error::UnknownTaskAddress {
        task: address.to_owned(),
        suggestion: Suggestion::closest(address, sp.task_addresses()),
    }
    .into()
}

/// Look up a tool argument of a task, failing with a suggestion.
pub fn tool_argument<'t>(
    sp: &SuperPipeline,
    task: &'t AssembledTask,
    section: &'static str,
    name: &str,
) -> Result<&'t ToolArgument> {
    task.tool.argument(name).ok_or_else(|| {
        Error::UnknownTaskArgument {
            pipeline: sp.pipeline(task.pipeline).config.id.clone(),
            section,
            task: task.name().to_owned(),
            argument: name.to_owned(),
            suggestion: Suggestion::closest(name, task.tool.long_forms()),
        }
        .into()
    })
}
