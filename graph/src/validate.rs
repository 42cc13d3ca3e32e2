use anyhow::Result;

use config::matching_extension;
use workflow::{SuperPipeline, TaskId};

use crate::{Binding, EdgeRef, Error, Interface, NodeId, PipelineGraph};

/// Prefix of values computed by the shell when the Makefile runs.
const SHELL_VALUE: &str = "$(";

/// Fail on the first required tool argument that has no way of getting a value:
/// no values, no other task writing it, and no recipe to construct one.
/// A task never satisfies its own outputs by writing them.
pub fn check_required(graph: &PipelineGraph, sp: &SuperPipeline, root: &Interface) -> Result<()> {
    for (id, task) in sp.tasks() {
        let Some(task_node) = graph.task_node(id) else {
            continue;
        };
        for arg in task.tool.arguments().filter(|a| a.required) {
            if arg.construct_filename.is_some() {
                continue;
            }
            let nodes = graph.argument_nodes(task_node, &arg.long_form);
            let satisfied = nodes.iter().any(|n| {
                graph.node(*n).has_values() || graph.producers(*n).any(|p| p != task_node)
            });
            if satisfied {
                continue;
            }

            let hint = match root_argument(graph, root, id, &arg.long_form, &nodes) {
                Some(name) => format!("Set it on the command line with {name}."),
                None => format!(
                    "No pipeline argument sets it; give it to the task directly with \
                     --{} [{} <value>].",
                    task.address, arg.long_form
                ),
            };
            return Err(Error::MissingRequired {
                task: task.address.clone(),
                argument: arg.long_form.clone(),
                description: arg.description.clone(),
                hint,
            }
            .into());
        }
    }
    Ok(())
}

/// Name of a root pipeline argument that would set this task argument, if there is one.
fn root_argument(
    graph: &PipelineGraph,
    root: &Interface,
    task: TaskId,
    long_form: &str,
    nodes: &[NodeId],
) -> Option<String> {
    let direct = Binding::TaskArgument {
        task,
        argument: long_form.to_owned(),
    };
    if let Some(arg) = root.argument_for(&direct) {
        return Some(arg.display_name());
    }
    let bound = |binding: &Binding| binding.nodes(graph).iter().any(|n| nodes.contains(n));
    root.arguments()
        .find(|arg| arg.bindings.iter().any(&bound))
        .map(|arg| arg.display_name())
}

/// Once filenames are constructed, every node read or written by a required
/// argument must hold values.
pub fn check_values(graph: &PipelineGraph) -> Result<()> {
    for (id, node) in graph.nodes() {
        if node.kind.is_task() || node.has_values() {
            continue;
        }
        let unset = graph
            .edges_of(id)
            .filter(|e| e.is_argument())
            .find(|e| e.argument.is_some_and(|a| a.required));
        if let Some(edge) = unset {
            let task = if edge.source == id { edge.target } else { edge.source };
            return Err(Error::Unset {
                node: graph.address(id).to_owned(),
                task: graph.address(task).to_owned(),
                argument: edge.long_form().unwrap_or_default().to_owned(),
            }
            .into());
        }
    }
    Ok(())
}

/// Check every value against every argument that reads or writes it,
/// and that no file is written by two tasks.
pub fn check_consistency(graph: &PipelineGraph) -> Result<()> {
    for (id, node) in graph.nodes() {
        if node.kind.is_task() {
            continue;
        }
        let producers: Vec<NodeId> = graph.producers(id).collect();
        if producers.len() > 1 {
            let tasks: Vec<&str> = producers.iter().map(|t| graph.address(*t)).collect();
            return Err(Error::MultipleProducers {
                node: graph.address(id).to_owned(),
                tasks: tasks.join(", "),
            }
            .into());
        }

        let edges: Vec<EdgeRef> = graph.edges_of(id).filter(|e| e.is_argument()).collect();
        check_data_types(graph, id, &edges)?;

        for value in node.values.iter().filter(|v| !v.starts_with(SHELL_VALUE)) {
            for edge in &edges {
                let Some(arg) = edge.argument else { continue };
                let task = if edge.source == id { edge.target } else { edge.source };
                let allowed = arg.allowed_extensions();
                if !allowed.is_empty() && matching_extension(value, &allowed).is_none() {
                    return Err(Error::ExtensionMismatch {
                        node: graph.address(id).to_owned(),
                        value: value.clone(),
                        task: graph.address(task).to_owned(),
                        argument: arg.long_form.clone(),
                        allowed: allowed.join(", "),
                    }
                    .into());
                }
                if !arg.data_type.accepts(value) {
                    return Err(Error::InvalidValue {
                        node: graph.address(id).to_owned(),
                        value: value.clone(),
                        task: graph.address(task).to_owned(),
                        argument: arg.long_form.clone(),
                        data_type: arg.data_type,
                    }
                    .into());
                }
            }
        }
    }
    Ok(())
}

fn check_data_types(graph: &PipelineGraph, node: NodeId, edges: &[EdgeRef]) -> Result<()> {
    let mut args = edges.iter().filter_map(|e| e.argument.map(|a| (e, a)));
    let Some((first_edge, first)) = args.next() else {
        return Ok(());
    };
    let describe = |edge: &EdgeRef, arg: &crate::EdgeArgument| {
        let task = if edge.source == node { edge.target } else { edge.source };
        format!("{} by {} of {}", arg.data_type, arg.long_form, graph.address(task))
    };
    for (edge, arg) in args {
        if arg.data_type != first.data_type {
            return Err(Error::ConflictingDataTypes {
                node: graph.address(node).to_owned(),
                first: describe(first_edge, first),
                second: describe(edge, arg),
            }
            .into());
        }
    }
    Ok(())
}
