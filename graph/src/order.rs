use std::collections::BTreeSet;

use anyhow::Result;

use util::{hash_map, hash_set, HashMap, HashSet};
use workflow::{SuperPipeline, TaskId};

use crate::{Error, NodeId, PipelineGraph};

/// Tasks in an order they can run in: every task after the tasks it depends on.
///
/// This is Kahn's algorithm, taking the lowest ready task id each time so the
/// order follows declaration order where it can. A task that outputs to a
/// stream must be followed immediately by the one task reading that stream.
pub fn workflow_order(graph: &PipelineGraph, sp: &SuperPipeline) -> Result<Vec<TaskId>> {
    let tasks: Vec<(TaskId, NodeId)> = graph.task_nodes().collect();
    let by_node: HashMap<NodeId, TaskId> = tasks
        .iter()
        .map(|(task, node)| (graph.canonical(*node), *task))
        .collect();

    let mut dependents: HashMap<TaskId, BTreeSet<TaskId>> = hash_map(tasks.len());
    let mut waiting_on: HashMap<TaskId, usize> = hash_map(tasks.len());
    let mut seen: HashSet<(TaskId, TaskId)> = hash_set(tasks.len() * 2);
    for (task, node) in &tasks {
        waiting_on.entry(*task).or_default();
        for before in upstream_tasks(graph, *node) {
            let Some(before) = by_node.get(&before).copied() else {
                continue;
            };
            if before != *task && seen.insert((before, *task)) {
                dependents.entry(before).or_default().insert(*task);
                *waiting_on.entry(*task).or_default() += 1;
            }
        }
    }

    let mut stream_to: HashMap<TaskId, TaskId> = hash_map(4);
    for (task, node) in &tasks {
        if !sp.task(*task).config.output_to_stream {
            continue;
        }
        let readers: Vec<TaskId> = data_readers(graph, *node)
            .into_iter()
            .filter_map(|n| by_node.get(&n).copied())
            .collect();
        if readers.len() != 1 {
            return Err(Error::StreamConsumers {
                task: sp.task(*task).address.clone(),
                count: readers.len(),
            }
            .into());
        }
        stream_to.insert(*task, readers[0]);
    }

    let mut ready: BTreeSet<TaskId> = waiting_on
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(t, _)| *t)
        .collect();
    let mut order = Vec::with_capacity(tasks.len());
    let mut must_follow: Option<(TaskId, TaskId)> = None;

    loop {
        let next = match must_follow.take() {
            Some((producer, consumer)) => {
                if !ready.remove(&consumer) {
                    return Err(Error::StreamBlocked {
                        producer: sp.task(producer).address.clone(),
                        consumer: sp.task(consumer).address.clone(),
                    }
                    .into());
                }
                consumer
            }
            None => match ready.pop_first() {
                Some(t) => t,
                None => break,
            },
        };
        order.push(next);
        if let Some(deps) = dependents.get(&next) {
            for dep in deps {
                if let Some(n) = waiting_on.get_mut(dep) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(*dep);
                    }
                }
            }
        }
        if let Some(consumer) = stream_to.get(&next) {
            must_follow = Some((next, *consumer));
        }
    }

    if order.len() < tasks.len() {
        let stuck: Vec<&str> = tasks
            .iter()
            .filter(|(t, _)| !order.contains(t))
            .map(|(t, _)| sp.task(*t).address.as_str())
            .collect();
        return Err(Error::Cycle(stuck.join(", ")).into());
    }
    log::debug!("workflow order: {order:?}");
    Ok(order)
}

/// Task nodes that must finish before `task` starts:
/// direct task links, and the writers of everything it reads.
fn upstream_tasks(graph: &PipelineGraph, task: NodeId) -> Vec<NodeId> {
    let mut upstream = Vec::new();
    for edge in graph.predecessors(task) {
        if graph.node(edge.source).kind.is_task() {
            upstream.push(edge.source);
        } else {
            upstream.extend(graph.producers(edge.source));
        }
    }
    upstream
}

/// Tasks reading the files `task` writes.
fn data_readers(graph: &PipelineGraph, task: NodeId) -> Vec<NodeId> {
    let mut readers: Vec<NodeId> = graph
        .successors(task)
        .filter(|e| e.is_argument())
        .flat_map(|e| {
            graph
                .successors(e.target)
                .filter(|e| e.is_argument())
                .map(|e| e.target)
                .collect::<Vec<_>>()
        })
        .collect();
    readers.sort();
    readers.dedup();
    readers
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{fixtures, GraphBuilder};

    fn addresses(sp: &SuperPipeline, order: &[TaskId]) -> Vec<String> {
        order.iter().map(|t| sp.task(*t).address.clone()).collect()
    }

    fn pipe(text: &str) -> Result<SuperPipeline> {
        let mut lib = fixtures::library()?;
        lib.add_pipeline(config::PipelineConfig::from_json_str(text, "test.json")?);
        SuperPipeline::assemble(&mut lib, "test")
    }

    #[test]
    fn test_dependencies_override_declaration_order() -> Result<()> {
        let sp = pipe(
            r#"{"id": "test",
                "pipeline tasks": [{"task": "call", "tool": "call"}, {"task": "sort", "tool": "sort"}],
                "shared graph nodes": [{"id": "bam", "arguments sharing node": [
                    {"task": "sort", "task argument": "--out"}, {"task": "call", "task argument": "--bam"}]}]}"#,
        )?;
        let graph = GraphBuilder::new(&sp).build()?;
        let order = workflow_order(&graph, &sp)?;
        assert_eq!(addresses(&sp, &order), ["sort", "call"]);
        Ok(())
    }

    #[test]
    fn test_nested_order() -> Result<()> {
        let sp = fixtures::assemble("cohort")?;
        let graph = GraphBuilder::new(&sp).build()?;
        let order = workflow_order(&graph, &sp)?;
        assert_eq!(
            addresses(&sp, &order),
            ["sample.align", "sample.sort", "sample.call", "merge"]
        );
        Ok(())
    }

    #[test]
    fn test_stream_follows_producer() -> Result<()> {
        // "stats" would come before "sort" by id, but it has to follow the stream.
        let sp = pipe(
            r#"{"id": "test",
                "pipeline tasks": [
                    {"task": "align", "tool": "align", "output to stream": true},
                    {"task": "stats", "tool": "stats"},
                    {"task": "sort", "tool": "sort"}],
                "shared graph nodes": [
                    {"id": "bam", "arguments sharing node": [
                        {"task": "align", "task argument": "--out"}, {"task": "sort", "task argument": "--in"}]}]}"#,
        )?;
        let graph = GraphBuilder::new(&sp).build()?;
        let order = workflow_order(&graph, &sp)?;
        assert_eq!(addresses(&sp, &order), ["align", "sort", "stats"]);
        Ok(())
    }

    #[test]
    fn test_stream_with_two_readers() -> Result<()> {
        let sp = pipe(
            r#"{"id": "test",
                "pipeline tasks": [
                    {"task": "align", "tool": "align", "output to stream": true},
                    {"task": "sort", "tool": "sort"},
                    {"task": "stats", "tool": "stats"}],
                "shared graph nodes": [
                    {"id": "bam", "arguments sharing node": [
                        {"task": "align", "task argument": "--out"},
                        {"task": "sort", "task argument": "--in"},
                        {"task": "stats", "task argument": "--in"}]}]}"#,
        )?;
        let graph = GraphBuilder::new(&sp).build()?;
        let err = workflow_order(&graph, &sp).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::StreamConsumers { count: 2, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_cycle() -> Result<()> {
        let sp = pipe(
            r#"{"id": "test",
                "pipeline tasks": [{"task": "a", "tool": "sort"}, {"task": "b", "tool": "sort"}],
                "shared graph nodes": [
                    {"id": "ab", "arguments sharing node": [
                        {"task": "a", "task argument": "--out"}, {"task": "b", "task argument": "--in"}]},
                    {"id": "ba", "arguments sharing node": [
                        {"task": "b", "task argument": "--out"}, {"task": "a", "task argument": "--in"}]}]}"#,
        )?;
        let graph = GraphBuilder::new(&sp).build()?;
        let err = workflow_order(&graph, &sp).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Cycle(tasks)) if tasks == "a, b"));
        Ok(())
    }
}
