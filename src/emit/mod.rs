use std::fmt::Write;
use std::path::Path;

use anyhow::Result;

use graph::{ExecutionPlan, NodeId, PipelineGraph, TaskRun};
use util::{hash_map, HashMap};
use workflow::{SuperPipeline, TaskId};

/// Building one command line
mod command;
use command::{command_line, StreamArgs};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(
        "Task \"{producer}\" runs {producer_runs} times but streams into \"{consumer}\", \
         which runs {consumer_runs} times"
    )]
    StreamRuns {
        producer: String,
        producer_runs: usize,
        consumer: String,
        consumer_runs: usize,
    },
    #[error("Task \"{0}\" isn't in the execution plan")]
    Unplanned(String),
}

impl util::Categorize for Error {
    fn category(&self) -> util::ErrorCategory {
        util::ErrorCategory::Makefile
    }
}

/// Directory for the marker files of runs that write no files.
const STAMP_DIR: &str = ".pw";

/// Writes a Makefile for a planned pipeline.
///
/// Every run of every task becomes one rule. A task that outputs to a stream
/// shares a rule with its consumer, joined by a pipe. Phases are marked with
/// comments; make works out the parallelism itself from the prerequisites.
pub struct Makefile<'a> {
    sp: &'a SuperPipeline,
    graph: &'a PipelineGraph,
    plan: &'a ExecutionPlan,
    resources: Option<&'a Path>,
}

/// One rule: what it makes, what it needs, and how.
#[derive(Debug)]
struct Rule {
    targets: Vec<String>,
    prerequisites: Vec<String>,
    recipe: String,
    /// set when no file is written, so the recipe touches a marker
    stamp: bool,
}

impl<'a> Makefile<'a> {
    pub fn new(
        sp: &'a SuperPipeline,
        graph: &'a PipelineGraph,
        plan: &'a ExecutionPlan,
        resources: Option<&'a Path>,
    ) -> Self {
        Self {
            sp,
            graph,
            plan,
            resources,
        }
    }

    pub fn render(&self) -> Result<String> {
        let mut text = String::with_capacity(4096);
        let mut all_targets: Vec<String> = Vec::new();
        let mut body = String::with_capacity(4096);

        // consumer -> producer, for tasks joined by a pipe.
        let mut streams_into: HashMap<TaskId, TaskId> = hash_map(4);
        for task in self.plan.order() {
            if self.sp.task(*task).config.output_to_stream {
                if let Some(next) = self.next_task(*task) {
                    streams_into.insert(next, *task);
                }
            }
        }

        for (index, phase) in self.plan.phases().iter().enumerate() {
            writeln!(
                body,
                "### PHASE {}: {} subphase(s), {} division(s)",
                index + 1,
                phase.subphases,
                phase.divisions
            )?;
            for task in &phase.tasks {
                if self.sp.task(*task).config.output_to_stream {
                    continue;
                }
                let rules = match streams_into.get(task) {
                    Some(producer) => self.stream_rules(*producer, *task)?,
                    None => self.task_rules(*task)?,
                };
                writeln!(body, "# {}", self.label(*task, streams_into.get(task).copied()))?;
                for rule in rules {
                    all_targets.push(rule.targets[0].clone());
                    write_rule(&mut body, &rule)?;
                }
            }
            writeln!(body)?;
        }

        writeln!(text, "# Makefile for pipeline \"{}\"", self.sp.root().config.id)?;
        writeln!(text, "# written by pw; edits will be overwritten\n")?;
        writeln!(text, "SHELL := /bin/bash")?;
        writeln!(text, ".SHELLFLAGS := -o pipefail -c")?;
        writeln!(text, ".DELETE_ON_ERROR:")?;
        writeln!(text, ".PHONY: all")?;
        writeln!(text, "\nall: {}\n", all_targets.join(" "))?;
        let intermediates = self.intermediate_files();
        if !intermediates.is_empty() {
            writeln!(text, ".INTERMEDIATE: {}\n", intermediates.join(" "))?;
        }
        text.push_str(&body);
        Ok(text)
    }

    fn label(&self, task: TaskId, producer: Option<TaskId>) -> String {
        let address = &self.sp.task(task).address;
        match producer {
            Some(p) => format!("{} | {address}", self.sp.task(p).address),
            None => address.clone(),
        }
    }

    fn next_task(&self, task: TaskId) -> Option<TaskId> {
        let order = self.plan.order();
        let pos = order.iter().position(|t| *t == task)?;
        order.get(pos + 1).copied()
    }

    fn runs(&self, task: TaskId) -> Result<&[TaskRun]> {
        self.plan
            .task(task)
            .map(|p| p.runs.as_slice())
            .ok_or_else(|| Error::Unplanned(self.sp.task(task).address.clone()).into())
    }

    fn task_rules(&self, task: TaskId) -> Result<Vec<Rule>> {
        let tool = &self.sp.task(task).tool;
        let runs = self.runs(task)?;
        Ok(runs
            .iter()
            .enumerate()
            .map(|(i, run)| {
                let recipe = command_line(tool, run, self.resources, StreamArgs::default());
                self.rule(task, i, run.outputs.clone(), run.inputs.clone(), recipe)
            })
            .collect())
    }

    fn stream_rules(&self, producer: TaskId, consumer: TaskId) -> Result<Vec<Rule>> {
        let (p_runs, c_runs) = (self.runs(producer)?, self.runs(consumer)?);
        if p_runs.len() != c_runs.len() {
            return Err(Error::StreamRuns {
                producer: self.sp.task(producer).address.clone(),
                producer_runs: p_runs.len(),
                consumer: self.sp.task(consumer).address.clone(),
                consumer_runs: c_runs.len(),
            }
            .into());
        }
        let (to_stream, from_stream, piped) = self.stream_arguments(producer, consumer);
        let (p_tool, c_tool) = (&self.sp.task(producer).tool, &self.sp.task(consumer).tool);

        let mut rules = Vec::with_capacity(c_runs.len());
        for (i, (p_run, c_run)) in p_runs.iter().zip(c_runs).enumerate() {
            let p_cmd = command_line(
                p_tool,
                p_run,
                self.resources,
                StreamArgs {
                    to_stream: &to_stream,
                    from_stream: &[],
                },
            );
            let c_cmd = command_line(
                c_tool,
                c_run,
                self.resources,
                StreamArgs {
                    to_stream: &[],
                    from_stream: &from_stream,
                },
            );
            let mut inputs: Vec<String> = p_run
                .inputs
                .iter()
                .chain(&c_run.inputs)
                .filter(|f| !piped.contains(*f))
                .cloned()
                .collect();
            inputs.sort();
            inputs.dedup();
            let mut outputs: Vec<String> = p_run
                .outputs
                .iter()
                .filter(|f| !piped.contains(*f))
                .cloned()
                .collect();
            outputs.splice(0..0, c_run.outputs.iter().cloned());
            rules.push(self.rule(consumer, i, outputs, inputs, format!("{p_cmd} | {c_cmd}")));
        }
        Ok(rules)
    }

    /// Arguments on each side of a pipe, and the files the pipe replaces.
    fn stream_arguments(&self, producer: TaskId, consumer: TaskId) -> (Vec<String>, Vec<String>, Vec<String>) {
        let (Some(p_node), Some(c_node)) = (self.graph.task_node(producer), self.graph.task_node(consumer))
        else {
            return Default::default();
        };
        let mut to_stream = Vec::new();
        let mut from_stream = Vec::new();
        let mut piped = Vec::new();
        for edge in self.graph.successors(p_node).filter(|e| e.is_argument()) {
            let data: NodeId = edge.target;
            let read_by_consumer: Vec<String> = self
                .graph
                .successors(data)
                .filter(|e| e.is_argument() && e.target == c_node)
                .filter_map(|e| e.long_form().map(str::to_owned))
                .collect();
            if read_by_consumer.is_empty() {
                continue;
            }
            if let Some(long) = edge.long_form() {
                to_stream.push(long.to_owned());
            }
            from_stream.extend(read_by_consumer);
            piped.extend(self.graph.node(data).values.iter().cloned());
        }
        (to_stream, from_stream, piped)
    }

    fn rule(&self, task: TaskId, run: usize, outputs: Vec<String>, inputs: Vec<String>, recipe: String) -> Rule {
        if outputs.is_empty() {
            let address = &self.sp.task(task).address;
            return Rule {
                targets: vec![format!("{STAMP_DIR}/{address}.{run}.done")],
                prerequisites: inputs,
                recipe,
                stamp: true,
            };
        }
        Rule {
            targets: outputs,
            prerequisites: inputs,
            recipe,
            stamp: false,
        }
    }

    fn intermediate_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .graph
            .nodes()
            .filter(|(id, node)| {
                node.intermediate
                    && self.graph.producers(*id).next().is_some()
                    && self.graph.consumers(*id).next().is_some()
            })
            .flat_map(|(_, node)| node.values.iter().cloned())
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

/// The first target owns the recipe; any others depend on it with an empty one.
fn write_rule(out: &mut String, rule: &Rule) -> std::fmt::Result {
    let primary = &rule.targets[0];
    writeln!(out, "{primary}: {}", rule.prerequisites.join(" "))?;
    let recipe = rule.recipe.replace('$', "$$");
    if rule.stamp {
        writeln!(out, "\t@mkdir -p {STAMP_DIR}")?;
        writeln!(out, "\t{recipe}")?;
        writeln!(out, "\t@touch $@")?;
    } else {
        writeln!(out, "\t{recipe}")?;
    }
    for other in &rule.targets[1..] {
        writeln!(out, "{other}: {primary} ;")?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_rule() -> anyhow::Result<()> {
        let mut out = String::new();
        write_rule(
            &mut out,
            &Rule {
                targets: vec!["x.bam".to_owned(), "x.bam.bai".to_owned()],
                prerequisites: vec!["a.bam".to_owned()],
                recipe: "tool --region $(cut -f1 ref.fai)".to_owned(),
                stamp: false,
            },
        )?;
        assert_eq!(
            out,
            "x.bam: a.bam\n\ttool --region $$(cut -f1 ref.fai)\nx.bam.bai: x.bam ;\n"
        );

        let mut out = String::new();
        write_rule(
            &mut out,
            &Rule {
                targets: vec![".pw/check.0.done".to_owned()],
                prerequisites: vec![],
                recipe: "check".to_owned(),
                stamp: true,
            },
        )?;
        assert!(out.ends_with("\t@touch $@\n"));
        Ok(())
    }
}
