use anyhow::Result;

use config::Direction;
use util::{hash_map, HashMap};
use workflow::{SuperPipeline, TaskId};

use crate::multiplicity::{pick_values, task_multiplicity, Multiplicity};
use crate::{EdgeArgument, Error, NodeId, NodeKind, PipelineGraph};

/// A group of tasks separated from the next by a synchronization point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub tasks: Vec<TaskId>,
    /// Largest subphase count of any task in the phase.
    pub subphases: usize,
    /// Largest division count of any task in the phase.
    pub divisions: usize,
}

/// The values one tool argument takes in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgument {
    pub long_form: String,
    pub direction: Direction,
    /// What goes on the command line. A stub argument shows the shared base name.
    pub values: Vec<String>,
}

/// One invocation of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRun {
    /// Arguments in the tool's command line order.
    pub arguments: Vec<RunArgument>,
    /// Files that have to exist before the run starts.
    pub inputs: Vec<String>,
    /// Files the run writes.
    pub outputs: Vec<String>,
}

impl TaskRun {
    pub fn argument(&self, long_form: &str) -> Option<&RunArgument> {
        self.arguments.iter().find(|a| a.long_form == long_form)
    }
}

#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub task: TaskId,
    pub phase: usize,
    pub multiplicity: Multiplicity,
    pub runs: Vec<TaskRun>,
}

/// Where every task sits in the execution, and what each of its runs reads and writes.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    order: Vec<TaskId>,
    phases: Vec<Phase>,
    tasks: HashMap<TaskId, TaskPlan>,
}

impl ExecutionPlan {
    /// Walk the tasks in workflow order, starting a new phase at the first task
    /// and at every greedy or consolidating task.
    pub fn create(graph: &PipelineGraph, sp: &SuperPipeline, order: &[TaskId]) -> Result<Self> {
        let mut phases: Vec<Phase> = Vec::new();
        let mut tasks: HashMap<TaskId, TaskPlan> = hash_map(order.len());
        let mut task_outputs: HashMap<NodeId, Vec<String>> = hash_map(order.len());

        for task in order {
            let assembled = sp.task(*task);
            let task_node = graph
                .task_node(*task)
                .ok_or_else(|| Error::UnresolvedNode(assembled.address.clone()))?;
            let greedy = assembled.config.is_greedy();
            let m = task_multiplicity(graph, task_node, greedy)?;
            check_outputs(graph, &assembled.address, task_node, m)?;

            let runs = (0..m.runs())
                .map(|run| task_run(graph, sp, *task, task_node, m, run, &task_outputs))
                .collect::<Vec<_>>();
            task_outputs.insert(
                task_node,
                runs.iter().flat_map(|r| r.outputs.iter().cloned()).collect(),
            );

            let new_phase = phases.is_empty() || greedy || assembled.config.consolidate;
            if new_phase {
                phases.push(Phase {
                    tasks: Vec::new(),
                    subphases: 1,
                    divisions: 1,
                });
            }
            let index = phases.len() - 1;
            let phase = &mut phases[index];
            phase.tasks.push(*task);
            phase.subphases = phase.subphases.max(m.subphases);
            phase.divisions = phase.divisions.max(m.divisions);
            log::debug!(
                "{} in phase {index}: {} subphases x {} divisions",
                assembled.address,
                m.subphases,
                m.divisions
            );

            tasks.insert(
                *task,
                TaskPlan {
                    task: *task,
                    phase: index,
                    multiplicity: m,
                    runs,
                },
            );
        }

        Ok(Self {
            order: order.to_vec(),
            phases,
            tasks,
        })
    }

    pub fn order(&self) -> &[TaskId] {
        &self.order
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskPlan> {
        self.tasks.get(&id)
    }

    pub fn phase_of(&self, id: TaskId) -> Option<usize> {
        self.tasks.get(&id).map(|t| t.phase)
    }
}

/// Every run must write its own output files.
fn check_outputs(graph: &PipelineGraph, task: &str, task_node: NodeId, m: Multiplicity) -> Result<()> {
    for edge in graph.successors(task_node).filter(|e| e.is_argument()) {
        let Some(arg) = edge.argument else { continue };
        if arg.takes_all_values() {
            continue;
        }
        let outputs = graph.node(edge.target).values.len();
        if outputs > 0 && outputs != m.runs() {
            return Err(Error::OutputCount {
                task: task.to_owned(),
                argument: arg.long_form.clone(),
                outputs,
                runs: m.runs(),
            }
            .into());
        }
    }
    Ok(())
}

fn task_run(
    graph: &PipelineGraph,
    sp: &SuperPipeline,
    task: TaskId,
    task_node: NodeId,
    m: Multiplicity,
    run: usize,
    task_outputs: &HashMap<NodeId, Vec<String>>,
) -> TaskRun {
    let mut out = TaskRun::default();
    for tool_arg in sp.task(task).tool.ordered_arguments() {
        let nodes = graph.argument_nodes(task_node, &tool_arg.long_form);
        let Some(arg) = graph
            .argument_edges(task_node, &tool_arg.long_form)
            .find_map(|e| e.argument)
        else {
            continue;
        };

        let mut values = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            let picked = node_values(graph, *node, arg, m, run);
            if graph.node(*node).kind == NodeKind::File {
                match arg.direction {
                    Direction::Output => out.outputs.extend(picked.iter().cloned()),
                    _ => out.inputs.extend(picked.iter().cloned()),
                }
            }
            // the command line shows a stub group once, by its primary member.
            if i == 0 {
                values = match (&graph.node(*node).stub, tool_arg.is_stub) {
                    (Some(member), true) => picked
                        .iter()
                        .map(|v| stub_base(v, &member.extension))
                        .collect(),
                    _ => picked,
                };
            }
        }
        if !values.is_empty() {
            out.arguments.push(RunArgument {
                long_form: tool_arg.long_form.clone(),
                direction: tool_arg.direction,
                values,
            });
        }
    }

    for edge in graph.predecessors(task_node).filter(|e| e.link_only) {
        match graph.node(edge.source).kind {
            NodeKind::File => out.inputs.extend(graph.node(edge.source).values.iter().cloned()),
            NodeKind::Task(_) => {
                if let Some(files) = task_outputs.get(&edge.source) {
                    out.inputs.extend(files.iter().cloned());
                }
            }
            NodeKind::Option => {}
        }
    }
    out.inputs.sort();
    out.inputs.dedup();
    out
}

/// The values `node` gives this run, with evaluated options rendered as shell substitutions.
fn node_values(graph: &PipelineGraph, node: NodeId, arg: &EdgeArgument, m: Multiplicity, run: usize) -> Vec<String> {
    let n = graph.node(node);
    if let Some(eval) = &n.evaluation {
        let mut command = eval.command.clone();
        for (placeholder, source) in &eval.placeholders {
            command = command.replace(placeholder, &graph.node(*source).values.join(" "));
        }
        return vec![format!("$({command})")];
    }
    pick_values(&n.values, arg, m, run).to_vec()
}

fn stub_base(value: &str, extension: &str) -> String {
    value
        .strip_suffix(extension)
        .and_then(|v| v.strip_suffix('.'))
        .unwrap_or(value)
        .to_owned()
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{construct_filenames, fixtures, workflow_order, GraphBuilder, Request, Resolver};

    fn planned(root: &str, args: &[(&str, &[&str])]) -> Result<(SuperPipeline, ExecutionPlan)> {
        let sp = fixtures::assemble(root)?;
        let mut graph = GraphBuilder::new(&sp).build()?;
        let request = Request {
            args: args
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
            ..Default::default()
        };
        Resolver::new(&sp, &mut graph).resolve(&request)?;
        let order = workflow_order(&graph, &sp)?;
        construct_filenames(&mut graph, &sp, &order, "", &mut StdRng::seed_from_u64(3))?;
        let plan = ExecutionPlan::create(&graph, &sp, &order)?;
        Ok((sp, plan))
    }

    #[test]
    fn test_single_phase() -> Result<()> {
        let (sp, plan) = planned("variants", &[("-q", &["s.fq"]), ("-r", &["hg.fa"])])?;
        assert_eq!(plan.phases().len(), 1);
        assert_eq!(plan.phases()[0].tasks.len(), 3);

        let call = sp.task_at("call").expect("call");
        let runs = &plan.task(call).expect("planned").runs;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].inputs, ["hg.fa", "s_sorted.bam"]);
        assert_eq!(runs[0].outputs, ["s_sorted_chr1.vcf"]);
        assert_eq!(
            runs[0].argument("--region").map(|a| a.values.clone()),
            Some(vec!["chr1".to_owned()])
        );
        Ok(())
    }

    #[test]
    fn test_greedy_task_starts_phase() -> Result<()> {
        let (sp, plan) = planned("cohort", &[("-q", &["a.fq", "b.fq"]), ("-r", &["hg.fa"])])?;
        let merge = sp.task_at("merge").expect("merge");
        let call = sp.task_at("sample.call").expect("call");

        assert_eq!(plan.phases().len(), 2);
        assert_eq!(plan.phase_of(call), Some(0));
        assert_eq!(plan.phase_of(merge), Some(1));
        assert_eq!(plan.phases()[0].subphases, 2);
        assert_eq!(plan.task(call).expect("planned").runs.len(), 2);

        let merge_runs = &plan.task(merge).expect("planned").runs;
        assert_eq!(merge_runs.len(), 1);
        assert_eq!(merge_runs[0].inputs, ["a_sorted_chr1.vcf", "b_sorted_chr1.vcf"]);
        assert_eq!(merge_runs[0].outputs, ["merged.vcf"]);
        Ok(())
    }

    #[test]
    fn test_greedy_task_reads_every_input() -> Result<()> {
        let (sp, plan) = planned(
            "bundled",
            &[("--in", &["a.vcf", "b.vcf"]), ("--idx", &["a.tbi", "b.tbi"])],
        )?;
        let bundle = sp.task_at("bundle").expect("bundle");
        let runs = &plan.task(bundle).expect("planned").runs;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].inputs, ["a.tbi", "a.vcf", "b.tbi", "b.vcf"]);
        assert_eq!(
            runs[0].argument("--idx").map(|a| a.values.clone()),
            Some(vec!["a.tbi".to_owned(), "b.tbi".to_owned()])
        );
        assert_eq!(runs[0].outputs, ["bundle.vcf"]);
        Ok(())
    }

    #[test]
    fn test_stub_runs() -> Result<()> {
        let (sp, plan) = planned("dedup", &[("--bam", &["x.bam"])])?;
        let markdup = sp.task_at("markdup").expect("markdup");
        let run = &plan.task(markdup).expect("planned").runs[0];
        assert_eq!(run.outputs, ["x_md.bam", "x_md.bam.bai"]);
        assert_eq!(run.argument("--out").map(|a| a.values.clone()), Some(vec!["x_md".to_owned()]));
        Ok(())
    }

    #[test]
    fn test_output_count() -> Result<()> {
        let sp = fixtures::assemble("variants")?;
        let mut graph = GraphBuilder::new(&sp).build()?;
        let request = Request {
            args: vec![
                ("-q".to_owned(), vec!["a.fq".to_owned(), "b.fq".to_owned()]),
                ("-r".to_owned(), vec!["hg.fa".to_owned()]),
            ],
            ..Default::default()
        };
        Resolver::new(&sp, &mut graph).resolve(&request)?;
        let order = workflow_order(&graph, &sp)?;
        let aligned = graph.resolve_address("aligned").unwrap_or_default()[0];
        graph.node_mut(aligned).values = vec!["only.bam".to_owned()];
        construct_filenames(&mut graph, &sp, &order, "", &mut StdRng::seed_from_u64(3))?;

        let err = ExecutionPlan::create(&graph, &sp, &order).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::OutputCount {
                task, outputs, runs, ..
            }) => {
                assert_eq!(task, "align");
                assert_eq!((*outputs, *runs), (1, 2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_stub_base() {
        assert_eq!(stub_base("x_md.bam", "bam"), "x_md");
        assert_eq!(stub_base("x_md.bam.bai", "bam.bai"), "x_md");
        assert_eq!(stub_base("plain", "bam"), "plain");
    }
}
