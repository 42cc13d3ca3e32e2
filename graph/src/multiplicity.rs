use anyhow::Result;

use config::Direction;

use crate::{EdgeArgument, Error, NodeId, PipelineGraph};

/// How many times a task runs, and how its runs are split.
///
/// Several values on a file input give one subphase per value; several values
/// on an option give one division per value. A task runs once per
/// (subphase, division) pair. Arguments that take every value in one run
/// (greedy or repeatable arguments) don't add runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multiplicity {
    pub subphases: usize,
    pub divisions: usize,
}

impl Default for Multiplicity {
    fn default() -> Self {
        Self {
            subphases: 1,
            divisions: 1,
        }
    }
}

impl Multiplicity {
    pub fn runs(&self) -> usize {
        self.subphases * self.divisions
    }

    /// (subphase, division) of run `run`.
    pub fn coordinates(&self, run: usize) -> (usize, usize) {
        (run / self.divisions, run % self.divisions)
    }
}

/// Work out a task's multiplicity from the values currently on its input and option nodes.
pub fn task_multiplicity(graph: &PipelineGraph, task_node: NodeId, greedy: bool) -> Result<Multiplicity> {
    let task = graph.address(task_node);
    let mut inputs: Option<(&str, usize)> = None;
    let mut options: Option<(&str, usize)> = None;

    for edge in graph.predecessors(task_node).filter(|e| e.is_argument()) {
        let Some(arg) = edge.argument else { continue };
        let count = graph.node(edge.source).values.len();
        if arg.takes_all_values() || count <= 1 {
            continue;
        }
        let (slot, kind) = match arg.direction {
            Direction::Input if greedy => continue,
            Direction::Input => (&mut inputs, "input"),
            Direction::Option => (&mut options, "option"),
            Direction::Output => continue,
        };
        match *slot {
            Some((first, first_count)) if first_count != count => {
                return Err(Error::MultiplicityMismatch {
                    task: task.to_owned(),
                    kind,
                    first: first.to_owned(),
                    first_count,
                    second: arg.long_form.clone(),
                    second_count: count,
                }
                .into());
            }
            Some(_) => {}
            None => *slot = Some((arg.long_form.as_str(), count)),
        }
    }

    Ok(Multiplicity {
        subphases: inputs.map_or(1, |(_, n)| n),
        divisions: options.map_or(1, |(_, n)| n),
    })
}

/// The values of one argument that go on the command line of run `run`.
pub fn pick_values<'v>(
    values: &'v [String],
    arg: &EdgeArgument,
    m: Multiplicity,
    run: usize,
) -> &'v [String] {
    if values.is_empty() || arg.takes_all_values() {
        return values;
    }
    let (subphase, division) = m.coordinates(run);
    let index = match (values.len(), arg.direction) {
        (1, _) => 0,
        (_, Direction::Input) => subphase,
        (_, Direction::Option) => division,
        (_, Direction::Output) => run,
    };
    values.get(index..=index).unwrap_or(&[])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{fixtures, GraphBuilder, Request, Resolver};

    fn strings(vals: &[&str]) -> Vec<String> {
        vals.iter().map(|v| v.to_string()).collect()
    }

    fn call_multiplicity(args: Vec<(String, Vec<String>)>) -> Result<Multiplicity> {
        let sp = fixtures::assemble("variants")?;
        let mut graph = GraphBuilder::new(&sp).build()?;
        let call = sp.task_at("call").expect("call");
        let request = Request {
            args,
            ..Default::default()
        };
        Resolver::new(&sp, &mut graph).resolve(&request)?;
        let sorted = graph.resolve_address("sorted").unwrap_or_default()[0];
        graph.node_mut(sorted).values = strings(&["a.bam", "b.bam"]);
        let node = graph.task_node(call).expect("node");
        task_multiplicity(&graph, node, false)
    }

    #[test]
    fn test_subphases_and_divisions() -> Result<()> {
        let m = call_multiplicity(vec![("--region".to_owned(), strings(&["chr1", "chr2", "chr3"]))])?;
        assert_eq!(
            m,
            Multiplicity {
                subphases: 2,
                divisions: 3
            }
        );
        assert_eq!(m.runs(), 6);
        assert_eq!(m.coordinates(4), (1, 1));
        Ok(())
    }

    #[test]
    fn test_mismatch() -> Result<()> {
        let sp = fixtures::assemble("variants")?;
        let mut graph = GraphBuilder::new(&sp).build()?;
        let call = graph.task_node(sp.task_at("call").expect("call")).expect("node");
        let assignments: [(&str, &[&str]); 2] =
            [("sorted", &["a.bam", "b.bam"]), ("ref", &["x.fa", "y.fa", "z.fa"])];
        for (address, vals) in assignments {
            let node = graph.resolve_address(address).unwrap_or_default()[0];
            graph.node_mut(node).values = strings(vals);
        }
        let err = task_multiplicity(&graph, call, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MultiplicityMismatch { first_count: 2, second_count: 3, .. })
                | Some(Error::MultiplicityMismatch { first_count: 3, second_count: 2, .. })
        ));
        // a greedy task ignores input multiplicity.
        assert_eq!(task_multiplicity(&graph, call, true)?, Multiplicity::default());
        Ok(())
    }

    #[test]
    fn test_pick_values() {
        let arg = |direction| EdgeArgument {
            long_form: "--x".to_owned(),
            short_form: None,
            data_type: config::DataType::String,
            direction,
            required: false,
            extensions: vec![],
            stub_extension: None,
            greedy: false,
            allow_multiple_values: false,
        };
        let m = Multiplicity {
            subphases: 2,
            divisions: 3,
        };
        let vals = strings(&["a", "b", "c"]);
        assert_eq!(pick_values(&vals[..2], &arg(Direction::Input), m, 4), ["b"]);
        assert_eq!(pick_values(&vals, &arg(Direction::Option), m, 4), ["b"]);
        assert_eq!(pick_values(&vals[..1], &arg(Direction::Option), m, 5), ["a"]);
        assert!(pick_values(&vals, &arg(Direction::Output), m, 5).is_empty());

        let mut all = arg(Direction::Input);
        all.allow_multiple_values = true;
        assert_eq!(pick_values(&vals, &all, m, 5).len(), 3);
    }
}
