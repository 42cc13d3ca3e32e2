use crate::{NodeKind, PipelineGraph};

/// Files the pipeline reads but never writes: these have to exist before it runs.
pub fn external_inputs(graph: &PipelineGraph) -> Vec<String> {
    let mut files: Vec<String> = graph
        .nodes()
        .filter(|(id, node)| {
            node.kind == NodeKind::File
                && graph.producers(*id).next().is_none()
                && graph.consumers(*id).next().is_some()
        })
        .flat_map(|(_, node)| node.values.iter())
        .filter(|v| !v.starts_with("$("))
        .cloned()
        .collect();
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod test {
    use anyhow::Result;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{construct_filenames, fixtures, workflow_order, GraphBuilder, Request, Resolver};

    #[test]
    fn test_external_inputs() -> Result<()> {
        let sp = fixtures::assemble("variants")?;
        let mut graph = GraphBuilder::new(&sp).build()?;
        let request = Request {
            args: vec![
                ("-q".to_owned(), vec!["b.fq".to_owned(), "a.fq".to_owned()]),
                ("-r".to_owned(), vec!["hg.fa".to_owned()]),
            ],
            ..Default::default()
        };
        Resolver::new(&sp, &mut graph).resolve(&request)?;
        let order = workflow_order(&graph, &sp)?;
        construct_filenames(&mut graph, &sp, &order, "", &mut StdRng::seed_from_u64(9))?;

        // constructed files have producers; options aren't files.
        assert_eq!(external_inputs(&graph), ["a.fq", "b.fq", "hg.fa"]);
        Ok(())
    }
}
