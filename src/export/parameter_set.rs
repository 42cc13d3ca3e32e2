use config::{ParameterSet, ParameterSetData, Scalar};
use graph::{Interface, PipelineGraph};

/// The values the user gave the root pipeline's arguments, as a parameter set named `name`.
/// Only supplied values are saved; constructed filenames are left to be rebuilt.
pub fn parameter_set(graph: &PipelineGraph, root: &Interface, name: &str) -> ParameterSet {
    let mut data = Vec::new();
    for arg in root.arguments() {
        let values = arg
            .bindings
            .iter()
            .flat_map(|b| b.nodes(graph))
            .map(|n| graph.node(n))
            .find(|node| node.source.is_supplied() && !node.values.is_empty())
            .map(|node| node.values.iter().map(|v| scalar(v)).collect::<Vec<_>>());
        if let Some(values) = values {
            data.push(ParameterSetData {
                argument: Some(arg.long_form.clone()),
                node: None,
                values,
            });
        }
    }
    log::info!("exporting {} arguments as parameter set \"{name}\"", data.len());
    ParameterSet {
        id: name.to_owned(),
        description: format!("Saved from a run of \"{}\"", root.pipeline),
        data,
    }
}

fn scalar(value: &str) -> Scalar {
    if let Ok(i) = value.parse::<i64>() {
        Scalar::Integer(i)
    } else if let Ok(b) = value.parse::<bool>() {
        Scalar::Bool(b)
    } else {
        Scalar::String(value.to_owned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scalar() {
        assert_eq!(scalar("12"), Scalar::Integer(12));
        assert_eq!(scalar("true"), Scalar::Bool(true));
        assert_eq!(scalar("1.5"), Scalar::String("1.5".to_owned()));
        assert_eq!(scalar("a.bam"), Scalar::String("a.bam".to_owned()));
    }
}
