use std::fmt::Write;

use anyhow::Result;

use graph::{NodeKind, PipelineGraph};

/// Render the graph in Graphviz dot format.
/// A reduced rendering leaves out option nodes and their edges.
pub fn dot(graph: &PipelineGraph, reduced: bool) -> Result<String> {
    let mut out = String::with_capacity(graph.num_nodes() * 64);
    writeln!(out, "digraph pipeline {{")?;
    writeln!(out, "  rankdir=LR;")?;

    let shown = |kind: NodeKind| !(reduced && kind == NodeKind::Option);
    for (id, node) in graph.nodes().filter(|(_, n)| shown(n.kind)) {
        let (shape, label) = match node.kind {
            NodeKind::Task(_) => ("box", graph.address(id).to_owned()),
            NodeKind::File => ("ellipse", file_label(graph.address(id), &node.values)),
            NodeKind::Option => ("note", file_label(graph.address(id), &node.values)),
        };
        writeln!(out, "  n{id} [shape={shape}, label=\"{}\"];", escape(&label))?;
    }

    for (id, _) in graph.nodes() {
        for edge in graph.successors(id) {
            if !shown(graph.node(edge.source).kind) || !shown(graph.node(edge.target).kind) {
                continue;
            }
            let style = if edge.link_only { " style=dashed" } else { "" };
            let label = edge.long_form().unwrap_or("");
            writeln!(
                out,
                "  n{} -> n{} [label=\"{}\"{style}];",
                edge.source,
                edge.target,
                escape(label)
            )?;
        }
    }
    writeln!(out, "}}")?;
    Ok(out)
}

fn file_label(address: &str, values: &[String]) -> String {
    match values {
        [] => address.to_owned(),
        [one] => format!("{address}\\n{one}"),
        [first, rest @ ..] => format!("{address}\\n{first} (+{})", rest.len()),
    }
}

fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(file_label("bam", &[]), "bam");
        assert_eq!(file_label("bam", &["a.bam".to_owned()]), "bam\\na.bam");
        assert_eq!(
            file_label("bam", &["a.bam".to_owned(), "b.bam".to_owned(), "c.bam".to_owned()]),
            "bam\\na.bam (+2)"
        );
        assert_eq!(escape("say \"hi\""), "say \\\"hi\\\"");
    }
}
