use std::path::Path;

use anyhow::{Context, Result};
use rand::{distributions::Alphanumeric, Rng};

use config::{
    matching_extension, ConstructionRecipe, Direction, ExtensionPolicy, TextModification,
    ToolArgument,
};
use util::hash_set;
use workflow::{AssembledTask, SuperPipeline, TaskId};

use crate::builder::materialize;
use crate::builder::is_greedy;
use crate::multiplicity::{pick_values, task_multiplicity, Multiplicity};
use crate::{EdgeArgument, Error, NodeId, PipelineGraph, ValueSource};

/// Length of the random text added to intermediate filenames.
pub const TOKEN_LEN: usize = 8;

/// Fill in filenames nobody supplied, from each argument's construction recipe.
///
/// Tasks are visited in workflow order, so a task's inputs are named before
/// its outputs are derived from them. Only nodes without values are touched,
/// which makes running this twice harmless.
pub fn construct_filenames<R: Rng>(
    graph: &mut PipelineGraph,
    sp: &SuperPipeline,
    order: &[TaskId],
    output_dir: &str,
    rng: &mut R,
) -> Result<()> {
    for task in order {
        let assembled = sp.task(*task);
        TaskConstruction::new(graph, sp, *task)?
            .run(graph, sp, output_dir, rng)
            .with_context(|| {
                format!("while constructing filenames for task \"{}\"", assembled.address)
            })?;
    }
    Ok(())
}

/// Filename pieces for one run, before the extension policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Base {
    dir: String,
    stem: String,
    ext: Option<String>,
    /// a "known filename": used as is.
    literal: bool,
}

struct TaskConstruction<'a> {
    task: TaskId,
    assembled: &'a AssembledTask,
    task_node: NodeId,
    m: Multiplicity,
}

impl<'a> TaskConstruction<'a> {
    fn new(graph: &PipelineGraph, sp: &'a SuperPipeline, task: TaskId) -> Result<Self> {
        let assembled = sp.task(task);
        let task_node = graph
            .task_node(task)
            .ok_or_else(|| Error::UnresolvedNode(assembled.address.clone()))?;
        let m = task_multiplicity(graph, task_node, assembled.config.is_greedy())?;
        Ok(Self {
            task,
            assembled,
            task_node,
            m,
        })
    }

    fn run<R: Rng>(
        &self,
        graph: &mut PipelineGraph,
        sp: &SuperPipeline,
        output_dir: &str,
        rng: &mut R,
    ) -> Result<()> {
        // derived inputs first, since outputs may be named after them.
        let mut args: Vec<&ToolArgument> = self
            .assembled
            .tool
            .arguments()
            .filter(|arg| arg.construct_filename.is_some())
            .collect();
        args.sort_by_key(|arg| arg.direction == Direction::Output);

        for arg in args {
            let Some(recipe) = &arg.construct_filename else {
                continue;
            };
            let mut nodes = graph.argument_nodes(self.task_node, &arg.long_form);
            if nodes.is_empty() {
                if !arg.required {
                    continue;
                }
                nodes = materialize(graph, sp, self.task, &arg.long_form)?;
            }
            if nodes.iter().any(|n| graph.node(*n).has_values()) {
                continue;
            }
            if arg.direction == Direction::Input
                && nodes.iter().any(|n| graph.producers(*n).next().is_some())
            {
                continue;
            }

            let bases = self.bases(graph, arg, recipe)?;
            let policy = match recipe {
                ConstructionRecipe::FromToolArgument {
                    modify_extension, ..
                } => *modify_extension,
                ConstructionRecipe::KnownFilename { .. } => ExtensionPolicy::Omit,
            };
            let token = self.token(graph, &nodes, rng);

            for node in nodes {
                let member_ext = graph.node(node).stub.as_ref().map(|s| s.extension.clone());
                let mut names = Vec::with_capacity(bases.len());
                let mut seen = hash_set(bases.len());
                for base in &bases {
                    let name = self.filename(
                        arg,
                        base,
                        policy,
                        member_ext.as_deref(),
                        token.as_deref(),
                        output_dir,
                    )?;
                    if !seen.insert(name.clone()) {
                        return Err(Error::IdenticalFilenames {
                            task: self.assembled.address.clone(),
                            argument: arg.long_form.clone(),
                            filename: name,
                        }
                        .into());
                    }
                    names.push(name);
                }
                log::debug!("{} = {names:?}", graph.address(node));
                graph.node_mut(node).set_values(names, ValueSource::Constructed);
            }
        }
        Ok(())
    }

    /// One base per run of the task.
    fn bases(&self, graph: &PipelineGraph, arg: &ToolArgument, recipe: &ConstructionRecipe) -> Result<Vec<Base>> {
        let runs = self.m.runs();
        match recipe {
            ConstructionRecipe::KnownFilename {
                filename,
                directory_argument,
            } => Ok((0..runs)
                .map(|run| {
                    let dir = directory_argument
                        .as_deref()
                        .and_then(|name| self.run_values(graph, name, run).into_iter().next())
                        .unwrap_or_default();
                    Base {
                        dir,
                        stem: filename.clone(),
                        ext: None,
                        literal: true,
                    }
                })
                .collect()),
            ConstructionRecipe::FromToolArgument {
                use_argument,
                modify_text,
                ..
            } => {
                let unset = || Error::ConstructionSourceUnset {
                    task: self.assembled.address.clone(),
                    argument: arg.long_form.clone(),
                    from: use_argument.clone(),
                };
                let source = self.assembled.tool.argument(use_argument).ok_or_else(unset)?;
                let source_node = graph
                    .argument_nodes(self.task_node, &source.long_form)
                    .first()
                    .copied()
                    .ok_or_else(unset)?;
                let values = &graph.node(source_node).values;
                if values.is_empty() {
                    return Err(unset().into());
                }
                let token = graph.node(source_node).token.as_deref();
                let mut exts = source.extensions.clone();
                exts.extend(source.stub_extensions.iter().cloned());
                let source_edge = self.edge_argument(source);

                let mut bases = Vec::with_capacity(runs);
                for run in 0..runs {
                    let value = pick_values(values, &source_edge, self.m, run)
                        .first()
                        .ok_or_else(|| Error::ConstructionCount {
                            task: self.assembled.address.clone(),
                            argument: arg.long_form.clone(),
                            values: values.len(),
                            runs,
                        })?;
                    let mut base = split_value(value, &exts, token);
                    let mut added = Vec::new();
                    for modification in modify_text {
                        match modification {
                            TextModification::AddText(text) => base.stem.push_str(text),
                            TextModification::AddArgumentValues(name) => {
                                let Some(other) = self.assembled.tool.argument(name) else {
                                    continue;
                                };
                                for v in self.run_values(graph, name, run) {
                                    base.stem.push('_');
                                    base.stem.push_str(&value_text(&v, other.direction.is_file()));
                                }
                                added.push(other.long_form.as_str());
                            }
                        }
                    }
                    if self.m.divisions > 1 {
                        self.add_division_values(graph, &mut base, &added, run);
                    }
                    bases.push(base);
                }
                Ok(bases)
            }
        }
    }

    /// Options that differ between divisions go into the name, so divisions don't collide.
    fn add_division_values(&self, graph: &PipelineGraph, base: &mut Base, added: &[&str], run: usize) {
        for edge in graph.predecessors(self.task_node).filter(|e| e.is_argument()) {
            let Some(arg) = edge.argument else { continue };
            if arg.direction != Direction::Option
                || arg.takes_all_values()
                || added.contains(&arg.long_form.as_str())
            {
                continue;
            }
            let values = &graph.node(edge.source).values;
            if values.len() > 1 {
                for v in pick_values(values, arg, self.m, run) {
                    base.stem.push('_');
                    base.stem.push_str(v);
                }
            }
        }
    }

    fn filename(
        &self,
        arg: &ToolArgument,
        base: &Base,
        policy: ExtensionPolicy,
        member_ext: Option<&str>,
        token: Option<&str>,
        output_dir: &str,
    ) -> Result<String> {
        let out_ext = member_ext.or(arg.extensions.first().map(String::as_str));
        let name = if base.literal {
            match member_ext {
                Some(ext) => format!("{}.{ext}", base.stem),
                None => base.stem.clone(),
            }
        } else {
            let stem = match token {
                Some(t) => format!("{}_{t}", base.stem),
                None => base.stem.clone(),
            };
            let no_extension = || Error::NoExtension {
                task: self.assembled.address.clone(),
                argument: arg.long_form.clone(),
            };
            match (policy, &base.ext) {
                (ExtensionPolicy::Replace, _) | (ExtensionPolicy::Append, None) => {
                    format!("{stem}.{}", out_ext.ok_or_else(no_extension)?)
                }
                (ExtensionPolicy::Append, Some(src)) => {
                    format!("{stem}.{src}.{}", out_ext.ok_or_else(no_extension)?)
                }
                (ExtensionPolicy::Retain, Some(src)) => format!("{stem}.{src}"),
                (ExtensionPolicy::Retain, None) | (ExtensionPolicy::Omit, _) => stem,
            }
        };

        let dir = if !base.dir.is_empty() && (base.literal || arg.direction != Direction::Output) {
            base.dir.as_str()
        } else if arg.direction == Direction::Output {
            output_dir
        } else {
            ""
        };
        Ok(join_dir(dir, &name))
    }

    /// The random token for an intermediate group of nodes, generated at most once.
    fn token<R: Rng>(&self, graph: &mut PipelineGraph, nodes: &[NodeId], rng: &mut R) -> Option<String> {
        let intermediate = nodes.iter().any(|n| {
            graph.node(*n).intermediate
                && graph.producers(*n).next().is_some()
                && graph.consumers(*n).next().is_some()
        });
        if !intermediate {
            return None;
        }
        let token = nodes
            .iter()
            .find_map(|n| graph.node(*n).token.clone())
            .unwrap_or_else(|| random_token(rng));
        for node in nodes {
            graph.node_mut(*node).token = Some(token.clone());
        }
        Some(token)
    }

    fn edge_argument(&self, arg: &ToolArgument) -> EdgeArgument {
        EdgeArgument::new(arg, is_greedy(self.assembled, arg), None)
    }

    /// Values of another argument of this task for one run.
    fn run_values(&self, graph: &PipelineGraph, name: &str, run: usize) -> Vec<String> {
        let Some(arg) = self.assembled.tool.argument(name) else {
            return Vec::new();
        };
        let Some(node) = graph.argument_nodes(self.task_node, &arg.long_form).first().copied() else {
            return Vec::new();
        };
        pick_values(&graph.node(node).values, &self.edge_argument(arg), self.m, run).to_vec()
    }
}

fn random_token<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Split a source value into directory, stem and extension,
/// dropping the token the source was given as an intermediate file.
fn split_value(value: &str, extensions: &[String], token: Option<&str>) -> Base {
    let (dir, file) = match value.rfind('/') {
        Some(i) => (&value[..i], &value[i + 1..]),
        None => ("", value),
    };
    let ext = matching_extension(file, extensions)
        .map(str::to_owned)
        .or_else(|| match file.rfind('.') {
            Some(i) if i > 0 => Some(file[i + 1..].to_owned()),
            _ => None,
        });
    let mut stem = match &ext {
        Some(ext) => &file[..file.len() - ext.len() - 1],
        None => file,
    };
    if let Some(stripped) = token.and_then(|t| stem.strip_suffix(t)).and_then(|s| s.strip_suffix('_')) {
        stem = stripped;
    }
    Base {
        dir: dir.to_owned(),
        stem: stem.to_owned(),
        ext,
        literal: false,
    }
}

/// How a value of another argument appears in a filename: files by their stem.
fn value_text(value: &str, is_file: bool) -> String {
    if !is_file {
        return value.to_owned();
    }
    Path::new(value)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(value)
        .to_owned()
}

fn join_dir(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{}/{name}", dir.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{fixtures, GraphBuilder, Request, Resolver};

    fn strings(vals: &[&str]) -> Vec<String> {
        vals.iter().map(|v| v.to_string()).collect()
    }

    fn values(graph: &PipelineGraph, address: &str) -> Vec<String> {
        let nodes = graph.resolve_address(address).unwrap_or_default();
        nodes
            .first()
            .map(|n| graph.node(*n).values.clone())
            .unwrap_or_default()
    }

    fn constructed(root: &str, args: Vec<(&str, Vec<String>)>, output_dir: &str) -> Result<(SuperPipeline, PipelineGraph)> {
        let sp = fixtures::assemble(root)?;
        let mut graph = GraphBuilder::new(&sp).build()?;
        let request = Request {
            args: args.into_iter().map(|(k, v)| (k.to_owned(), v)).collect(),
            ..Default::default()
        };
        Resolver::new(&sp, &mut graph).resolve(&request)?;
        let order: Vec<TaskId> = sp.tasks().map(|(id, _)| id).collect();
        let mut rng = StdRng::seed_from_u64(7);
        construct_filenames(&mut graph, &sp, &order, output_dir, &mut rng)?;
        Ok((sp, graph))
    }

    #[test]
    fn test_linear_pipeline() -> Result<()> {
        let (_, graph) = constructed(
            "variants",
            vec![("--fastq", strings(&["reads/sample.fq"])), ("-r", strings(&["hg.fa"]))],
            "",
        )?;

        let aligned = values(&graph, "aligned");
        assert_eq!(aligned.len(), 1);
        let token = graph
            .node(graph.resolve_address("aligned").unwrap_or_default()[0])
            .token
            .clone()
            .expect("intermediate token");
        assert_eq!(token.len(), TOKEN_LEN);
        assert_eq!(aligned[0], format!("sample_{token}.bam"));

        // the token of the source is dropped again downstream.
        assert_eq!(values(&graph, "sorted"), ["sample_sorted.bam"]);
        assert_eq!(values(&graph, "vcf"), ["sample_sorted_chr1.vcf"]);
        Ok(())
    }

    #[test]
    fn test_tokens_are_stable() -> Result<()> {
        let (sp, mut graph) = constructed(
            "variants",
            vec![("--fastq", strings(&["sample.fq"])), ("-r", strings(&["hg.fa"]))],
            "",
        )?;
        let aligned = graph.resolve_address("aligned").unwrap_or_default()[0];
        let first = graph.node(aligned).values.clone();

        graph.node_mut(aligned).values.clear();
        let order: Vec<TaskId> = sp.tasks().map(|(id, _)| id).collect();
        let mut rng = StdRng::seed_from_u64(99);
        construct_filenames(&mut graph, &sp, &order, "", &mut rng)?;
        assert_eq!(graph.node(aligned).values, first);
        Ok(())
    }

    #[test]
    fn test_divisions_and_output_dir() -> Result<()> {
        let (_, graph) = constructed(
            "variants",
            vec![
                ("--fastq", strings(&["in/a.fq", "in/b.fq"])),
                ("-r", strings(&["hg.fa"])),
                ("--region", strings(&["chr1", "chr2"])),
            ],
            "out",
        )?;
        assert_eq!(values(&graph, "sorted"), ["out/a_sorted.bam", "out/b_sorted.bam"]);
        assert_eq!(
            values(&graph, "vcf"),
            [
                "out/a_sorted_chr1.vcf",
                "out/a_sorted_chr2.vcf",
                "out/b_sorted_chr1.vcf",
                "out/b_sorted_chr2.vcf"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_stub_and_known_filename() -> Result<()> {
        let (_, graph) = constructed("dedup", vec![("--bam", strings(&["x.bam"]))], "")?;
        assert_eq!(values(&graph, "marked:bam"), ["x_md.bam"]);
        assert_eq!(values(&graph, "marked:bam.bai"), ["x_md.bam.bai"]);
        assert_eq!(values(&graph, "stats.report"), ["x_md.txt"]);

        let (_, graph) = constructed(
            "cohort",
            vec![("--fastq", strings(&["a.fq"])), ("-r", strings(&["hg.fa"]))],
            "",
        )?;
        assert_eq!(values(&graph, "merge.out"), ["merged.vcf"]);
        Ok(())
    }

    #[test]
    fn test_source_unset() -> Result<()> {
        let err = constructed("variants", vec![("-r", strings(&["hg.fa"]))], "").unwrap_err();
        assert!(err.chain().any(|e| matches!(
            e.downcast_ref::<Error>(),
            Some(Error::ConstructionSourceUnset { from, .. }) if from == "--fastq"
        )));
        Ok(())
    }

    #[test]
    fn test_split_value() {
        let exts = strings(&["bam", "bam.bai"]);
        let base = split_value("dir/x_abc.bam.bai", &exts, Some("abc"));
        assert_eq!(base.dir, "dir");
        assert_eq!(base.stem, "x");
        assert_eq!(base.ext.as_deref(), Some("bam.bai"));

        let base = split_value("notes.v2.txt", &[], None);
        assert_eq!(base.stem, "notes.v2");
        assert_eq!(base.ext.as_deref(), Some("txt"));

        let base = split_value(".hidden", &[], None);
        assert_eq!(base.stem, ".hidden");
        assert_eq!(base.ext, None);
    }
}
