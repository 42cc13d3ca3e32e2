use anyhow::Result;

use config::{Direction, TaskTarget};
use util::Suggestion;
use workflow::{join_address, PipelineId, SuperPipeline, TaskId};

use crate::{Error, NodeId, PipelineGraph};

/// Something a value can be attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A declared node, by full address.
    Node(String),
    /// A tool argument of a task, whose node may not exist yet.
    TaskArgument { task: TaskId, argument: String },
}

impl Binding {
    /// Nodes currently behind this binding; empty if none have been created.
    pub fn nodes(&self, graph: &PipelineGraph) -> Vec<NodeId> {
        match self {
            Self::Node(address) => graph.resolve_address(address).unwrap_or_default(),
            Self::TaskArgument { task, argument } => graph
                .task_node(*task)
                .map(|t| graph.argument_nodes(t, argument))
                .unwrap_or_default(),
        }
    }
}

/// One argument a pipeline exposes on the command line.
#[derive(Debug, Clone)]
pub struct InterfaceArgument {
    pub long_form: String,
    pub short_form: Option<String>,
    pub description: String,
    pub direction: Direction,
    pub bindings: Vec<Binding>,
}

impl InterfaceArgument {
    pub fn is_named(&self, name: &str) -> bool {
        self.long_form == name || self.short_form.as_deref() == Some(name)
    }

    /// "--long (-s)", for messages.
    pub fn display_name(&self) -> String {
        match &self.short_form {
            Some(short) => format!("{} ({short})", self.long_form),
            None => self.long_form.clone(),
        }
    }
}

/// The arguments of a pipeline: those it declares, plus any imported from a task.
/// Declared arguments take precedence over imported ones with the same name.
#[derive(Debug, Clone)]
pub struct Interface {
    pub pipeline: String,
    arguments: Vec<InterfaceArgument>,
}

impl Interface {
    pub fn for_pipeline(sp: &SuperPipeline, id: PipelineId) -> Result<Self> {
        let pipe = sp.pipeline(id);
        let config = &pipe.config;
        let mut arguments: Vec<InterfaceArgument> = config
            .arguments()
            .map(|arg| InterfaceArgument {
                long_form: arg.long_form.clone(),
                short_form: arg.short_form.clone(),
                description: arg.description.clone(),
                direction: arg.direction,
                bindings: arg
                    .node_ids
                    .iter()
                    .map(|node| Binding::Node(pipe.address(node)))
                    .collect(),
            })
            .collect();

        if let Some(task_name) = &config.import_arguments {
            let imported = imported_arguments(sp, id, task_name)?;
            for arg in imported {
                let clash = arguments.iter().any(|a| {
                    a.is_named(&arg.long_form)
                        || arg.short_form.as_deref().is_some_and(|short| a.is_named(short))
                });
                if clash {
                    log::debug!(
                        "pipeline {} overrides imported argument {}",
                        config.id,
                        arg.long_form
                    );
                } else {
                    arguments.push(arg);
                }
            }
        }

        Ok(Self {
            pipeline: config.id.clone(),
            arguments,
        })
    }

    pub fn arguments(&self) -> impl Iterator<Item = &InterfaceArgument> + '_ {
        self.arguments.iter()
    }

    pub fn argument(&self, name: &str) -> Option<&InterfaceArgument> {
        self.arguments.iter().find(|arg| arg.is_named(name))
    }

    /// Like [`Self::argument`], but a miss is an error with a suggestion.
    pub fn require(&self, name: &str) -> Result<&InterfaceArgument> {
        self.argument(name).ok_or_else(|| {
            Error::UnknownArgument {
                pipeline: self.pipeline.clone(),
                argument: name.to_owned(),
                suggestion: Suggestion::closest(name, self.long_forms()),
            }
            .into()
        })
    }

    pub fn long_forms(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.arguments.iter().map(|arg| arg.long_form.as_str())
    }

    /// First argument bound to `binding`, if any.
    pub fn argument_for(&self, binding: &Binding) -> Option<&InterfaceArgument> {
        self.arguments.iter().find(|arg| arg.bindings.contains(binding))
    }
}

fn imported_arguments(
    sp: &SuperPipeline,
    pipeline: PipelineId,
    task_name: &str,
) -> Result<Vec<InterfaceArgument>> {
    let pipe = sp.pipeline(pipeline);
    let address = join_address(&pipe.prefix, task_name);
    let target = pipe.config.task(task_name).map(|t| t.target());

    match (target, sp.task_at(&address), sp.nested_at(&address)) {
        (Some(TaskTarget::Tool(_)), Some(task), _) => {
            let tool = &sp.task(task).tool;
            Ok(tool
                .arguments()
                .map(|arg| InterfaceArgument {
                    long_form: arg.long_form.clone(),
                    short_form: arg.short_form.clone(),
                    description: arg.description.clone(),
                    direction: arg.direction,
                    bindings: vec![Binding::TaskArgument {
                        task,
                        argument: arg.long_form.clone(),
                    }],
                })
                .collect())
        }
        (Some(TaskTarget::Pipeline(_)), _, Some(nested)) => {
            Ok(Interface::for_pipeline(sp, nested)?.arguments)
        }
        _ => Err(Error::UnknownTaskAddress {
            task: address,
            suggestion: Suggestion::closest(task_name, sp.task_addresses()),
        }
        .into()),
    }
}
