use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use util::{hash_set, HashSet, Suggestion};

use crate::parameter_set::validate_sets;
use crate::{Direction, Error, ParameterSet, ToolConfig};

/// What a pipeline task runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskTarget {
    Tool(String),
    Pipeline(String),
}

impl Default for TaskTarget {
    fn default() -> Self {
        Self::Tool(String::new())
    }
}

impl TaskTarget {
    pub fn name(&self) -> &str {
        match self {
            Self::Tool(s) | Self::Pipeline(s) => s,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineTask {
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pipeline: Option<String>,
    /// Argument whose values are all consumed by a single run of this task.
    #[serde(rename = "greedy argument", default)]
    pub greedy_argument: Option<String>,
    /// Start a new phase at this task even if it isn't greedy.
    #[serde(default)]
    pub consolidate: bool,
    #[serde(rename = "output to stream", default)]
    pub output_to_stream: bool,
    #[serde(skip)]
    target: TaskTarget,
}

impl PipelineTask {
    pub fn target(&self) -> &TaskTarget {
        &self.target
    }

    pub fn is_pipeline(&self) -> bool {
        matches!(self.target, TaskTarget::Pipeline(_))
    }

    pub fn is_greedy(&self) -> bool {
        self.greedy_argument.is_some()
    }
}

/// One end of a node: a task and either one of its tool arguments or,
/// for a nested pipeline task, the id of a node inside that pipeline.
/// A tool argument named on a pipeline task refers to that pipeline's own argument.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SharedMember {
    pub task: String,
    #[serde(rename = "task argument", default, skip_serializing_if = "Option::is_none")]
    pub task_argument: Option<String>,
    #[serde(rename = "node id", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl SharedMember {
    fn is_valid(&self) -> bool {
        self.task_argument.is_some() != self.node_id.is_some()
    }
}

/// A node used by exactly one task argument.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UniqueNode {
    pub id: String,
    pub task: String,
    #[serde(rename = "task argument", default, skip_serializing_if = "Option::is_none")]
    pub task_argument: Option<String>,
    #[serde(rename = "node id", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Intermediate file, removed once the pipeline has finished with it.
    #[serde(rename = "delete files", default)]
    pub delete_files: bool,
}

impl UniqueNode {
    pub fn member(&self) -> SharedMember {
        SharedMember {
            task: self.task.clone(),
            task_argument: self.task_argument.clone(),
            node_id: self.node_id.clone(),
        }
    }
}

/// A node wired to several task arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SharedNode {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "arguments sharing node")]
    pub members: Vec<SharedMember>,
    #[serde(rename = "delete files", default)]
    pub delete_files: bool,
}

fn one_or_many<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(d)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// An argument exposed on the command line when this pipeline is run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineArgument {
    #[serde(rename = "long form argument")]
    pub long_form: String,
    #[serde(rename = "short form argument", default)]
    pub short_form: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "node id", deserialize_with = "one_or_many")]
    pub node_ids: Vec<String>,
    #[serde(skip)]
    pub direction: Direction,
}

impl PipelineArgument {
    pub fn is_named(&self, name: &str) -> bool {
        self.long_form == name || self.short_form.as_deref() == Some(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct PipelineArgumentSections {
    #[serde(default)]
    inputs: Vec<PipelineArgument>,
    #[serde(default)]
    outputs: Vec<PipelineArgument>,
    #[serde(default)]
    options: Vec<PipelineArgument>,
}

/// An extra edge from a node (or task) to a task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Connection {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub argument: Option<String>,
    /// Dependency only; never rendered on the command line.
    #[serde(rename = "link only", default)]
    pub link_only: bool,
}

/// An option whose value is the output of a shell command at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluateCommand {
    #[serde(rename = "node id")]
    pub node_id: String,
    pub command: String,
    #[serde(rename = "add values", default)]
    pub values: Vec<EvaluateValue>,
}

/// A placeholder in an evaluated command, replaced by a node's value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluateValue {
    pub id: String,
    #[serde(rename = "node id")]
    pub node_id: String,
}

/// Configuration for a composition of tasks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(rename = "pipeline tasks")]
    pub tasks: Vec<PipelineTask>,
    #[serde(rename = "unique graph nodes", default)]
    pub unique_nodes: Vec<UniqueNode>,
    #[serde(rename = "shared graph nodes", default)]
    pub shared_nodes: Vec<SharedNode>,
    #[serde(default)]
    arguments: PipelineArgumentSections,
    /// Task whose arguments (tool or nested pipeline) become this pipeline's arguments.
    #[serde(rename = "import arguments", default)]
    pub import_arguments: Option<String>,
    #[serde(rename = "connect nodes", default)]
    pub connections: Vec<Connection>,
    #[serde(rename = "evaluate commands", default)]
    pub evaluate_commands: Vec<EvaluateCommand>,
    #[serde(rename = "parameter sets", default)]
    pub parameter_sets: Vec<ParameterSet>,
}

impl PipelineConfig {
    /// Parse and validate a pipeline configuration document.
    pub fn from_json_str(text: &str, file: &str) -> Result<Self> {
        let mut pipe: PipelineConfig =
            serde_json::from_str(text).map_err(|e| Error::PipelineJson(file.to_owned(), e))?;
        pipe.bind()
            .with_context(|| format!("while validating pipeline configuration file \"{file}\""))?;
        Ok(pipe)
    }

    /// A one-task pipeline that runs `tool` directly, exposing all of its arguments.
    pub fn for_tool(tool: &ToolConfig) -> Result<Self> {
        let mut pipe = Self {
            id: tool.id.clone(),
            description: tool.description.clone(),
            categories: tool.categories.clone(),
            tasks: vec![PipelineTask {
                task: tool.id.clone(),
                tool: Some(tool.id.clone()),
                pipeline: None,
                greedy_argument: None,
                consolidate: false,
                output_to_stream: false,
                target: TaskTarget::default(),
            }],
            unique_nodes: Vec::new(),
            shared_nodes: Vec::new(),
            arguments: PipelineArgumentSections::default(),
            import_arguments: Some(tool.id.clone()),
            connections: Vec::new(),
            evaluate_commands: Vec::new(),
            parameter_sets: tool.parameter_sets.clone(),
        };
        pipe.bind()?;
        Ok(pipe)
    }

    /// Attach task targets and argument directions, and check every
    /// reference that can be resolved within this document.
    pub fn bind(&mut self) -> Result<()> {
        for task in &mut self.tasks {
            task.target = match (&task.tool, &task.pipeline) {
                (Some(tool), None) => TaskTarget::Tool(tool.clone()),
                (None, Some(pipe)) => TaskTarget::Pipeline(pipe.clone()),
                _ => {
                    return Err(Error::TaskTarget {
                        pipeline: self.id.clone(),
                        task: task.task.clone(),
                    }
                    .into())
                }
            };
        }
        for arg in &mut self.arguments.inputs {
            arg.direction = Direction::Input;
        }
        for arg in &mut self.arguments.outputs {
            arg.direction = Direction::Output;
        }
        for arg in &mut self.arguments.options {
            arg.direction = Direction::Option;
        }

        self.check_ids()?;
        self.check_members()?;
        self.check_arguments()?;
        self.check_connections()?;
        self.check_evaluate_commands()?;

        let mut sets = std::mem::take(&mut self.parameter_sets);
        let nodes: Vec<&str> = self.node_ids().collect();
        let lookup = |name: &str| self.argument(name).map(|arg| arg.long_form.as_str());
        match self.import_arguments {
            // imported arguments aren't known until the whole library is loaded.
            Some(_) => validate_sets(&self.id, &mut sets, None, self.long_forms(), Some(&nodes)),
            None => {
                validate_sets(&self.id, &mut sets, Some(&lookup), self.long_forms(), Some(&nodes))
            }
        }?;
        self.parameter_sets = sets;
        Ok(())
    }

    fn check_ids(&self) -> Result<()> {
        let mut ids: HashSet<&str> = hash_set(self.tasks.len() + self.unique_nodes.len());
        let sections = self
            .tasks
            .iter()
            .map(|t| ("pipeline tasks", t.task.as_str()))
            .chain(self.unique_nodes.iter().map(|n| ("unique graph nodes", n.id.as_str())))
            .chain(self.shared_nodes.iter().map(|n| ("shared graph nodes", n.id.as_str())));
        for (section, id) in sections {
            if !ids.insert(id) {
                return Err(Error::DuplicateId {
                    pipeline: self.id.clone(),
                    section,
                    id: id.to_owned(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn check_members(&self) -> Result<()> {
        for node in &self.unique_nodes {
            self.check_task_ref("unique graph nodes", &node.task)?;
            if !node.member().is_valid() {
                return Err(Error::SharedMember {
                    pipeline: self.id.clone(),
                    node: node.id.clone(),
                }
                .into());
            }
        }
        for node in &self.shared_nodes {
            for member in &node.members {
                self.check_task_ref("shared graph nodes", &member.task)?;
                if !member.is_valid() {
                    return Err(Error::SharedMember {
                        pipeline: self.id.clone(),
                        node: node.id.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn check_arguments(&self) -> Result<()> {
        let mut seen = hash_set(self.num_arguments() * 2);
        for arg in self.arguments() {
            let dupe = !seen.insert(arg.long_form.as_str())
                || arg.short_form.as_deref().is_some_and(|short| !seen.insert(short));
            if dupe {
                return Err(Error::DuplicatePipelineArgument {
                    pipeline: self.id.clone(),
                    argument: arg.long_form.clone(),
                }
                .into());
            }
            for id in &arg.node_ids {
                self.check_node_ref("arguments", id)?;
            }
        }
        if let Some(task) = &self.import_arguments {
            self.check_task_ref("import arguments", task)?;
        }
        Ok(())
    }

    fn check_connections(&self) -> Result<()> {
        for conn in &self.connections {
            if self.task(&conn.source).is_none() {
                self.check_node_ref("connect nodes", &conn.source)?;
            }
            self.check_task_ref("connect nodes", &conn.target)?;
            if conn.argument.is_none() && !conn.link_only {
                return Err(Error::ConnectionArgument {
                    pipeline: self.id.clone(),
                    from: conn.source.clone(),
                    to: conn.target.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn check_evaluate_commands(&self) -> Result<()> {
        for eval in &self.evaluate_commands {
            self.check_node_ref("evaluate commands", &eval.node_id)?;
            for value in &eval.values {
                self.check_node_ref("evaluate commands", &value.node_id)?;
            }
        }
        Ok(())
    }

    fn check_task_ref(&self, section: &'static str, task: &str) -> Result<()> {
        if self.task(task).is_none() {
            return Err(Error::UndeclaredTask {
                pipeline: self.id.clone(),
                section,
                task: task.to_owned(),
                suggestion: Suggestion::closest(task, self.tasks.iter().map(|t| t.task.as_str())),
            }
            .into());
        }
        Ok(())
    }

    fn check_node_ref(&self, section: &'static str, id: &str) -> Result<()> {
        if !self.node_ids().any(|n| n == id) {
            return Err(Error::UndeclaredNode {
                pipeline: self.id.clone(),
                section,
                id: id.to_owned(),
                suggestion: Suggestion::closest(id, self.node_ids()),
            }
            .into());
        }
        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<&PipelineTask> {
        self.tasks.iter().find(|t| t.task == name)
    }

    /// Ids of every unique and shared node.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.unique_nodes
            .iter()
            .map(|n| n.id.as_str())
            .chain(self.shared_nodes.iter().map(|n| n.id.as_str()))
    }

    pub fn unique_node(&self, id: &str) -> Option<&UniqueNode> {
        self.unique_nodes.iter().find(|n| n.id == id)
    }

    pub fn shared_node(&self, id: &str) -> Option<&SharedNode> {
        self.shared_nodes.iter().find(|n| n.id == id)
    }

    pub fn num_arguments(&self) -> usize {
        self.arguments.inputs.len() + self.arguments.outputs.len() + self.arguments.options.len()
    }

    /// Declared top-level arguments, inputs first, then outputs, then options.
    pub fn arguments(&self) -> impl Iterator<Item = &PipelineArgument> + '_ {
        self.arguments
            .inputs
            .iter()
            .chain(self.arguments.outputs.iter())
            .chain(self.arguments.options.iter())
    }

    pub fn long_forms(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.arguments
            .inputs
            .iter()
            .chain(self.arguments.outputs.iter())
            .chain(self.arguments.options.iter())
            .map(|arg| arg.long_form.as_str())
    }

    /// Look up a declared top-level argument by long or short form.
    pub fn argument(&self, name: &str) -> Option<&PipelineArgument> {
        self.arguments().find(|arg| arg.is_named(name))
    }

    /// Names of nested pipelines run by this pipeline's tasks.
    pub fn nested_pipelines(&self) -> impl Iterator<Item = (&PipelineTask, &str)> + '_ {
        self.tasks.iter().filter_map(|t| match &t.target {
            TaskTarget::Pipeline(p) => Some((t, p.as_str())),
            TaskTarget::Tool(_) => None,
        })
    }

    pub fn parameter_set(&self, id: &str) -> Option<&ParameterSet> {
        self.parameter_sets.iter().find(|set| set.id == id)
    }
}
