use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use util::{hash_map, HashMap, Suggestion};

use crate::parameter_set::validate_sets;
use crate::{
    ConstructionRecipe, DataType, Direction, Error, ParameterSet, StreamHandling, NO_EXTENSION,
};

fn default_true() -> bool {
    true
}

/// One argument accepted by a tool.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolArgument {
    #[serde(rename = "long form argument")]
    pub long_form: String,
    #[serde(rename = "short form argument", default)]
    pub short_form: Option<String>,
    /// The flag actually passed to the executable, if it differs from the long form.
    #[serde(rename = "command line argument", default)]
    pub command_line_argument: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "data type")]
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
    /// Allowed extensions, without leading dots. Empty means unchecked.
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(rename = "is stub", default)]
    pub is_stub: bool,
    #[serde(rename = "stub extensions", default)]
    pub stub_extensions: Vec<String>,
    #[serde(rename = "primary stub extension", default)]
    pub primary_stub_extension: Option<String>,
    /// Whether the argument may be repeated on the command line with several values.
    #[serde(rename = "allow multiple values", default)]
    pub allow_multiple_values: bool,
    #[serde(rename = "include on command line", default = "default_true")]
    pub include_on_command_line: bool,
    #[serde(rename = "if output to stream", default)]
    pub if_output_to_stream: Option<StreamHandling>,
    #[serde(rename = "if input is stream", default)]
    pub if_input_is_stream: Option<StreamHandling>,
    #[serde(rename = "construct filename", default)]
    pub construct_filename: Option<ConstructionRecipe>,
    #[serde(skip)]
    pub direction: Direction,
}

impl ToolArgument {
    /// Flag to write on the command line for this argument.
    pub fn command_line_flag(&self) -> &str {
        self.command_line_argument.as_deref().unwrap_or(&self.long_form)
    }

    /// True if `name` is this argument's long or short form.
    pub fn is_named(&self, name: &str) -> bool {
        self.long_form == name || self.short_form.as_deref() == Some(name)
    }

    /// True if `value` ends with one of the allowed extensions
    /// (or if extensions aren't checked for this argument).
    pub fn has_allowed_extension(&self, value: &str) -> bool {
        self.extensions.is_empty() || matching_extension(value, &self.extensions).is_some()
    }

    /// Extension of the primary file in a stub group.
    pub fn primary_stub_extension(&self) -> Option<&str> {
        self.primary_stub_extension
            .as_deref()
            .or_else(|| self.stub_extensions.first().map(String::as_str))
    }

    fn normalize(&mut self, direction: Direction) {
        self.direction = direction;
        normalize_extensions(&mut self.extensions);
        normalize_extensions(&mut self.stub_extensions);
        if let Some(primary) = &mut self.primary_stub_extension {
            *primary = primary.trim_start_matches('.').to_owned();
        }
    }
}

/// Find the longest of `extensions` that `value` ends with (as ".ext").
pub fn matching_extension<'a>(value: &str, extensions: &'a [String]) -> Option<&'a str> {
    extensions
        .iter()
        .filter(|ext| {
            value.len() > ext.len()
                && value.ends_with(ext.as_str())
                && value.as_bytes()[value.len() - ext.len() - 1] == b'.'
        })
        .max_by_key(|ext| ext.len())
        .map(String::as_str)
}

fn normalize_extensions(exts: &mut Vec<String>) {
    exts.retain(|ext| ext != NO_EXTENSION);
    for ext in exts.iter_mut() {
        if let Some(stripped) = ext.strip_prefix('.') {
            *ext = stripped.to_owned();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ArgumentSections {
    #[serde(default)]
    inputs: Vec<ToolArgument>,
    #[serde(default)]
    outputs: Vec<ToolArgument>,
    #[serde(default)]
    options: Vec<ToolArgument>,
}

/// Configuration for a single external executable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub executable: String,
    /// Path to the executable, relative to the resources directory.
    #[serde(default)]
    pub path: Option<String>,
    /// Command placed before the executable, e.g. "java -jar".
    #[serde(default)]
    pub precommand: Option<String>,
    /// Subcommand placed after the executable, e.g. "sort".
    #[serde(default)]
    pub modifier: Option<String>,
    arguments: ArgumentSections,
    #[serde(rename = "argument order", default)]
    pub argument_order: Vec<String>,
    #[serde(rename = "parameter sets", default)]
    pub parameter_sets: Vec<ParameterSet>,
    /// long form -> (section, index) in `arguments`
    #[serde(skip)]
    index: HashMap<String, (Direction, usize)>,
}

impl ToolConfig {
    /// Parse and validate a tool configuration document.
    pub fn from_json_str(text: &str, file: &str) -> Result<Self> {
        let mut tool: ToolConfig =
            serde_json::from_str(text).map_err(|e| Error::ToolJson(file.to_owned(), e))?;
        tool.bind()
            .with_context(|| format!("while validating tool configuration file \"{file}\""))?;
        Ok(tool)
    }

    /// Attach directions, build the argument index, and check internal references.
    pub fn bind(&mut self) -> Result<()> {
        for arg in &mut self.arguments.inputs {
            arg.normalize(Direction::Input);
        }
        for arg in &mut self.arguments.outputs {
            arg.normalize(Direction::Output);
        }
        for arg in &mut self.arguments.options {
            arg.normalize(Direction::Option);
        }

        self.index = hash_map(self.num_arguments());
        let mut short_forms = util::hash_set(self.num_arguments());
        let sections = [
            (Direction::Input, &self.arguments.inputs),
            (Direction::Output, &self.arguments.outputs),
            (Direction::Option, &self.arguments.options),
        ];
        for (direction, args) in sections {
            for (i, arg) in args.iter().enumerate() {
                let dupe = self.index.insert(arg.long_form.clone(), (direction, i)).is_some()
                    || arg
                        .short_form
                        .as_ref()
                        .is_some_and(|short| !short_forms.insert(short.clone()));
                if dupe {
                    return Err(Error::DuplicateToolArgument {
                        tool: self.id.clone(),
                        argument: arg.long_form.clone(),
                    }
                    .into());
                }
            }
        }

        self.validate_arguments()?;

        let mut sets = std::mem::take(&mut self.parameter_sets);
        let lookup = |name: &str| self.argument(name).map(|arg| arg.long_form.as_str());
        validate_sets(&self.id, &mut sets, Some(&lookup), self.long_forms(), None)?;
        self.parameter_sets = sets;
        Ok(())
    }

    fn validate_arguments(&self) -> Result<()> {
        for arg in self.arguments() {
            if arg.is_stub {
                if arg.stub_extensions.is_empty() {
                    return Err(Error::StubWithoutExtensions {
                        tool: self.id.clone(),
                        argument: arg.long_form.clone(),
                    }
                    .into());
                }
                if !arg.direction.is_file() {
                    return Err(Error::StubOption {
                        tool: self.id.clone(),
                        argument: arg.long_form.clone(),
                    }
                    .into());
                }
            }
            if let Some(recipe) = &arg.construct_filename {
                self.validate_recipe(arg, recipe)?;
            }
        }

        for name in &self.argument_order {
            if self.argument(name).is_none() {
                return Err(Error::UnknownArgumentInOrder {
                    tool: self.id.clone(),
                    argument: name.clone(),
                    suggestion: Suggestion::closest(name, self.long_forms()),
                }
                .into());
            }
        }
        Ok(())
    }

    fn validate_recipe(&self, arg: &ToolArgument, recipe: &ConstructionRecipe) -> Result<()> {
        for referenced in recipe.referenced_arguments() {
            if referenced == arg.long_form {
                return Err(Error::InvalidRecipe {
                    tool: self.id.clone(),
                    argument: arg.long_form.clone(),
                    reason: "a filename cannot be constructed from itself".to_owned(),
                }
                .into());
            }
            if self.argument(referenced).is_none() {
                return Err(Error::UnknownRecipeArgument {
                    tool: self.id.clone(),
                    argument: arg.long_form.clone(),
                    referenced: referenced.to_owned(),
                    suggestion: Suggestion::closest(referenced, self.long_forms()),
                }
                .into());
            }
        }
        if let ConstructionRecipe::FromToolArgument {
            modify_extension, ..
        } = recipe
        {
            if modify_extension.needs_new_extension()
                && !arg.is_stub
                && arg.extensions.is_empty()
            {
                return Err(Error::InvalidRecipe {
                    tool: self.id.clone(),
                    argument: arg.long_form.clone(),
                    reason: format!(
                        "extension policy \"{modify_extension:?}\" needs the argument to declare \
                         an extension"
                    ),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn num_arguments(&self) -> usize {
        self.arguments.inputs.len() + self.arguments.outputs.len() + self.arguments.options.len()
    }

    /// All arguments, inputs first, then outputs, then options.
    pub fn arguments(&self) -> impl Iterator<Item = &ToolArgument> + Clone + '_ {
        self.arguments
            .inputs
            .iter()
            .chain(self.arguments.outputs.iter())
            .chain(self.arguments.options.iter())
    }

    /// Long forms of every argument, for suggestions.
    pub fn long_forms(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.arguments().map(|arg| arg.long_form.as_str())
    }

    /// Look up an argument by its long or short form.
    pub fn argument(&self, name: &str) -> Option<&ToolArgument> {
        if let Some((direction, i)) = self.index.get(name) {
            let section = match direction {
                Direction::Input => &self.arguments.inputs,
                Direction::Output => &self.arguments.outputs,
                Direction::Option => &self.arguments.options,
            };
            return section.get(*i);
        }
        self.arguments().find(|arg| arg.short_form.as_deref() == Some(name))
    }

    /// Arguments in the order they should be written on a command line:
    /// "argument order" first if given, then everything else in declaration order.
    pub fn ordered_arguments(&self) -> Vec<&ToolArgument> {
        let mut ordered: Vec<&ToolArgument> = self
            .argument_order
            .iter()
            .filter_map(|name| self.argument(name))
            .collect();
        for arg in self.arguments() {
            if !ordered.iter().any(|o| o.long_form == arg.long_form) {
                ordered.push(arg);
            }
        }
        ordered
    }

    pub fn parameter_set(&self, id: &str) -> Option<&ParameterSet> {
        self.parameter_sets.iter().find(|set| set.id == id)
    }
}
