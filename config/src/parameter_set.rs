use anyhow::Result;
use serde::{Deserialize, Serialize};

use util::{hash_set, Suggestion};

use crate::{Error, Scalar};

/// Parameter set applied to every tool and pipeline before anything else.
pub const DEFAULT_PARAMETER_SET: &str = "default";

/// A named bundle of argument values.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSet {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data: Vec<ParameterSetData>,
}

impl ParameterSet {
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_PARAMETER_SET
    }
}

/// One assignment in a parameter set: either a top-level argument or a node id.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSetData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub values: Vec<Scalar>,
}

/// What a `ParameterSetData` entry assigns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterTarget<'a> {
    Argument(&'a str),
    Node(&'a str),
}

impl ParameterSetData {
    /// Only valid after the owning document has been bound.
    pub fn target(&self) -> Option<ParameterTarget<'_>> {
        match (&self.argument, &self.node) {
            (Some(arg), None) => Some(ParameterTarget::Argument(arg)),
            (None, Some(node)) => Some(ParameterTarget::Node(node)),
            _ => None,
        }
    }

    /// Values rendered as they will appear on a command line.
    pub fn string_values(&self) -> Vec<String> {
        self.values.iter().map(Scalar::to_string).collect()
    }
}

/// Check a document's parameter sets. `lookup_argument` resolves an argument name
/// (long or short form) to its long form; `None` disables the argument check.
/// `nodes` is the set of node ids that may be set directly (empty for tools).
pub(crate) fn validate_sets<'a, I>(
    owner: &str,
    sets: &mut [ParameterSet],
    lookup_argument: Option<&dyn Fn(&str) -> Option<&'a str>>,
    argument_names: I,
    nodes: Option<&[&str]>,
) -> Result<()>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let mut seen = hash_set(sets.len());
    for set in sets.iter_mut() {
        if !seen.insert(set.id.clone()) {
            return Err(Error::DuplicateParameterSet {
                owner: owner.to_owned(),
                id: set.id.clone(),
            }
            .into());
        }
        for data in &mut set.data {
            match data.target() {
                Some(ParameterTarget::Argument(name)) => {
                    let Some(lookup) = lookup_argument else {
                        continue;
                    };
                    match lookup(name) {
                        Some(long) => data.argument = Some(long.to_owned()),
                        None => {
                            return Err(Error::UnknownParameterSetArgument {
                                owner: owner.to_owned(),
                                set: set.id.clone(),
                                argument: name.to_owned(),
                                suggestion: Suggestion::closest(name, argument_names.clone()),
                            }
                            .into())
                        }
                    }
                }
                Some(ParameterTarget::Node(node)) => match nodes {
                    None => {
                        return Err(Error::ToolParameterSetNode {
                            owner: owner.to_owned(),
                            set: set.id.clone(),
                        }
                        .into())
                    }
                    Some(nodes) if !nodes.contains(&node) => {
                        return Err(Error::UndeclaredNode {
                            pipeline: owner.to_owned(),
                            section: "parameter sets",
                            id: node.to_owned(),
                            suggestion: Suggestion::closest(node, nodes.iter().copied()),
                        }
                        .into())
                    }
                    Some(_) => {}
                },
                None => {
                    return Err(Error::InvalidParameterSetData {
                        owner: owner.to_owned(),
                        set: set.id.clone(),
                    }
                    .into())
                }
            }
        }
    }
    Ok(())
}
