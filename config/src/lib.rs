//! Typed records for tool and pipeline configuration documents.
//!
//! Documents are JSON. Each record is deserialized with `serde` (unknown
//! attributes are rejected) and then bound: directions are attached to
//! arguments, lookup indexes are built, and cross-references inside a single
//! document are validated. References that need the whole library (a task's
//! tool, a nested pipeline's nodes) are checked later by the workflow crate.

mod error;
pub use error::Error;

mod types;
pub use types::{DataType, Direction, Scalar, StreamHandling};

mod recipe;
pub use recipe::{ConstructionRecipe, ExtensionPolicy, TextModification};

mod tool;
pub use tool::{matching_extension, ToolArgument, ToolConfig};

mod pipeline;
pub use pipeline::{
    Connection, EvaluateCommand, EvaluateValue, PipelineArgument, PipelineConfig, PipelineTask,
    SharedMember, SharedNode, TaskTarget, UniqueNode,
};

mod parameter_set;
pub use parameter_set::{ParameterSet, ParameterSetData, ParameterTarget, DEFAULT_PARAMETER_SET};

mod dir;
pub use dir::ConfigDir;

/// Value of an "extensions" entry meaning "don't check extensions".
pub const NO_EXTENSION: &str = "no extension";

/// Extension of files that contain one argument value per line.
pub const LIST_EXTENSION: &str = "list";
