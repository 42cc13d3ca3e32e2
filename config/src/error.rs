use util::{Categorize, ErrorCategory, Suggestion};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed tool configuration file \"{0}\": {1}")]
    ToolJson(String, serde_json::Error),
    #[error("Malformed pipeline configuration file \"{0}\": {1}")]
    PipelineJson(String, serde_json::Error),
    #[error("{kind} configuration file \"{file}\" declares id \"{id}\"; the id must match the file name")]
    IdMismatch {
        kind: &'static str,
        file: String,
        id: String,
    },
    #[error("Configuration directory \"{0}\" has no \"{1}\" subdirectory")]
    MissingConfigDir(String, &'static str),

    // tools:
    #[error("Tool \"{tool}\" declares argument \"{argument}\" more than once")]
    DuplicateToolArgument { tool: String, argument: String },
    #[error("Tool \"{tool}\" argument \"{argument}\" is a stub but declares no \"stub extensions\"")]
    StubWithoutExtensions { tool: String, argument: String },
    #[error("Tool \"{tool}\" argument \"{argument}\" is a stub, so it must be an input or output")]
    StubOption { tool: String, argument: String },
    #[error("Tool \"{tool}\" lists unknown argument \"{argument}\" in \"argument order\"{suggestion}")]
    UnknownArgumentInOrder {
        tool: String,
        argument: String,
        suggestion: Suggestion,
    },
    #[error("Tool \"{tool}\" argument \"{argument}\" has an invalid \"construct filename\" recipe: {reason}")]
    InvalidRecipe {
        tool: String,
        argument: String,
        reason: String,
    },
    #[error(
        "Tool \"{tool}\" argument \"{argument}\" constructs its filename from unknown argument \
         \"{referenced}\"{suggestion}"
    )]
    UnknownRecipeArgument {
        tool: String,
        argument: String,
        referenced: String,
        suggestion: Suggestion,
    },

    // parameter sets:
    #[error("\"{owner}\" declares parameter set \"{id}\" more than once")]
    DuplicateParameterSet { owner: String, id: String },
    #[error("Parameter set \"{set}\" of \"{owner}\" sets unknown argument \"{argument}\"{suggestion}")]
    UnknownParameterSetArgument {
        owner: String,
        set: String,
        argument: String,
        suggestion: Suggestion,
    },
    #[error(
        "Parameter set \"{set}\" of \"{owner}\" has an entry that must name exactly one of \
         \"argument\" or \"node\""
    )]
    InvalidParameterSetData { owner: String, set: String },
    #[error("Parameter set \"{set}\" of tool \"{owner}\" may not set graph nodes directly")]
    ToolParameterSetNode { owner: String, set: String },

    // pipelines:
    #[error("Pipeline \"{pipeline}\" task \"{task}\" must name exactly one of \"tool\" or \"pipeline\"")]
    TaskTarget { pipeline: String, task: String },
    #[error("Pipeline \"{pipeline}\": id \"{id}\" in section \"{section}\" is already used by a task or node")]
    DuplicateId {
        pipeline: String,
        section: &'static str,
        id: String,
    },
    #[error("Pipeline \"{pipeline}\": section \"{section}\" references undeclared task \"{task}\"{suggestion}")]
    UndeclaredTask {
        pipeline: String,
        section: &'static str,
        task: String,
        suggestion: Suggestion,
    },
    #[error("Pipeline \"{pipeline}\": section \"{section}\" references undeclared node \"{id}\"{suggestion}")]
    UndeclaredNode {
        pipeline: String,
        section: &'static str,
        id: String,
        suggestion: Suggestion,
    },
    #[error(
        "Pipeline \"{pipeline}\" shared node \"{node}\": every entry must name exactly one of \
         \"task argument\" or \"node id\""
    )]
    SharedMember { pipeline: String, node: String },
    #[error("Pipeline \"{pipeline}\" declares argument \"{argument}\" more than once")]
    DuplicatePipelineArgument { pipeline: String, argument: String },
    #[error("Pipeline \"{pipeline}\" connection from \"{from}\" to \"{to}\" needs an \"argument\" unless it is \"link only\"")]
    ConnectionArgument {
        pipeline: String,
        from: String,
        to: String,
    },
}

impl Categorize for Error {
    fn category(&self) -> ErrorCategory {
        use Error::*;
        match self {
            ToolJson(..)
            | DuplicateToolArgument { .. }
            | StubWithoutExtensions { .. }
            | StubOption { .. }
            | UnknownArgumentInOrder { .. } => ErrorCategory::ToolConfig,
            InvalidRecipe { .. } | UnknownRecipeArgument { .. } => {
                ErrorCategory::FilenameConstruction
            }
            DuplicateParameterSet { .. }
            | UnknownParameterSetArgument { .. }
            | InvalidParameterSetData { .. }
            | ToolParameterSetNode { .. } => ErrorCategory::ParameterSet,
            IdMismatch { kind, .. } if *kind == "Tool" => ErrorCategory::ToolConfig,
            IdMismatch { .. }
            | MissingConfigDir(..)
            | PipelineJson(..)
            | TaskTarget { .. }
            | DuplicateId { .. }
            | UndeclaredTask { .. }
            | UndeclaredNode { .. }
            | SharedMember { .. }
            | DuplicatePipelineArgument { .. }
            | ConnectionArgument { .. } => ErrorCategory::PipelineConfig,
        }
    }
}
