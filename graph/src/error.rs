use util::{Categorize, ErrorCategory, Suggestion};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // graph structure:
    #[error("Graph node address \"{0}\" is used twice")]
    DuplicateAddress(String),
    #[error("Cannot merge {first_kind} node \"{first}\" with {second_kind} node \"{second}\"")]
    MergeConflict {
        first: String,
        first_kind: &'static str,
        second: String,
        second_kind: &'static str,
    },
    #[error("Node \"{0}\" is not connected to any tool argument")]
    UnresolvedNode(String),

    // references into tools and nested pipelines:
    #[error(
        "Pipeline \"{pipeline}\": section \"{section}\" uses unknown argument \"{argument}\" \
         of task \"{task}\"{suggestion}"
    )]
    UnknownTaskArgument {
        pipeline: String,
        section: &'static str,
        task: String,
        argument: String,
        suggestion: Suggestion,
    },
    #[error(
        "Pipeline \"{pipeline}\": section \"{section}\" uses unknown node \"{node}\" \
         inside nested pipeline task \"{task}\"{suggestion}"
    )]
    UnknownNestedNode {
        pipeline: String,
        section: &'static str,
        task: String,
        node: String,
        suggestion: Suggestion,
    },
    #[error("Pipeline \"{pipeline}\": \"evaluate commands\" node \"{node}\" must be an option, not a file")]
    EvaluatedFile { pipeline: String, node: String },

    // values from parameter sets and the command line:
    #[error("Pipeline \"{pipeline}\" has no argument \"{argument}\"{suggestion}")]
    UnknownArgument {
        pipeline: String,
        argument: String,
        suggestion: Suggestion,
    },
    #[error("Task \"{task}\" has no argument \"{argument}\"{suggestion}")]
    UnknownToolArgument {
        task: String,
        argument: String,
        suggestion: Suggestion,
    },
    #[error("No task \"{task}\" in this pipeline{suggestion}")]
    UnknownTaskAddress { task: String, suggestion: Suggestion },
    #[error("\"{owner}\" has no parameter set \"{set}\"{suggestion}")]
    UnknownParameterSet {
        owner: String,
        set: String,
        suggestion: Suggestion,
    },
    #[error("List file \"{0}\" contains no values")]
    EmptyListFile(String),
    #[error("Argument \"{argument}\" of task \"{task}\" ({description}) is required but has no value. {hint}")]
    MissingRequired {
        task: String,
        argument: String,
        description: String,
        hint: String,
    },
    #[error("Node \"{node}\" for required argument \"{argument}\" of task \"{task}\" was never given a value")]
    Unset {
        node: String,
        task: String,
        argument: String,
    },

    // consistency between declarations and values:
    #[error("File node \"{node}\" is written by more than one task: {tasks}")]
    MultipleProducers { node: String, tasks: String },
    #[error(
        "Value \"{value}\" of node \"{node}\" doesn't have an extension allowed by argument \
         \"{argument}\" of task \"{task}\" (allowed: {allowed})"
    )]
    ExtensionMismatch {
        node: String,
        value: String,
        task: String,
        argument: String,
        allowed: String,
    },
    #[error(
        "Value \"{value}\" of node \"{node}\" is not a valid {data_type} for argument \
         \"{argument}\" of task \"{task}\""
    )]
    InvalidValue {
        node: String,
        value: String,
        task: String,
        argument: String,
        data_type: config::DataType,
    },
    #[error("Node \"{node}\" is used as {first} and as {second}")]
    ConflictingDataTypes {
        node: String,
        first: String,
        second: String,
    },
    #[error(
        "Task \"{task}\" can't be run: {kind} \"{first}\" has {first_count} values \
         but \"{second}\" has {second_count}"
    )]
    MultiplicityMismatch {
        task: String,
        kind: &'static str,
        first: String,
        first_count: usize,
        second: String,
        second_count: usize,
    },
    #[error(
        "Task \"{task}\" runs {runs} times but output argument \"{argument}\" has {outputs} \
         values; each run must write its own files"
    )]
    OutputCount {
        task: String,
        argument: String,
        outputs: usize,
        runs: usize,
    },

    // ordering:
    #[error("Task \"{task}\" outputs to a stream, so it needs exactly one consumer (found {count})")]
    StreamConsumers { task: String, count: usize },
    #[error(
        "Task \"{producer}\" streams into \"{consumer}\", but \"{consumer}\" also depends on \
         tasks that can't run before it"
    )]
    StreamBlocked { producer: String, consumer: String },
    #[error("Tasks depend on each other in a cycle: {0}")]
    Cycle(String),

    // filename construction:
    #[error(
        "Can't construct a filename for argument \"{argument}\" of task \"{task}\": \
         argument \"{from}\" has no value"
    )]
    ConstructionSourceUnset {
        task: String,
        argument: String,
        from: String,
    },
    #[error(
        "Can't construct filenames for argument \"{argument}\" of task \"{task}\": \
         {values} source values for {runs} runs"
    )]
    ConstructionCount {
        task: String,
        argument: String,
        values: usize,
        runs: usize,
    },
    #[error("Can't construct a filename for argument \"{argument}\" of task \"{task}\": no extension is known")]
    NoExtension { task: String, argument: String },
    #[error(
        "Constructing filenames for argument \"{argument}\" of task \"{task}\" gives \"{filename}\" \
         for more than one run"
    )]
    IdenticalFilenames {
        task: String,
        argument: String,
        filename: String,
    },
}

impl Categorize for Error {
    fn category(&self) -> ErrorCategory {
        use Error::*;
        match self {
            DuplicateAddress(..)
            | UnresolvedNode(..)
            | StreamConsumers { .. }
            | StreamBlocked { .. }
            | Cycle(..) => ErrorCategory::GraphConstruction,
            UnknownTaskArgument { .. } | UnknownNestedNode { .. } | EvaluatedFile { .. } => {
                ErrorCategory::PipelineConfig
            }
            UnknownArgument { .. }
            | UnknownToolArgument { .. }
            | UnknownTaskAddress { .. }
            | EmptyListFile(..)
            | MissingRequired { .. }
            | Unset { .. } => ErrorCategory::Argument,
            UnknownParameterSet { .. } => ErrorCategory::ParameterSet,
            MergeConflict { .. }
            | MultipleProducers { .. }
            | ExtensionMismatch { .. }
            | InvalidValue { .. }
            | ConflictingDataTypes { .. }
            | MultiplicityMismatch { .. }
            | OutputCount { .. } => ErrorCategory::DataConsistency,
            ConstructionSourceUnset { .. }
            | ConstructionCount { .. }
            | NoExtension { .. }
            | IdenticalFilenames { .. } => ErrorCategory::FilenameConstruction,
        }
    }
}
