/// Broad class of a fatal error, used by the binary to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    CommandLine,
    ToolConfig,
    PipelineConfig,
    GraphConstruction,
    Argument,
    DataConsistency,
    Makefile,
    ParameterSet,
    FilenameConstruction,
}

impl ErrorCategory {
    #[rustfmt::skip]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::CommandLine          => 3,
            Self::ToolConfig           => 6,
            Self::PipelineConfig       => 7,
            Self::GraphConstruction    => 8,
            Self::Argument             => 9,
            Self::DataConsistency      => 10,
            Self::Makefile             => 13,
            Self::ParameterSet         => 14,
            Self::FilenameConstruction => 15,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CommandLine => "command line error",
            Self::ToolConfig => "tool configuration error",
            Self::PipelineConfig => "pipeline configuration error",
            Self::GraphConstruction => "graph construction error",
            Self::Argument => "argument error",
            Self::DataConsistency => "data consistency error",
            Self::Makefile => "makefile generation error",
            Self::ParameterSet => "parameter set error",
            Self::FilenameConstruction => "filename construction error",
        }
    }
}

/// Implemented by every error enum in the workspace so the top-level handler
/// can classify failures without knowing their concrete types.
pub trait Categorize {
    fn category(&self) -> ErrorCategory;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        use ErrorCategory::*;
        let all = [
            CommandLine,
            ToolConfig,
            PipelineConfig,
            GraphConstruction,
            Argument,
            DataConsistency,
            Makefile,
            ParameterSet,
            FilenameConstruction,
        ];
        let mut codes: Vec<i32> = all.iter().map(|c| c.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert_eq!(Argument.exit_code(), 9);
    }
}
