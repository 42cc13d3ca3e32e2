use util::{Categorize, ErrorCategory, Suggestion};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No tool or pipeline named \"{0}\"{1}")]
    UnknownTarget(String, Suggestion),
    #[error("Unknown tool \"{0}\"{1}")]
    UnknownTool(String, Suggestion),
    #[error("Unknown pipeline \"{0}\"{1}")]
    UnknownPipeline(String, Suggestion),
    #[error("Pipeline \"{0}\" is nested inside itself: {1}")]
    NestingCycle(String, String),
}

impl Categorize for Error {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownTarget(..) => ErrorCategory::CommandLine,
            Self::UnknownTool(..) | Self::UnknownPipeline(..) | Self::NestingCycle(..) => {
                ErrorCategory::PipelineConfig
            }
        }
    }
}
