use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraderError {
    #[error("LLM provider failed: {0}")]
    LlmProvider(String),
    #[error("Parsing failed on output '{output}': {reason}")]
    ParseFailed { output: String, reason: String },
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Join precondition violated: {0}")]
    JoinPrecondition(String),
}

impl GraderError {
    pub fn parse_failed(output: impl Into<String>, reason: impl Into<String>) -> Self {
        GraderError::ParseFailed {
            output: output.into(),
            reason: reason.into(),
        }
    }
}
