use thiserror::Error;

use crate::domain::request::{RequestId, SubmissionError};
use crate::workflow::WorkflowError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("request `{0}` was not found")]
    NotFound(RequestId),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Caller-caused errors are reported verbatim; infrastructure failures
    /// surface as a generic message so internals never leak.
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain(error) => error.to_string(),
            Self::NotFound(id) => format!("request `{}` was not found", id.0),
            Self::Persistence(_) | Self::Configuration(_) => {
                "An unexpected internal error occurred.".to_string()
            }
        }
    }
}
