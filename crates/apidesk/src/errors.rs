use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single tool invocation. These travel back to the model as
/// tool results so it can recover, they never abort a reply.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Errors raised by the embedding model and the vector store.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        RetrievalError::Upstream(err.to_string())
    }
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid catalog document: {0}")]
    Invalid(String),
}
