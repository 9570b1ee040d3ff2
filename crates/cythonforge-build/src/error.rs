use std::path::PathBuf;
use thiserror::Error;

use cythonforge_core::ValidationError;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to create build sink: {0}")]
    Create(String),

    #[error("Failed to submit command to sink {handle}: {reason}")]
    Submit { handle: u64, reason: String },

    #[error("Unknown sink handle: {0}")]
    UnknownHandle(u64),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No Python interpreter found in environment: {}", .0.display())]
    InterpreterNotFound(PathBuf),

    #[error("Build could not be started: {0}")]
    Execution(#[from] SinkError),
}

impl BuildError {
    /// True when the request was rejected before any sink was touched.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InterpreterNotFound(_))
    }
}
