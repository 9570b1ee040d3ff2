//! Validation errors shared by discovery, manual selection and the build path.

use std::path::PathBuf;
use thiserror::Error;

/// A path failed validation. Always raised before any process is spawned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Path is not safe (empty or contains a traversal sequence): '{0}'")]
    UnsafePath(String),

    #[error("Project folder does not exist: {}", .0.display())]
    MissingFolder(PathBuf),

    #[error("Selected folder does not contain setup.py: {}", .0.display())]
    MissingBuildDescriptor(PathBuf),

    #[error("Environment path does not exist: {}", .0.display())]
    MissingEnvironment(PathBuf),

    #[error("Not a valid Python environment (needs an interpreter and pyvenv.cfg or conda-meta): {}", .0.display())]
    InvalidEnvironment(PathBuf),
}
