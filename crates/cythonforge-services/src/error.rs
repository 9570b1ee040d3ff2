use thiserror::Error;

use cythonforge_build::BuildError;
use cythonforge_core::ValidationError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
