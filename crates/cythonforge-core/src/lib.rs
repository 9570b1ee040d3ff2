pub mod config;
pub mod environment;
pub mod error;
pub mod observability;
pub mod path_validation;

pub use environment::{EnvironmentCandidate, SourceKind};
pub use error::ValidationError;
pub use path_validation::{PathStyle, PathValidator};
