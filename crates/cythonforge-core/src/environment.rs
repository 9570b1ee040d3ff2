//! Environment candidates: validated, immutable records handed to hosts.

use crate::error::ValidationError;
use crate::path_validation::{is_safe, make_absolute, PathValidator};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Listed by the package manager (`conda env list`).
    PackageManager,
    /// Found by searching the filesystem for `pyvenv.cfg`.
    DiscoveredVirtualEnv,
    /// Picked by hand in the host.
    ManualSelection,
}

impl SourceKind {
    /// Icon prefix in the host editor's label syntax.
    pub fn icon(self) -> &'static str {
        match self {
            Self::PackageManager => "$(zap)",
            Self::DiscoveredVirtualEnv => "$(rocket)",
            Self::ManualSelection => "$(folder)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::PackageManager => "Conda",
            Self::DiscoveredVirtualEnv => "Virtual Environment",
            Self::ManualSelection => "Manual Selection",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A structurally valid environment. Only [`EnvironmentCandidate::validate`] can
/// build one, so holding a candidate means validation passed at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentCandidate {
    label: String,
    description: &'static str,
    name: String,
    path: PathBuf,
    source: SourceKind,
}

impl EnvironmentCandidate {
    pub fn validate(
        path: impl Into<PathBuf>,
        source: SourceKind,
        validator: &PathValidator,
    ) -> Result<Self, ValidationError> {
        let path = path.into();
        if !is_safe(&path) {
            return Err(ValidationError::UnsafePath(
                path.to_string_lossy().to_string(),
            ));
        }
        let path = make_absolute(&path);
        if !path.exists() {
            return Err(ValidationError::MissingEnvironment(path));
        }
        if !validator.is_valid_environment(&path) {
            return Err(ValidationError::InvalidEnvironment(path));
        }
        let name = validator.basename(&path.to_string_lossy());
        Ok(Self {
            label: format!("{} {}", source.icon(), name),
            description: source.description(),
            name,
            path,
            source,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        self.description
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }
}
