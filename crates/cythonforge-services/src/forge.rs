//! ForgeService: composition root for discovery and builds.

use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cythonforge_build::{BuildExecutor, BuildSubmission, CommandSink};
use cythonforge_core::config::{ConfigSource, DiscoveryConfig};
use cythonforge_core::observability::{AuditLog, Notifier};
use cythonforge_core::path_validation::{is_safe, make_absolute};
use cythonforge_core::{EnvironmentCandidate, PathValidator, SourceKind, ValidationError};
use cythonforge_discovery::{DiscoveryCoordinator, ProcessRunner};

use crate::error::Result;

/// Outcome of checking a folder picked as the build target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderCheck {
    pub path: PathBuf,
    /// A missing `setup.py` is reported, not rejected; the host decides.
    pub has_build_descriptor: bool,
}

pub struct ForgeService {
    coordinator: DiscoveryCoordinator,
    executor: BuildExecutor,
    config: Arc<dyn ConfigSource>,
    notifier: Arc<dyn Notifier>,
    audit: AuditLog,
    validator: PathValidator,
}

impl ForgeService {
    pub fn new(
        discovery: &DiscoveryConfig,
        runner: Arc<dyn ProcessRunner>,
        sink: Arc<dyn CommandSink>,
        config: Arc<dyn ConfigSource>,
        notifier: Arc<dyn Notifier>,
        audit: AuditLog,
    ) -> Self {
        let validator = PathValidator::new(discovery.path_style);
        Self {
            coordinator: DiscoveryCoordinator::from_config(
                discovery,
                runner,
                Arc::clone(&notifier),
            ),
            executor: BuildExecutor::new(sink, validator, Arc::clone(&notifier)),
            config,
            notifier,
            audit,
            validator,
        }
    }

    pub fn validator(&self) -> &PathValidator {
        &self.validator
    }

    pub fn coordinator(&self) -> &DiscoveryCoordinator {
        &self.coordinator
    }

    /// Run every probe and return the merged candidates. Empty means the host
    /// should offer manual selection.
    pub async fn discover_environments(&self) -> Vec<EnvironmentCandidate> {
        let found = self.coordinator.discover().await;
        if found.is_empty() {
            self.notifier.warn(
                "No Python environments found. Please select one manually.",
                None,
            );
        }
        found
    }

    /// Validate a hand-picked environment root.
    pub fn select_environment(&self, path: impl AsRef<Path>) -> Result<EnvironmentCandidate> {
        let path = path.as_ref();
        match EnvironmentCandidate::validate(path, SourceKind::ManualSelection, &self.validator) {
            Ok(candidate) => {
                self.notifier.info(
                    "Environment selected",
                    Some(&json!({ "path": path.to_string_lossy() })),
                );
                Ok(candidate)
            }
            Err(e) => {
                self.notifier.warn(
                    "Invalid environment selection",
                    Some(&json!({ "path": path.to_string_lossy(), "error": e.to_string() })),
                );
                Err(e.into())
            }
        }
    }

    /// Check a folder picked as the build target. Unsafe or missing folders are
    /// errors; a missing `setup.py` only produces a warning.
    pub fn check_project_folder(&self, path: impl AsRef<Path>) -> Result<FolderCheck> {
        let path = path.as_ref();
        if !is_safe(path) {
            return Err(ValidationError::UnsafePath(path.to_string_lossy().to_string()).into());
        }
        let path = make_absolute(path);
        let path = path.as_path();
        if !path.is_dir() {
            return Err(ValidationError::MissingFolder(path.to_path_buf()).into());
        }
        let has_build_descriptor = self.validator.has_build_descriptor(path);
        if !has_build_descriptor {
            self.notifier.warn(
                "The selected folder does not contain setup.py. This may cause build issues.",
                Some(&json!({ "path": path.to_string_lossy() })),
            );
        }
        Ok(FolderCheck {
            path: path.to_path_buf(),
            has_build_descriptor,
        })
    }

    /// Build with the configured arguments, read fresh for this request.
    pub fn execute_build(
        &self,
        project_dir: impl AsRef<Path>,
        environment: impl AsRef<Path>,
    ) -> Result<BuildSubmission> {
        let build_args = self.config.default_build_args();
        self.execute_build_with_args(project_dir, environment, &build_args)
    }

    /// Build with explicit arguments. They are not escaped.
    pub fn execute_build_with_args(
        &self,
        project_dir: impl AsRef<Path>,
        environment: impl AsRef<Path>,
        build_args: &str,
    ) -> Result<BuildSubmission> {
        let project_dir = make_absolute(project_dir.as_ref());
        let environment = make_absolute(environment.as_ref());
        let (project_dir, environment) = (project_dir.as_path(), environment.as_path());
        match self.executor.execute(project_dir, environment, build_args) {
            Ok(submission) => {
                self.audit
                    .build_submitted(project_dir, environment, &submission.command_line);
                Ok(submission)
            }
            Err(e) => {
                self.audit
                    .build_rejected(project_dir, environment, &e.to_string());
                Err(e.into())
            }
        }
    }

    /// Release the build sink. Hosts call this on shutdown; dropping the service
    /// has the same effect.
    pub fn dispose(&self) {
        self.executor.dispose();
    }
}
