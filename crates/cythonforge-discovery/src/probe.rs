//! Discovery probes.
//!
//! A probe never returns an error: unavailable tools, non-zero exits, timeouts and
//! unparseable output all become `ProbeResult { succeeded: false, .. }` plus a
//! warning through the notifier.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cythonforge_core::observability::Notifier;
use cythonforge_core::path_validation::{is_safe, is_safe_path, make_absolute, VENV_CONFIG_MARKER};
use cythonforge_core::{EnvironmentCandidate, PathValidator, SourceKind};

use crate::runner::{ProcessOutput, ProcessRunner};

/// Maximum directory depth for the filesystem search.
pub const SEARCH_MAX_DEPTH: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub candidates: Vec<EnvironmentCandidate>,
    pub succeeded: bool,
}

impl ProbeResult {
    pub fn found(candidates: Vec<EnvironmentCandidate>) -> Self {
        Self {
            candidates,
            succeeded: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            candidates: Vec::new(),
            succeeded: false,
        }
    }

    /// Nothing to search (e.g. the root does not exist). Not a failure.
    pub fn skipped() -> Self {
        Self::found(Vec::new())
    }
}

/// One discovery strategy querying one source.
#[async_trait]
pub trait EnvironmentProbe: Send + Sync {
    /// Short name for logs and diagnostics.
    fn name(&self) -> String;

    async fn probe(&self) -> ProbeResult;
}

/// Shared plumbing for running the probe's process and handling exit status.
struct ProbeContext {
    runner: Arc<dyn ProcessRunner>,
    notifier: Arc<dyn Notifier>,
    validator: PathValidator,
    timeout: Duration,
}

impl ProbeContext {
    /// Run the process; `None` means the probe failed and a warning was emitted.
    async fn run(&self, label: &str, program: &str, args: &[String]) -> Option<ProcessOutput> {
        let output = match self.runner.run(program, args, self.timeout).await {
            Ok(output) => output,
            Err(e) => {
                self.notifier.warn(
                    &format!("{} unavailable", label),
                    Some(&json!({ "program": program, "error": e.to_string() })),
                );
                return None;
            }
        };
        if !output.success() {
            self.notifier.warn(
                &format!("{} command failed", label),
                Some(&json!({
                    "program": program,
                    "code": output.exit_code,
                    "stderr": output.stderr.trim(),
                })),
            );
            return None;
        }
        Some(output)
    }

    /// Keep paths that are safe and structurally valid, in input order.
    fn candidates<I>(&self, paths: I, source: SourceKind) -> Vec<EnvironmentCandidate>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        paths
            .into_iter()
            .filter(|p| is_safe(p))
            .filter_map(|p| EnvironmentCandidate::validate(p, source, &self.validator).ok())
            .collect()
    }
}

/// `conda env list --json` output. Entries are kept as raw values so a single
/// non-string entry does not invalidate the whole listing.
#[derive(Debug, Deserialize)]
struct CondaEnvList {
    envs: Vec<serde_json::Value>,
}

/// Lists environments known to the package manager.
pub struct PackageManagerProbe {
    ctx: ProbeContext,
    executable: String,
}

impl PackageManagerProbe {
    pub fn new(
        executable: impl Into<String>,
        runner: Arc<dyn ProcessRunner>,
        notifier: Arc<dyn Notifier>,
        validator: PathValidator,
        timeout: Duration,
    ) -> Self {
        Self {
            ctx: ProbeContext {
                runner,
                notifier,
                validator,
                timeout,
            },
            executable: executable.into(),
        }
    }

    fn parse(&self, stdout: &str) -> Result<Vec<PathBuf>, serde_json::Error> {
        let listing: CondaEnvList = serde_json::from_str(stdout)?;
        Ok(listing
            .envs
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .filter(|p| is_safe_path(p))
            .map(PathBuf::from)
            .collect())
    }
}

#[async_trait]
impl EnvironmentProbe for PackageManagerProbe {
    fn name(&self) -> String {
        format!("{} env list", self.executable)
    }

    async fn probe(&self) -> ProbeResult {
        let args: Vec<String> = ["env", "list", "--json"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let Some(output) = self.ctx.run("Conda", &self.executable, &args).await else {
            return ProbeResult::failed();
        };

        let paths = match self.parse(&output.stdout) {
            Ok(paths) => paths,
            Err(e) => {
                self.ctx
                    .notifier
                    .warn("Invalid conda environment data", Some(&json!({ "error": e.to_string() })));
                return ProbeResult::failed();
            }
        };

        let candidates = self.ctx.candidates(paths, SourceKind::PackageManager);
        self.ctx.notifier.info(
            &format!("Found {} conda environments", candidates.len()),
            None,
        );
        ProbeResult::found(candidates)
    }
}

/// Searches one directory tree (bounded depth) for `pyvenv.cfg`.
pub struct FilesystemSearchProbe {
    ctx: ProbeContext,
    root: PathBuf,
    find_program: String,
}

impl FilesystemSearchProbe {
    pub fn new(
        root: impl Into<PathBuf>,
        find_program: impl Into<String>,
        runner: Arc<dyn ProcessRunner>,
        notifier: Arc<dyn Notifier>,
        validator: PathValidator,
        timeout: Duration,
    ) -> Self {
        let root: PathBuf = root.into();
        Self {
            ctx: ProbeContext {
                runner,
                notifier,
                validator,
                timeout,
            },
            root: make_absolute(&root),
            find_program: find_program.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn search_args(&self) -> Vec<String> {
        vec![
            self.root.to_string_lossy().to_string(),
            "-maxdepth".to_string(),
            SEARCH_MAX_DEPTH.to_string(),
            "-name".to_string(),
            VENV_CONFIG_MARKER.to_string(),
            "-type".to_string(),
            "f".to_string(),
        ]
    }
}

/// Parent directories of the marker files listed one per line. Lines are not
/// trimmed: directory names may start or end with spaces.
fn marker_parents(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty() && is_safe_path(line))
        .filter_map(|line| Path::new(line).parent().map(Path::to_path_buf))
        .collect()
}

#[async_trait]
impl EnvironmentProbe for FilesystemSearchProbe {
    fn name(&self) -> String {
        format!("search {}", self.root.display())
    }

    async fn probe(&self) -> ProbeResult {
        if !is_safe(&self.root) || !self.root.exists() {
            tracing::debug!(root = %self.root.display(), "Skipping search root");
            return ProbeResult::skipped();
        }

        let label = format!("Find for {}", self.root.display());
        let Some(output) = self
            .ctx
            .run(&label, &self.find_program, &self.search_args())
            .await
        else {
            return ProbeResult::failed();
        };

        let candidates = self
            .ctx
            .candidates(marker_parents(&output.stdout), SourceKind::DiscoveredVirtualEnv);
        tracing::debug!(
            root = %self.root.display(),
            count = candidates.len(),
            "Filesystem search finished"
        );
        ProbeResult::found(candidates)
    }
}
