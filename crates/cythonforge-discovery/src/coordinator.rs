//! Fan-out / fan-in over all probes.

use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use cythonforge_core::config::DiscoveryConfig;
use cythonforge_core::observability::Notifier;
use cythonforge_core::{EnvironmentCandidate, PathValidator};

use crate::probe::{EnvironmentProbe, FilesystemSearchProbe, PackageManagerProbe, ProbeResult};
use crate::runner::ProcessRunner;

/// Runs the package-manager probe and every filesystem probe concurrently, then
/// merges their results in a fixed order: package manager first, then the
/// filesystem probes in the order their roots were configured.
pub struct DiscoveryCoordinator {
    package_manager: Arc<dyn EnvironmentProbe>,
    filesystem: Vec<Arc<dyn EnvironmentProbe>>,
    notifier: Arc<dyn Notifier>,
}

impl DiscoveryCoordinator {
    pub fn new(
        package_manager: Arc<dyn EnvironmentProbe>,
        filesystem: Vec<Arc<dyn EnvironmentProbe>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            package_manager,
            filesystem,
            notifier,
        }
    }

    /// Wire the standard probes from config: `conda env list` plus one `find`
    /// per search root.
    pub fn from_config(
        cfg: &DiscoveryConfig,
        runner: Arc<dyn ProcessRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let validator = PathValidator::new(cfg.path_style);
        let package_manager: Arc<dyn EnvironmentProbe> = Arc::new(PackageManagerProbe::new(
            cfg.conda_executable.clone(),
            Arc::clone(&runner),
            Arc::clone(&notifier),
            validator,
            cfg.conda_timeout,
        ));
        let filesystem = cfg
            .search_roots()
            .into_iter()
            .map(|root| {
                Arc::new(FilesystemSearchProbe::new(
                    root,
                    cfg.find_program.clone(),
                    Arc::clone(&runner),
                    Arc::clone(&notifier),
                    validator,
                    cfg.search_timeout,
                )) as Arc<dyn EnvironmentProbe>
            })
            .collect();
        Self::new(package_manager, filesystem, notifier)
    }

    pub fn probe_names(&self) -> Vec<String> {
        std::iter::once(&self.package_manager)
            .chain(self.filesystem.iter())
            .map(|p| p.name())
            .collect()
    }

    /// Discover environments. An empty list is a valid answer and means the host
    /// should fall back to manual selection.
    pub async fn discover(&self) -> Vec<EnvironmentCandidate> {
        let probes: Vec<Arc<dyn EnvironmentProbe>> = std::iter::once(&self.package_manager)
            .chain(self.filesystem.iter())
            .cloned()
            .collect();

        let handles: Vec<_> = probes
            .iter()
            .map(|probe| {
                let probe = Arc::clone(probe);
                tokio::spawn(async move { probe.probe().await })
            })
            .collect();

        // Awaiting in spawn order fixes the merge order regardless of which probe
        // finishes first.
        let mut results = Vec::with_capacity(handles.len());
        for (probe, handle) in probes.iter().zip(handles) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    self.notifier.warn(
                        "Environment probe aborted",
                        Some(&json!({ "probe": probe.name(), "error": e.to_string() })),
                    );
                    ProbeResult::failed()
                }
            };
            if !result.succeeded {
                tracing::debug!(probe = %probe.name(), "Probe failed");
            }
            results.push(result);
        }

        let merged = merge(results);
        self.notifier.info(
            &format!("Discovered {} environments", merged.len()),
            None,
        );
        merged
    }
}

/// Concatenate in order, keeping the first occurrence of each path.
fn merge(results: Vec<ProbeResult>) -> Vec<EnvironmentCandidate> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .flat_map(|r| r.candidates)
        .filter(|c| seen.insert(c.path().to_path_buf()))
        .collect()
}
