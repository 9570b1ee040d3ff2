//! Subcommand handlers. Each builds a ForgeService for the sink it needs.

pub mod build;
pub mod check;
pub mod discover;

use std::sync::Arc;

use cythonforge_build::CommandSink;
use cythonforge_core::config::{DiscoveryConfig, EnvConfigSource, ObservabilityConfig};
use cythonforge_core::observability::{AuditLog, TracingNotifier};
use cythonforge_discovery::TokioProcessRunner;
use cythonforge_services::ForgeService;

pub(crate) fn forge_service(discovery: &DiscoveryConfig, sink: Arc<dyn CommandSink>) -> ForgeService {
    ForgeService::new(
        discovery,
        Arc::new(TokioProcessRunner::new(discovery.max_output_bytes)),
        sink,
        Arc::new(EnvConfigSource),
        Arc::new(TracingNotifier),
        AuditLog::from_config(&ObservabilityConfig::from_env()),
    )
}
