//! Observability: tracing init, the notifier handed to components, audit log.
//!
//! Uses config::ObservabilityConfig for CYTHONFORGE_QUIET, LOG_LEVEL, LOG_JSON and
//! AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Initialize tracing. Call once at process startup.
/// With CYTHONFORGE_QUIET=1 only WARN and above are logged.
pub fn init_tracing(cfg: &ObservabilityConfig) {
    let level = if cfg.quiet {
        "cythonforge=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}

/// Structured reporting sink for core components. Fire-and-forget: nothing a
/// notifier does may change control flow.
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str, data: Option<&Value>);
    fn warn(&self, message: &str, data: Option<&Value>);
    fn error(&self, message: &str, err: Option<&(dyn std::error::Error + 'static)>);
}

/// Forwards notifications to `tracing` events under the `cythonforge` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn info(&self, message: &str, data: Option<&Value>) {
        match data {
            Some(data) => tracing::info!(target: "cythonforge", data = %data, "{}", message),
            None => tracing::info!(target: "cythonforge", "{}", message),
        }
    }

    fn warn(&self, message: &str, data: Option<&Value>) {
        match data {
            Some(data) => tracing::warn!(target: "cythonforge", data = %data, "{}", message),
            None => tracing::warn!(target: "cythonforge", "{}", message),
        }
    }

    fn error(&self, message: &str, err: Option<&(dyn std::error::Error + 'static)>) {
        match err {
            Some(err) => tracing::error!(target: "cythonforge", error = %err, "{}", message),
            None => tracing::error!(target: "cythonforge", "{}", message),
        }
    }
}

/// Append-only JSONL record of submitted builds. Disabled when no path is set.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn from_config(cfg: &ObservabilityConfig) -> Self {
        match cfg.audit_log.as_deref() {
            Some(p) if !p.is_empty() => Self::to_file(p),
            _ => Self::disabled(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Audit: build_submitted
    pub fn build_submitted(&self, project_dir: &Path, environment: &Path, command_line: &str) {
        self.append(&json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "build_submitted",
            "project_dir": project_dir.to_string_lossy(),
            "environment": environment.to_string_lossy(),
            "command_line": command_line,
        }));
    }

    /// Audit: build_rejected
    pub fn build_rejected(&self, project_dir: &Path, environment: &Path, reason: &str) {
        self.append(&json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "build_rejected",
            "project_dir": project_dir.to_string_lossy(),
            "environment": environment.to_string_lossy(),
            "reason": reason,
        }));
    }

    fn append(&self, record: &Value) {
        let Some(ref path) = self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
            if let Ok(line) = serde_json::to_string(record) {
                let _ = writeln!(f, "{}", line);
            }
        }
    }
}
