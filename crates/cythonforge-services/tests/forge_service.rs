//! End-to-end tests for ForgeService with scripted processes and a recording sink.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cythonforge_build::{CommandSink, SinkError, SinkHandle};
use cythonforge_core::config::{BuildConfig, ConfigSource, DiscoveryConfig};
use cythonforge_core::observability::{AuditLog, TracingNotifier};
use cythonforge_core::{PathStyle, SourceKind, ValidationError};
use cythonforge_discovery::{ProcessOutput, ProcessRunner, RunError};
use cythonforge_services::{ForgeService, ServiceError};

/// Answers by program name, and for `find` by the searched root (first argument).
#[derive(Default)]
struct ScriptedRunner {
    conda: Option<String>,
    find: HashMap<String, String>,
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        let stdout = match program {
            "conda" => self.conda.clone(),
            "find" => args.first().and_then(|root| self.find.get(root).cloned()),
            _ => None,
        };
        match stdout {
            Some(stdout) => Ok(ProcessOutput {
                exit_code: Some(0),
                stdout,
                stderr: String::new(),
            }),
            None => Err(RunError::TimedOut {
                program: program.to_string(),
                timeout,
            }),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    submitted: Mutex<Vec<String>>,
    disposed: Mutex<Vec<u64>>,
    next: Mutex<u64>,
}

impl CommandSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn create(&self) -> Result<SinkHandle, SinkError> {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        Ok(SinkHandle::new(*next))
    }

    fn submit(&self, _handle: &SinkHandle, command_line: &str) -> Result<(), SinkError> {
        self.submitted.lock().unwrap().push(command_line.to_string());
        Ok(())
    }

    fn dispose(&self, handle: SinkHandle) {
        self.disposed.lock().unwrap().push(handle.id());
    }
}

struct FixedArgs(&'static str);

impl ConfigSource for FixedArgs {
    fn default_build_args(&self) -> String {
        self.0.to_string()
    }
}

fn venv(root: &Path) -> PathBuf {
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::write(root.join("bin").join("python3"), "").unwrap();
    fs::write(root.join("pyvenv.cfg"), "").unwrap();
    root.to_path_buf()
}

fn conda_env(root: &Path) -> PathBuf {
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::write(root.join("bin").join("python"), "").unwrap();
    fs::create_dir_all(root.join("conda-meta")).unwrap();
    root.to_path_buf()
}

fn discovery_config(workspace: &Path, extra: Vec<PathBuf>) -> DiscoveryConfig {
    DiscoveryConfig {
        workspace: Some(workspace.to_path_buf()),
        home_dir: None,
        extra_search_roots: extra,
        conda_executable: "conda".to_string(),
        find_program: "find".to_string(),
        path_style: PathStyle::Posix,
        ..DiscoveryConfig::default()
    }
}

fn service(
    cfg: &DiscoveryConfig,
    runner: ScriptedRunner,
    sink: Arc<RecordingSink>,
    config: Arc<dyn ConfigSource>,
    audit: AuditLog,
) -> ForgeService {
    ForgeService::new(
        cfg,
        Arc::new(runner),
        sink,
        config,
        Arc::new(TracingNotifier),
        audit,
    )
}

#[tokio::test]
async fn discovery_merges_conda_then_roots_and_dedupes() {
    let tmp = tempfile::tempdir().unwrap();
    let workspace = tmp.path().join("ws");
    let extra = tmp.path().join("extra");
    let base = conda_env(&tmp.path().join("miniconda"));
    let ws_env = venv(&workspace.join(".venv"));
    let extra_env = venv(&extra.join("tools"));
    fs::create_dir_all(&extra).unwrap();

    let mut find = HashMap::new();
    find.insert(
        workspace.to_string_lossy().to_string(),
        format!("{}\n", ws_env.join("pyvenv.cfg").display()),
    );
    find.insert(
        extra.to_string_lossy().to_string(),
        format!(
            "{}\n{}\n",
            extra_env.join("pyvenv.cfg").display(),
            ws_env.join("pyvenv.cfg").display()
        ),
    );
    let runner = ScriptedRunner {
        conda: Some(json!({ "envs": [base.to_string_lossy()] }).to_string()),
        find,
    };

    let cfg = discovery_config(&workspace, vec![extra.clone()]);
    let svc = service(
        &cfg,
        runner,
        Arc::new(RecordingSink::default()),
        Arc::new(BuildConfig::default()),
        AuditLog::disabled(),
    );
    let found = svc.discover_environments().await;

    let summary: Vec<(String, SourceKind)> = found
        .iter()
        .map(|c| (c.label().to_string(), c.source()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("$(zap) miniconda".to_string(), SourceKind::PackageManager),
            ("$(rocket) .venv".to_string(), SourceKind::DiscoveredVirtualEnv),
            ("$(rocket) tools".to_string(), SourceKind::DiscoveredVirtualEnv),
        ]
    );
}

#[tokio::test]
async fn discovery_with_every_probe_failing_is_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = discovery_config(tmp.path(), Vec::new());
    let svc = service(
        &cfg,
        ScriptedRunner::default(),
        Arc::new(RecordingSink::default()),
        Arc::new(BuildConfig::default()),
        AuditLog::disabled(),
    );
    assert!(svc.discover_environments().await.is_empty());
}

#[test]
fn build_uses_config_args_and_writes_audit() {
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("ext");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("setup.py"), "").unwrap();
    let env = venv(&tmp.path().join("env"));
    let audit_path = tmp.path().join("audit.jsonl");

    let sink = Arc::new(RecordingSink::default());
    let cfg = discovery_config(tmp.path(), Vec::new());
    let svc = service(
        &cfg,
        ScriptedRunner::default(),
        sink.clone(),
        Arc::new(FixedArgs("build_ext --inplace --force")),
        AuditLog::to_file(&audit_path),
    );

    let submission = svc.execute_build(&project, &env).unwrap();
    assert!(submission.command_line.ends_with("setup.py build_ext --inplace --force"));
    assert_eq!(sink.submitted.lock().unwrap().as_slice(), [submission.command_line.clone()]);

    let err = svc.execute_build(tmp.path().join("nowhere"), &env).unwrap_err();
    assert!(matches!(err, ServiceError::Build(_)));

    let records: Vec<Value> = fs::read_to_string(&audit_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["event"], "build_submitted");
    assert_eq!(records[0]["command_line"], submission.command_line.as_str());
    assert_eq!(records[1]["event"], "build_rejected");

    svc.dispose();
    svc.dispose();
    assert_eq!(sink.disposed.lock().unwrap().as_slice(), [1]);
}

#[test]
fn manual_selection_rejects_unsafe_and_invalid_paths() {
    let tmp = tempfile::tempdir().unwrap();
    let plain = tmp.path().join("plain");
    fs::create_dir_all(plain.join("bin")).unwrap();
    fs::write(plain.join("bin").join("python3"), "").unwrap();

    let cfg = discovery_config(tmp.path(), Vec::new());
    let svc = service(
        &cfg,
        ScriptedRunner::default(),
        Arc::new(RecordingSink::default()),
        Arc::new(BuildConfig::default()),
        AuditLog::disabled(),
    );

    assert!(matches!(
        svc.select_environment(format!("{}/../plain", tmp.path().display())),
        Err(ServiceError::Validation(ValidationError::UnsafePath(_)))
    ));
    assert!(matches!(
        svc.select_environment(&plain),
        Err(ServiceError::Validation(ValidationError::InvalidEnvironment(_)))
    ));
    assert!(matches!(
        svc.select_environment(tmp.path().join("gone")),
        Err(ServiceError::Validation(ValidationError::MissingEnvironment(_)))
    ));
}

#[test]
fn dropping_the_service_disposes_the_sink() {
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("ext");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("setup.py"), "").unwrap();
    let env = venv(&tmp.path().join("env"));

    let sink = Arc::new(RecordingSink::default());
    let cfg = discovery_config(tmp.path(), Vec::new());
    let svc = service(
        &cfg,
        ScriptedRunner::default(),
        sink.clone(),
        Arc::new(BuildConfig::default()),
        AuditLog::disabled(),
    );
    svc.execute_build(&project, &env).unwrap();
    svc.execute_build(&project, &env).unwrap();
    drop(svc);

    assert_eq!(sink.disposed.lock().unwrap().as_slice(), [1, 2]);
}
