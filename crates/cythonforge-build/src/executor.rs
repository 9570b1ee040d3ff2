//! BuildExecutor: re-validate, resolve the interpreter, submit one command line.
//!
//! Owns at most one active sink. A new build disposes the previous sink before
//! creating the next one, and dropping the executor disposes whatever is left.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use cythonforge_core::observability::Notifier;
use cythonforge_core::path_validation::{is_safe, make_absolute};
use cythonforge_core::{PathValidator, ValidationError};

use crate::error::BuildError;
use crate::sink::{CommandSink, SinkHandle};

/// A build that was handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSubmission {
    pub handle: SinkHandle,
    pub interpreter: PathBuf,
    pub command_line: String,
}

/// `cd <project> && <interpreter> setup.py <build_args>`.
///
/// Both paths are escaped for the validator's shell. `build_args` is inserted as
/// is: it comes from configuration and is trusted like the host itself.
pub fn build_command_line(
    validator: &PathValidator,
    project_dir: &Path,
    interpreter: &Path,
    build_args: &str,
) -> String {
    format!(
        "cd {} && {} setup.py {}",
        validator.escape_for_shell(&project_dir.to_string_lossy()),
        validator.escape_for_shell(&interpreter.to_string_lossy()),
        build_args
    )
}

pub struct BuildExecutor {
    sink: Arc<dyn CommandSink>,
    validator: PathValidator,
    notifier: Arc<dyn Notifier>,
    active: Mutex<Option<SinkHandle>>,
}

impl BuildExecutor {
    pub fn new(
        sink: Arc<dyn CommandSink>,
        validator: PathValidator,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sink,
            validator,
            notifier,
            active: Mutex::new(None),
        }
    }

    pub fn validator(&self) -> &PathValidator {
        &self.validator
    }

    /// Handle of the sink the last build was submitted to, if still held.
    pub fn active_sink(&self) -> Option<SinkHandle> {
        *self.lock_active()
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<SinkHandle>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Project: safe, exists, has `setup.py`. Environment: safe, exists, valid.
    pub fn validate_request(
        &self,
        project_dir: &Path,
        environment: &Path,
    ) -> Result<(), ValidationError> {
        if !is_safe(project_dir) {
            return Err(ValidationError::UnsafePath(
                project_dir.to_string_lossy().to_string(),
            ));
        }
        if !project_dir.is_dir() {
            return Err(ValidationError::MissingFolder(project_dir.to_path_buf()));
        }
        if !self.validator.has_build_descriptor(project_dir) {
            return Err(ValidationError::MissingBuildDescriptor(
                project_dir.to_path_buf(),
            ));
        }
        if !is_safe(environment) {
            return Err(ValidationError::UnsafePath(
                environment.to_string_lossy().to_string(),
            ));
        }
        if !environment.exists() {
            return Err(ValidationError::MissingEnvironment(environment.to_path_buf()));
        }
        if !self.validator.is_valid_environment(environment) {
            return Err(ValidationError::InvalidEnvironment(environment.to_path_buf()));
        }
        Ok(())
    }

    /// Validate both paths and launch the build. Success means the command was
    /// handed to a fresh sink, not that the build passed.
    ///
    /// Relative paths are anchored at the current directory first: the command
    /// changes directory before running the interpreter, so a relative interpreter
    /// path would otherwise be looked up inside the project.
    pub fn execute(
        &self,
        project_dir: &Path,
        environment: &Path,
        build_args: &str,
    ) -> Result<BuildSubmission, BuildError> {
        let project_dir = make_absolute(project_dir);
        let environment = make_absolute(environment);
        let (project_dir, environment) = (project_dir.as_path(), environment.as_path());

        if let Err(e) = self.validate_request(project_dir, environment) {
            self.notifier.error("Build request rejected", Some(&e));
            return Err(e.into());
        }

        let interpreter = self
            .validator
            .resolve_interpreter(environment)
            .ok_or_else(|| BuildError::InterpreterNotFound(environment.to_path_buf()))?;

        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            self.sink.dispose(previous);
        }

        let handle = match self.sink.create() {
            Ok(handle) => handle,
            Err(e) => {
                self.notifier.error("Failed to create build sink", Some(&e));
                return Err(e.into());
            }
        };
        *active = Some(handle);

        let command_line = build_command_line(&self.validator, project_dir, &interpreter, build_args);
        if let Err(e) = self.sink.submit(&handle, &command_line) {
            self.notifier.error("Failed to execute build command", Some(&e));
            self.sink.dispose(handle);
            *active = None;
            return Err(e.into());
        }

        self.notifier.info(
            "Build command submitted",
            Some(&json!({
                "sink": self.sink.name(),
                "project_dir": project_dir.to_string_lossy(),
                "interpreter": interpreter.to_string_lossy(),
            })),
        );
        Ok(BuildSubmission {
            handle,
            interpreter,
            command_line,
        })
    }

    /// Dispose the active sink. Safe to call repeatedly.
    pub fn dispose(&self) {
        if let Some(handle) = self.lock_active().take() {
            self.sink.dispose(handle);
        }
    }
}

impl Drop for BuildExecutor {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use cythonforge_core::observability::TracingNotifier;
    use cythonforge_core::PathStyle;
    use std::fs;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Create(u64),
        Submit(u64, String),
        Dispose(u64),
    }

    #[derive(Default)]
    struct SpySink {
        events: Mutex<Vec<Event>>,
        next: Mutex<u64>,
        fail_submit: bool,
    }

    impl SpySink {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl CommandSink for SpySink {
        fn name(&self) -> &str {
            "spy"
        }

        fn create(&self) -> Result<SinkHandle, SinkError> {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            self.events.lock().unwrap().push(Event::Create(*next));
            Ok(SinkHandle::new(*next))
        }

        fn submit(&self, handle: &SinkHandle, command_line: &str) -> Result<(), SinkError> {
            self.events
                .lock()
                .unwrap()
                .push(Event::Submit(handle.id(), command_line.to_string()));
            if self.fail_submit {
                return Err(SinkError::Submit {
                    handle: handle.id(),
                    reason: "closed".to_string(),
                });
            }
            Ok(())
        }

        fn dispose(&self, handle: SinkHandle) {
            self.events.lock().unwrap().push(Event::Dispose(handle.id()));
        }
    }

    fn venv(root: &Path) -> PathBuf {
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin").join("python3"), "").unwrap();
        fs::write(root.join("pyvenv.cfg"), "").unwrap();
        root.to_path_buf()
    }

    fn project(root: &Path) -> PathBuf {
        fs::create_dir_all(root).unwrap();
        fs::write(root.join("setup.py"), "").unwrap();
        root.to_path_buf()
    }

    fn executor(sink: Arc<SpySink>) -> BuildExecutor {
        BuildExecutor::new(
            sink,
            PathValidator::new(PathStyle::Posix),
            Arc::new(TracingNotifier),
        )
    }

    #[test]
    fn test_command_line_escapes_paths_but_not_args() {
        let v = PathValidator::new(PathStyle::Posix);
        let line = build_command_line(
            &v,
            Path::new("/home/u/my proj"),
            Path::new("/envs/a b/bin/python3"),
            "build_ext --inplace",
        );
        assert_eq!(
            line,
            "cd /home/u/my\\ proj && /envs/a\\ b/bin/python3 setup.py build_ext --inplace"
        );

        let v = PathValidator::new(PathStyle::Windows);
        let line = build_command_line(
            &v,
            Path::new("C:\\work\\ext"),
            Path::new("C:\\envs\\a\\Scripts\\python.exe"),
            "build_ext --inplace",
        );
        assert_eq!(
            line,
            "cd \"C:\\work\\ext\" && \"C:\\envs\\a\\Scripts\\python.exe\" setup.py build_ext --inplace"
        );
    }

    #[test]
    fn test_happy_path_submits_one_line() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = project(&tmp.path().join("ext"));
        let env = venv(&tmp.path().join("env"));
        let sink = Arc::new(SpySink::default());
        let exec = executor(sink.clone());

        let submission = exec.execute(&proj, &env, "build_ext --inplace").unwrap();
        let expected = format!(
            "cd {} && {}/bin/python3 setup.py build_ext --inplace",
            proj.display(),
            env.display()
        );
        assert_eq!(submission.command_line, expected);
        assert_eq!(submission.interpreter, env.join("bin").join("python3"));
        assert_eq!(
            sink.events(),
            vec![Event::Create(1), Event::Submit(1, expected)]
        );
        assert_eq!(exec.active_sink(), Some(SinkHandle::new(1)));
    }

    #[test]
    fn test_missing_setup_py_never_touches_sink() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = tmp.path().join("ext");
        fs::create_dir_all(&proj).unwrap();
        let env = venv(&tmp.path().join("env"));
        let sink = Arc::new(SpySink::default());
        let exec = executor(sink.clone());

        let err = exec.execute(&proj, &env, "build_ext").unwrap_err();
        assert!(matches!(
            err,
            BuildError::Validation(ValidationError::MissingBuildDescriptor(_))
        ));
        assert!(err.is_rejection());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_validation_failures_are_typed() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = project(&tmp.path().join("ext"));
        let env = venv(&tmp.path().join("env"));
        let bare = tmp.path().join("bare");
        fs::create_dir_all(&bare).unwrap();
        let sink = Arc::new(SpySink::default());
        let exec = executor(sink.clone());

        let reject = |p: &Path, e: &Path| match exec.execute(p, e, "build_ext") {
            Err(BuildError::Validation(v)) => v,
            other => panic!("expected validation error for {:?}, got {:?}", p, other),
        };

        assert!(matches!(
            reject(Path::new("../ext"), &env),
            ValidationError::UnsafePath(_)
        ));
        assert!(matches!(
            reject(&tmp.path().join("nope"), &env),
            ValidationError::MissingFolder(_)
        ));
        assert!(matches!(
            reject(&proj, &tmp.path().join("x/../env")),
            ValidationError::UnsafePath(_)
        ));
        assert!(matches!(
            reject(&proj, &tmp.path().join("gone")),
            ValidationError::MissingEnvironment(_)
        ));
        assert!(matches!(
            reject(&proj, &bare),
            ValidationError::InvalidEnvironment(_)
        ));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_second_build_replaces_sink() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = project(&tmp.path().join("ext"));
        let env = venv(&tmp.path().join("env"));
        let sink = Arc::new(SpySink::default());
        let exec = executor(sink.clone());

        exec.execute(&proj, &env, "build_ext").unwrap();
        exec.execute(&proj, &env, "build_ext").unwrap();

        let kinds: Vec<String> = sink
            .events()
            .iter()
            .map(|e| match e {
                Event::Create(id) => format!("create {}", id),
                Event::Submit(id, _) => format!("submit {}", id),
                Event::Dispose(id) => format!("dispose {}", id),
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["create 1", "submit 1", "dispose 1", "create 2", "submit 2"]
        );
        assert_eq!(exec.active_sink(), Some(SinkHandle::new(2)));
    }

    #[test]
    fn test_failed_submit_releases_sink() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = project(&tmp.path().join("ext"));
        let env = venv(&tmp.path().join("env"));
        let sink = Arc::new(SpySink {
            fail_submit: true,
            ..SpySink::default()
        });
        let exec = executor(sink.clone());

        let err = exec.execute(&proj, &env, "build_ext").unwrap_err();
        assert!(matches!(err, BuildError::Execution(_)));
        assert!(!err.is_rejection());
        assert_eq!(exec.active_sink(), None);
        assert_eq!(sink.events().last(), Some(&Event::Dispose(1)));
    }

    #[test]
    fn test_dispose_is_idempotent_and_runs_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = project(&tmp.path().join("ext"));
        let env = venv(&tmp.path().join("env"));
        let sink = Arc::new(SpySink::default());

        let exec = executor(sink.clone());
        exec.execute(&proj, &env, "build_ext").unwrap();
        exec.dispose();
        exec.dispose();
        drop(exec);
        let disposals = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Dispose(_)))
            .count();
        assert_eq!(disposals, 1);

        let exec = executor(sink.clone());
        exec.execute(&proj, &env, "build_ext").unwrap();
        drop(exec);
        assert_eq!(sink.events().last(), Some(&Event::Dispose(2)));
    }

    fn local_tempdir() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::Builder::new()
            .prefix("cf-build-")
            .tempdir_in(".")
            .unwrap();
        let relative = PathBuf::from(tmp.path().file_name().unwrap());
        (tmp, relative)
    }

    #[test]
    fn test_relative_paths_are_anchored_before_the_command_is_built() {
        let (_tmp, rel) = local_tempdir();
        project(&rel.join("ext"));
        venv(&rel.join("env"));
        let sink = Arc::new(SpySink::default());
        let exec = executor(sink.clone());

        let submission = exec
            .execute(&rel.join("ext"), &rel.join("env"), "build_ext --inplace")
            .unwrap();

        let cwd = std::env::current_dir().unwrap();
        assert!(submission.interpreter.is_absolute());
        assert_eq!(
            submission.interpreter,
            cwd.join(&rel).join("env").join("bin").join("python3")
        );
        let expected = build_command_line(
            &PathValidator::new(PathStyle::Posix),
            &cwd.join(&rel).join("ext"),
            &submission.interpreter,
            "build_ext --inplace",
        );
        assert_eq!(submission.command_line, expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_request_runs_the_interpreter_through_the_shell() {
        use crate::sink::ShellSink;
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, rel) = local_tempdir();
        let proj = project(&rel.join("ext"));
        let env = venv(&rel.join("env"));
        let interpreter = env.join("bin").join("python3");
        fs::write(&interpreter, "#!/bin/sh\necho \"$@\" > ran.txt\n").unwrap();
        fs::set_permissions(&interpreter, fs::Permissions::from_mode(0o755)).unwrap();

        let sink = Arc::new(ShellSink::new(PathStyle::Posix));
        let exec = BuildExecutor::new(
            sink.clone(),
            PathValidator::new(PathStyle::Posix),
            Arc::new(TracingNotifier),
        );
        let submission = exec.execute(&proj, &env, "build_ext --inplace").unwrap();
        let status = sink.wait_for(&submission.handle).unwrap();

        assert!(status.success(), "status {:?}", status);
        let ran = fs::read_to_string(proj.join("ran.txt")).unwrap();
        assert_eq!(ran.trim(), "setup.py build_ext --inplace");
    }
}
