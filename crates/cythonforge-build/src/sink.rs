//! CommandSink: where a finished build command line is sent.
//!
//! The editor host provides a terminal; the CLI uses [`ShellSink`], which runs the
//! line through the platform shell with inherited stdio.

use std::collections::HashMap;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use cythonforge_core::PathStyle;

use crate::error::SinkError;

/// Opaque handle to one sink instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkHandle(u64);

impl SinkHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

/// Extension point for command execution surfaces.
pub trait CommandSink: Send + Sync {
    /// Sink name for logging and diagnostics.
    fn name(&self) -> &str;

    fn create(&self) -> Result<SinkHandle, SinkError>;

    /// Hand one command line to the sink. Returns once the command is launched.
    fn submit(&self, handle: &SinkHandle, command_line: &str) -> Result<(), SinkError>;

    /// Release the sink. Unknown or already disposed handles are ignored.
    fn dispose(&self, handle: SinkHandle);
}

/// Runs each submitted line with `sh -c` (Posix) or `cmd /C` (Windows).
///
/// Disposing a sink kills its child if it is still running, unless the sink was
/// built with [`ShellSink::detached`].
pub struct ShellSink {
    style: PathStyle,
    kill_on_dispose: bool,
    next_id: AtomicU64,
    slots: Mutex<HashMap<u64, Option<Child>>>,
}

impl Default for ShellSink {
    fn default() -> Self {
        Self::new(PathStyle::host())
    }
}

impl ShellSink {
    pub fn new(style: PathStyle) -> Self {
        Self {
            style,
            kill_on_dispose: true,
            next_id: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Children outlive their sink.
    pub fn detached(style: PathStyle) -> Self {
        Self {
            kill_on_dispose: false,
            ..Self::new(style)
        }
    }

    fn shell_command(&self, command_line: &str) -> Command {
        let mut cmd = match self.style {
            PathStyle::Posix => {
                let mut c = Command::new("sh");
                c.arg("-c");
                c
            }
            PathStyle::Windows => {
                let mut c = Command::new("cmd");
                c.arg("/C");
                c
            }
        };
        cmd.arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Option<Child>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until the command submitted to `handle` exits.
    ///
    /// The child is taken out of the sink, so a later `dispose` has nothing to kill.
    pub fn wait_for(&self, handle: &SinkHandle) -> Result<ExitStatus, SinkError> {
        let child = {
            let mut slots = self.lock();
            match slots.get_mut(&handle.id()) {
                Some(slot) => slot.take(),
                None => return Err(SinkError::UnknownHandle(handle.id())),
            }
        };
        let Some(mut child) = child else {
            return Err(SinkError::Submit {
                handle: handle.id(),
                reason: "nothing was submitted".to_string(),
            });
        };
        child.wait().map_err(|e| SinkError::Submit {
            handle: handle.id(),
            reason: e.to_string(),
        })
    }
}

impl CommandSink for ShellSink {
    fn name(&self) -> &str {
        match self.style {
            PathStyle::Posix => "sh",
            PathStyle::Windows => "cmd",
        }
    }

    fn create(&self) -> Result<SinkHandle, SinkError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, None);
        tracing::debug!(sink = id, "Shell sink created");
        Ok(SinkHandle::new(id))
    }

    fn submit(&self, handle: &SinkHandle, command_line: &str) -> Result<(), SinkError> {
        let mut slots = self.lock();
        let slot = slots
            .get_mut(&handle.id())
            .ok_or(SinkError::UnknownHandle(handle.id()))?;
        if slot.is_some() {
            return Err(SinkError::Submit {
                handle: handle.id(),
                reason: "a command is already running in this sink".to_string(),
            });
        }
        let child = self
            .shell_command(command_line)
            .spawn()
            .map_err(|e| SinkError::Submit {
                handle: handle.id(),
                reason: e.to_string(),
            })?;
        tracing::debug!(sink = handle.id(), pid = child.id(), "Command submitted");
        *slot = Some(child);
        Ok(())
    }

    fn dispose(&self, handle: SinkHandle) {
        let Some(slot) = self.lock().remove(&handle.id()) else {
            return;
        };
        if let Some(mut child) = slot {
            if self.kill_on_dispose {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
        tracing::debug!(sink = handle.id(), "Shell sink disposed");
    }
}
