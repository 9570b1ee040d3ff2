//! Child-process runner used by the probes.
//!
//! Every run has a hard timeout and a cap on captured output. A child that
//! outlives its timeout, or writes more than the cap to either stream, is killed.

use async_trait::async_trait;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use cythonforge_core::config::schema::DEFAULT_MAX_PROBE_OUTPUT_BYTES;

/// Captured result of a child that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("'{program}' produced more than {limit} bytes of output")]
    OutputTooLarge { program: String, limit: usize },

    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Extension point for process execution, so probes can be driven by fakes in tests.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError>;
}

/// Runs children with `tokio::process`.
#[derive(Debug, Clone, Copy)]
pub struct TokioProcessRunner {
    max_output_bytes: usize,
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROBE_OUTPUT_BYTES as usize)
    }
}

impl TokioProcessRunner {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }
}

enum Collected {
    Finished {
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    Overflow,
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: program.to_string(),
                source,
            })?;

        tracing::debug!(program, ?args, ?timeout, "Spawned probe process");

        let outcome = tokio::time::timeout(
            timeout,
            collect(&mut child, self.max_output_bytes),
        )
        .await;

        match outcome {
            Ok(Ok(Collected::Finished {
                status,
                stdout,
                stderr,
            })) => Ok(ProcessOutput {
                exit_code: status.code(),
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            }),
            Ok(Ok(Collected::Overflow)) => {
                let _ = child.kill().await;
                Err(RunError::OutputTooLarge {
                    program: program.to_string(),
                    limit: self.max_output_bytes,
                })
            }
            Ok(Err(source)) => {
                let _ = child.kill().await;
                Err(RunError::Io {
                    program: program.to_string(),
                    source,
                })
            }
            Err(_) => {
                let _ = child.kill().await;
                Err(RunError::TimedOut {
                    program: program.to_string(),
                    timeout,
                })
            }
        }
    }
}

async fn collect(child: &mut Child, limit: usize) -> io::Result<Collected> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let ((out, out_overflow), (err, err_overflow)) =
        tokio::try_join!(read_capped(stdout, limit), read_capped(stderr, limit))?;
    if out_overflow || err_overflow {
        return Ok(Collected::Overflow);
    }
    let status = child.wait().await?;
    Ok(Collected::Finished {
        status,
        stdout: out,
        stderr: err,
    })
}

/// Read at most `limit` bytes; the flag reports whether more was available.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let Some(reader) = reader else {
        return Ok((buf, false));
    };
    reader.take(limit as u64 + 1).read_to_end(&mut buf).await?;
    let overflow = buf.len() > limit;
    buf.truncate(limit);
    Ok((buf, overflow))
}
