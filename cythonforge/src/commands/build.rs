use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;

use cythonforge_build::ShellSink;
use cythonforge_core::config::DiscoveryConfig;

pub async fn run(
    discovery: &DiscoveryConfig,
    project_dir: &str,
    env_path: &str,
    build_args: Option<String>,
    detach: bool,
) -> Result<ExitCode> {
    let sink = Arc::new(if detach {
        ShellSink::detached(discovery.path_style)
    } else {
        ShellSink::new(discovery.path_style)
    });
    let svc = super::forge_service(discovery, sink.clone());

    let submission = match build_args {
        Some(args) => svc.execute_build_with_args(project_dir, env_path, &args),
        None => svc.execute_build(project_dir, env_path),
    }
    .context("Build was not started")?;

    tracing::info!(command = %submission.command_line, "Build launched");
    if detach {
        println!("{}", submission.command_line);
        return Ok(ExitCode::SUCCESS);
    }

    let handle = submission.handle;
    let waiter = Arc::clone(&sink);
    let status = tokio::task::spawn_blocking(move || waiter.wait_for(&handle))
        .await
        .context("Build wait task failed")?
        .context("Failed to wait for build")?;
    svc.dispose();

    if status.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Build failed ({})", status);
        let code = status.code().and_then(|c| u8::try_from(c).ok()).unwrap_or(1);
        Ok(ExitCode::from(code.max(1)))
    }
}
