use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;

use cythonforge_build::ShellSink;
use cythonforge_core::config::DiscoveryConfig;

pub fn check_env(discovery: &DiscoveryConfig, path: &str) -> Result<ExitCode> {
    let svc = super::forge_service(discovery, Arc::new(ShellSink::new(discovery.path_style)));
    let candidate = svc
        .select_environment(path)
        .with_context(|| format!("Environment rejected: {}", path))?;
    let interpreter = svc
        .validator()
        .resolve_interpreter(candidate.path())
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    println!("{}\t{}\t{}", candidate.label(), candidate.description(), interpreter);
    Ok(ExitCode::SUCCESS)
}

pub fn check_project(discovery: &DiscoveryConfig, dir: &str) -> Result<ExitCode> {
    let svc = super::forge_service(discovery, Arc::new(ShellSink::new(discovery.path_style)));
    let check = svc
        .check_project_folder(dir)
        .with_context(|| format!("Folder rejected: {}", dir))?;
    if check.has_build_descriptor {
        println!("{}: setup.py found", check.path.display());
    } else {
        eprintln!(
            "warning: {} does not contain setup.py. This may cause build issues.",
            check.path.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}
