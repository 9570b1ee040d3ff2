use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;

use cythonforge_build::ShellSink;
use cythonforge_core::config::DiscoveryConfig;

pub async fn run(discovery: &DiscoveryConfig, json: bool) -> Result<ExitCode> {
    let svc = super::forge_service(discovery, Arc::new(ShellSink::new(discovery.path_style)));
    let found = svc.discover_environments().await;

    if json {
        let out = serde_json::to_string_pretty(&found).context("Failed to serialize candidates")?;
        println!("{}", out);
        return Ok(ExitCode::SUCCESS);
    }

    if found.is_empty() {
        eprintln!("No Python environments found. Use `cythonforge check-env <PATH>` to pick one by hand.");
        return Ok(ExitCode::SUCCESS);
    }
    for c in &found {
        println!("{}\t{}\t{}", c.label(), c.description(), c.path().display());
    }
    Ok(ExitCode::SUCCESS)
}
