mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use cli::{Cli, Commands};
use cythonforge_core::config::{DiscoveryConfig, ObservabilityConfig};
use cythonforge_core::observability;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    observability::init_tracing(&ObservabilityConfig::from_env());
    let cli = Cli::parse();

    let mut discovery = DiscoveryConfig::from_env();
    if let Some(ws) = cli.workspace {
        discovery.workspace = Some(PathBuf::from(ws));
    }

    match cli.command {
        Commands::Discover { json } => commands::discover::run(&discovery, json).await,
        Commands::Build {
            project_dir,
            env_path,
            build_args,
            detach,
        } => commands::build::run(&discovery, &project_dir, &env_path, build_args, detach).await,
        Commands::CheckEnv { path } => commands::check::check_env(&discovery, &path),
        Commands::CheckProject { dir } => commands::check::check_project(&discovery, &dir),
    }
}
