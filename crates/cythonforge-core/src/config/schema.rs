//! Config structs grouped by concern, loaded from environment variables.

use super::env_keys::{build, discovery, observability as obv_keys};
use super::loader::{env_bool, env_optional, env_or, env_u64, load_dotenv};
use crate::path_validation::{make_absolute, PathStyle};
use std::path::PathBuf;
use std::time::Duration;

/// Build arguments used when the host does not override them.
pub const DEFAULT_BUILD_ARGS: &str = "build_ext --inplace";

pub const DEFAULT_CONDA_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_PROBE_OUTPUT_BYTES: u64 = 4 * 1024 * 1024;

/// Directories under the home directory that conventionally hold virtualenvs.
pub const CONVENTIONAL_SEARCH_DIRS: &[&[&str]] = &[
    &[".virtualenvs"],
    &[".local", "share", "virtualenvs"],
    &[".pyenv", "versions"],
];

/// Read-only source of the build-args setting.
///
/// The value is interpolated into the shell command unescaped, so implementations
/// must only read from sources trusted as much as the host application.
pub trait ConfigSource: Send + Sync {
    fn default_build_args(&self) -> String;
}

/// Build invocation config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub default_build_args: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            default_build_args: DEFAULT_BUILD_ARGS.to_string(),
        }
    }
}

impl BuildConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            default_build_args: env_or(
                build::CYTHONFORGE_DEFAULT_BUILD_ARGS,
                build::DEFAULT_BUILD_ARGS_ALIASES,
                || DEFAULT_BUILD_ARGS.to_string(),
            ),
        }
    }
}

impl ConfigSource for BuildConfig {
    fn default_build_args(&self) -> String {
        self.default_build_args.clone()
    }
}

/// Re-reads the environment on every call, so edits made while a host is running
/// are picked up by the next build.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn default_build_args(&self) -> String {
        BuildConfig::from_env().default_build_args
    }
}

/// Environment discovery config
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Workspace root searched before the conventional directories.
    pub workspace: Option<PathBuf>,
    pub extra_search_roots: Vec<PathBuf>,
    pub home_dir: Option<PathBuf>,
    pub conda_executable: String,
    pub find_program: String,
    pub conda_timeout: Duration,
    pub search_timeout: Duration,
    pub max_output_bytes: usize,
    pub path_style: PathStyle,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            extra_search_roots: Vec::new(),
            home_dir: dirs::home_dir(),
            conda_executable: "conda".to_string(),
            find_program: "find".to_string(),
            conda_timeout: Duration::from_secs(DEFAULT_CONDA_TIMEOUT_SECS),
            search_timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_PROBE_OUTPUT_BYTES as usize,
            path_style: PathStyle::host(),
        }
    }
}

impl DiscoveryConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let defaults = Self::default();

        let workspace = env_optional(discovery::CYTHONFORGE_WORKSPACE, &[]).map(PathBuf::from);
        let extra_search_roots: Vec<PathBuf> = env_optional(discovery::CYTHONFORGE_EXTRA_SEARCH_ROOTS, &[])
            .map(|raw| {
                std::env::split_paths(&raw)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let path_style = match env_optional(discovery::CYTHONFORGE_PATH_STYLE, &[]) {
            Some(raw) => raw.parse::<PathStyle>().unwrap_or_else(|_| {
                tracing::warn!("Invalid CYTHONFORGE_PATH_STYLE: {}, using host style", raw);
                PathStyle::host()
            }),
            None => PathStyle::host(),
        };

        let conda_executable = env_or(
            discovery::CYTHONFORGE_CONDA_EXE,
            discovery::CONDA_EXE_ALIASES,
            || defaults.conda_executable.clone(),
        );
        let find_program = env_or(discovery::CYTHONFORGE_FIND_PROGRAM, &[], || {
            defaults.find_program.clone()
        });

        Self {
            workspace,
            extra_search_roots,
            conda_executable,
            find_program,
            conda_timeout: Duration::from_secs(env_u64(
                discovery::CYTHONFORGE_CONDA_TIMEOUT_SECS,
                DEFAULT_CONDA_TIMEOUT_SECS,
            )),
            search_timeout: Duration::from_secs(env_u64(
                discovery::CYTHONFORGE_SEARCH_TIMEOUT_SECS,
                DEFAULT_SEARCH_TIMEOUT_SECS,
            )),
            max_output_bytes: env_u64(
                discovery::CYTHONFORGE_MAX_PROBE_OUTPUT_BYTES,
                DEFAULT_MAX_PROBE_OUTPUT_BYTES,
            ) as usize,
            path_style,
            ..defaults
        }
    }

    /// Filesystem search roots in probe order: workspace, conventional home
    /// directories, then configured extras. Relative roots are anchored at the
    /// current directory so every candidate path comes out absolute.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(ref ws) = self.workspace {
            roots.push(ws.clone());
        }
        if let Some(ref home) = self.home_dir {
            for parts in CONVENTIONAL_SEARCH_DIRS {
                roots.push(parts.iter().fold(home.clone(), |p, part| p.join(part)));
            }
        }
        roots.extend(self.extra_search_roots.iter().cloned());
        roots.into_iter().map(|r| make_absolute(&r)).collect()
    }
}

/// Observability config: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            quiet: env_bool(obv_keys::CYTHONFORGE_QUIET, obv_keys::QUIET_ALIASES, false),
            log_level: env_or(
                obv_keys::CYTHONFORGE_LOG_LEVEL,
                obv_keys::LOG_LEVEL_ALIASES,
                || "cythonforge=info".to_string(),
            ),
            log_json: env_bool(obv_keys::CYTHONFORGE_LOG_JSON, obv_keys::LOG_JSON_ALIASES, false),
            audit_log: env_optional(obv_keys::CYTHONFORGE_AUDIT_LOG, &[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_roots_order() {
        let cfg = DiscoveryConfig {
            workspace: Some(PathBuf::from("/work")),
            extra_search_roots: vec![PathBuf::from("/opt/envs")],
            home_dir: Some(PathBuf::from("/home/dev")),
            ..DiscoveryConfig::default()
        };
        assert_eq!(
            cfg.search_roots(),
            vec![
                PathBuf::from("/work"),
                PathBuf::from("/home/dev/.virtualenvs"),
                PathBuf::from("/home/dev/.local/share/virtualenvs"),
                PathBuf::from("/home/dev/.pyenv/versions"),
                PathBuf::from("/opt/envs"),
            ]
        );
    }

    #[test]
    fn test_relative_search_roots_become_absolute() {
        let cfg = DiscoveryConfig {
            workspace: Some(PathBuf::from(".")),
            extra_search_roots: vec![PathBuf::from("envs")],
            home_dir: None,
            ..DiscoveryConfig::default()
        };
        let cwd = std::env::current_dir().unwrap();
        let roots = cfg.search_roots();
        assert!(roots.iter().all(|r| r.is_absolute()), "{:?}", roots);
        assert_eq!(roots[1], cwd.join("envs"));
    }

    #[test]
    fn test_search_roots_without_workspace_or_home() {
        let cfg = DiscoveryConfig {
            workspace: None,
            home_dir: None,
            ..DiscoveryConfig::default()
        };
        assert!(cfg.search_roots().is_empty());
    }

    #[test]
    fn test_build_config_default_args() {
        let cfg = BuildConfig::default();
        assert_eq!(cfg.default_build_args(), "build_ext --inplace");
    }
}
