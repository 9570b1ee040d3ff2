//! Environment variable keys and their aliases.
//!
//! Primary keys use the `CYTHONFORGE_*` prefix.

/// Build invocation
pub mod build {
    pub const CYTHONFORGE_DEFAULT_BUILD_ARGS: &str = "CYTHONFORGE_DEFAULT_BUILD_ARGS";
    pub const DEFAULT_BUILD_ARGS_ALIASES: &[&str] = &["CYTHON_FORGE_BUILD_ARGS"];
}

/// Environment discovery
pub mod discovery {
    pub const CYTHONFORGE_WORKSPACE: &str = "CYTHONFORGE_WORKSPACE";

    /// Extra search roots, separated like `PATH`.
    pub const CYTHONFORGE_EXTRA_SEARCH_ROOTS: &str = "CYTHONFORGE_EXTRA_SEARCH_ROOTS";

    pub const CYTHONFORGE_CONDA_EXE: &str = "CYTHONFORGE_CONDA_EXE";
    pub const CONDA_EXE_ALIASES: &[&str] = &["CONDA_EXE"];

    pub const CYTHONFORGE_FIND_PROGRAM: &str = "CYTHONFORGE_FIND_PROGRAM";

    pub const CYTHONFORGE_CONDA_TIMEOUT_SECS: &str = "CYTHONFORGE_CONDA_TIMEOUT_SECS";
    pub const CYTHONFORGE_SEARCH_TIMEOUT_SECS: &str = "CYTHONFORGE_SEARCH_TIMEOUT_SECS";
    pub const CYTHONFORGE_MAX_PROBE_OUTPUT_BYTES: &str = "CYTHONFORGE_MAX_PROBE_OUTPUT_BYTES";

    /// `posix` or `windows`; unset means the host platform.
    pub const CYTHONFORGE_PATH_STYLE: &str = "CYTHONFORGE_PATH_STYLE";
}

/// Observability and logging
pub mod observability {
    pub const CYTHONFORGE_QUIET: &str = "CYTHONFORGE_QUIET";
    pub const QUIET_ALIASES: &[&str] = &[];

    pub const CYTHONFORGE_LOG_LEVEL: &str = "CYTHONFORGE_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &[];

    pub const CYTHONFORGE_LOG_JSON: &str = "CYTHONFORGE_LOG_JSON";
    pub const LOG_JSON_ALIASES: &[&str] = &[];

    pub const CYTHONFORGE_AUDIT_LOG: &str = "CYTHONFORGE_AUDIT_LOG";
}
