use clap::{Parser, Subcommand};

/// Cython Forge - find Python environments and build Cython extensions in them
#[derive(Parser, Debug)]
#[command(name = "cythonforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace root searched for virtual environments before the home directories
    #[arg(long, global = true, value_name = "DIR", env = "CYTHONFORGE_WORKSPACE")]
    pub workspace: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List environments from conda and the virtualenv search roots
    Discover {
        /// Print candidates as a JSON array
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run `python setup.py <build args>` for a project inside an environment
    Build {
        /// Folder containing setup.py
        #[arg(value_name = "PROJECT_DIR")]
        project_dir: String,

        /// Environment root (the directory holding bin/ or Scripts/)
        #[arg(value_name = "ENV_PATH")]
        env_path: String,

        /// Arguments after `setup.py` (default: CYTHONFORGE_DEFAULT_BUILD_ARGS or "build_ext --inplace")
        #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
        build_args: Option<String>,

        /// Return once the build is launched instead of waiting for it
        #[arg(long, default_value = "false")]
        detach: bool,
    },

    /// Validate an environment picked by hand
    CheckEnv {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Check that a folder is usable as a build target
    CheckProject {
        #[arg(value_name = "DIR")]
        dir: String,
    },
}
