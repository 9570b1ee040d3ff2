//! Path validation utilities.
//!
//! Traversal checks, shell escaping and the structural rules that decide whether a
//! directory is a usable Python environment. Platform differences are captured by
//! [`PathStyle`], picked once at startup so every rule can be tested for either
//! platform on any host.
//!
//! The traversal check is a literal substring match. Paths are not canonicalized,
//! so a symlink can still point outside the directory a caller expects. Relative
//! paths are anchored at the current directory with [`make_absolute`], which is
//! lexical and leaves `..` in place for the traversal check to see.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File whose presence marks a buildable project folder.
pub const BUILD_DESCRIPTOR: &str = "setup.py";

/// Config file written by `venv` / `virtualenv` at the environment root.
pub const VENV_CONFIG_MARKER: &str = "pyvenv.cfg";

/// Metadata directory present in every conda environment.
pub const CONDA_META_MARKER: &str = "conda-meta";

const TRAVERSAL_SEQUENCES: &[&str] = &["../", "..\\"];

/// Platform path conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStyle {
    /// `bin/python3`, backslash escaping, `/` separators.
    Posix,
    /// `Scripts\python.exe`, double-quote wrapping, `\` or `/` separators.
    Windows,
}

impl PathStyle {
    /// Style of the platform this binary was compiled for.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    fn is_separator(self, c: char) -> bool {
        match self {
            Self::Posix => c == '/',
            Self::Windows => c == '/' || c == '\\',
        }
    }

    /// Interpreter directory and executable names, in lookup order.
    fn interpreter_candidates(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Posix => ("bin", &["python3", "python"]),
            Self::Windows => ("Scripts", &["python.exe", "python3.exe"]),
        }
    }
}

impl fmt::Display for PathStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Posix => f.write_str("posix"),
            Self::Windows => f.write_str("windows"),
        }
    }
}

impl FromStr for PathStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "posix" | "unix" => Ok(Self::Posix),
            "windows" | "win32" => Ok(Self::Windows),
            other => Err(format!("unknown path style: {}", other)),
        }
    }
}

/// Reject empty paths and paths containing `../` or `..\`.
pub fn is_safe_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    !TRAVERSAL_SEQUENCES.iter().any(|seq| path.contains(seq))
}

/// [`is_safe_path`] for a `Path`; non-UTF-8 components are checked lossily.
pub fn is_safe(path: &Path) -> bool {
    is_safe_path(&path.to_string_lossy())
}

/// Anchor a relative path at the current directory. Absolute and empty paths are
/// returned unchanged; symlinks and `..` are not resolved.
pub fn make_absolute(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Existence checks plus escaping for one [`PathStyle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathValidator {
    style: PathStyle,
}

impl Default for PathValidator {
    fn default() -> Self {
        Self::host()
    }
}

impl PathValidator {
    pub fn new(style: PathStyle) -> Self {
        Self { style }
    }

    pub fn host() -> Self {
        Self::new(PathStyle::host())
    }

    pub fn style(&self) -> PathStyle {
        self.style
    }

    /// Escape a path for interpolation into a shell command line.
    ///
    /// Windows: wrap in double quotes and double embedded quotes.
    /// Posix: backslash-escape quotes, `$`, backtick, backslash and whitespace.
    /// A newline is single-quoted instead, since `sh` drops backslash-newline as a
    /// line continuation.
    pub fn escape_for_shell(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }
        match self.style {
            PathStyle::Windows => format!("\"{}\"", path.replace('"', "\"\"")),
            PathStyle::Posix => {
                let mut escaped = String::with_capacity(path.len() + 8);
                for c in path.chars() {
                    if c == '\n' {
                        escaped.push_str("'\n'");
                        continue;
                    }
                    if matches!(c, '"' | '\'' | '$' | '`' | '\\') || c.is_whitespace() {
                        escaped.push('\\');
                    }
                    escaped.push(c);
                }
                escaped
            }
        }
    }

    /// Last path segment; trailing separators are ignored.
    pub fn basename(&self, path: &str) -> String {
        let trimmed = path.trim_end_matches(|c| self.style.is_separator(c));
        trimmed
            .rsplit(|c| self.style.is_separator(c))
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// First existing interpreter inside `env_root`, or `None`.
    pub fn resolve_interpreter(&self, env_root: &Path) -> Option<PathBuf> {
        if env_root.as_os_str().is_empty() || !env_root.exists() {
            return None;
        }
        let (dir, names) = self.style.interpreter_candidates();
        names
            .iter()
            .map(|name| env_root.join(dir).join(name))
            .find(|candidate| candidate.exists())
    }

    /// `folder` exists and has `setup.py` directly inside it.
    pub fn has_build_descriptor(&self, folder: &Path) -> bool {
        if folder.as_os_str().is_empty() || !folder.is_dir() {
            return false;
        }
        folder.join(BUILD_DESCRIPTOR).is_file()
    }

    /// Existence, interpreter presence, then a structural marker.
    ///
    /// A prefix that merely holds a python binary (e.g. `/usr`) has no marker and
    /// is rejected.
    pub fn is_valid_environment(&self, env_root: &Path) -> bool {
        if env_root.as_os_str().is_empty() || !env_root.exists() {
            return false;
        }
        if self.resolve_interpreter(env_root).is_none() {
            return false;
        }
        env_root.join(VENV_CONFIG_MARKER).is_file() || env_root.join(CONDA_META_MARKER).is_dir()
    }
}
