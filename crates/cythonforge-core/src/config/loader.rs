//! Environment variable loading.
//!
//! Keeps the fallback chains in one place so callers never chain `or_else` on
//! `std::env::var` themselves.

use std::env;
use std::path::Path;

/// Load `.env` from the current directory into the process environment (existing
/// variables win). Runs at most once per process.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// Load `<dir>/.env` without overriding variables that are already set.
pub fn load_dotenv_from_dir(dir: &Path) {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if env::var(&key).is_err() {
            #[allow(unsafe_code)]
            unsafe {
                env::set_var(key, value);
            }
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        // Strip inline comment (# not inside quotes)
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

/// Read the primary variable or the first set alias; empty values fall back to `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Like [`env_or`] but returns `None` when unset or blank.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Parse a numeric variable, ignoring unparseable values.
pub fn env_u64(primary: &str, default: u64) -> u64 {
    env_optional(primary, &[])
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}
