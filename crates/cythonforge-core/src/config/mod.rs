//! Cython Forge configuration layer.
//!
//! All environment-variable reads live here; the rest of the workspace only sees
//! typed config structs.
//!
//! - `loader`: env_or, env_optional, env_bool helpers and `.env` loading
//! - `schema`: BuildConfig, DiscoveryConfig, ObservabilityConfig, ConfigSource
//! - `env_keys`: key constants (with aliases)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv, load_dotenv_from_dir};
pub use schema::{
    BuildConfig, ConfigSource, DiscoveryConfig, EnvConfigSource, ObservabilityConfig,
    DEFAULT_BUILD_ARGS,
};
