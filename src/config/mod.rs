//! Configuration loading for convoy.
//!
//! Supports convoy.toml, CLI flags, and environment variables.
//! Precedence (highest to lowest): CLI flags > env vars > config file > defaults.

mod cli;
mod env;
mod file;
mod types;

pub use cli::CliArgs;
pub use types::{resolve, Config, ConfigError, GateConfig, Role, DEFAULT_CONFIG_FILE};
pub(crate) use types::detect_trunk;
