//! Configuration loading and CLI definitions.
//!
//! Config files use flat shadowsocks-style keys (`server`, `server_port`,
//! `password`, `method`, `local_address`, `local_port`, ...) with optional
//! `tcp`, `metrics` and `logging` sections. JSON (with comments), YAML and
//! TOML are accepted; the format is chosen by file extension.

mod cli;
mod defaults;
mod loader;
mod types;
mod validate;

pub use cli::{CliOverrides, apply_overrides};
pub use loader::{ConfigError, load_config, parse_config};
pub use types::*;
pub use validate::validate_config;
