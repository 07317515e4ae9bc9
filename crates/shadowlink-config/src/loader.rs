//! Configuration file loading and error types.

use std::{fs, path::Path};

use crate::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config format: {0:?}")]
    UnsupportedFormat(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Read and parse a config file, picking the format from its extension.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    parse_config(&data, ext)
}

/// Parse config text in the format named by `ext` (`json`, `jsonc`, `yaml`, `yml`, `toml`).
pub fn parse_config(data: &str, ext: &str) -> Result<Config, ConfigError> {
    match ext.to_ascii_lowercase().as_str() {
        "json" | "jsonc" => {
            let stripped = json_comments::StripComments::new(data.as_bytes());
            Ok(serde_json::from_reader(stripped)?)
        }
        "yaml" | "yml" => Ok(serde_yaml::from_str(data)?),
        "toml" => Ok(toml::from_str(data)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}
