//! Configuration validation logic.

use shadowlink_core::defaults::{MAX_RELAY_BUFFER_SIZE, MAX_WORKERS, MIN_RELAY_BUFFER_SIZE};

use crate::Config;
use crate::loader::ConfigError;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.trim().is_empty() {
        return Err(ConfigError::Validation("server is empty".into()));
    }
    if config.server_port == 0 {
        return Err(ConfigError::Validation("server_port must be > 0".into()));
    }
    if config.password.is_empty() {
        return Err(ConfigError::Validation("password is empty".into()));
    }
    if config.method.trim().is_empty() {
        return Err(ConfigError::Validation("method is empty".into()));
    }
    if config.local_address.trim().is_empty() {
        return Err(ConfigError::Validation("local_address is empty".into()));
    }
    if config.local_port == 0 {
        return Err(ConfigError::Validation("local_port must be > 0".into()));
    }
    if config.idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "idle_timeout_secs must be > 0".into(),
        ));
    }
    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be > 0".into(),
        ));
    }
    if config.workers == 0 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be 1..={MAX_WORKERS}"
        )));
    }
    if config.relay_buffer_size < MIN_RELAY_BUFFER_SIZE {
        return Err(ConfigError::Validation(format!(
            "relay_buffer_size must be >= {MIN_RELAY_BUFFER_SIZE}"
        )));
    }
    if config.relay_buffer_size > MAX_RELAY_BUFFER_SIZE {
        return Err(ConfigError::Validation(
            "relay_buffer_size must be <= 1MB".into(),
        ));
    }
    if config.max_pending_bytes == 0 {
        return Err(ConfigError::Validation(
            "max_pending_bytes must be > 0".into(),
        ));
    }
    if let Some(format) = config.logging.format.as_deref()
        && !matches!(format, "json" | "pretty" | "compact")
    {
        return Err(ConfigError::Validation(
            "logging.format must be one of: json, pretty, compact".into(),
        ));
    }
    if let Some(output) = config.logging.output.as_deref()
        && !matches!(output, "stdout" | "stderr")
    {
        return Err(ConfigError::Validation(
            "logging.output must be 'stdout' or 'stderr'".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config;

    fn base() -> Config {
        parse_config(
            r#"{"server":"203.0.113.7","server_port":8388,"password":"123456"}"#,
            "json",
        )
        .unwrap()
    }

    fn expect_invalid(cfg: &Config, needle: &str) {
        match validate_config(cfg) {
            Err(ConfigError::Validation(msg)) => {
                assert!(msg.contains(needle), "{msg:?} does not mention {needle:?}")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        validate_config(&base()).unwrap();
    }

    #[test]
    fn rejects_empty_credentials() {
        let mut cfg = base();
        cfg.password.clear();
        expect_invalid(&cfg, "password");

        let mut cfg = base();
        cfg.server = "  ".into();
        expect_invalid(&cfg, "server");
    }

    #[test]
    fn rejects_zero_ports_and_timeouts() {
        let mut cfg = base();
        cfg.server_port = 0;
        expect_invalid(&cfg, "server_port");

        let mut cfg = base();
        cfg.idle_timeout_secs = 0;
        expect_invalid(&cfg, "idle_timeout_secs");

        let mut cfg = base();
        cfg.connect_timeout_secs = 0;
        expect_invalid(&cfg, "connect_timeout_secs");
    }

    #[test]
    fn worker_bounds() {
        let mut cfg = base();
        cfg.workers = 0;
        expect_invalid(&cfg, "workers");
        cfg.workers = MAX_WORKERS + 1;
        expect_invalid(&cfg, "workers");
        cfg.workers = MAX_WORKERS;
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn buffer_bounds() {
        let mut cfg = base();
        cfg.relay_buffer_size = 512;
        expect_invalid(&cfg, "relay_buffer_size");
        cfg.relay_buffer_size = 2 * 1024 * 1024;
        expect_invalid(&cfg, "relay_buffer_size");

        let mut cfg = base();
        cfg.max_pending_bytes = 0;
        expect_invalid(&cfg, "max_pending_bytes");
    }

    #[test]
    fn logging_values() {
        let mut cfg = base();
        cfg.logging.format = Some("xml".into());
        expect_invalid(&cfg, "logging.format");

        let mut cfg = base();
        cfg.logging.output = Some("file".into());
        expect_invalid(&cfg, "logging.output");
    }
}
