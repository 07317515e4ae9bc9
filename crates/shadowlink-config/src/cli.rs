//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override remote server host
    #[arg(short = 's', long)]
    pub server: Option<String>,
    /// Override remote server port
    #[arg(short = 'p', long)]
    pub server_port: Option<u16>,
    /// Override shared password
    #[arg(short = 'k', long)]
    pub password: Option<String>,
    /// Override cipher method, e.g. aes-256-cfb
    #[arg(short = 'm', long)]
    pub method: Option<String>,
    /// Override local SOCKS5 listen address
    #[arg(short = 'b', long)]
    pub local_address: Option<String>,
    /// Override local SOCKS5 listen port
    #[arg(short = 'l', long)]
    pub local_port: Option<u16>,
    /// Override worker thread count
    #[arg(long)]
    pub workers: Option<usize>,
    /// Override upstream idle timeout (seconds)
    #[arg(short = 't', long)]
    pub idle_timeout_secs: Option<u64>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Override metrics listen address
    #[arg(long)]
    pub metrics_listen: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.server {
        config.server = v.clone();
    }
    if let Some(v) = overrides.server_port {
        config.server_port = v;
    }
    if let Some(v) = &overrides.password {
        config.password = v.clone();
    }
    if let Some(v) = &overrides.method {
        config.method = v.clone();
    }
    if let Some(v) = &overrides.local_address {
        config.local_address = v.clone();
    }
    if let Some(v) = overrides.local_port {
        config.local_port = v;
    }
    if let Some(v) = overrides.workers {
        config.workers = v;
    }
    if let Some(v) = overrides.idle_timeout_secs {
        config.idle_timeout_secs = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
    if let Some(v) = &overrides.metrics_listen {
        config.metrics.listen = Some(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config;

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = parse_config(
            "server = \"a\"\nserver_port = 1\npassword = \"x\"\n",
            "toml",
        )
        .unwrap();
        let overrides = CliOverrides::parse_from([
            "shadowlink",
            "--server",
            "b.example",
            "-p",
            "8388",
            "--method",
            "aes-192-cfb",
            "--workers",
            "4",
            "--log-level",
            "debug",
        ]);
        apply_overrides(&mut cfg, &overrides);

        assert_eq!(cfg.server, "b.example");
        assert_eq!(cfg.server_port, 8388);
        assert_eq!(cfg.password, "x");
        assert_eq!(cfg.method, "aes-192-cfb");
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
        assert!(cfg.metrics.listen.is_none());
    }

    #[test]
    fn empty_overrides_change_nothing() {
        let mut cfg = parse_config(
            "server = \"a\"\nserver_port = 1\npassword = \"x\"\n",
            "toml",
        )
        .unwrap();
        let before = format!("{cfg:?}");
        apply_overrides(&mut cfg, &CliOverrides::default());
        assert_eq!(format!("{cfg:?}"), before);
    }
}
