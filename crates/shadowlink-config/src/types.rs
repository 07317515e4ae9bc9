//! Configuration type definitions.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote proxy host (IP literal or domain).
    pub server: String,
    /// Remote proxy port.
    pub server_port: u16,
    /// Shared secret the cipher key is derived from.
    pub password: String,
    /// Stream cipher method, e.g. `aes-128-cfb`.
    #[serde(default = "default_method")]
    pub method: String,
    /// Local SOCKS5 listen address.
    #[serde(default = "default_local_address")]
    pub local_address: String,
    /// Local SOCKS5 listen port.
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    /// Upstream idle timeout in seconds.
    #[serde(default = "default_idle_timeout_secs", alias = "timeout")]
    pub idle_timeout_secs: u64,
    /// Upstream dial timeout in seconds (DNS + TCP connect).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Worker threads in the shared I/O pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Decrypt upstream bytes before writing them to the client.
    #[serde(default)]
    pub decode_inbound: bool,
    /// Cap on client bytes queued while the upstream dial is in flight.
    #[serde(default = "default_max_pending_bytes")]
    pub max_pending_bytes: usize,
    /// Read buffer size per relay direction.
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// `local_address:local_port`, bracketing IPv6 literals.
    pub fn local_endpoint(&self) -> String {
        join_host_port(&self.local_address, self.local_port)
    }

    /// `server:server_port`, bracketing IPv6 literals.
    pub fn server_endpoint(&self) -> String {
        join_host_port(&self.server, self.server_port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// TCP socket options applied to the upstream connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY) for lower latency.
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// TCP Keep-Alive interval in seconds (0 = disabled).
    #[serde(default = "default_tcp_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Prefer IPv4 addresses when resolving the remote server.
    #[serde(default = "default_tcp_prefer_ipv4")]
    pub prefer_ipv4: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            keepalive_secs: default_tcp_keepalive_secs(),
            prefer_ipv4: default_tcp_prefer_ipv4(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// Prometheus scrape endpoint, e.g. `127.0.0.1:9100`. Disabled when unset.
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"shadowlink_client": "debug"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
