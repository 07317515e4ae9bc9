//! # shadowlink
//!
//! Encrypted SOCKS5 tunneling client.
//!
//! ## Crates
//!
//! - [`shadowlink_core`] - Shared defaults and error labels
//! - [`shadowlink_proto`] - Address header and SOCKS5 reply encoding
//! - [`shadowlink_crypto`] - Stream cipher adapter and key derivation
//! - [`shadowlink_config`] - Configuration loading and validation
//! - [`shadowlink_metrics`] - Prometheus-compatible metrics
//! - [`shadowlink_client`] - Local SOCKS5 client and relay engine

pub use shadowlink_client as client;
pub use shadowlink_config as config;
pub use shadowlink_core as core;
pub use shadowlink_crypto as crypto;
pub use shadowlink_metrics as metrics;
pub use shadowlink_proto as proto;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use shadowlink_client::{ClientState, RelayConfig, RelaySession, WorkerPool, run, serve};
    pub use shadowlink_config::{Config, load_config, validate_config};
    pub use shadowlink_crypto::{CipherFactory, CipherKind, StreamCipher};
    pub use tokio_util::sync::CancellationToken;
}
