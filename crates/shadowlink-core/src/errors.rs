//! Error type labels for metrics and logging.
//!
//! These constants keep error classification consistent across crates.

/// Dial to the remote proxy failed.
pub const ERROR_UPSTREAM_CONNECT: &str = "upstream_connect";
/// First frame had no destination address to encode.
pub const ERROR_MISSING_DESTINATION: &str = "missing_destination";
/// Destination could not be encoded as an address header.
pub const ERROR_HEADER: &str = "header";
/// A peer closed its side of the tunnel.
pub const ERROR_PEER_CLOSED: &str = "peer_closed";
/// No traffic on the upstream within the idle window.
pub const ERROR_IDLE_TIMEOUT: &str = "idle_timeout";
/// Generic I/O failure on either socket.
pub const ERROR_TRANSPORT: &str = "transport";
/// SOCKS5 handshake violation.
pub const ERROR_SOCKS5: &str = "socks5";
/// DNS/address resolution error.
pub const ERROR_RESOLVE: &str = "resolve";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
/// Cipher construction error.
pub const ERROR_CIPHER: &str = "cipher";
