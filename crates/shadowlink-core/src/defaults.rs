//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Endpoint Defaults
// ============================================================================

/// Default local SOCKS5 listen address.
pub const DEFAULT_LOCAL_ADDRESS: &str = "127.0.0.1";
/// Default local SOCKS5 listen port.
pub const DEFAULT_LOCAL_PORT: u16 = 1080;
/// Default stream cipher method.
pub const DEFAULT_METHOD: &str = "aes-128-cfb";

// ============================================================================
// Timeout Defaults
// ============================================================================

/// Default upstream idle timeout in seconds (read, write or both idle).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 3;
/// Default upstream dial timeout in seconds (DNS + TCP connect).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Worker Pool Defaults
// ============================================================================

/// Default number of I/O worker threads shared by all sessions.
pub const DEFAULT_WORKERS: usize = 10;
/// Upper bound accepted for `workers`.
pub const MAX_WORKERS: usize = 512;
/// Thread name used for worker pool threads.
pub const WORKER_THREAD_NAME: &str = "shadowlink-worker";

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Default relay read buffer size per direction (16 KiB).
pub const DEFAULT_RELAY_BUFFER_SIZE: usize = 16 * 1024;
/// Smallest accepted relay buffer size.
pub const MIN_RELAY_BUFFER_SIZE: usize = 1024;
/// Largest accepted relay buffer size.
pub const MAX_RELAY_BUFFER_SIZE: usize = 1024 * 1024;
/// Default cap on client bytes buffered while the upstream dial is in flight.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1024 * 1024;

// ============================================================================
// TCP Socket Defaults
// ============================================================================

/// Default TCP_NODELAY (disable Nagle's algorithm for lower latency).
pub const DEFAULT_TCP_NO_DELAY: bool = true;
/// Default TCP Keep-Alive interval in seconds (0 = disabled).
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 60;
/// Prefer IPv4 addresses when resolving the remote server.
pub const DEFAULT_TCP_PREFER_IPV4: bool = false;
