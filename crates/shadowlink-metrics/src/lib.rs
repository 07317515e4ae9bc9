//! Metrics collection and Prometheus exporter for shadowlink.
//!
//! Recording functions go through the `metrics` facade, so they are no-ops
//! until [`init_prometheus`] installs a recorder.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
/// Returns an error message if binding fails.
pub fn init_prometheus(listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid metrics listen address: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install prometheus exporter: {}", e))?;

    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Total number of SOCKS5 sessions handed to the relay.
pub const SESSIONS_TOTAL: &str = "shadowlink_sessions_total";
/// Number of currently active sessions.
pub const SESSIONS_ACTIVE: &str = "shadowlink_sessions_active";
/// Total number of failed upstream dials.
pub const UPSTREAM_CONNECT_FAILURES_TOTAL: &str = "shadowlink_upstream_connect_failures_total";
/// Upstream dial duration histogram (seconds).
pub const UPSTREAM_CONNECT_DURATION_SECONDS: &str = "shadowlink_upstream_connect_duration_seconds";
/// Total plaintext bytes read from clients and sent upstream.
pub const BYTES_UPSTREAM_TOTAL: &str = "shadowlink_bytes_upstream_total";
/// Total bytes read from the upstream and written to clients.
pub const BYTES_DOWNSTREAM_TOTAL: &str = "shadowlink_bytes_downstream_total";
/// Session closes by reason label.
pub const SESSION_CLOSES_TOTAL: &str = "shadowlink_session_closes_total";
/// Session duration histogram (seconds).
pub const SESSION_DURATION_SECONDS: &str = "shadowlink_session_duration_seconds";
/// Total SOCKS5 handshakes rejected before the relay started.
pub const HANDSHAKE_FAILURES_TOTAL: &str = "shadowlink_handshake_failures_total";

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a session entering the relay core.
#[inline]
pub fn record_session_started() {
    counter!(SESSIONS_TOTAL).increment(1);
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Record a session torn down, labelled by close reason.
#[inline]
pub fn record_session_closed(reason: &'static str, duration_secs: f64) {
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
    counter!(SESSION_CLOSES_TOTAL, "reason" => reason).increment(1);
    histogram!(SESSION_DURATION_SECONDS).record(duration_secs);
}

/// Record a successful upstream dial.
#[inline]
pub fn record_upstream_connected(duration_secs: f64) {
    histogram!(UPSTREAM_CONNECT_DURATION_SECONDS).record(duration_secs);
}

/// Record a failed upstream dial.
#[inline]
pub fn record_upstream_connect_failure() {
    counter!(UPSTREAM_CONNECT_FAILURES_TOTAL).increment(1);
}

/// Record session byte totals.
#[inline]
pub fn record_session_bytes(upstream: u64, downstream: u64) {
    counter!(BYTES_UPSTREAM_TOTAL).increment(upstream);
    counter!(BYTES_DOWNSTREAM_TOTAL).increment(downstream);
}

/// Record a rejected SOCKS5 handshake.
#[inline]
pub fn record_handshake_failure(error_type: &'static str) {
    counter!(HANDSHAKE_FAILURES_TOTAL, "type" => error_type).increment(1);
}

// ============================================================================
// Error Type Constants (re-exported from shadowlink-core)
// ============================================================================

pub use shadowlink_core::{
    ERROR_CIPHER, ERROR_CONFIG, ERROR_HEADER, ERROR_IDLE_TIMEOUT, ERROR_MISSING_DESTINATION,
    ERROR_PEER_CLOSED, ERROR_RESOLVE, ERROR_SOCKS5, ERROR_TRANSPORT, ERROR_UPSTREAM_CONNECT,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_listen_address() {
        let err = init_prometheus("not-an-address").unwrap_err();
        assert!(err.contains("invalid metrics listen address"));
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_session_started();
        record_upstream_connected(0.01);
        record_session_bytes(10, 20);
        record_session_closed(ERROR_PEER_CLOSED, 1.5);
    }
}
