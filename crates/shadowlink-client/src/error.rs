//! Client error types.

use std::fmt;
use std::io;

use shadowlink_core::errors::{
    ERROR_CIPHER, ERROR_CONFIG, ERROR_HEADER, ERROR_IDLE_TIMEOUT, ERROR_MISSING_DESTINATION,
    ERROR_PEER_CLOSED, ERROR_RESOLVE, ERROR_SOCKS5, ERROR_TRANSPORT, ERROR_UPSTREAM_CONNECT,
};
use shadowlink_crypto::CipherError;
use shadowlink_proto::WriteError;

/// Errors that can occur in the shadowlink client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("DNS resolution failed for {0}")]
    Resolve(String),

    #[error("SOCKS5 error: {0}")]
    Socks5(Socks5Error),

    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    /// Stable label for metrics and logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Io(_) => ERROR_TRANSPORT,
            Self::Resolve(_) => ERROR_RESOLVE,
            Self::Socks5(_) => ERROR_SOCKS5,
            Self::Cipher(_) => ERROR_CIPHER,
            Self::Config(_) => ERROR_CONFIG,
        }
    }
}

/// SOCKS5 protocol errors.
#[derive(Debug)]
pub enum Socks5Error {
    InvalidVersion(u8),
    NoAcceptableMethods,
    UnsupportedCommand(u8),
    UnsupportedAddressType(u8),
    MalformedAddress,
    Truncated,
}

impl fmt::Display for Socks5Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVersion(v) => write!(f, "invalid SOCKS version: 0x{v:02x}"),
            Self::NoAcceptableMethods => write!(f, "no acceptable authentication methods"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported command: 0x{c:02x}"),
            Self::UnsupportedAddressType(a) => write!(f, "unsupported address type: 0x{a:02x}"),
            Self::MalformedAddress => write!(f, "malformed destination address"),
            Self::Truncated => write!(f, "connection closed during handshake"),
        }
    }
}

impl std::error::Error for Socks5Error {}

impl Socks5Error {
    /// Metric label for a rejected handshake.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidVersion(_) => "invalid_version",
            Self::NoAcceptableMethods => "no_acceptable_methods",
            Self::UnsupportedCommand(_) => "unsupported_command",
            Self::UnsupportedAddressType(_) => "unsupported_address_type",
            Self::MalformedAddress => "malformed_address",
            Self::Truncated => "truncated",
        }
    }
}

impl From<Socks5Error> for ClientError {
    fn from(e: Socks5Error) -> Self {
        Self::Socks5(e)
    }
}

/// Why a relay session ended.
///
/// `PeerClosed` and `IdleTimeout` are ordinary lifecycle outcomes; the rest
/// are failures.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream connect failed: {0}")]
    UpstreamConnect(#[source] ClientError),

    #[error("no destination address for the first frame")]
    MissingDestination,

    #[error("destination cannot be encoded: {0}")]
    Header(#[from] WriteError),

    #[error("peer closed")]
    PeerClosed,

    #[error("idle timeout")]
    IdleTimeout,

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl RelayError {
    /// Stable label for metrics and logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UpstreamConnect(_) => ERROR_UPSTREAM_CONNECT,
            Self::MissingDestination => ERROR_MISSING_DESTINATION,
            Self::Header(_) => ERROR_HEADER,
            Self::PeerClosed => ERROR_PEER_CLOSED,
            Self::IdleTimeout => ERROR_IDLE_TIMEOUT,
            Self::Transport(_) => ERROR_TRANSPORT,
        }
    }

    /// True for normal session endings that are not worth a warning.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::PeerClosed | Self::IdleTimeout)
    }
}
