//! Local SOCKS5 front end (RFC 1928, NO AUTH + CONNECT only).

pub mod handshake;

pub use handshake::{Socks5Request, negotiate_method, read_request, send_failure, send_success};
