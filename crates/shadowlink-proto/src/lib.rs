//! Address header encoding for the shadowlink tunnel.
//!
//! The first encrypted frame of every tunnel starts with the destination the
//! remote proxy should dial:
//!
//! ```text
//! IPv4:   [0x01][4 bytes addr][2 bytes port]
//! Domain: [0x03][1 byte len][len bytes][2 bytes port]
//! IPv6:   [0x04][16 bytes addr][2 bytes port]
//! ```
//!
//! All integers are big-endian. The parser is zero-copy and incremental so a
//! receiving side (or a test harness) can feed it partial buffers.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use bytes::BytesMut;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

/// Maximum domain name length representable in the one-byte length field.
pub const MAX_DOMAIN_LEN: usize = 255;
/// Largest possible header: atyp + len + 255 domain bytes + port.
pub const MAX_HEADER_LEN: usize = 1 + 1 + MAX_DOMAIN_LEN + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    InvalidAtyp,
    InvalidDomainLen,
    NonAsciiDomain,
}

/// Errors that can occur when writing an address header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// Domain name exceeds maximum length (255 bytes).
    DomainTooLong,
    /// Domain name is empty.
    EmptyDomain,
    /// Domain name contains non-ASCII bytes (IDNA names must be punycoded first).
    NonAsciiDomain,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomainTooLong => write!(f, "domain longer than {MAX_DOMAIN_LEN} bytes"),
            Self::EmptyDomain => write!(f, "empty domain"),
            Self::NonAsciiDomain => write!(f, "domain is not ASCII"),
        }
    }
}

impl std::error::Error for WriteError {}

/// Parse result for incremental parsing.
///
/// - `Complete(T)` - parsing succeeded, contains the parsed value.
/// - `Incomplete(n)` - buffer too small; `n` is the **minimum total bytes** needed.
/// - `Invalid(e)` - malformed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult<T> {
    Complete(T),
    Incomplete(usize),
    Invalid(ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRef<'a> {
    Ipv4([u8; 4]),
    Ipv6([u8; 16]),
    Domain(&'a [u8]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRef<'a> {
    pub host: HostRef<'a>,
    pub port: u16,
}

/// Owned destination host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Domain(String),
}

/// Owned destination address as requested by the local application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: Host,
    pub port: u16,
}

impl Address {
    /// Build an address from a textual host.
    ///
    /// IPv4 and IPv6 literals (optionally bracketed) are classified as such;
    /// anything else is kept as a domain name.
    pub fn new(host: &str, port: u16) -> Self {
        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        let host = match bare.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => Host::Ipv4(ip),
            Ok(IpAddr::V6(ip)) => Host::Ipv6(ip),
            Err(_) => Host::Domain(host.to_string()),
        };
        Self { host, port }
    }

    /// Borrow as a wire-level address reference.
    pub fn as_address_ref(&self) -> AddressRef<'_> {
        let host = match &self.host {
            Host::Ipv4(ip) => HostRef::Ipv4(ip.octets()),
            Host::Ipv6(ip) => HostRef::Ipv6(ip.octets()),
            Host::Domain(d) => HostRef::Domain(d.as_bytes()),
        };
        AddressRef {
            host,
            port: self.port,
        }
    }

    /// Encoded header length for this address.
    pub fn header_len(&self) -> usize {
        match &self.host {
            Host::Ipv4(_) => 1 + 4 + 2,
            Host::Ipv6(_) => 1 + 16 + 2,
            Host::Domain(d) => 1 + 1 + d.len() + 2,
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        let host = match addr.ip() {
            IpAddr::V4(ip) => Host::Ipv4(ip),
            IpAddr::V6(ip) => Host::Ipv6(ip),
        };
        Self {
            host,
            port: addr.port(),
        }
    }
}

impl From<&AddressRef<'_>> for Address {
    fn from(addr: &AddressRef<'_>) -> Self {
        match addr.host {
            HostRef::Ipv4(ip) => Self {
                host: Host::Ipv4(Ipv4Addr::from(ip)),
                port: addr.port,
            },
            HostRef::Ipv6(ip) => Self {
                host: Host::Ipv6(Ipv6Addr::from(ip)),
                port: addr.port,
            },
            // A domain that spells an IP literal is classified as that literal.
            HostRef::Domain(d) => Self::new(&String::from_utf8_lossy(d), addr.port),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Ipv4(ip) => write!(f, "{ip}:{}", self.port),
            Host::Ipv6(ip) => write!(f, "[{ip}]:{}", self.port),
            Host::Domain(d) => write!(f, "{d}:{}", self.port),
        }
    }
}

/// Error parsing a `host:port` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError(pub String);

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid address: {}", self.0)
    }
}

impl std::error::Error for AddressParseError {}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(sa) = s.parse::<SocketAddr>() {
            return Ok(sa.into());
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressParseError(s.to_string()))?;
        if host.is_empty() || host.contains(':') {
            return Err(AddressParseError(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

/// Writes the address header to the buffer.
///
/// # Errors
/// - `EmptyDomain` if the domain is empty.
/// - `DomainTooLong` if the domain is longer than 255 bytes.
/// - `NonAsciiDomain` if the domain has any byte above 0x7F.
#[allow(clippy::cast_possible_truncation)]
pub fn write_address_header(buf: &mut BytesMut, address: &AddressRef<'_>) -> Result<(), WriteError> {
    if let HostRef::Domain(d) = &address.host {
        if d.is_empty() {
            return Err(WriteError::EmptyDomain);
        }
        if d.len() > MAX_DOMAIN_LEN {
            return Err(WriteError::DomainTooLong);
        }
        if !d.is_ascii() {
            return Err(WriteError::NonAsciiDomain);
        }
    }
    buf.extend_from_slice(&[address_atyp(address)]);
    match address.host {
        HostRef::Ipv4(ip) => buf.extend_from_slice(&ip),
        HostRef::Ipv6(ip) => buf.extend_from_slice(&ip),
        HostRef::Domain(domain) => {
            buf.extend_from_slice(&[domain.len() as u8]);
            buf.extend_from_slice(domain);
        }
    }
    buf.extend_from_slice(&address.port.to_be_bytes());
    Ok(())
}

/// Parses an address header from the start of `buf`.
///
/// On success returns the address and the number of header bytes consumed.
#[inline]
pub fn parse_address_header(buf: &[u8]) -> ParseResult<(AddressRef<'_>, usize)> {
    if buf.is_empty() {
        return ParseResult::Incomplete(1);
    }
    match parse_address(buf[0], &buf[1..]) {
        ParseResult::Complete((addr, len)) => ParseResult::Complete((addr, 1 + len)),
        ParseResult::Incomplete(n) => ParseResult::Incomplete(1 + n),
        ParseResult::Invalid(e) => ParseResult::Invalid(e),
    }
}

#[inline]
fn parse_address(atyp: u8, buf: &[u8]) -> ParseResult<(AddressRef<'_>, usize)> {
    match atyp {
        ATYP_IPV4 => {
            if buf.len() < 6 {
                return ParseResult::Incomplete(6);
            }
            let host = HostRef::Ipv4([buf[0], buf[1], buf[2], buf[3]]);
            let port = read_u16(&buf[4..6]);
            ParseResult::Complete((AddressRef { host, port }, 6))
        }
        ATYP_DOMAIN => {
            if buf.is_empty() {
                return ParseResult::Incomplete(1);
            }
            let len = buf[0] as usize;
            if len == 0 {
                return ParseResult::Invalid(ParseError::InvalidDomainLen);
            }
            let need = 1 + len + 2;
            if buf.len() < need {
                return ParseResult::Incomplete(need);
            }
            let domain = &buf[1..1 + len];
            if !domain.is_ascii() {
                return ParseResult::Invalid(ParseError::NonAsciiDomain);
            }
            let port = read_u16(&buf[1 + len..need]);
            ParseResult::Complete((
                AddressRef {
                    host: HostRef::Domain(domain),
                    port,
                },
                need,
            ))
        }
        ATYP_IPV6 => {
            if buf.len() < 18 {
                return ParseResult::Incomplete(18);
            }
            let mut ip = [0u8; 16];
            ip.copy_from_slice(&buf[0..16]);
            let port = read_u16(&buf[16..18]);
            ParseResult::Complete((
                AddressRef {
                    host: HostRef::Ipv6(ip),
                    port,
                },
                18,
            ))
        }
        _ => ParseResult::Invalid(ParseError::InvalidAtyp),
    }
}

#[inline]
fn address_atyp(address: &AddressRef<'_>) -> u8 {
    match address.host {
        HostRef::Ipv4(_) => ATYP_IPV4,
        HostRef::Ipv6(_) => ATYP_IPV6,
        HostRef::Domain(_) => ATYP_DOMAIN,
    }
}

#[inline]
fn read_u16(buf: &[u8]) -> u16 {
    debug_assert!(buf.len() >= 2, "read_u16 requires at least 2 bytes");
    u16::from_be_bytes([buf[0], buf[1]])
}

/// Length of the fixed-form SOCKS5 success reply.
pub const SOCKS5_REPLY_LEN: usize = 10;

/// Builds the "connection accepted" reply sent to the local client once the
/// upstream is up: `05 00 00 01 [IPv4] [port]`.
///
/// The reply always uses the IPv4 form; an IPv6 bound address is reported as
/// `0.0.0.0` with its port.
pub fn socks5_success_reply(bound: SocketAddr) -> [u8; SOCKS5_REPLY_LEN] {
    let ip = match bound.ip() {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => v6.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
    };
    let mut reply = [0u8; SOCKS5_REPLY_LEN];
    reply[..4].copy_from_slice(&[0x05, 0x00, 0x00, ATYP_IPV4]);
    reply[4..8].copy_from_slice(&ip.octets());
    reply[8..].copy_from_slice(&bound.port().to_be_bytes());
    reply
}
