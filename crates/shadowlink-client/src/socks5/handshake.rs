//! SOCKS5 handshake: method negotiation and request parsing (RFC 1928).

use std::net::SocketAddr;

use shadowlink_proto::{Address, ParseError, ParseResult, parse_address_header, socks5_success_reply};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Socks5Error;

const SOCKS5_VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

pub const CMD_CONNECT: u8 = 0x01;

/// SOCKS5 reply codes.
pub const REPLY_SUCCEEDED: u8 = 0x00;
pub const REPLY_GENERAL_FAILURE: u8 = 0x01;
pub const REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;
pub const REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// Parsed SOCKS5 request.
///
/// The request's `ATYP | DST.ADDR | DST.PORT` tail has the same layout as the
/// tunnel address header, so it is decoded with the same parser. A domain
/// that spells an IP literal comes out as that literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Request {
    pub command: u8,
    pub address: Address,
}

/// Perform SOCKS5 method negotiation (server side).
///
/// Accepts only NO AUTH; anything else gets `05 FF`.
pub async fn negotiate_method<S>(stream: &mut S) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 2];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|_| Socks5Error::Truncated)?;

    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::InvalidVersion(header[0]));
    }

    let mut methods = vec![0u8; header[1] as usize];
    stream
        .read_exact(&mut methods)
        .await
        .map_err(|_| Socks5Error::Truncated)?;

    if methods.contains(&METHOD_NO_AUTH) {
        stream
            .write_all(&[SOCKS5_VERSION, METHOD_NO_AUTH])
            .await
            .map_err(|_| Socks5Error::Truncated)?;
        Ok(())
    } else {
        let _ = stream
            .write_all(&[SOCKS5_VERSION, METHOD_NO_ACCEPTABLE])
            .await;
        Err(Socks5Error::NoAcceptableMethods)
    }
}

/// Read the SOCKS5 request after method negotiation.
pub async fn read_request<S>(stream: &mut S) -> Result<Socks5Request, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    // VER CMD RSV ATYP
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|_| Socks5Error::Truncated)?;

    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::InvalidVersion(header[0]));
    }

    let atyp = header[3];
    let mut buf = vec![atyp];
    loop {
        let need = match parse_address_header(&buf) {
            ParseResult::Complete((addr, _)) => {
                return Ok(Socks5Request {
                    command: header[1],
                    address: Address::from(&addr),
                });
            }
            ParseResult::Incomplete(need) => need,
            ParseResult::Invalid(ParseError::InvalidAtyp) => {
                return Err(Socks5Error::UnsupportedAddressType(atyp));
            }
            ParseResult::Invalid(_) => return Err(Socks5Error::MalformedAddress),
        };
        let have = buf.len();
        buf.resize(need, 0);
        stream
            .read_exact(&mut buf[have..])
            .await
            .map_err(|_| Socks5Error::Truncated)?;
    }
}

/// Send the success reply carrying `bound` in IPv4 form.
pub async fn send_success<S>(stream: &mut S, bound: SocketAddr) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&socks5_success_reply(bound)).await?;
    stream.flush().await
}

/// Send a failure reply with a zeroed bind address (0.0.0.0:0).
pub async fn send_failure<S>(stream: &mut S, reply: u8) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut frame = socks5_success_reply(SocketAddr::from(([0, 0, 0, 0], 0u16)));
    frame[1] = reply;
    stream.write_all(&frame).await
}

/// Reply code for a rejected request.
pub fn reply_code_for(error: &Socks5Error) -> u8 {
    match error {
        Socks5Error::UnsupportedCommand(_) => REPLY_COMMAND_NOT_SUPPORTED,
        Socks5Error::UnsupportedAddressType(_) => REPLY_ADDRESS_TYPE_NOT_SUPPORTED,
        _ => REPLY_GENERAL_FAILURE,
    }
}
