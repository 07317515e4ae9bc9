//! Per-connection handling: SOCKS5 handshake, then hand the socket to a relay session.

use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use shadowlink_config::Config;
use shadowlink_crypto::{CipherFactory, CipherKind};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{Instrument, debug, info_span};

use crate::connector::{TcpConnector, UpstreamConnector};
use crate::error::{ClientError, Socks5Error};
use crate::relay::{ClientConnection, RelayConfig, RelaySession, SessionSummary};
use crate::socks5::handshake::{
    CMD_CONNECT, Socks5Request, negotiate_method, read_request, reply_code_for, send_failure,
};

/// State shared by every session of one listener.
pub struct ClientState<K> {
    pub factory: CipherFactory,
    pub connector: Arc<K>,
    pub relay: RelayConfig,
    next_id: AtomicU64,
}

impl<K> ClientState<K> {
    pub fn new(factory: CipherFactory, connector: K, relay: RelayConfig) -> Self {
        Self {
            factory,
            connector: Arc::new(connector),
            relay,
            next_id: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl ClientState<TcpConnector> {
    /// Derive the key and build the TCP connector from a validated config.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let kind: CipherKind = config.method.parse()?;
        let factory = CipherFactory::from_password(kind, &config.password);
        let connector = TcpConnector::from_config(config)?;
        Ok(Self::new(factory, connector, RelayConfig::from(config)))
    }
}

/// Handle a single SOCKS5 client connection.
pub async fn handle_socks5_conn<K>(mut stream: TcpStream, peer: SocketAddr, state: Arc<ClientState<K>>)
where
    K: UpstreamConnector,
{
    let request = match accept_connect(&mut stream).await {
        Ok(request) => request,
        Err(e) => {
            shadowlink_metrics::record_handshake_failure(e.label());
            debug!(peer = %peer, error = %e, "SOCKS5 handshake failed");
            return;
        }
    };

    let initial = match take_buffered(&stream, state.relay.buffer_size) {
        Ok(initial) => initial,
        Err(e) => {
            debug!(peer = %peer, error = %e, "client read failed after handshake");
            return;
        }
    };

    let cipher = match state.factory.create() {
        Ok(cipher) => cipher,
        Err(e) => {
            debug!(peer = %peer, error = %e, "cipher setup failed");
            return;
        }
    };

    let id = state.next_id();
    let span = info_span!("session", conn = id, peer = %peer, target = %request.address);
    let conn = ClientConnection::new(id, peer, Some(request.address), cipher);
    let session = RelaySession::new(conn, stream, Arc::clone(&state.connector), state.relay);

    // CONNECT completion counts as the first client event, even with no payload.
    let summary = session.run(Some(initial)).instrument(span).await;
    log_summary(&summary);
}

/// Negotiate NO AUTH and read a CONNECT request, rejecting anything else.
pub(crate) async fn accept_connect<S>(stream: &mut S) -> Result<Socks5Request, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    negotiate_method(stream).await?;

    let request = match read_request(stream).await {
        Ok(request) => request,
        Err(e @ Socks5Error::UnsupportedAddressType(_)) => {
            let _ = send_failure(stream, reply_code_for(&e)).await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    if request.command != CMD_CONNECT {
        let e = Socks5Error::UnsupportedCommand(request.command);
        let _ = send_failure(stream, reply_code_for(&e)).await;
        return Err(e);
    }

    Ok(request)
}

/// Grab whatever the client already sent behind the request, without waiting.
fn take_buffered(stream: &TcpStream, limit: usize) -> io::Result<Bytes> {
    let mut buf = vec![0u8; limit];
    match stream.try_read(&mut buf) {
        Ok(n) => {
            buf.truncate(n);
            Ok(Bytes::from(buf))
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(Bytes::new()),
        Err(e) => Err(e),
    }
}

fn log_summary(summary: &SessionSummary) {
    debug!(
        conn = summary.id,
        reason = summary.reason.error_type(),
        bytes_up = summary.bytes_up,
        bytes_down = summary.bytes_down,
        duration_ms = summary.duration.as_millis() as u64,
        "session finished"
    );
}
