//! Upstream connection establishment to the remote proxy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shadowlink_config::{Config, TcpConfig};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::ClientError;
use crate::resolve::{DnsResolver, parse_ip_literal};

/// A freshly dialed upstream connection.
#[derive(Debug)]
pub struct Upstream<S> {
    pub stream: S,
    /// Local address of the upstream socket, echoed in the SOCKS5 success reply.
    pub bound: SocketAddr,
}

/// Dials the configured remote proxy.
///
/// Implementations must be thread-safe (`Send + Sync`); one connector is
/// shared by every session.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self) -> Result<Upstream<Self::Stream>, ClientError>;
}

#[async_trait]
impl<K: UpstreamConnector + ?Sized> UpstreamConnector for Arc<K> {
    type Stream = K::Stream;

    #[inline]
    async fn connect(&self) -> Result<Upstream<Self::Stream>, ClientError> {
        (**self).connect().await
    }
}

/// Plain TCP connector to `server:server_port`.
#[derive(Debug)]
pub struct TcpConnector {
    host: String,
    port: u16,
    /// Only built when the server is a name rather than an IP literal.
    resolver: Option<DnsResolver>,
    tcp: TcpConfig,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16, tcp: TcpConfig) -> Result<Self, ClientError> {
        let host = host.into();
        let resolver = match parse_ip_literal(&host) {
            Some(_) => None,
            None => Some(DnsResolver::system(tcp.prefer_ipv4)?),
        };
        Ok(Self {
            host,
            port,
            resolver,
            tcp,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        Self::new(config.server.clone(), config.server_port, config.tcp.clone())
    }

    async fn resolve(&self) -> Result<SocketAddr, ClientError> {
        if let Some(ip) = parse_ip_literal(&self.host) {
            return Ok(SocketAddr::new(ip, self.port));
        }
        match &self.resolver {
            Some(resolver) => resolver.resolve(&self.host, self.port).await,
            None => Err(ClientError::Resolve(self.host.clone())),
        }
    }
}

#[async_trait]
impl UpstreamConnector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<Upstream<TcpStream>, ClientError> {
        let addr = self.resolve().await?;
        debug!(remote = %addr, "connecting to remote proxy");

        let stream = TcpStream::connect(addr).await?;
        apply_tcp_options(&stream, &self.tcp)?;
        let bound = stream.local_addr()?;

        Ok(Upstream { stream, bound })
    }
}

/// Apply TCP socket options.
fn apply_tcp_options(stream: &TcpStream, config: &TcpConfig) -> Result<(), ClientError> {
    stream.set_nodelay(config.no_delay)?;

    if config.keepalive_secs > 0 {
        let sock = socket2::SockRef::from(stream);
        let keepalive =
            socket2::TcpKeepalive::new().with_time(Duration::from_secs(config.keepalive_secs));
        sock.set_tcp_keepalive(&keepalive)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_ip_literal_and_reports_bound_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let connector = TcpConnector::new("127.0.0.1", port, TcpConfig::default()).unwrap();
        assert!(connector.resolver.is_none());

        let (upstream, accepted) = tokio::join!(connector.connect(), listener.accept());
        let upstream = upstream.unwrap();
        let (_server_side, client_addr) = accepted.unwrap();

        assert_eq!(upstream.bound, client_addr);
        assert!(upstream.stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn refused_dial_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = TcpConnector::new("127.0.0.1", port, TcpConfig::default()).unwrap();
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Io(_)), "{err:?}");
    }

    #[tokio::test]
    async fn nodelay_can_be_disabled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let tcp = TcpConfig {
            no_delay: false,
            keepalive_secs: 0,
            prefer_ipv4: false,
        };

        let connector = Arc::new(TcpConnector::new("127.0.0.1", port, tcp).unwrap());
        let (upstream, _) = tokio::join!(connector.connect(), listener.accept());
        assert!(!upstream.unwrap().stream.nodelay().unwrap());
    }
}
