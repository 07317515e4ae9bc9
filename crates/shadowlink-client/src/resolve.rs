//! Remote server name resolution backed by hickory-resolver.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use hickory_resolver::Resolver;
use hickory_resolver::name_server::TokioConnectionProvider;
use tracing::debug;

use crate::error::ClientError;

/// Shared async DNS resolver using the system configuration.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct DnsResolver {
    inner: Arc<Inner>,
}

struct Inner {
    resolver: Resolver<TokioConnectionProvider>,
    prefer_ipv4: bool,
}

impl std::fmt::Debug for DnsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsResolver")
            .field("prefer_ipv4", &self.inner.prefer_ipv4)
            .finish()
    }
}

impl DnsResolver {
    /// Build a resolver from `/etc/resolv.conf` (or the platform equivalent).
    pub fn system(prefer_ipv4: bool) -> Result<Self, ClientError> {
        let resolver = Resolver::builder_tokio()
            .map_err(|e| ClientError::Config(format!("system DNS config: {e}")))?
            .build();
        Ok(Self {
            inner: Arc::new(Inner {
                resolver,
                prefer_ipv4,
            }),
        })
    }

    /// Resolve `host` to a socket address. IP literals skip the lookup.
    pub async fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr, ClientError> {
        if let Some(ip) = parse_ip_literal(host) {
            return Ok(SocketAddr::new(ip, port));
        }

        let response = self
            .inner
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| ClientError::Resolve(format!("{host}: {e}")))?;

        let ip = if self.inner.prefer_ipv4 {
            response
                .iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| response.iter().next())
        } else {
            response.iter().next()
        };

        match ip {
            Some(ip) => {
                let sa = SocketAddr::new(ip, port);
                debug!(host = %host, resolved = %sa, "dns resolved");
                Ok(sa)
            }
            None => Err(ClientError::Resolve(host.to_string())),
        }
    }
}

/// Parse an IP literal, accepting the bracketed IPv6 form.
pub(crate) fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::parse_ip_literal;

    #[test]
    fn ip_literals() {
        assert_eq!(parse_ip_literal("127.0.0.1").unwrap().to_string(), "127.0.0.1");
        assert_eq!(parse_ip_literal("[::1]").unwrap().to_string(), "::1");
        assert_eq!(parse_ip_literal("2001:db8::1").unwrap().to_string(), "2001:db8::1");
        assert!(parse_ip_literal("proxy.example.com").is_none());
    }
}
