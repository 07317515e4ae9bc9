//! Single close path for a session's sockets and state.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::relay::context::ClientConnection;

/// Owns both halves of a session so that only this type ever closes them.
///
/// `close` is idempotent: the first call shuts down the upstream (if any),
/// then the client, then releases the connection state. Later calls do
/// nothing.
#[derive(Debug)]
pub struct TeardownCoordinator<C, U> {
    client: Option<C>,
    upstream: Option<U>,
    closed: bool,
}

impl<C, U> TeardownCoordinator<C, U>
where
    C: AsyncWrite + Unpin,
    U: AsyncWrite + Unpin,
{
    pub fn new(client: C) -> Self {
        Self {
            client: Some(client),
            upstream: None,
            closed: false,
        }
    }

    /// Store the upstream. Hands it back if one is already attached or the
    /// session is closed.
    pub fn attach_upstream(&mut self, upstream: U) -> Result<(), U> {
        if self.closed || self.upstream.is_some() {
            return Err(upstream);
        }
        self.upstream = Some(upstream);
        Ok(())
    }

    #[cfg(test)]
    fn has_upstream(&self) -> bool {
        self.upstream.is_some()
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn client_mut(&mut self) -> Option<&mut C> {
        self.client.as_mut()
    }

    pub fn upstream_mut(&mut self) -> Option<&mut U> {
        self.upstream.as_mut()
    }

    /// Both streams at once, for the relay loop.
    pub fn streams_mut(&mut self) -> Option<(&mut C, &mut U)> {
        match (self.client.as_mut(), self.upstream.as_mut()) {
            (Some(c), Some(u)) => Some((c, u)),
            _ => None,
        }
    }

    /// Close the session. Returns `true` only for the call that did the work.
    pub async fn close(&mut self, conn: &mut ClientConnection, reason: &RelayError) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;

        if let Some(mut upstream) = self.upstream.take() {
            let _ = upstream.shutdown().await;
        }
        if let Some(mut client) = self.client.take() {
            let _ = client.shutdown().await;
        }
        conn.release();

        if reason.is_lifecycle() {
            debug!(conn = conn.id(), peer = %conn.peer(), reason = reason.error_type(), "session closed");
        } else {
            warn!(conn = conn.id(), peer = %conn.peer(), reason = reason.error_type(), error = %reason, "session closed");
        }
        true
    }
}
