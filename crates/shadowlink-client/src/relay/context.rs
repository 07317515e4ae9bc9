//! Per-connection state owned by the relay.

use std::net::SocketAddr;

use shadowlink_crypto::StreamCipher;
use shadowlink_proto::Address;

/// One accepted local connection.
///
/// Created when the SOCKS5 request completes and released by the teardown
/// path. Nothing here is shared with other sessions.
pub struct ClientConnection {
    id: u64,
    peer: SocketAddr,
    destination: Option<Address>,
    pub(crate) first_packet_sent: bool,
    cipher: Option<Box<dyn StreamCipher>>,
}

impl ClientConnection {
    pub fn new(
        id: u64,
        peer: SocketAddr,
        destination: Option<Address>,
        cipher: Box<dyn StreamCipher>,
    ) -> Self {
        Self {
            id,
            peer,
            destination,
            first_packet_sent: false,
            cipher: Some(cipher),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn destination(&self) -> Option<&Address> {
        self.destination.as_ref()
    }

    pub fn first_packet_sent(&self) -> bool {
        self.first_packet_sent
    }

    pub(crate) fn cipher_mut(&mut self) -> Option<&mut (dyn StreamCipher + 'static)> {
        self.cipher.as_deref_mut()
    }

    /// Drop the cipher and destination. Idempotent.
    pub(crate) fn release(&mut self) {
        self.cipher = None;
        self.destination = None;
    }

    pub fn is_released(&self) -> bool {
        self.cipher.is_none()
    }

    #[cfg(test)]
    pub(crate) fn drop_cipher(&mut self) {
        self.cipher = None;
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("destination", &self.destination)
            .field("first_packet_sent", &self.first_packet_sent)
            .field("cipher", &self.cipher.as_ref().map(|c| c.kind()))
            .finish()
    }
}
