//! Outbound frame construction.

use bytes::{Bytes, BytesMut};
use shadowlink_proto::write_address_header;

use crate::error::RelayError;
use crate::relay::context::ClientConnection;

/// Build and encrypt the next outbound frame for `payload`.
///
/// The first frame of a connection is `header || payload`; later frames are
/// the payload alone. Each frame goes through the cipher exactly once.
///
/// `first_packet_sent` flips as soon as the header has been written into the
/// frame buffer and stays set even if encryption below fails, so a header is
/// never sent twice.
pub fn encode_frame(conn: &mut ClientConnection, payload: &[u8]) -> Result<Bytes, RelayError> {
    let mut frame;
    if conn.first_packet_sent {
        frame = BytesMut::from(payload);
    } else {
        let destination = conn.destination().ok_or(RelayError::MissingDestination)?;
        frame = BytesMut::with_capacity(destination.header_len() + payload.len());
        write_address_header(&mut frame, &destination.as_address_ref())?;
        conn.first_packet_sent = true;
        frame.extend_from_slice(payload);
    }

    let cipher = conn.cipher_mut().ok_or_else(|| {
        RelayError::Transport(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "connection already released",
        ))
    })?;
    Ok(cipher.encode(&frame))
}
