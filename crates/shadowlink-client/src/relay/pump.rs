//! Poll-driven byte pumps for the two relay directions.
//!
//! Each direction is a small read → transform → write → flush state machine.
//! The session polls both from one future so a blocked write on one side
//! never stalls the other.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::RelayError;
use crate::relay::context::ClientConnection;
use crate::relay::framing::encode_frame;

/// What happens to bytes between read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    /// Client → upstream: framed and encrypted.
    Outbound,
    /// Upstream → client: forwarded as-is, or decrypted when `decode` is set.
    Inbound { decode: bool },
}

pub(crate) enum PumpState {
    Reading,
    Writing { frame: Bytes, pos: usize, read: usize },
    Flushing(usize),
}

/// Progress report from one poll.
pub(crate) enum PumpPoll {
    /// A chunk of `n` source bytes was fully written and flushed.
    Moved(usize),
    /// The source reached EOF.
    Eof,
}

pub(crate) fn poll_pump<R, W>(
    cx: &mut Context<'_>,
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
    state: &mut PumpState,
    conn: &mut ClientConnection,
    direction: Direction,
) -> Poll<Result<PumpPoll, RelayError>>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    loop {
        match state {
            PumpState::Reading => {
                let mut read_buf = ReadBuf::new(buf);
                match Pin::new(&mut *reader).poll_read(cx, &mut read_buf) {
                    Poll::Ready(Ok(())) => {
                        let data = read_buf.filled();
                        if data.is_empty() {
                            return Poll::Ready(Ok(PumpPoll::Eof));
                        }
                        let read = data.len();
                        let frame = transform(conn, direction, data)?;
                        if frame.is_empty() {
                            // Inbound decode still buffering the peer IV.
                            return Poll::Ready(Ok(PumpPoll::Moved(read)));
                        }
                        *state = PumpState::Writing {
                            frame,
                            pos: 0,
                            read,
                        };
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                    Poll::Pending => return Poll::Pending,
                }
            }
            PumpState::Writing { frame, pos, read } => {
                match Pin::new(&mut *writer).poll_write(cx, &frame[*pos..]) {
                    Poll::Ready(Ok(0)) => {
                        return Poll::Ready(Err(io::Error::from(io::ErrorKind::WriteZero).into()));
                    }
                    Poll::Ready(Ok(n)) => {
                        *pos += n;
                        if *pos >= frame.len() {
                            let read = *read;
                            *state = PumpState::Flushing(read);
                        }
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                    Poll::Pending => return Poll::Pending,
                }
            }
            PumpState::Flushing(read) => {
                let read = *read;
                match Pin::new(&mut *writer).poll_flush(cx) {
                    Poll::Ready(Ok(())) => {
                        *state = PumpState::Reading;
                        return Poll::Ready(Ok(PumpPoll::Moved(read)));
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                    Poll::Pending => return Poll::Pending,
                }
            }
        }
    }
}

fn transform(
    conn: &mut ClientConnection,
    direction: Direction,
    data: &[u8],
) -> Result<Bytes, RelayError> {
    match direction {
        Direction::Outbound => encode_frame(conn, data),
        Direction::Inbound { decode: false } => Ok(Bytes::copy_from_slice(data)),
        Direction::Inbound { decode: true } => match conn.cipher_mut() {
            Some(cipher) => Ok(cipher.decode(data)),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "connection already released").into()),
        },
    }
}
