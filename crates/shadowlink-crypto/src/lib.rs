//! Stream cipher adapter for shadowlink tunnels.
//!
//! Every tunnel owns one [`StreamCipher`] instance. Outbound bytes go through
//! [`StreamCipher::encode`], which prefixes the very first output with a
//! random IV and then runs a single continuous keystream for the lifetime of
//! the connection. [`StreamCipher::decode`] is the symmetric inverse with its
//! own independent keystream position.
//!
//! # Example
//!
//! ```
//! use shadowlink_crypto::{CipherFactory, CipherKind};
//!
//! # fn example() -> Result<(), shadowlink_crypto::CipherError> {
//! let factory = CipherFactory::from_password(CipherKind::Aes128Cfb, "123456");
//! let mut cipher = factory.create()?;
//!
//! let wire = cipher.encode(b"hello");
//! assert_eq!(wire.len(), 16 + 5); // IV prefix + payload
//!
//! let mut peer = factory.create()?;
//! assert_eq!(&peer.decode(&wire)[..], b"hello");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod cfb;
mod error;
mod kdf;
mod kind;

pub use cfb::{Aes128Cfb, Aes192Cfb, Aes256Cfb, AesCfb, IV_LEN};
pub use error::CipherError;
pub use kdf::{Key, evp_bytes_to_key};
pub use kind::{CipherFactory, CipherKind};

use bytes::Bytes;

/// Stateful per-connection stream cipher.
///
/// `encode` and `decode` each advance their own keystream position by the
/// number of bytes processed. An instance must never be shared across
/// connections or reused after its connection closes.
pub trait StreamCipher: Send {
    /// Encrypt `plain`, continuing the outbound keystream.
    fn encode(&mut self, plain: &[u8]) -> Bytes;

    /// Decrypt `data`, continuing the inbound keystream.
    ///
    /// Returns an empty buffer while the peer IV is still incomplete.
    fn decode(&mut self, data: &[u8]) -> Bytes;

    /// The method this cipher implements.
    fn kind(&self) -> CipherKind;
}
