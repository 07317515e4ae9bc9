//! AES in full-block CFB mode over a continuous stream.

use aes::cipher::{BlockCipher, BlockEncryptMut, KeyInit, KeyIvInit};
use bytes::{BufMut, Bytes, BytesMut};
use cfb_mode::{BufDecryptor, BufEncryptor};
use rand::RngCore;

use crate::kdf::Key;
use crate::{CipherError, CipherKind, StreamCipher};

/// IV length for every AES-CFB method (one AES block).
pub const IV_LEN: usize = 16;

pub type Aes128Cfb = AesCfb<aes::Aes128>;
pub type Aes192Cfb = AesCfb<aes::Aes192>;
pub type Aes256Cfb = AesCfb<aes::Aes256>;

/// AES-CFB stream cipher with an IV-prefixed outbound stream.
///
/// The outbound IV is written in front of the first `encode` output only.
/// The inbound side expects the peer's IV as the first 16 bytes it sees.
pub struct AesCfb<C>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    kind: CipherKind,
    key: Key,
    encryptor: BufEncryptor<C>,
    enc_iv: Option<[u8; IV_LEN]>,
    decryptor: Option<BufDecryptor<C>>,
    dec_iv: Vec<u8>,
}

impl<C> AesCfb<C>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    /// Create a cipher with a fresh random outbound IV.
    pub(crate) fn new(kind: CipherKind, key: Key) -> Result<Self, CipherError> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);
        Self::with_iv(kind, key, &iv)
    }

    /// Create a cipher with an explicit outbound IV.
    pub(crate) fn with_iv(kind: CipherKind, key: Key, iv: &[u8]) -> Result<Self, CipherError> {
        if key.len() != kind.key_len() {
            return Err(CipherError::InvalidKeyLength {
                expected: kind.key_len(),
                actual: key.len(),
            });
        }
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| CipherError::InvalidIvLength {
            expected: IV_LEN,
            actual: iv.len(),
        })?;
        let encryptor = BufEncryptor::<C>::new_from_slices(key.as_bytes(), &iv).map_err(|_| {
            CipherError::InvalidKeyLength {
                expected: kind.key_len(),
                actual: key.len(),
            }
        })?;

        Ok(Self {
            kind,
            key,
            encryptor,
            enc_iv: Some(iv),
            decryptor: None,
            dec_iv: Vec::with_capacity(IV_LEN),
        })
    }
}

impl<C> StreamCipher for AesCfb<C>
where
    C: BlockEncryptMut + BlockCipher + KeyInit + Send,
{
    fn encode(&mut self, plain: &[u8]) -> Bytes {
        let prefix = self.enc_iv.take();
        let mut out = BytesMut::with_capacity(plain.len() + prefix.map_or(0, |_| IV_LEN));
        if let Some(iv) = prefix {
            out.put_slice(&iv);
        }
        let start = out.len();
        out.put_slice(plain);
        self.encryptor.encrypt(&mut out[start..]);
        out.freeze()
    }

    fn decode(&mut self, mut data: &[u8]) -> Bytes {
        if self.decryptor.is_none() {
            let need = IV_LEN - self.dec_iv.len();
            let take = need.min(data.len());
            self.dec_iv.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.dec_iv.len() < IV_LEN {
                return Bytes::new();
            }
            // Key length was checked at construction.
            match BufDecryptor::<C>::new_from_slices(self.key.as_bytes(), &self.dec_iv) {
                Ok(dec) => self.decryptor = Some(dec),
                Err(_) => return Bytes::new(),
            }
        }

        let mut out = BytesMut::from(data);
        if let Some(dec) = self.decryptor.as_mut() {
            dec.decrypt(&mut out);
        }
        out.freeze()
    }

    fn kind(&self) -> CipherKind {
        self.kind
    }
}
