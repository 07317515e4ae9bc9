//! Cipher method registry.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::cfb::{Aes128Cfb, Aes192Cfb, Aes256Cfb};
use crate::kdf::{Key, evp_bytes_to_key};
use crate::{CipherError, StreamCipher};

/// Supported stream cipher methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherKind {
    Aes128Cfb,
    Aes192Cfb,
    Aes256Cfb,
}

impl CipherKind {
    pub const ALL: [CipherKind; 3] = [Self::Aes128Cfb, Self::Aes192Cfb, Self::Aes256Cfb];

    /// Canonical method name as used in config files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aes128Cfb => "aes-128-cfb",
            Self::Aes192Cfb => "aes-192-cfb",
            Self::Aes256Cfb => "aes-256-cfb",
        }
    }

    pub fn key_len(&self) -> usize {
        match self {
            Self::Aes128Cfb => 16,
            Self::Aes192Cfb => 24,
            Self::Aes256Cfb => 32,
        }
    }

    pub fn iv_len(&self) -> usize {
        crate::cfb::IV_LEN
    }

    /// Build a cipher with a random outbound IV.
    pub fn new_cipher(&self, key: Key) -> Result<Box<dyn StreamCipher>, CipherError> {
        Ok(match self {
            Self::Aes128Cfb => Box::new(Aes128Cfb::new(*self, key)?),
            Self::Aes192Cfb => Box::new(Aes192Cfb::new(*self, key)?),
            Self::Aes256Cfb => Box::new(Aes256Cfb::new(*self, key)?),
        })
    }

    /// Build a cipher with a fixed outbound IV.
    pub fn new_cipher_with_iv(
        &self,
        key: Key,
        iv: &[u8],
    ) -> Result<Box<dyn StreamCipher>, CipherError> {
        Ok(match self {
            Self::Aes128Cfb => Box::new(Aes128Cfb::with_iv(*self, key, iv)?),
            Self::Aes192Cfb => Box::new(Aes192Cfb::with_iv(*self, key, iv)?),
            Self::Aes256Cfb => Box::new(Aes256Cfb::with_iv(*self, key, iv)?),
        })
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CipherKind {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CipherError::UnknownMethod(s.to_string()))
    }
}

/// Creates one cipher per connection from a key derived once at startup.
///
/// Cheap to clone; the key is shared and zeroized when the last clone drops.
#[derive(Debug, Clone)]
pub struct CipherFactory {
    kind: CipherKind,
    key: Arc<Key>,
}

impl CipherFactory {
    pub fn new(kind: CipherKind, key: Key) -> Result<Self, CipherError> {
        if key.len() != kind.key_len() {
            return Err(CipherError::InvalidKeyLength {
                expected: kind.key_len(),
                actual: key.len(),
            });
        }
        Ok(Self {
            kind,
            key: Arc::new(key),
        })
    }

    /// Derive the key from a password with `EVP_BytesToKey`.
    pub fn from_password(kind: CipherKind, password: &str) -> Self {
        Self {
            kind,
            key: Arc::new(evp_bytes_to_key(password.as_bytes(), kind.key_len())),
        }
    }

    pub fn kind(&self) -> CipherKind {
        self.kind
    }

    /// Fresh cipher for a new connection.
    pub fn create(&self) -> Result<Box<dyn StreamCipher>, CipherError> {
        self.kind.new_cipher(Key::clone(&self.key))
    }

    /// Cipher with a fixed outbound IV (tests and diagnostics).
    pub fn create_with_iv(&self, iv: &[u8]) -> Result<Box<dyn StreamCipher>, CipherError> {
        self.kind.new_cipher_with_iv(Key::clone(&self.key), iv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_method_names() {
        assert_eq!("aes-128-cfb".parse::<CipherKind>().unwrap(), CipherKind::Aes128Cfb);
        assert_eq!("AES-256-CFB".parse::<CipherKind>().unwrap(), CipherKind::Aes256Cfb);
        assert!(matches!(
            "rc4-md5".parse::<CipherKind>(),
            Err(CipherError::UnknownMethod(_))
        ));
    }

    #[test]
    fn names_round_trip_through_display() {
        for kind in CipherKind::ALL {
            assert_eq!(kind.to_string().parse::<CipherKind>().unwrap(), kind);
        }
    }

    #[test]
    fn factory_ciphers_interoperate() {
        for kind in CipherKind::ALL {
            let factory = CipherFactory::from_password(kind, "123456");
            let mut tx = factory.create().unwrap();
            let mut rx = factory.create().unwrap();
            assert_eq!(tx.kind(), kind);

            let mut wire = tx.encode(b"first").to_vec();
            wire.extend_from_slice(&tx.encode(b" second"));
            assert_eq!(&rx.decode(&wire)[..], b"first second");
        }
    }

    #[test]
    fn factory_rejects_mismatched_key() {
        let err = CipherFactory::new(CipherKind::Aes192Cfb, Key::from_bytes(vec![1u8; 16]));
        assert!(matches!(err, Err(CipherError::InvalidKeyLength { expected: 24, .. })));
    }

    #[test]
    fn fixed_iv_ciphers_are_deterministic() {
        let factory = CipherFactory::from_password(CipherKind::Aes128Cfb, "pw");
        let iv = [7u8; 16];
        let mut a = factory.create_with_iv(&iv).unwrap();
        let mut b = factory.create_with_iv(&iv).unwrap();
        assert_eq!(a.encode(b"same"), b.encode(b"same"));
    }
}
