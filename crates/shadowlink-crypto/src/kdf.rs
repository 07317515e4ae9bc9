//! Password-to-key derivation.

use md5::{Digest, Md5};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key material derived from the configured password.
///
/// Automatically zeroized when dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Key(Vec<u8>);

impl Key {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw key bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key(<{} bytes>)", self.0.len())
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5, one iteration and no salt.
///
/// `D_1 = MD5(password)`, `D_i = MD5(D_{i-1} || password)`; the key is the
/// first `key_len` bytes of `D_1 || D_2 || ...`.
pub fn evp_bytes_to_key(password: &[u8], key_len: usize) -> Key {
    let mut out = Vec::with_capacity(key_len + 16);
    let mut prev: Option<[u8; 16]> = None;

    while out.len() < key_len {
        let mut hasher = Md5::new();
        if let Some(p) = &prev {
            hasher.update(p);
        }
        hasher.update(password);
        let digest: [u8; 16] = hasher.finalize().into();
        out.extend_from_slice(&digest);
        prev = Some(digest);
    }

    out.truncate(key_len);
    Key(out)
}
