//! Cipher error types.

/// Errors from cipher construction.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("unknown cipher method: {0}")]
    UnknownMethod(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },
}
