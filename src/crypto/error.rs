//! Cryptographic error types

use thiserror::Error;

/// Errors that can occur in key handling and signing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The provided key has an invalid length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },

    /// The provided signature has an invalid length
    #[error("Invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength {
        /// Expected signature length in bytes
        expected: usize,
        /// Actual signature length in bytes
        actual: usize,
    },

    /// Signature verification failed - the signature is invalid
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// The signing backend refused to produce a signature
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The key envelope could not be decoded
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// The key envelope names a key type this client cannot use
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(i32),

    /// The public key format is invalid
    #[error("Invalid public key format")]
    InvalidPublicKey,

    /// The secret key format is invalid
    #[error("Invalid secret key format")]
    InvalidSecretKey,

    /// A configured public key does not belong to the configured private key
    #[error("Configured public key does not match the private key")]
    KeyMismatch,
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
