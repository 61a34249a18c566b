//! Crate-level error type
//!
//! Every failure is returned to the caller as-is; nothing here retries.

use thiserror::Error;

use crate::codec::CodecError;
use crate::crypto::CryptoError;
use crate::proto::SchemaError;
use crate::transport::TransportError;

/// Message reported whenever a signing flow runs without a private key
pub const MISSING_KEY_MESSAGE: &str =
    "private key not available in configuration file or environment variable";

/// Errors surfaced by the signing flows and the upload driver
#[derive(Error, Debug)]
pub enum Error {
    /// Bad base64 or text at the transport boundary
    #[error("Encoding error: {0}")]
    Encoding(#[from] CodecError),

    /// Payload is not the expected protocol message
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Key material could not be parsed or is inconsistent
    #[error("Key error: {0}")]
    Key(CryptoError),

    /// No private key is configured
    #[error("{}", MISSING_KEY_MESSAGE)]
    MissingKey,

    /// The signer failed to produce a signature
    #[error("Signing failed: {0}")]
    Sign(CryptoError),

    /// The coordinator could not be reached or rejected the call
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A JSON body could not be built or parsed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// One contract of a batch failed; the rest of the batch was not signed
    #[error("Contract {key:?}: {source}")]
    Contract {
        /// Key of the failing batch item
        key: String,
        /// What went wrong with it
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Innermost error, looking through per-contract context
    pub fn root(&self) -> &Error {
        match self {
            Error::Contract { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for signing and driver operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_message() {
        assert_eq!(Error::MissingKey.to_string(), MISSING_KEY_MESSAGE);
    }

    #[test]
    fn test_root_unwraps_contract_context() {
        let err = Error::Contract {
            key: "h1".to_string(),
            source: Box::new(Error::Encoding(CodecError::InvalidBase64("x".into()))),
        };
        assert!(matches!(err.root(), Error::Encoding(_)));
        assert!(err.to_string().starts_with("Contract \"h1\": Encoding error"));
    }
}
