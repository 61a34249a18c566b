//! Protocol messages exchanged with the coordinator
//!
//! Hand-written `prost` definitions for the ledger, escrow and guard schemas.
//! Field numbers and types mirror the coordinator's `.proto` files exactly;
//! a signature is only valid if both sides serialize identically.

use prost::{Message, Name};
use thiserror::Error;

macro_rules! impl_name {
    ($package:literal => $($message:ident),+ $(,)?) => {
        $(
            impl ::prost::Name for $message {
                const NAME: &'static str = stringify!($message);
                const PACKAGE: &'static str = $package;
            }
        )+
    };
}

pub mod escrow;
pub mod guard;
pub mod ledger;

/// Errors decoding a protocol message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Bytes do not parse as the expected message
    #[error("Failed to decode {message}: {reason}")]
    Decode {
        /// Fully qualified message name
        message: String,
        /// Decoder diagnostic
        reason: String,
    },

    /// Bytes parse, but re-encoding does not reproduce them
    ///
    /// Happens with unknown fields, duplicated fields, or a payload of a
    /// different message type that happens to share wire types.
    #[error("{message} is not canonical: {actual} bytes re-encode to {canonical}")]
    NonCanonical {
        /// Fully qualified message name
        message: String,
        /// Length of the received payload
        actual: usize,
        /// Length of the re-encoded payload
        canonical: usize,
    },

    /// A required sub-message is absent
    #[error("{message} is missing field {field}")]
    MissingField {
        /// Fully qualified message name
        message: String,
        /// Field name
        field: &'static str,
    },
}

/// Decode `bytes` as `M`, requiring the payload to be `M`'s canonical encoding
///
/// Signatures are computed over the canonical encoding, so accepting anything
/// else would sign bytes other than the ones the coordinator sent.
pub fn decode_exact<M: Message + Name + Default>(bytes: &[u8]) -> Result<M, SchemaError> {
    let message = M::decode(bytes).map_err(|e| SchemaError::Decode {
        message: M::full_name(),
        reason: e.to_string(),
    })?;

    let canonical = message.encode_to_vec();
    if canonical != bytes {
        return Err(SchemaError::NonCanonical {
            message: M::full_name(),
            actual: bytes.len(),
            canonical: canonical.len(),
        });
    }
    Ok(message)
}

/// Unwrap an optional sub-message
pub(crate) fn required<M: Name, T>(field: Option<T>, name: &'static str) -> Result<T, SchemaError> {
    field.ok_or_else(|| SchemaError::MissingField {
        message: M::full_name(),
        field: name,
    })
}

/// Require a scalar field to hold a non-default value
pub(crate) fn present<M: Name>(is_set: bool, name: &'static str) -> Result<(), SchemaError> {
    if is_set {
        Ok(())
    } else {
        Err(SchemaError::MissingField {
            message: M::full_name(),
            field: name,
        })
    }
}
