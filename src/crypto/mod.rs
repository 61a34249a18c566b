//! Cryptographic primitives for offline signing
//!
//! This module provides:
//! - `keys`: Ed25519 and Secp256k1 key pairs in their envelope encoding
//! - `identity`: the peer id and key pair handed to every signing flow

pub mod error;
pub mod identity;
pub mod keys;

// Re-export commonly used types
pub use error::{CryptoError, CryptoResult};
pub use identity::KeyMaterial;
pub use keys::{KeyEnvelope, KeyType, PrivateKey, PublicKey};
