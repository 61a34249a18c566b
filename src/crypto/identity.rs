//! Local peer identity
//!
//! The key material every signing flow reads. It is built once from
//! configuration and passed by reference; nothing here is global.

use super::error::{CryptoError, CryptoResult};
use super::keys::{KeyType, PrivateKey, PublicKey};

/// Peer id plus the key pair used for offline signing
///
/// The private key may be absent (e.g. a watch-only setup). Every signing
/// entry point checks for it first.
#[derive(Clone, Debug)]
pub struct KeyMaterial {
    peer_id: String,
    public_key: Option<PublicKey>,
    private_key: Option<PrivateKey>,
}

impl KeyMaterial {
    /// Assemble key material, rejecting a public key that does not belong to
    /// the private key
    pub fn new(
        peer_id: impl Into<String>,
        public_key: Option<PublicKey>,
        private_key: Option<PrivateKey>,
    ) -> CryptoResult<Self> {
        if let (Some(public), Some(private)) = (&public_key, &private_key) {
            if *public != private.public_key() {
                return Err(CryptoError::KeyMismatch);
            }
        }

        Ok(KeyMaterial {
            peer_id: peer_id.into(),
            public_key,
            private_key,
        })
    }

    /// Key material backed by a private key, public key derived
    pub fn from_private_key(peer_id: impl Into<String>, private_key: PrivateKey) -> Self {
        KeyMaterial {
            peer_id: peer_id.into(),
            public_key: Some(private_key.public_key()),
            private_key: Some(private_key),
        }
    }

    /// Generate a new random identity
    pub fn generate(peer_id: impl Into<String>, key_type: KeyType) -> CryptoResult<Self> {
        Ok(Self::from_private_key(peer_id, PrivateKey::generate(key_type)?))
    }

    /// Peer id of this node
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Configured public key, or the one derived from the private key
    pub fn public_key(&self) -> Option<PublicKey> {
        self.public_key
            .or_else(|| self.private_key.as_ref().map(PrivateKey::public_key))
    }

    /// The private key, if configured
    ///
    /// # Security Warning
    /// Never log or transmit the returned key.
    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    /// Whether offline signing is possible with this material
    pub fn can_sign(&self) -> bool {
        self.private_key.is_some()
    }
}
