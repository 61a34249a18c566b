//! Peer key pairs
//!
//! Keys travel as a protobuf envelope `{Type, Data}`, usually base64 encoded in
//! configuration. Two key types are understood: Ed25519 and Secp256k1.
//! Secp256k1 signatures are ECDSA over SHA-256, DER encoded.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use prost::Message;
use rand::rngs::OsRng;
use secp256k1::{ecdsa, SECP256K1};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::error::{CryptoError, CryptoResult};

/// Size of an Ed25519 public key in bytes
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 seed in bytes
pub const ED25519_SEED_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Size of a Secp256k1 secret key in bytes
pub const SECP256K1_SECRET_KEY_SIZE: usize = 32;

/// Key algorithm tag carried in the envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum KeyType {
    /// RSA (not supported for signing here)
    Rsa = 0,
    /// Ed25519
    Ed25519 = 1,
    /// Secp256k1
    Secp256k1 = 2,
    /// NIST ECDSA (not supported for signing here)
    Ecdsa = 3,
}

/// Serialized form of a public or private key
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyEnvelope {
    /// Algorithm, see [`KeyType`]
    #[prost(enumeration = "KeyType", tag = "1")]
    pub key_type: i32,
    /// Algorithm-specific key bytes
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

fn open_envelope(bytes: &[u8]) -> CryptoResult<(KeyType, Vec<u8>)> {
    let envelope =
        KeyEnvelope::decode(bytes).map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let key_type = KeyType::try_from(envelope.key_type)
        .map_err(|_| CryptoError::UnsupportedKeyType(envelope.key_type))?;
    Ok((key_type, envelope.data))
}

fn seal_envelope(key_type: KeyType, data: Vec<u8>) -> Vec<u8> {
    KeyEnvelope {
        key_type: key_type as i32,
        data,
    }
    .encode_to_vec()
}

fn decode_base64(s: &str) -> CryptoResult<Vec<u8>> {
    BASE64
        .decode(s.trim())
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))
}

/// A public key belonging to a peer
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PublicKey {
    /// Ed25519 verifying key
    Ed25519(VerifyingKey),
    /// Secp256k1 point
    Secp256k1(secp256k1::PublicKey),
}

impl PublicKey {
    /// Decode from envelope bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let (key_type, data) = open_envelope(bytes)?;
        match key_type {
            KeyType::Ed25519 => {
                let raw: [u8; ED25519_PUBLIC_KEY_SIZE] =
                    data.as_slice()
                        .try_into()
                        .map_err(|_| CryptoError::InvalidKeyLength {
                            expected: ED25519_PUBLIC_KEY_SIZE,
                            actual: data.len(),
                        })?;
                VerifyingKey::from_bytes(&raw)
                    .map(PublicKey::Ed25519)
                    .map_err(|_| CryptoError::InvalidPublicKey)
            }
            KeyType::Secp256k1 => secp256k1::PublicKey::from_slice(&data)
                .map(PublicKey::Secp256k1)
                .map_err(|_| CryptoError::InvalidPublicKey),
            other => Err(CryptoError::UnsupportedKeyType(other as i32)),
        }
    }

    /// Decode from base64 envelope text
    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        Self::from_bytes(&decode_base64(s)?)
    }

    /// Encode into envelope bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        seal_envelope(self.key_type(), self.raw())
    }

    /// Encode into base64 envelope text
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }

    /// Algorithm of this key
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Ed25519(_) => KeyType::Ed25519,
            PublicKey::Secp256k1(_) => KeyType::Secp256k1,
        }
    }

    /// Raw key bytes: 32 for Ed25519, 33 (compressed) for Secp256k1
    pub fn raw(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(key) => key.to_bytes().to_vec(),
            PublicKey::Secp256k1(key) => key.serialize().to_vec(),
        }
    }

    /// Full-width key bytes: 32 for Ed25519, 65 (uncompressed) for Secp256k1
    pub fn raw_full(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(key) => key.to_bytes().to_vec(),
            PublicKey::Secp256k1(key) => key.serialize_uncompressed().to_vec(),
        }
    }

    /// Convert to hex string of the raw key
    pub fn to_hex(&self) -> String {
        hex::encode(self.raw())
    }

    /// Verify a detached signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        match self {
            PublicKey::Ed25519(key) => {
                let bytes: [u8; ED25519_SIGNATURE_SIZE] =
                    signature
                        .try_into()
                        .map_err(|_| CryptoError::InvalidSignatureLength {
                            expected: ED25519_SIGNATURE_SIZE,
                            actual: signature.len(),
                        })?;
                key.verify(message, &Signature::from_bytes(&bytes))
                    .map_err(|_| CryptoError::SignatureVerificationFailed)
            }
            PublicKey::Secp256k1(key) => {
                let sig = ecdsa::Signature::from_der(signature)
                    .map_err(|_| CryptoError::SignatureVerificationFailed)?;
                let digest = secp256k1_digest(message)?;
                SECP256K1
                    .verify_ecdsa(&digest, &sig, key)
                    .map_err(|_| CryptoError::SignatureVerificationFailed)
            }
        }
    }

    /// Verify a detached signature over the canonical encoding of `message`
    pub fn verify_message<M: Message>(&self, message: &M, signature: &[u8]) -> CryptoResult<()> {
        self.verify(&message.encode_to_vec(), signature)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({:?}, {}...)", self.key_type(), &self.to_hex()[..16])
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A private signing key
///
/// Secret material is wiped when the key is dropped.
#[derive(Clone)]
pub enum PrivateKey {
    /// Ed25519 signing key
    Ed25519(SigningKey),
    /// Secp256k1 scalar
    Secp256k1(secp256k1::SecretKey),
}

impl PrivateKey {
    /// Generate a new random key
    pub fn generate(key_type: KeyType) -> CryptoResult<Self> {
        match key_type {
            KeyType::Ed25519 => Ok(PrivateKey::Ed25519(SigningKey::generate(&mut OsRng))),
            KeyType::Secp256k1 => Ok(PrivateKey::Secp256k1(secp256k1::SecretKey::new(
                &mut OsRng,
            ))),
            other => Err(CryptoError::UnsupportedKeyType(other as i32)),
        }
    }

    /// Create an Ed25519 key from a seed (deterministic generation)
    pub fn ed25519_from_seed(seed: &[u8; ED25519_SEED_SIZE]) -> Self {
        PrivateKey::Ed25519(SigningKey::from_bytes(seed))
    }

    /// Create a Secp256k1 key from its 32-byte scalar
    pub fn secp256k1_from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SECP256K1_SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SECP256K1_SECRET_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        secp256k1::SecretKey::from_slice(bytes)
            .map(PrivateKey::Secp256k1)
            .map_err(|_| CryptoError::InvalidSecretKey)
    }

    /// Decode from envelope bytes
    ///
    /// Ed25519 data is `seed || public` (64 bytes), or the older 96-byte form
    /// with the public half repeated. The public half must match the seed.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let (key_type, mut data) = open_envelope(bytes)?;
        let key = match key_type {
            KeyType::Ed25519 => ed25519_from_envelope_data(&data),
            KeyType::Secp256k1 => Self::secp256k1_from_slice(&data),
            other => Err(CryptoError::UnsupportedKeyType(other as i32)),
        };
        data.zeroize();
        key
    }

    /// Decode from base64 envelope text
    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        let mut bytes = decode_base64(s)?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Encode into envelope bytes
    ///
    /// WARNING: This exposes the secret key. Handle with extreme care.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PrivateKey::Ed25519(key) => {
                let mut data = Vec::with_capacity(ED25519_SEED_SIZE + ED25519_PUBLIC_KEY_SIZE);
                data.extend_from_slice(&key.to_bytes());
                data.extend_from_slice(key.verifying_key().as_bytes());
                seal_envelope(KeyType::Ed25519, data)
            }
            PrivateKey::Secp256k1(key) => {
                seal_envelope(KeyType::Secp256k1, key.secret_bytes().to_vec())
            }
        }
    }

    /// Encode into base64 envelope text
    pub fn to_base64(&self) -> String {
        let mut bytes = self.to_bytes();
        let text = BASE64.encode(&bytes);
        bytes.zeroize();
        text
    }

    /// Algorithm of this key
    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Ed25519(_) => KeyType::Ed25519,
            PrivateKey::Secp256k1(_) => KeyType::Secp256k1,
        }
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
            PrivateKey::Secp256k1(key) => PublicKey::Secp256k1(key.public_key(SECP256K1)),
        }
    }

    /// Produce a detached signature over `message`
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        match self {
            PrivateKey::Ed25519(key) => key
                .try_sign(message)
                .map(|sig| sig.to_bytes().to_vec())
                .map_err(|e| CryptoError::SigningFailed(e.to_string())),
            PrivateKey::Secp256k1(key) => {
                let digest = secp256k1_digest(message)?;
                Ok(SECP256K1.sign_ecdsa(&digest, key).serialize_der().to_vec())
            }
        }
    }

    /// Produce a detached signature over the canonical encoding of `message`
    pub fn sign_message<M: Message>(&self, message: &M) -> CryptoResult<Vec<u8>> {
        self.sign(&message.encode_to_vec())
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        // SigningKey wipes itself
        if let PrivateKey::Secp256k1(key) = self {
            key.non_secure_erase();
        }
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({:?}, <redacted>)", self.key_type())
    }
}

fn ed25519_from_envelope_data(data: &[u8]) -> CryptoResult<PrivateKey> {
    let full = ED25519_SEED_SIZE + ED25519_PUBLIC_KEY_SIZE;
    if data.len() != full && data.len() != full + ED25519_PUBLIC_KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: full,
            actual: data.len(),
        });
    }

    let mut seed = [0u8; ED25519_SEED_SIZE];
    seed.copy_from_slice(&data[..ED25519_SEED_SIZE]);
    let signing_key = SigningKey::from_bytes(&seed);
    seed.zeroize();

    if signing_key.verifying_key().as_bytes()[..] != data[ED25519_SEED_SIZE..full] {
        return Err(CryptoError::InvalidSecretKey);
    }
    Ok(PrivateKey::Ed25519(signing_key))
}

fn secp256k1_digest(message: &[u8]) -> CryptoResult<secp256k1::Message> {
    let digest = Sha256::digest(message);
    secp256k1::Message::from_digest_slice(&digest)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secp_key(fill: u8) -> PrivateKey {
        PrivateKey::secp256k1_from_slice(&[fill; 32]).unwrap()
    }

    #[test]
    fn test_ed25519_sign_verify() {
        let key = PrivateKey::ed25519_from_seed(&[7u8; 32]);
        let signature = key.sign(b"storage contract").unwrap();

        assert_eq!(signature.len(), ED25519_SIGNATURE_SIZE);
        assert!(key.public_key().verify(b"storage contract", &signature).is_ok());
        assert_eq!(
            key.public_key().verify(b"storage contracT", &signature),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_secp256k1_sign_verify() {
        let key = secp_key(0x11);
        let signature = key.sign(b"channel commit").unwrap();

        assert!(key.public_key().verify(b"channel commit", &signature).is_ok());
        assert!(key.public_key().verify(b"channel commix", &signature).is_err());
    }

    #[test]
    fn test_signatures_are_deterministic() {
        for key in [PrivateKey::ed25519_from_seed(&[1u8; 32]), secp_key(0x22)] {
            assert_eq!(key.sign(b"same").unwrap(), key.sign(b"same").unwrap());
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let signer = secp_key(0x01);
        let other = secp_key(0x02);
        let signature = signer.sign(b"payin").unwrap();
        assert!(other.public_key().verify(b"payin", &signature).is_err());
    }

    #[test]
    fn test_private_key_envelope_roundtrip() {
        for key in [
            PrivateKey::generate(KeyType::Ed25519).unwrap(),
            PrivateKey::generate(KeyType::Secp256k1).unwrap(),
        ] {
            let restored = PrivateKey::from_base64(&key.to_base64()).unwrap();
            assert_eq!(restored.key_type(), key.key_type());
            assert_eq!(restored.public_key(), key.public_key());
        }
    }

    #[test]
    fn test_public_key_envelope_roundtrip() {
        let public = secp_key(0x33).public_key();
        let restored = PublicKey::from_base64(&public.to_base64()).unwrap();
        assert_eq!(restored, public);
    }

    #[test]
    fn test_raw_encodings() {
        let secp = secp_key(0x44).public_key();
        assert_eq!(secp.raw().len(), 33);
        assert_eq!(secp.raw_full().len(), 65);
        assert_eq!(secp.raw_full()[0], 0x04);

        let ed = PrivateKey::ed25519_from_seed(&[9u8; 32]).public_key();
        assert_eq!(ed.raw(), ed.raw_full());
        assert_eq!(ed.raw().len(), ED25519_PUBLIC_KEY_SIZE);
    }

    #[test]
    fn test_ed25519_envelope_with_mismatched_public_half() {
        let key = PrivateKey::ed25519_from_seed(&[5u8; 32]);
        let other = PrivateKey::ed25519_from_seed(&[6u8; 32]);

        let mut data = [5u8; 32].to_vec();
        data.extend_from_slice(&other.public_key().raw());
        let envelope = seal_envelope(KeyType::Ed25519, data);

        assert_eq!(
            PrivateKey::from_bytes(&envelope).unwrap_err(),
            CryptoError::InvalidSecretKey
        );
        assert!(PrivateKey::from_bytes(&key.to_bytes()).is_ok());
    }

    #[test]
    fn test_legacy_ed25519_envelope_accepted() {
        let key = PrivateKey::ed25519_from_seed(&[8u8; 32]);
        let mut data = [8u8; 32].to_vec();
        data.extend_from_slice(&key.public_key().raw());
        data.extend_from_slice(&key.public_key().raw());

        let restored = PrivateKey::from_bytes(&seal_envelope(KeyType::Ed25519, data)).unwrap();
        assert_eq!(restored.public_key(), key.public_key());
    }

    #[test]
    fn test_unsupported_key_type() {
        let envelope = seal_envelope(KeyType::Ecdsa, vec![1, 2, 3]);
        assert_eq!(
            PublicKey::from_bytes(&envelope).unwrap_err(),
            CryptoError::UnsupportedKeyType(KeyType::Ecdsa as i32)
        );
    }

    #[test]
    fn test_malformed_base64_key() {
        assert!(matches!(
            PrivateKey::from_base64("not base64!"),
            Err(CryptoError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_ed25519_signature_length_checked() {
        let key = PrivateKey::ed25519_from_seed(&[3u8; 32]).public_key();
        assert_eq!(
            key.verify(b"msg", &[0u8; 10]),
            Err(CryptoError::InvalidSignatureLength {
                expected: ED25519_SIGNATURE_SIZE,
                actual: 10
            })
        );
    }
}
