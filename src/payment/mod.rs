//! Payment artifact signing
//!
//! The coordinator hands out one [`UnsignedData`] envelope per payment step.
//! Its `unsigned` field means something different for each step:
//!
//! | flow                  | `unsigned` holds                    | artifact sent back            |
//! |-----------------------|-------------------------------------|-------------------------------|
//! | [`sign_data`]         | text to sign                        | raw signature bytes           |
//! | [`sign_balance`]      | (unused)                            | base64 `SignedPublicKey`      |
//! | [`sign_channel_commit`] | base64 escrow public key envelope | base64 `SignedChannelCommit`  |
//! | [`sign_payin_request`] | `SignedSubmitContractResult` bytes | raw `SignedPayinRequest`      |
//!
//! Every flow checks for the private key before touching its input.

use prost::Message;
use serde::{Deserialize, Serialize};
use tracing::{debug, enabled, Level};

use crate::codec::{self, Encoding};
use crate::crypto::{KeyMaterial, PrivateKey, PublicKey};
use crate::error::{Error, Result};
use crate::proto::escrow::{PayinRequest, SignedPayinRequest, SignedSubmitContractResult, SubmitContractResult};
use crate::proto::ledger::{self, ChannelCommit, SignedChannelCommit, SignedPublicKey};
use crate::proto::{decode_exact, required};

/// Unsigned work fetched from the coordinator
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnsignedData {
    /// Payload to sign, interpretation depends on the flow
    #[serde(alias = "unsigned")]
    pub unsigned: String,
    /// Coordinator operation code (advisory)
    #[serde(default, alias = "opcode")]
    pub opcode: String,
    /// Coordinator price hint (advisory)
    #[serde(default, alias = "price")]
    pub price: i64,
}

/// How a signed artifact is carried in the submit request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactEncoding {
    /// Serialized bytes, base64 text
    Base64,
    /// Serialized bytes as-is
    RawBytes,
}

/// A signed artifact ready for submission
#[derive(Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    payload: Vec<u8>,
    encoding: ArtifactEncoding,
}

impl SignedArtifact {
    /// Artifact shipped as base64 text of `bytes`
    pub fn base64(bytes: &[u8]) -> Result<Self> {
        Ok(SignedArtifact {
            payload: codec::encode(bytes, Encoding::Base64)?.into_bytes(),
            encoding: ArtifactEncoding::Base64,
        })
    }

    /// Artifact shipped as the bytes themselves
    pub fn raw(bytes: Vec<u8>) -> Self {
        SignedArtifact {
            payload: bytes,
            encoding: ArtifactEncoding::RawBytes,
        }
    }

    /// Bytes placed in the submit request
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Transport encoding of the payload
    pub fn encoding(&self) -> ArtifactEncoding {
        self.encoding
    }

    /// The serialized artifact, with the transport encoding removed
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self.encoding {
            ArtifactEncoding::RawBytes => Ok(self.payload.clone()),
            ArtifactEncoding::Base64 => {
                let text = codec::encode(&self.payload, Encoding::Text)?;
                Ok(codec::decode(&text, Encoding::Base64)?)
            }
        }
    }
}

impl std::fmt::Debug for SignedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SignedArtifact({:?}, {} bytes)", self.encoding, self.payload.len())
    }
}

/// The four payment signing flows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentFlow {
    /// Plain detached signature over the payload text
    Data,
    /// Public-key attestation for balance queries
    Balance,
    /// Payment channel opening commitment
    PayChannel {
        /// Amount committed to the channel
        total_price: i64,
    },
    /// Escrow payin funding request
    PayinRequest,
}

/// Run `flow` over `unsigned`
///
/// `issued_at` is only used by [`PaymentFlow::PayChannel`].
pub fn sign_payment(
    flow: PaymentFlow,
    unsigned: &UnsignedData,
    keys: &KeyMaterial,
    issued_at: i64,
) -> Result<SignedArtifact> {
    match flow {
        PaymentFlow::Data => sign_data(unsigned, keys),
        PaymentFlow::Balance => sign_balance(keys),
        PaymentFlow::PayChannel { total_price } => {
            sign_channel_commit(unsigned, keys, total_price, issued_at)
        }
        PaymentFlow::PayinRequest => sign_payin_request(unsigned, keys),
    }
}

fn require_private_key(keys: &KeyMaterial) -> Result<&PrivateKey> {
    keys.private_key().ok_or(Error::MissingKey)
}

fn require_public_key(keys: &KeyMaterial) -> Result<PublicKey> {
    keys.public_key().ok_or(Error::MissingKey)
}

/// Address of a channel party: the full-width key encoding
pub fn channel_address(key: &PublicKey) -> Vec<u8> {
    key.raw_full()
}

/// Buyer address in a payin request: raw bytes of the private key's public half
pub fn payin_address(key: &PrivateKey) -> Vec<u8> {
    key.public_key().raw()
}

/// Sign the payload text itself
pub fn sign_data(unsigned: &UnsignedData, keys: &KeyMaterial) -> Result<SignedArtifact> {
    let key = require_private_key(keys)?;
    let message = codec::decode(&unsigned.unsigned, Encoding::Text)?;
    let signature = key.sign(&message).map_err(Error::Sign)?;
    Ok(SignedArtifact::raw(signature))
}

/// Build the buyer's signed public key
pub fn build_signed_public_key(keys: &KeyMaterial) -> Result<SignedPublicKey> {
    let key = require_private_key(keys)?;
    let public = ledger::PublicKey {
        key: key.public_key().raw(),
    };
    let signature = key.sign_message(&public).map_err(Error::Sign)?;

    Ok(SignedPublicKey {
        key: Some(public),
        signature,
    })
}

/// Attest the buyer's public key for a balance query
pub fn sign_balance(keys: &KeyMaterial) -> Result<SignedArtifact> {
    let signed = build_signed_public_key(keys)?;
    let artifact = SignedArtifact::base64(&signed.encode_to_vec())?;

    if enabled!(Level::DEBUG) {
        let roundtrip: SignedPublicKey = decode_exact(&artifact.to_bytes()?)?;
        debug!(?roundtrip, "balance attestation");
    }
    Ok(artifact)
}

/// Build the buyer's signed channel commit towards the escrow in `unsigned`
pub fn build_channel_commit(
    unsigned: &UnsignedData,
    keys: &KeyMaterial,
    total_price: i64,
    issued_at: i64,
) -> Result<SignedChannelCommit> {
    let key = require_private_key(keys)?;

    let escrow_bytes = codec::decode(&unsigned.unsigned, Encoding::Base64)?;
    let escrow_key = PublicKey::from_bytes(&escrow_bytes).map_err(Error::Key)?;
    let buyer_key = require_public_key(keys)?;

    let channel = ChannelCommit {
        payer: Some(ledger::PublicKey {
            key: channel_address(&buyer_key),
        }),
        recipient: Some(ledger::PublicKey {
            key: channel_address(&escrow_key),
        }),
        amount: total_price,
        payer_id: issued_at,
    };
    let signature = key.sign_message(&channel).map_err(Error::Sign)?;
    debug!(amount = total_price, payer_id = issued_at, "signed channel commit");

    Ok(SignedChannelCommit {
        channel: Some(channel),
        signature,
    })
}

/// Open a payment channel to the escrow
pub fn sign_channel_commit(
    unsigned: &UnsignedData,
    keys: &KeyMaterial,
    total_price: i64,
    issued_at: i64,
) -> Result<SignedArtifact> {
    let signed = build_channel_commit(unsigned, keys, total_price, issued_at)?;
    SignedArtifact::base64(&signed.encode_to_vec())
}

/// Build the buyer's signed payin request from the escrow's submit result
///
/// The buyer's channel state is counter-signed as received and the signature
/// stored in its `from_signature` before the state is embedded in the request.
pub fn build_payin_request(unsigned: &UnsignedData, keys: &KeyMaterial) -> Result<SignedPayinRequest> {
    let key = require_private_key(keys)?;

    let bytes = codec::decode(&unsigned.unsigned, Encoding::Text)?;
    let envelope: SignedSubmitContractResult = decode_exact(&bytes)?;
    let result = required::<SignedSubmitContractResult, _>(envelope.result, "result")?;
    let mut channel_state =
        required::<SubmitContractResult, _>(result.buyer_channel_state, "buyer_channel_state")?;

    channel_state.from_signature = key.sign_message(&channel_state).map_err(Error::Sign)?;

    let request = PayinRequest {
        payin_id: result.payin_id,
        buyer_address: payin_address(key),
        buyer_channel_state: Some(channel_state),
    };
    let buyer_signature = key.sign_message(&request).map_err(Error::Sign)?;
    debug!(payin_id = request.payin_id, "signed payin request");

    Ok(SignedPayinRequest {
        request: Some(request),
        buyer_signature,
    })
}

/// Fund the escrow payin
pub fn sign_payin_request(unsigned: &UnsignedData, keys: &KeyMaterial) -> Result<SignedArtifact> {
    let signed = build_payin_request(unsigned, keys)?;
    Ok(SignedArtifact::raw(signed.encode_to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyType;
    use crate::proto::ledger::{Account, ChannelId, ChannelState, SignedChannelState};

    fn buyer() -> KeyMaterial {
        KeyMaterial::from_private_key(
            "QmBuyer",
            PrivateKey::secp256k1_from_slice(&[0x21; 32]).unwrap(),
        )
    }

    fn watch_only() -> KeyMaterial {
        KeyMaterial::new("QmBuyer", Some(buyer().public_key().unwrap()), None).unwrap()
    }

    fn escrow_key() -> PrivateKey {
        PrivateKey::secp256k1_from_slice(&[0x42; 32]).unwrap()
    }

    fn escrow_unsigned() -> UnsignedData {
        UnsignedData {
            unsigned: escrow_key().public_key().to_base64(),
            opcode: "PayChannel".to_string(),
            price: 999,
        }
    }

    fn channel_state() -> SignedChannelState {
        SignedChannelState {
            channel: Some(ChannelState {
                id: Some(ChannelId { id: 77 }),
                sequence: 3,
                from: Some(Account {
                    address: Some(ledger::PublicKey { key: vec![0x61; 33] }),
                    balance: 50,
                }),
                to: Some(Account {
                    address: Some(ledger::PublicKey { key: vec![0x62; 33] }),
                    balance: 100,
                }),
            }),
            from_signature: Vec::new(),
            to_signature: Vec::new(),
        }
    }

    // Submit results arrive in a JSON text field; every byte of this fixture is ASCII.
    fn payin_unsigned(payin_id: i64) -> UnsignedData {
        let result = SignedSubmitContractResult {
            result: Some(SubmitContractResult {
                payin_id,
                buyer_channel_state: Some(channel_state()),
            }),
            escrow_signature: b"escrow-signature".to_vec(),
        };
        UnsignedData {
            unsigned: String::from_utf8(result.encode_to_vec()).unwrap(),
            opcode: "PayinRequest".to_string(),
            price: 0,
        }
    }

    #[test]
    fn test_every_flow_requires_private_key() {
        let keys = watch_only();
        // Garbage input: the key check must come first
        let garbage = UnsignedData {
            unsigned: "%%%".to_string(),
            ..Default::default()
        };

        for flow in [
            PaymentFlow::Data,
            PaymentFlow::Balance,
            PaymentFlow::PayChannel { total_price: 1 },
            PaymentFlow::PayinRequest,
        ] {
            let err = sign_payment(flow, &garbage, &keys, 1).unwrap_err();
            assert!(matches!(err, Error::MissingKey), "{flow:?}: {err}");
        }
    }

    #[test]
    fn test_sign_data_signs_text_bytes() {
        let keys = buyer();
        let unsigned = UnsignedData {
            unsigned: "dGhpcyBpcyBub3QgZGVjb2RlZA==".to_string(),
            ..Default::default()
        };

        let artifact = sign_data(&unsigned, &keys).unwrap();

        assert_eq!(artifact.encoding(), ArtifactEncoding::RawBytes);
        let public = keys.public_key().unwrap();
        assert!(public.verify(unsigned.unsigned.as_bytes(), artifact.payload()).is_ok());
    }

    #[test]
    fn test_balance_attestation() {
        let keys = buyer();
        let artifact = sign_balance(&keys).unwrap();
        assert_eq!(artifact.encoding(), ArtifactEncoding::Base64);

        let signed: SignedPublicKey = decode_exact(&artifact.to_bytes().unwrap()).unwrap();
        let attested = signed.key.unwrap();
        let public = keys.public_key().unwrap();

        assert_eq!(attested.key, public.raw());
        assert!(public.verify_message(&attested, &signed.signature).is_ok());
    }

    #[test]
    fn test_channel_commit_fields() {
        let keys = buyer();
        let signed = build_channel_commit(&escrow_unsigned(), &keys, 1000, 1_700_000_000_123).unwrap();
        let channel = signed.channel.clone().unwrap();

        assert_eq!(channel.amount, 1000);
        assert_eq!(channel.payer_id, 1_700_000_000_123);
        assert_eq!(
            channel.payer.unwrap().key,
            channel_address(&keys.public_key().unwrap())
        );
        assert_eq!(
            channel.recipient.unwrap().key,
            channel_address(&escrow_key().public_key())
        );
        assert_eq!(channel_address(&escrow_key().public_key()).len(), 65);

        let public = keys.public_key().unwrap();
        assert!(public
            .verify_message(signed.channel.as_ref().unwrap(), &signed.signature)
            .is_ok());
    }

    #[test]
    fn test_channel_commit_ignores_price_hint() {
        let signed = build_channel_commit(&escrow_unsigned(), &buyer(), 5, 1).unwrap();
        assert_eq!(signed.channel.unwrap().amount, 5);
    }

    #[test]
    fn test_channel_commit_deterministic_for_fixed_inputs() {
        let keys = buyer();
        let a = sign_channel_commit(&escrow_unsigned(), &keys, 1000, 10).unwrap();
        let b = sign_channel_commit(&escrow_unsigned(), &keys, 1000, 10).unwrap();
        assert_eq!(a, b);

        let c = build_channel_commit(&escrow_unsigned(), &keys, 1000, 11).unwrap();
        let d = build_channel_commit(&escrow_unsigned(), &keys, 1000, 12).unwrap();
        assert_ne!(c.channel.unwrap().payer_id, d.channel.unwrap().payer_id);
    }

    #[test]
    fn test_channel_commit_artifact_is_base64() {
        let artifact = sign_channel_commit(&escrow_unsigned(), &buyer(), 1000, 10).unwrap();
        let text = std::str::from_utf8(artifact.payload()).unwrap();
        let bytes = codec::decode(text, Encoding::Base64).unwrap();
        let decoded: SignedChannelCommit = decode_exact(&bytes).unwrap();
        assert_eq!(decoded.channel.unwrap().amount, 1000);
    }

    #[test]
    fn test_channel_commit_rejects_bad_escrow_key() {
        let not_base64 = UnsignedData {
            unsigned: "***".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_channel_commit(&not_base64, &buyer(), 1, 1),
            Err(Error::Encoding(_))
        ));

        let not_a_key = UnsignedData {
            unsigned: codec::encode(b"garbage", Encoding::Base64).unwrap(),
            ..Default::default()
        };
        assert!(matches!(
            build_channel_commit(&not_a_key, &buyer(), 1, 1),
            Err(Error::Key(_))
        ));
    }

    #[test]
    fn test_ed25519_addresses_match_raw() {
        let keys = KeyMaterial::generate("QmEd", KeyType::Ed25519).unwrap();
        let signed = build_channel_commit(&escrow_unsigned(), &keys, 1, 1).unwrap();
        assert_eq!(
            signed.channel.unwrap().payer.unwrap().key,
            keys.public_key().unwrap().raw()
        );
    }

    #[test]
    fn test_payin_request() {
        let keys = buyer();
        let signed = build_payin_request(&payin_unsigned(42), &keys).unwrap();
        let request = signed.request.clone().unwrap();
        let public = keys.public_key().unwrap();

        assert_eq!(request.payin_id, 42);
        assert_eq!(request.buyer_address, payin_address(keys.private_key().unwrap()));
        assert_eq!(request.buyer_address.len(), 33);

        // fromSignature covers the state as received
        let mut state = request.buyer_channel_state.clone().unwrap();
        let from_signature = std::mem::take(&mut state.from_signature);
        assert!(!from_signature.is_empty());
        assert_eq!(state, channel_state());
        assert!(public.verify_message(&state, &from_signature).is_ok());

        assert!(public
            .verify_message(&request, &signed.buyer_signature)
            .is_ok());
    }

    #[test]
    fn test_payin_artifact_is_raw_bytes() {
        let artifact = sign_payin_request(&payin_unsigned(1), &buyer()).unwrap();
        assert_eq!(artifact.encoding(), ArtifactEncoding::RawBytes);

        let decoded: SignedPayinRequest = decode_exact(artifact.payload()).unwrap();
        assert_eq!(decoded.request.unwrap().payin_id, 1);
    }

    #[test]
    fn test_payin_missing_channel_state() {
        let result = SignedSubmitContractResult {
            result: Some(SubmitContractResult {
                payin_id: 9,
                buyer_channel_state: None,
            }),
            escrow_signature: Vec::new(),
        };
        let unsigned = UnsignedData {
            unsigned: String::from_utf8(result.encode_to_vec()).unwrap(),
            ..Default::default()
        };

        let err = build_payin_request(&unsigned, &buyer()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert!(err.to_string().contains("buyer_channel_state"));
    }

    #[test]
    fn test_payin_rejects_corrupt_result() {
        let unsigned = UnsignedData {
            unsigned: "not a protobuf message at all".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_payin_request(&unsigned, &buyer()),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_unsigned_data_json() {
        let data: UnsignedData =
            serde_json::from_str(r#"{"Unsigned":"abc","Opcode":"op","Price":12}"#).unwrap();
        assert_eq!(data.unsigned, "abc");
        assert_eq!(data.opcode, "op");
        assert_eq!(data.price, 12);

        let partial: UnsignedData = serde_json::from_str(r#"{"Unsigned":"x"}"#).unwrap();
        assert_eq!(partial.price, 0);

        let lower: UnsignedData =
            serde_json::from_str(r#"{"unsigned":"abc","opcode":"op","price":12}"#).unwrap();
        assert_eq!(lower, data);
    }

    #[test]
    fn test_unsigned_data_requires_payload() {
        let err = serde_json::from_str::<UnsignedData>(r#"{"Opcode":"op","Price":12}"#).unwrap_err();
        assert!(err.to_string().contains("Unsigned"));
        assert!(serde_json::from_str::<UnsignedData>("{}").is_err());
    }
}
