//! Contract batch signing
//!
//! The coordinator hands out contracts in batches: each item is a named,
//! base64-encoded protocol message. Which message type is expected depends on
//! the session status. Signing replaces every contract with the buyer's
//! detached signature over it.
//!
//! # Example
//!
//! ```rust
//! use offsign::contract::{ContractItem, Contracts, INIT_SIGN_READY_ESCROW};
//! use offsign::crypto::PrivateKey;
//! use offsign::proto::escrow::EscrowContract;
//! use prost::Message;
//! use base64::{engine::general_purpose::STANDARD, Engine};
//!
//! let key = PrivateKey::ed25519_from_seed(&[7u8; 32]);
//! let contract = EscrowContract {
//!     contract_id: "c1".into(),
//!     buyer_address: vec![2; 33],
//!     seller_address: vec![3; 33],
//!     amount: 100,
//!     ..Default::default()
//! };
//!
//! let batch = Contracts::new(vec![ContractItem::new("h1", STANDARD.encode(contract.encode_to_vec()))]);
//! let signed = batch.sign(&key, INIT_SIGN_READY_ESCROW).unwrap();
//!
//! let signature = STANDARD.decode(&signed.contracts[0].contract).unwrap();
//! assert!(key.public_key().verify_message(&contract, &signature).is_ok());
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::codec::{self, Encoding};
use crate::crypto::PrivateKey;
use crate::error::{Error, Result};
use crate::proto::escrow::EscrowContract;
use crate::proto::guard::ContractMeta;
use crate::proto::{decode_exact, present, SchemaError};

/// Session status under which batches carry escrow contracts
pub const INIT_SIGN_READY_ESCROW: &str = "initSignReadyEscrow";

/// One named contract of a batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractItem {
    /// Coordinator-assigned name (e.g. a shard hash)
    #[serde(alias = "Key")]
    pub key: String,
    /// Base64 contract payload, or base64 signature once signed
    #[serde(alias = "Contract")]
    pub contract: String,
}

impl ContractItem {
    /// Create a batch item
    pub fn new(key: impl Into<String>, contract: impl Into<String>) -> Self {
        ContractItem {
            key: key.into(),
            contract: contract.into(),
        }
    }
}

/// An ordered batch of contracts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contracts {
    /// Items, in coordinator order; the key must be present, `null` means none
    #[serde(rename = "Contracts", alias = "contracts", deserialize_with = "null_as_empty")]
    pub contracts: Vec<ContractItem>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<ContractItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ContractItem>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Which contract schema a batch carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractVariant {
    /// Escrow contracts, during the initial escrow negotiation
    Escrow,
    /// Guard contract metadata, in every other session status
    GuardMeta,
}

impl ContractVariant {
    /// Select the variant implied by a session status
    pub fn for_session_status(session_status: &str) -> Self {
        if session_status == INIT_SIGN_READY_ESCROW {
            ContractVariant::Escrow
        } else {
            ContractVariant::GuardMeta
        }
    }
}

/// A decoded contract of either variant
#[derive(Clone, Debug, PartialEq)]
pub enum ContractMessage {
    /// Escrow contract
    Escrow(EscrowContract),
    /// Guard contract metadata
    GuardMeta(ContractMeta),
}

impl ContractMessage {
    /// Decode `bytes` strictly as the given variant
    ///
    /// Beyond canonical decoding, each variant must carry the fields that
    /// define it. Guard metadata requires `rent_start`/`rent_end`, which sit
    /// on tags the escrow schema encodes as varints, so no escrow payload can
    /// pass as guard metadata and no complete guard payload decodes as escrow.
    pub fn decode(variant: ContractVariant, bytes: &[u8]) -> std::result::Result<Self, SchemaError> {
        match variant {
            ContractVariant::Escrow => {
                let contract: EscrowContract = decode_exact(bytes)?;
                check_escrow(&contract)?;
                Ok(ContractMessage::Escrow(contract))
            }
            ContractVariant::GuardMeta => {
                let meta: ContractMeta = decode_exact(bytes)?;
                check_guard_meta(&meta)?;
                Ok(ContractMessage::GuardMeta(meta))
            }
        }
    }

    /// Variant of this message
    pub fn variant(&self) -> ContractVariant {
        match self {
            ContractMessage::Escrow(_) => ContractVariant::Escrow,
            ContractMessage::GuardMeta(_) => ContractVariant::GuardMeta,
        }
    }

    /// Contract id carried by either variant
    pub fn contract_id(&self) -> &str {
        match self {
            ContractMessage::Escrow(contract) => &contract.contract_id,
            ContractMessage::GuardMeta(meta) => &meta.contract_id,
        }
    }

    /// Sign the canonical encoding of the message
    pub fn sign(&self, key: &PrivateKey) -> Result<Vec<u8>> {
        let signature = match self {
            ContractMessage::Escrow(contract) => key.sign_message(contract),
            ContractMessage::GuardMeta(meta) => key.sign_message(meta),
        };
        signature.map_err(Error::Sign)
    }
}

impl Contracts {
    /// Wrap items into a batch
    pub fn new(contracts: Vec<ContractItem>) -> Self {
        Contracts { contracts }
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Sign every contract for the given session status
    ///
    /// See [`sign_contracts`].
    pub fn sign(&self, key: &PrivateKey, session_status: &str) -> Result<Contracts> {
        sign_contracts(self, key, ContractVariant::for_session_status(session_status))
    }

    /// Decode every contract without signing
    pub fn decode(&self, variant: ContractVariant) -> Result<Vec<ContractMessage>> {
        self.contracts
            .iter()
            .map(|item| decode_item(item, variant).map_err(|e| with_key(item, e)))
            .collect()
    }

    /// JSON body submitted for a signed batch: the bare item array
    pub fn to_submission(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.contracts)?)
    }
}

fn check_escrow(contract: &EscrowContract) -> std::result::Result<(), SchemaError> {
    present::<EscrowContract>(!contract.buyer_address.is_empty(), "buyer_address")?;
    present::<EscrowContract>(!contract.seller_address.is_empty(), "seller_address")
}

fn check_guard_meta(meta: &ContractMeta) -> std::result::Result<(), SchemaError> {
    present::<ContractMeta>(!meta.renter_pid.is_empty(), "renter_pid")?;
    present::<ContractMeta>(!meta.host_pid.is_empty(), "host_pid")?;
    present::<ContractMeta>(!meta.shard_hash.is_empty(), "shard_hash")?;
    present::<ContractMeta>(meta.rent_start.is_some(), "rent_start")?;
    present::<ContractMeta>(meta.rent_end.is_some(), "rent_end")
}

fn decode_item(item: &ContractItem, variant: ContractVariant) -> Result<ContractMessage> {
    let bytes = codec::decode(&item.contract, Encoding::Base64)?;
    Ok(ContractMessage::decode(variant, &bytes)?)
}

fn sign_item(item: &ContractItem, key: &PrivateKey, variant: ContractVariant) -> Result<ContractItem> {
    let message = decode_item(item, variant)?;
    let signature = message.sign(key)?;
    debug!(key = %item.key, contract_id = message.contract_id(), "signed contract");

    Ok(ContractItem {
        key: item.key.clone(),
        contract: codec::encode(&signature, Encoding::Base64)?,
    })
}

fn with_key(item: &ContractItem, error: Error) -> Error {
    Error::Contract {
        key: item.key.clone(),
        source: Box::new(error),
    }
}

/// Sign a batch, returning a new batch of signatures
///
/// Each item is base64-decoded, decoded strictly as `variant`, and signed over
/// its canonical encoding; the signature replaces the contract. Keys and order
/// are preserved. The first failing item aborts the batch and is reported with
/// its key.
pub fn sign_contracts(
    contracts: &Contracts,
    key: &PrivateKey,
    variant: ContractVariant,
) -> Result<Contracts> {
    debug!(items = contracts.len(), ?variant, "signing contract batch");

    let signed = contracts
        .contracts
        .iter()
        .map(|item| sign_item(item, key, variant).map_err(|e| with_key(item, e)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Contracts::new(signed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyType;
    use prost::Message;
    use prost_types::Timestamp;

    fn escrow_contract(id: &str) -> EscrowContract {
        EscrowContract {
            contract_id: id.to_string(),
            buyer_address: vec![0x04, 0xff, 0xfe, 0x80, 0x81],
            seller_address: vec![0x04, 0xc3, 0x28],
            amount: 1_500,
            collateral_amount: 300,
            tokens_per_unit_per_time: 5,
            units_per_time: 30,
            payout_schedule: 1,
            num_payouts: 4,
            ..Default::default()
        }
    }

    fn guard_meta(id: &str) -> ContractMeta {
        ContractMeta {
            contract_id: id.to_string(),
            renter_pid: "QmRenter".to_string(),
            host_pid: "QmHost".to_string(),
            shard_hash: "QmShard".to_string(),
            shard_index: 2,
            shard_file_size: 4096,
            file_hash: "QmFile".to_string(),
            rent_start: Some(Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            }),
            rent_end: Some(Timestamp {
                seconds: 1_710_000_000,
                nanos: 0,
            }),
            guard_pid: "QmGuard".to_string(),
            escrow_pid: "QmEscrow".to_string(),
            price: 250,
            amount: 1_000,
            ..Default::default()
        }
    }

    fn item<M: Message>(key: &str, message: &M) -> ContractItem {
        ContractItem::new(
            key,
            codec::encode(&message.encode_to_vec(), Encoding::Base64).unwrap(),
        )
    }

    #[test]
    fn test_variant_selection() {
        assert_eq!(
            ContractVariant::for_session_status("initSignReadyEscrow"),
            ContractVariant::Escrow
        );
        assert_eq!(
            ContractVariant::for_session_status("initSignReadyGuard"),
            ContractVariant::GuardMeta
        );
        assert_eq!(ContractVariant::for_session_status(""), ContractVariant::GuardMeta);
    }

    #[test]
    fn test_escrow_batch_signatures_verify() {
        let key = PrivateKey::ed25519_from_seed(&[7u8; 32]);
        let contract = escrow_contract("c-1");
        let batch = Contracts::new(vec![item("h1", &contract)]);

        let signed = batch.sign(&key, INIT_SIGN_READY_ESCROW).unwrap();

        assert_eq!(signed.len(), 1);
        assert_eq!(signed.contracts[0].key, "h1");
        let signature = codec::decode(&signed.contracts[0].contract, Encoding::Base64).unwrap();
        assert!(key
            .public_key()
            .verify(&contract.encode_to_vec(), &signature)
            .is_ok());
    }

    #[test]
    fn test_guard_batch_preserves_keys_and_order() {
        let key = PrivateKey::generate(KeyType::Secp256k1).unwrap();
        let metas: Vec<ContractMeta> = (0..3).map(|i| guard_meta(&format!("g-{i}"))).collect();
        let batch = Contracts::new(
            metas
                .iter()
                .enumerate()
                .map(|(i, m)| item(&format!("shard-{i}"), m))
                .collect(),
        );

        let signed = batch.sign(&key, "initSignReadyGuard").unwrap();

        assert_eq!(signed.len(), batch.len());
        for ((before, after), meta) in batch.contracts.iter().zip(&signed.contracts).zip(&metas) {
            assert_eq!(before.key, after.key);
            assert_ne!(before.contract, after.contract);
            let signature = codec::decode(&after.contract, Encoding::Base64).unwrap();
            assert!(key.public_key().verify_message(meta, &signature).is_ok());
        }
    }

    #[test]
    fn test_input_batch_untouched() {
        let key = PrivateKey::ed25519_from_seed(&[1u8; 32]);
        let batch = Contracts::new(vec![item("h1", &escrow_contract("c"))]);
        let copy = batch.clone();

        let _ = batch.sign(&key, INIT_SIGN_READY_ESCROW).unwrap();
        assert_eq!(batch, copy);
    }

    #[test]
    fn test_guard_payload_under_escrow_status() {
        let key = PrivateKey::ed25519_from_seed(&[1u8; 32]);
        let batch = Contracts::new(vec![item("g", &guard_meta("g-1"))]);

        let err = batch.sign(&key, INIT_SIGN_READY_ESCROW).unwrap_err();
        assert!(matches!(err.root(), Error::Schema(_)));
    }

    #[test]
    fn test_escrow_payload_under_guard_status() {
        let key = PrivateKey::ed25519_from_seed(&[1u8; 32]);
        let batch = Contracts::new(vec![item("e", &escrow_contract("e-1"))]);

        let err = batch.sign(&key, "guardSignReady").unwrap_err();
        assert!(matches!(err.root(), Error::Schema(_)));
    }

    #[test]
    fn test_minimal_escrow_under_guard_status() {
        let key = PrivateKey::ed25519_from_seed(&[1u8; 32]);
        // Only tags whose wire types the guard schema shares
        let contract = EscrowContract {
            contract_id: "c-1".to_string(),
            amount: 2_000,
            num_payouts: 1,
            ..Default::default()
        };
        let batch = Contracts::new(vec![item("e", &contract)]);

        let err = batch.sign(&key, "initSignReadyGuard").unwrap_err();
        assert!(matches!(err.root(), Error::Schema(SchemaError::MissingField { .. })));
        assert!(batch.decode(ContractVariant::GuardMeta).is_err());
    }

    #[test]
    fn test_guard_meta_requires_rent_period() {
        let key = PrivateKey::ed25519_from_seed(&[1u8; 32]);
        let meta = ContractMeta {
            rent_end: None,
            ..guard_meta("g-1")
        };
        let batch = Contracts::new(vec![item("g", &meta)]);

        match batch.sign(&key, "initSignReadyGuard").unwrap_err().root() {
            Error::Schema(SchemaError::MissingField { field, .. }) => assert_eq!(*field, "rent_end"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_escrow_requires_addresses() {
        let key = PrivateKey::ed25519_from_seed(&[1u8; 32]);
        let contract = EscrowContract {
            seller_address: Vec::new(),
            ..escrow_contract("c-2")
        };
        let batch = Contracts::new(vec![item("e", &contract)]);

        match batch.sign(&key, INIT_SIGN_READY_ESCROW).unwrap_err().root() {
            Error::Schema(SchemaError::MissingField { field, .. }) => {
                assert_eq!(*field, "seller_address")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bad_item_aborts_batch_with_its_key() {
        let key = PrivateKey::ed25519_from_seed(&[1u8; 32]);
        let batch = Contracts::new(vec![
            item("ok", &escrow_contract("c-1")),
            ContractItem::new("broken", "%%% not base64 %%%"),
            item("never", &escrow_contract("c-3")),
        ]);

        match batch.sign(&key, INIT_SIGN_READY_ESCROW).unwrap_err() {
            Error::Contract { key, source } => {
                assert_eq!(key, "broken");
                assert!(matches!(*source, Error::Encoding(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_batch() {
        let key = PrivateKey::ed25519_from_seed(&[1u8; 32]);
        let signed = Contracts::default().sign(&key, INIT_SIGN_READY_ESCROW).unwrap();
        assert!(signed.is_empty());
    }

    #[test]
    fn test_decode_without_signing() {
        let batch = Contracts::new(vec![item("g", &guard_meta("g-9"))]);
        let decoded = batch.decode(ContractVariant::GuardMeta).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].variant(), ContractVariant::GuardMeta);
        assert_eq!(decoded[0].contract_id(), "g-9");
    }

    #[test]
    fn test_json_missing_keys_rejected() {
        assert!(serde_json::from_str::<Contracts>("{}").is_err());
        assert!(serde_json::from_str::<Contracts>(r#"{"Items":[]}"#).is_err());
        assert!(serde_json::from_str::<Contracts>(r#"{"Contracts":[{"key":"h1"}]}"#).is_err());
    }

    #[test]
    fn test_json_shapes() {
        let batch: Contracts =
            serde_json::from_str(r#"{"Contracts":[{"key":"h1","contract":"AAE="}]}"#).unwrap();
        assert_eq!(batch.contracts, vec![ContractItem::new("h1", "AAE=")]);

        let empty: Contracts = serde_json::from_str(r#"{"Contracts":null}"#).unwrap();
        assert!(empty.is_empty());

        let lower: Contracts =
            serde_json::from_str(r#"{"contracts":[{"key":"h1","contract":"AAE="}]}"#).unwrap();
        assert_eq!(lower, batch);
        let pascal: Contracts =
            serde_json::from_str(r#"{"Contracts":[{"Key":"h1","Contract":"AAE="}]}"#).unwrap();
        assert_eq!(pascal, batch);

        assert_eq!(
            batch.to_submission().unwrap(),
            r#"[{"key":"h1","contract":"AAE="}]"#
        );
    }
}
