//! # offsign
//!
//! Offline signing client for paid storage uploads.
//!
//! A buyer uploads a file; the network negotiates storage contracts with
//! hosts and an escrow/guard service. The buyer's node may be offline, so
//! every signature the protocol needs is produced here, locally, over data
//! fetched from the coordinator and pushed back to it.
//!
//! ## Features
//!
//! - **Contract batches** signed as escrow contracts or guard contract metadata
//! - **Payment artifacts**: balance attestation, channel commit, payin request
//! - **Ed25519 and secp256k1** libp2p keys
//! - **Pluggable transport** (HTTP node API, scripted in-memory executor)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use offsign::{HttpExecutor, KeyMaterial, KeyType, StorageClient, UploadSession};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let keys = KeyMaterial::generate("QmBuyer", KeyType::Secp256k1)?;
//! let executor = HttpExecutor::new("http://127.0.0.1:5001", Duration::from_secs(60))?;
//! let client = StorageClient::new(executor, keys);
//!
//! let session = UploadSession::new("session-id", "QmFileHash");
//! client.sign_next_batch(&session, "initSignReadyEscrow").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                DRIVER LAYER                 │
//! │        StorageClient  |  offsign CLI        │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │               SIGNING LAYER                 │
//! │   Contract batches | Payment artifacts      │
//! │   Session binder                            │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │          CRYPTO / ENCODING LAYER            │
//! │  Ed25519 | secp256k1 | protobuf | base64    │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │             TRANSPORT LAYER                 │
//! │        HTTP node API | In-memory            │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod driver;
pub mod error;
pub mod payment;
pub mod proto;
pub mod session;
pub mod transport;

// Re-export main types at crate root
pub use codec::{CodecError, Encoding};
pub use config::{ClientConfig, ConfigError, IdentityConfig};
pub use contract::{sign_contracts, ContractItem, ContractVariant, Contracts};
pub use crypto::{CryptoError, KeyMaterial, KeyType, PrivateKey, PublicKey};
pub use driver::{Storage, StorageClient, UploadOption, UploadSession};
pub use error::{Error, Result};
pub use payment::{PaymentFlow, SignedArtifact, UnsignedData};
pub use session::{SessionBinder, TimeComponent};
pub use transport::{HttpExecutor, Request, RequestExecutor, TransportError};
