//! Upload session driver
//!
//! [`StorageClient`] walks an offline upload session against the coordinator:
//! start the upload, fetch unsigned work, sign it locally, and submit the
//! result. It holds no session state of its own; every call builds its
//! request from the arguments plus the configured identity.
//!
//! ```text
//!   upload_offline ──► session id
//!        │
//!        ├─► get_contract_batch ──► sign_batch ──► storage/upload/signcontractbatch
//!        │
//!        └─► get_unsigned_data  ──► sign / sign_balance / sign_pay_channel / sign_pay_request
//!                                          └─────────► storage/upload/sign
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DEFAULT_TIMEOUT;
use crate::contract::{sign_contracts, ContractVariant, Contracts};
use crate::crypto::{KeyMaterial, PrivateKey};
use crate::error::{Error, Result};
use crate::payment::{self, PaymentFlow, SignedArtifact, UnsignedData};
use crate::session::{unix_timestamp, SessionBinder};
use crate::transport::{Request, RequestExecutor, TransportError};

/// Start an online upload
pub const PATH_UPLOAD: &str = "storage/upload";
/// Start an offline-signed upload
pub const PATH_UPLOAD_OFFLINE: &str = "storage/upload/offline";
/// Query upload progress
pub const PATH_STATUS: &str = "storage/upload/status";
/// Fetch a contract batch
pub const PATH_GET_CONTRACT_BATCH: &str = "storage/upload/getcontractbatch";
/// Fetch unsigned payment data
pub const PATH_GET_UNSIGNED: &str = "storage/upload/getunsigned";
/// Submit a signed contract batch
pub const PATH_SIGN_CONTRACT_BATCH: &str = "storage/upload/signcontractbatch";
/// Submit a signed payment artifact
pub const PATH_SIGN: &str = "storage/upload/sign";

/// Options accepted when starting an upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOption {
    /// Upload mode (`m`)
    Mode(String),
    /// Comma-separated host ids (`s`)
    Hosts(String),
    /// Storage period in days (`storage-length`)
    StorageLength(u64),
}

impl UploadOption {
    fn apply(&self, request: Request) -> Request {
        match self {
            UploadOption::Mode(mode) => request.option("m", mode),
            UploadOption::Hosts(hosts) => request.option("s", hosts),
            UploadOption::StorageLength(days) => request.option("storage-length", days),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "ID")]
    id: String,
}

/// Per-shard progress of an upload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Shard {
    /// Contract negotiated for the shard
    #[serde(alias = "contractId", alias = "contract_id")]
    pub contract_id: String,
    /// Agreed price
    #[serde(alias = "price")]
    pub price: i64,
    /// Host peer id
    #[serde(alias = "host")]
    pub host: String,
    /// Shard status
    #[serde(alias = "status")]
    pub status: String,
}

/// Upload progress as reported by the coordinator
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Storage {
    /// Session status, e.g. `initSignReadyEscrow`
    #[serde(alias = "status")]
    pub status: String,
    /// Human readable detail
    #[serde(default, alias = "message")]
    pub message: String,
    /// Root hash of the uploaded file
    #[serde(default, alias = "fileHash", alias = "file_hash")]
    pub file_hash: String,
    /// Shards by shard hash
    #[serde(default, alias = "shards", deserialize_with = "null_as_default")]
    pub shards: HashMap<String, Shard>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identifies one offline upload session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSession {
    /// Session id returned by the upload call
    pub id: String,
    /// Hash of the uploaded file
    pub hash: String,
    /// Unix seconds sent as `uts` with every call of the session
    pub uts: String,
}

impl UploadSession {
    /// Session stamped with the current time
    pub fn new(id: impl Into<String>, hash: impl Into<String>) -> Self {
        Self::with_uts(id, hash, unix_timestamp())
    }

    /// Session with an explicit `uts`
    pub fn with_uts(id: impl Into<String>, hash: impl Into<String>, uts: impl Into<String>) -> Self {
        UploadSession {
            id: id.into(),
            hash: hash.into(),
            uts: uts.into(),
        }
    }
}

/// Client for the offline upload endpoints
pub struct StorageClient<E> {
    executor: E,
    keys: KeyMaterial,
    binder: SessionBinder,
    deadline: Duration,
}

impl<E: RequestExecutor> StorageClient<E> {
    /// Create a client with the default binder and deadline
    pub fn new(executor: E, keys: KeyMaterial) -> Self {
        StorageClient {
            executor,
            keys,
            binder: SessionBinder::default(),
            deadline: DEFAULT_TIMEOUT,
        }
    }

    /// Use a different session token policy
    pub fn with_binder(mut self, binder: SessionBinder) -> Self {
        self.binder = binder;
        self
    }

    /// Bound every coordinator call by `deadline`
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Identity requests are made under
    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    /// The underlying executor
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Start an online upload of `hash`, returning the session id
    pub async fn upload(&self, hash: &str, options: &[UploadOption]) -> Result<String> {
        let request = with_options(Request::new(PATH_UPLOAD).arg(hash), options);
        let response: UploadResponse = self.call_json(&request).await?;
        info!(session = %response.id, "upload started");
        Ok(response.id)
    }

    /// Start an offline-signed upload of `hash`, returning the session id
    pub async fn upload_offline(&self, hash: &str, uts: &str, options: &[UploadOption]) -> Result<String> {
        let token = self.binder.bind(self.keys.peer_id(), hash);
        let request = Request::new(PATH_UPLOAD_OFFLINE)
            .arg(hash)
            .arg(self.keys.peer_id())
            .arg(uts)
            .arg(&token.token);
        let response: UploadResponse = self.call_json(&with_options(request, options)).await?;
        info!(session = %response.id, "offline upload started");
        Ok(response.id)
    }

    /// Current status of upload `id`
    pub async fn upload_status(&self, id: &str) -> Result<Storage> {
        self.call_json(&Request::new(PATH_STATUS).arg(id)).await
    }

    /// Fetch the contract batch for `session_status`
    pub async fn get_contract_batch(&self, session: &UploadSession, session_status: &str) -> Result<Contracts> {
        let request = self.session_request(PATH_GET_CONTRACT_BATCH, session).arg(session_status);
        let batch: Contracts = self.call_json(&request).await?;
        debug!(items = batch.len(), session_status, "fetched contract batch");
        Ok(batch)
    }

    /// Fetch unsigned payment data for `session_status`
    pub async fn get_unsigned_data(&self, session: &UploadSession, session_status: &str) -> Result<UnsignedData> {
        let request = self.session_request(PATH_GET_UNSIGNED, session).arg(session_status);
        self.call_json(&request).await
    }

    /// Sign a contract batch and submit it
    ///
    /// Nothing is sent if any contract fails to sign.
    pub async fn sign_batch(
        &self,
        session: &UploadSession,
        contracts: &Contracts,
        session_status: &str,
    ) -> Result<Vec<u8>> {
        let key = self.private_key()?;
        let variant = ContractVariant::for_session_status(session_status);
        let signed = sign_contracts(contracts, key, variant)?;

        let request = self
            .session_request(PATH_SIGN_CONTRACT_BATCH, session)
            .arg(session_status)
            .arg(signed.to_submission()?);
        info!(session = %session.id, items = signed.len(), ?variant, "submitting signed batch");
        self.call(&request).await
    }

    /// Fetch a contract batch, sign it and submit it
    pub async fn sign_next_batch(&self, session: &UploadSession, session_status: &str) -> Result<Vec<u8>> {
        self.private_key()?;
        let batch = self.get_contract_batch(session, session_status).await?;
        self.sign_batch(session, &batch, session_status).await
    }

    /// Sign the payload text and submit the signature
    pub async fn sign(&self, session: &UploadSession, unsigned: &UnsignedData, session_status: &str) -> Result<Vec<u8>> {
        self.sign_payment(session, PaymentFlow::Data, unsigned, session_status)
            .await
    }

    /// Submit a balance attestation
    pub async fn sign_balance(
        &self,
        session: &UploadSession,
        unsigned: &UnsignedData,
        session_status: &str,
    ) -> Result<Vec<u8>> {
        self.sign_payment(session, PaymentFlow::Balance, unsigned, session_status)
            .await
    }

    /// Submit a channel commit of `total_price` to the escrow key in `unsigned`
    pub async fn sign_pay_channel(
        &self,
        session: &UploadSession,
        unsigned: &UnsignedData,
        session_status: &str,
        total_price: i64,
    ) -> Result<Vec<u8>> {
        self.sign_payment(
            session,
            PaymentFlow::PayChannel { total_price },
            unsigned,
            session_status,
        )
        .await
    }

    /// Submit a payin request built from the escrow result in `unsigned`
    pub async fn sign_pay_request(
        &self,
        session: &UploadSession,
        unsigned: &UnsignedData,
        session_status: &str,
    ) -> Result<Vec<u8>> {
        self.sign_payment(session, PaymentFlow::PayinRequest, unsigned, session_status)
            .await
    }

    /// Run a payment flow and submit its artifact
    ///
    /// The private key is checked before anything is parsed or sent.
    pub async fn sign_payment(
        &self,
        session: &UploadSession,
        flow: PaymentFlow,
        unsigned: &UnsignedData,
        session_status: &str,
    ) -> Result<Vec<u8>> {
        self.private_key()?;
        let token = self.binder.bind(self.keys.peer_id(), &session.hash);
        let artifact = payment::sign_payment(flow, unsigned, &self.keys, token.issued_at)?;
        self.submit(session, &token.token, &artifact, session_status, flow)
            .await
    }

    /// Fetch unsigned data, run `flow` over it and submit the artifact
    pub async fn sign_next_payment(
        &self,
        session: &UploadSession,
        flow: PaymentFlow,
        session_status: &str,
    ) -> Result<Vec<u8>> {
        self.private_key()?;
        let unsigned = self.get_unsigned_data(session, session_status).await?;
        self.sign_payment(session, flow, &unsigned, session_status)
            .await
    }

    async fn submit(
        &self,
        session: &UploadSession,
        token: &str,
        artifact: &SignedArtifact,
        session_status: &str,
        flow: PaymentFlow,
    ) -> Result<Vec<u8>> {
        let request = Request::new(PATH_SIGN)
            .arg(&session.id)
            .arg(self.keys.peer_id())
            .arg(&session.uts)
            .arg(token)
            .arg(artifact.payload())
            .arg(session_status);
        info!(session = %session.id, ?flow, artifact = ?artifact, "submitting signed artifact");
        self.call(&request).await
    }

    fn private_key(&self) -> Result<&PrivateKey> {
        self.keys.private_key().ok_or(Error::MissingKey)
    }

    /// `(id, peer id, uts, token)` prefix shared by the session endpoints
    fn session_request(&self, path: &str, session: &UploadSession) -> Request {
        let token = self.binder.bind(self.keys.peer_id(), &session.hash);
        Request::new(path)
            .arg(&session.id)
            .arg(self.keys.peer_id())
            .arg(&session.uts)
            .arg(token.token)
    }

    async fn call(&self, request: &Request) -> Result<Vec<u8>> {
        debug!(path = request.path(), "coordinator call");
        let body = tokio::time::timeout(self.deadline, self.executor.execute(request))
            .await
            .map_err(|_| TransportError::Timeout(self.deadline))??;
        Ok(body)
    }

    async fn call_json<T: DeserializeOwned>(&self, request: &Request) -> Result<T> {
        let body = self.call(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn with_options(request: Request, options: &[UploadOption]) -> Request {
    options.iter().fold(request, |request, option| option.apply(request))
}
