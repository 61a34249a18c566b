//! Ledger schema: account keys and payment channels

/// An account address on the ledger
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublicKey {
    /// Raw key bytes
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

/// A key signed by its owner, used to authorize balance queries
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedPublicKey {
    /// The attested key
    #[prost(message, optional, tag = "1")]
    pub key: Option<PublicKey>,
    /// Owner's signature over `key`
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

/// Commitment to open a payment channel
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelCommit {
    /// Paying account
    #[prost(message, optional, tag = "1")]
    pub payer: Option<PublicKey>,
    /// Receiving account
    #[prost(message, optional, tag = "2")]
    pub recipient: Option<PublicKey>,
    /// Amount locked in the channel
    #[prost(int64, tag = "3")]
    pub amount: i64,
    /// Payer-chosen nonce, unix nanoseconds
    #[prost(int64, tag = "4")]
    pub payer_id: i64,
}

/// A channel commit signed by the payer
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedChannelCommit {
    /// The commitment
    #[prost(message, optional, tag = "1")]
    pub channel: Option<ChannelCommit>,
    /// Payer's signature over `channel`
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

/// Ledger-assigned channel identifier
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelId {
    /// Channel number
    #[prost(int64, tag = "1")]
    pub id: i64,
}

/// One side of a channel
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Account {
    /// Account address
    #[prost(message, optional, tag = "1")]
    pub address: Option<PublicKey>,
    /// Balance held in the channel
    #[prost(int64, tag = "2")]
    pub balance: i64,
}

/// Balances of a channel at a given sequence number
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelState {
    /// Channel identifier
    #[prost(message, optional, tag = "1")]
    pub id: Option<ChannelId>,
    /// Monotonic state counter
    #[prost(int64, tag = "2")]
    pub sequence: i64,
    /// Payer side
    #[prost(message, optional, tag = "3")]
    pub from: Option<Account>,
    /// Payee side
    #[prost(message, optional, tag = "4")]
    pub to: Option<Account>,
}

/// Channel state with the signatures of both sides
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedChannelState {
    /// The state
    #[prost(message, optional, tag = "1")]
    pub channel: Option<ChannelState>,
    /// Payer's signature
    #[prost(bytes = "vec", tag = "2")]
    pub from_signature: Vec<u8>,
    /// Payee's signature
    #[prost(bytes = "vec", tag = "3")]
    pub to_signature: Vec<u8>,
}

impl_name!("ledger" =>
    PublicKey,
    SignedPublicKey,
    ChannelCommit,
    SignedChannelCommit,
    ChannelId,
    Account,
    ChannelState,
    SignedChannelState,
);
