//! Escrow schema: buyer/seller contracts and payins

use super::ledger::SignedChannelState;

/// How a contract pays out over its lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Schedule {
    /// Once per month
    Monthly = 0,
    /// Once per quarter
    Quarterly = 1,
    /// Once per year
    Annually = 2,
    /// Custom cadence
    Custom = 3,
}

/// Kind of escrow contract
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ContractType {
    /// Single storage contract
    Regular = 0,
    /// Contract under a storage plan
    Plan = 1,
}

/// Payment terms between buyer and seller, held by the escrow
#[derive(Clone, PartialEq, ::prost::Message)]
#[allow(missing_docs)]
pub struct EscrowContract {
    #[prost(string, tag = "1")]
    pub contract_id: String,
    #[prost(bytes = "vec", tag = "2")]
    pub buyer_address: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub seller_address: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub auth_address: Vec<u8>,
    #[prost(int64, tag = "5")]
    pub amount: i64,
    #[prost(int64, tag = "6")]
    pub collateral_amount: i64,
    #[prost(int64, tag = "7")]
    pub withhold_amount: i64,
    #[prost(int64, tag = "8")]
    pub tokens_per_unit_per_time: i64,
    #[prost(int64, tag = "9")]
    pub units_per_time: i64,
    #[prost(int64, tag = "10")]
    pub units_of_time: i64,
    #[prost(enumeration = "Schedule", tag = "11")]
    pub payout_schedule: i32,
    #[prost(int64, tag = "12")]
    pub num_payouts: i64,
    #[prost(enumeration = "ContractType", tag = "13")]
    pub contract_type: i32,
}

/// Escrow's answer to a submitted contract batch
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitContractResult {
    /// Identifier of the payin the buyer must fund
    #[prost(int64, tag = "1")]
    pub payin_id: i64,
    /// Buyer-side channel state awaiting the buyer's signature
    #[prost(message, optional, tag = "2")]
    pub buyer_channel_state: Option<SignedChannelState>,
}

/// [`SubmitContractResult`] signed by the escrow
#[derive(Clone, PartialEq, ::prost::Message)]
#[allow(missing_docs)]
pub struct SignedSubmitContractResult {
    #[prost(message, optional, tag = "1")]
    pub result: Option<SubmitContractResult>,
    #[prost(bytes = "vec", tag = "2")]
    pub escrow_signature: Vec<u8>,
}

/// Buyer's request to fund a payin
#[derive(Clone, PartialEq, ::prost::Message)]
#[allow(missing_docs)]
pub struct PayinRequest {
    #[prost(int64, tag = "1")]
    pub payin_id: i64,
    #[prost(bytes = "vec", tag = "2")]
    pub buyer_address: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub buyer_channel_state: Option<SignedChannelState>,
}

/// [`PayinRequest`] signed by the buyer
#[derive(Clone, PartialEq, ::prost::Message)]
#[allow(missing_docs)]
pub struct SignedPayinRequest {
    #[prost(message, optional, tag = "1")]
    pub request: Option<PayinRequest>,
    #[prost(bytes = "vec", tag = "2")]
    pub buyer_signature: Vec<u8>,
}

impl_name!("escrow" =>
    EscrowContract,
    SubmitContractResult,
    SignedSubmitContractResult,
    PayinRequest,
    SignedPayinRequest,
);
