//! Guard schema: storage contract terms checked by the guard service

use prost_types::Timestamp;

/// Terms of one shard's storage contract
#[derive(Clone, PartialEq, ::prost::Message)]
#[allow(missing_docs)]
pub struct ContractMeta {
    #[prost(string, tag = "1")]
    pub contract_id: String,
    #[prost(string, tag = "2")]
    pub renter_pid: String,
    #[prost(string, tag = "3")]
    pub host_pid: String,
    #[prost(string, tag = "4")]
    pub shard_hash: String,
    #[prost(int32, tag = "5")]
    pub shard_index: i32,
    #[prost(int64, tag = "6")]
    pub shard_file_size: i64,
    #[prost(string, tag = "7")]
    pub file_hash: String,
    #[prost(message, optional, tag = "8")]
    pub rent_start: Option<Timestamp>,
    #[prost(message, optional, tag = "9")]
    pub rent_end: Option<Timestamp>,
    #[prost(string, tag = "10")]
    pub guard_pid: String,
    #[prost(string, tag = "11")]
    pub escrow_pid: String,
    #[prost(int64, tag = "12")]
    pub price: i64,
    #[prost(int64, tag = "13")]
    pub amount: i64,
    #[prost(int64, tag = "14")]
    pub collateral_amount: i64,
    #[prost(int32, tag = "15")]
    pub challenge_interval: i32,
    #[prost(int32, tag = "16")]
    pub challenge_num: i32,
    #[prost(enumeration = "super::escrow::Schedule", tag = "17")]
    pub payout_schedule: i32,
    #[prost(int32, tag = "18")]
    pub num_payouts: i32,
}

impl_name!("guard" => ContractMeta);
