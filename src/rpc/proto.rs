//! Wire messages for `bank.v1.BankService`.
//!
//! Amounts are integer minor units (cents). The service stubs are generated by
//! `build.rs` from the method list and included at the bottom of this module.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateAccountRequest {
    #[prost(string, tag = "1")]
    pub account_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateAccountResponse {
    #[prost(string, tag = "1")]
    pub account_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBalanceRequest {
    #[prost(string, tag = "1")]
    pub account_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBalanceResponse {
    #[prost(string, tag = "1")]
    pub account_id: ::prost::alloc::string::String,
    #[prost(uint64, tag = "2")]
    pub balance: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DepositRequest {
    #[prost(string, tag = "1")]
    pub account_id: ::prost::alloc::string::String,
    #[prost(uint64, tag = "2")]
    pub amount: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DepositResponse {
    #[prost(uint64, tag = "1")]
    pub new_balance: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WithdrawRequest {
    #[prost(string, tag = "1")]
    pub account_id: ::prost::alloc::string::String,
    #[prost(uint64, tag = "2")]
    pub amount: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WithdrawResponse {
    #[prost(uint64, tag = "1")]
    pub new_balance: u64,
}

include!(concat!(env!("OUT_DIR"), "/bank.v1.BankService.rs"));
