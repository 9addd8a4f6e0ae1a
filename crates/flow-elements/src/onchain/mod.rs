//! On-chain elements
//!
//! Both kinds fail closed when `enable_blockchain` is off. They use the
//! injected `chain_provider` service, falling back to [`AptosRestClient`].

mod aptos;
mod build_transaction_json;
mod call;
mod read_blockchain_data;

pub use aptos::AptosRestClient;
pub use build_transaction_json::BuildTransactionJsonElement;
pub use read_blockchain_data::ReadBlockchainDataElement;
