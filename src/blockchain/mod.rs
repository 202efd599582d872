// src/blockchain/mod.rs

pub mod backend;
pub mod codec;
pub mod etherscan;
pub mod gateway;
pub mod models;
pub mod rpc;
pub mod token;

// Re-export commonly used types
pub use etherscan::EtherscanClient;
pub use gateway::QueryGateway;
pub use models::{GatewayError, GatewayResult, ResolvedToken, TokenDetails};
pub use rpc::RpcClient;
