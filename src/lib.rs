// src/lib.rs

// Re-export modules
pub mod api;
pub mod blockchain;
pub mod config;
pub mod mcp;
pub mod utils;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// Explorer-first query gateway with per-chain RPC fallback
    pub gateway: blockchain::QueryGateway,
}

impl AppState {
    /// Build the gateway described by `config`.
    pub fn from_config(config: config::Config) -> anyhow::Result<Self> {
        use anyhow::Context;

        let explorer = blockchain::EtherscanClient::new(&config.etherscan_api_url, &config.etherscan_api_key)
            .context("Failed to build explorer client")?;
        let fallback = blockchain::RpcClient::new(&config.fallback_rpc_urls)
            .context("Failed to build fallback RPC client")?;

        Ok(Self {
            config,
            gateway: blockchain::QueryGateway::new(explorer, fallback),
        })
    }
}
