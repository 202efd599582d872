// src/blockchain/rpc.rs
//! Direct JSON-RPC client for the chains listed in
//! [`FALLBACK_RPC_URLS`](crate::blockchain::backend::FALLBACK_RPC_URLS).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::blockchain::{
    backend::FALLBACK_RPC_URLS,
    codec::{
        function_selector, hex_to_u256_string, hex_to_u64_string, json_scalar, pad_address_word,
        to_rpc_quantity,
    },
    etherscan::RpcEnvelope,
    models::{GatewayError, GatewayResult},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// JSON-RPC client for the fallback nodes.
#[derive(Clone)]
pub struct RpcClient {
    http: Client,
    endpoints: Arc<HashMap<String, String>>,
}

impl RpcClient {
    /// Build a client over the compiled-in endpoints. `overrides` may replace the
    /// URL of a listed chain; entries for other chains are ignored.
    pub fn new(overrides: &HashMap<String, String>) -> GatewayResult<Self> {
        let mut endpoints: HashMap<String, String> = FALLBACK_RPC_URLS
            .iter()
            .map(|(chain, url)| (chain.to_string(), url.to_string()))
            .collect();

        for (chain_id, url) in overrides {
            match endpoints.get_mut(chain_id) {
                Some(slot) => *slot = url.clone(),
                None => warn!(
                    "Ignoring fallback RPC override for chain {}: not a fallback chain",
                    chain_id
                ),
            }
        }

        Self::with_endpoints(endpoints)
    }

    /// Build a client over an explicit chain -> URL map.
    pub fn with_endpoints(endpoints: HashMap<String, String>) -> GatewayResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoints: Arc::new(endpoints),
        })
    }

    pub fn has_endpoint(&self, chain_id: &str) -> bool {
        self.endpoints.contains_key(chain_id)
    }

    /// Perform a single JSON-RPC call against the chain's node.
    pub async fn call(&self, chain_id: &str, method: &str, params: Vec<Value>) -> GatewayResult<Value> {
        let rpc_url = self
            .endpoints
            .get(chain_id)
            .ok_or_else(|| GatewayError::UnsupportedChain(chain_id.to_string()))?;

        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        debug!(chain_id, method, "fallback rpc request");
        let body = self
            .http
            .post(rpc_url)
            .json(&payload)
            .send()
            .await?
            .text()
            .await?;

        let resp: RpcEnvelope = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Decode(format!("failed to parse RPC response: {}", e)))?;
        match resp.error {
            Some(err) => Err(err.into()),
            None => Ok(resp.result),
        }
    }

    /// Latest block number as decimal text.
    pub async fn block_number(&self, chain_id: &str) -> GatewayResult<String> {
        let result = self.call(chain_id, "eth_blockNumber", vec![]).await?;
        let hex_block = json_scalar(result, "block number")?;
        Ok(hex_to_u64_string(&hex_block))
    }

    /// Native balance in wei, as decimal text.
    pub async fn balance(&self, chain_id: &str, address: &str) -> GatewayResult<String> {
        let result = self
            .call(chain_id, "eth_getBalance", vec![json!(address), json!("latest")])
            .await?;
        hex_to_u256_string(&json_scalar(result, "balance")?)
    }

    /// ERC-20 `balanceOf(address)`, as decimal text.
    pub async fn token_balance(
        &self,
        chain_id: &str,
        contract_address: &str,
        address: &str,
    ) -> GatewayResult<String> {
        let data = format!(
            "{}{}",
            function_selector("balanceOf(address)"),
            pad_address_word(address)
        );
        let result = self.eth_call(chain_id, contract_address, &data).await?;
        hex_to_u256_string(&json_scalar(result, "token balance")?)
    }

    pub async fn transaction_by_hash(&self, chain_id: &str, tx_hash: &str) -> GatewayResult<Value> {
        self.call(chain_id, "eth_getTransactionByHash", vec![json!(tx_hash)]).await
    }

    pub async fn transaction_receipt(&self, chain_id: &str, tx_hash: &str) -> GatewayResult<Value> {
        self.call(chain_id, "eth_getTransactionReceipt", vec![json!(tx_hash)]).await
    }

    pub async fn transaction_count(
        &self,
        chain_id: &str,
        address: &str,
        tag: Option<&str>,
    ) -> GatewayResult<Value> {
        let tag = to_rpc_quantity(tag.filter(|t| !t.is_empty()).unwrap_or("latest"));
        self.call(chain_id, "eth_getTransactionCount", vec![json!(address), json!(tag)])
            .await
    }

    /// Read-only contract call at the latest block.
    pub async fn eth_call(&self, chain_id: &str, to: &str, data: &str) -> GatewayResult<Value> {
        self.call(
            chain_id,
            "eth_call",
            vec![json!({"to": to, "data": data}), json!("latest")],
        )
        .await
    }
}
