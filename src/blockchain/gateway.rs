// src/blockchain/gateway.rs
//! Entry point for every read query.
//!
//! All operations go to the explorer first. When the explorer refuses a chain
//! because it needs a paid plan and that chain has a fallback node, the same
//! operation is re-issued once against the node.

use serde_json::Value;
use tracing::warn;

use crate::blockchain::{
    backend::select_backend,
    etherscan::EtherscanClient,
    models::{AddressFilter, BackendChoice, GatewayError, GatewayResult, ResolvedToken},
    rpc::RpcClient,
    token,
};

/// Routes queries to the explorer or the fallback node.
#[derive(Clone)]
pub struct QueryGateway {
    explorer: EtherscanClient,
    fallback: RpcClient,
}

impl QueryGateway {
    pub fn new(explorer: EtherscanClient, fallback: RpcClient) -> Self {
        Self { explorer, fallback }
    }

    pub fn explorer(&self) -> &EtherscanClient {
        &self.explorer
    }

    fn should_fall_back(&self, chain_id: &str, operation: &str, err: &GatewayError) -> bool {
        let eligible = err.is_paid_plan_required()
            && select_backend(chain_id) == BackendChoice::FallbackCapable
            && self.fallback.has_endpoint(chain_id);
        if eligible {
            warn!(
                "Explorer requires a paid plan for chain {}; retrying {} on fallback RPC",
                chain_id, operation
            );
        }
        eligible
    }

    pub async fn account_balance(&self, chain_id: &str, address: &str) -> GatewayResult<String> {
        match self.explorer.account_balance(chain_id, address).await {
            Err(err) if self.should_fall_back(chain_id, "balance", &err) => {
                self.fallback.balance(chain_id, address).await
            }
            other => other,
        }
    }

    pub async fn token_balance(
        &self,
        chain_id: &str,
        contract_address: &str,
        address: &str,
    ) -> GatewayResult<String> {
        match self
            .explorer
            .token_balance(chain_id, contract_address, address)
            .await
        {
            Err(err) if self.should_fall_back(chain_id, "token balance", &err) => {
                self.fallback
                    .token_balance(chain_id, contract_address, address)
                    .await
            }
            other => other,
        }
    }

    pub async fn latest_block_number(&self, chain_id: &str) -> GatewayResult<String> {
        match self.explorer.latest_block_number(chain_id).await {
            Err(err) if self.should_fall_back(chain_id, "block number", &err) => {
                self.fallback.block_number(chain_id).await
            }
            other => other,
        }
    }

    pub async fn transaction_by_hash(&self, chain_id: &str, tx_hash: &str) -> GatewayResult<Value> {
        match self.explorer.transaction_by_hash(chain_id, tx_hash).await {
            Err(err) if self.should_fall_back(chain_id, "transaction lookup", &err) => {
                self.fallback.transaction_by_hash(chain_id, tx_hash).await
            }
            other => other,
        }
    }

    pub async fn transaction_receipt(&self, chain_id: &str, tx_hash: &str) -> GatewayResult<Value> {
        match self.explorer.transaction_receipt(chain_id, tx_hash).await {
            Err(err) if self.should_fall_back(chain_id, "transaction receipt", &err) => {
                self.fallback.transaction_receipt(chain_id, tx_hash).await
            }
            other => other,
        }
    }

    pub async fn transaction_count(
        &self,
        chain_id: &str,
        address: &str,
        tag: Option<&str>,
    ) -> GatewayResult<Value> {
        match self.explorer.transaction_count(chain_id, address, tag).await {
            Err(err) if self.should_fall_back(chain_id, "transaction count", &err) => {
                self.fallback.transaction_count(chain_id, address, tag).await
            }
            other => other,
        }
    }

    /// Read-only contract call. `method_params` is only understood by the explorer.
    pub async fn execute_contract_method(
        &self,
        chain_id: &str,
        contract_address: &str,
        data: &str,
        method_params: Option<&str>,
    ) -> GatewayResult<Value> {
        match self
            .explorer
            .execute_contract_method(chain_id, contract_address, data, method_params)
            .await
        {
            Err(err) if self.should_fall_back(chain_id, "eth_call", &err) => {
                self.fallback.eth_call(chain_id, contract_address, data).await
            }
            other => other,
        }
    }

    /// Best-effort token metadata; never fails.
    pub async fn token_details(&self, chain_id: &str, contract_address: &str) -> ResolvedToken {
        token::resolve_token_details(self, chain_id, contract_address).await
    }

    // Explorer-only queries

    pub async fn block_by_number(&self, chain_id: &str, block_number: &str) -> GatewayResult<Value> {
        self.explorer.block_by_number(chain_id, block_number).await
    }

    pub async fn block_by_number_raw(&self, chain_id: &str, block_number: &str) -> GatewayResult<Value> {
        self.explorer.block_by_number_raw(chain_id, block_number).await
    }

    pub async fn block_rewards(&self, chain_id: &str, block_number: &str) -> GatewayResult<Value> {
        self.explorer.block_rewards(chain_id, block_number).await
    }

    pub async fn contract_abi(&self, chain_id: &str, contract_address: &str) -> GatewayResult<String> {
        self.explorer.contract_abi(chain_id, contract_address).await
    }

    pub async fn contract_source_code(&self, chain_id: &str, contract_address: &str) -> GatewayResult<Value> {
        self.explorer.contract_source_code(chain_id, contract_address).await
    }

    pub async fn gas_oracle(&self, chain_id: &str) -> GatewayResult<Value> {
        self.explorer.gas_oracle(chain_id).await
    }

    pub async fn transaction_by_block_number_and_index(
        &self,
        chain_id: &str,
        block_number: &str,
        index: &str,
    ) -> GatewayResult<Value> {
        self.explorer
            .transaction_by_block_number_and_index(chain_id, block_number, index)
            .await
    }

    pub async fn transaction_status(&self, chain_id: &str, tx_hash: &str) -> GatewayResult<Value> {
        self.explorer.transaction_status(chain_id, tx_hash).await
    }

    pub async fn transactions_by_address(
        &self,
        chain_id: &str,
        address: &str,
        filter: &AddressFilter,
    ) -> GatewayResult<Value> {
        self.explorer
            .transactions_by_address(chain_id, address, filter)
            .await
    }

    pub async fn internal_transactions_by_address(
        &self,
        chain_id: &str,
        address: &str,
        filter: &AddressFilter,
    ) -> GatewayResult<Value> {
        self.explorer
            .internal_transactions_by_address(chain_id, address, filter)
            .await
    }

    pub async fn token_transfers_by_address(
        &self,
        chain_id: &str,
        address: &str,
        filter: &AddressFilter,
    ) -> GatewayResult<Value> {
        self.explorer
            .token_transfers_by_address(chain_id, address, filter)
            .await
    }

    pub async fn erc721_transfers_by_address(
        &self,
        chain_id: &str,
        address: &str,
        filter: &AddressFilter,
    ) -> GatewayResult<Value> {
        self.explorer
            .erc721_transfers_by_address(chain_id, address, filter)
            .await
    }
}
