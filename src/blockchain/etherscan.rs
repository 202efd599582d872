// src/blockchain/etherscan.rs
//! Client for the Etherscan v2 multichain API.
//!
//! The same endpoint serves explorer actions, which answer with a
//! `status/message/result` envelope, and `proxy` actions, which answer with a
//! JSON-RPC 2.0 envelope. [`Envelope`] sniffs which one came back and
//! [`Envelope::into_result`] unwraps either into the inner payload.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::blockchain::{
    codec::{hex_to_u64_string, json_scalar, to_rpc_quantity},
    models::{AddressFilter, GatewayError, GatewayResult},
};

pub const DEFAULT_ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC 2.0 reply, used by the `proxy` module.
#[derive(Debug, Deserialize)]
pub struct RpcEnvelope {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl From<RpcErrorObject> for GatewayError {
    fn from(err: RpcErrorObject) -> Self {
        GatewayError::UpstreamRpc {
            code: err.code,
            message: err.message,
        }
    }
}

/// Classic explorer reply.
#[derive(Debug, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

/// The shape an explorer reply turned out to have.
#[derive(Debug)]
pub enum Envelope {
    Rpc(RpcEnvelope),
    Status(StatusEnvelope),
    Unparseable(String),
}

impl Envelope {
    /// Try the JSON-RPC shape first, then the status shape. Only JSON objects
    /// qualify for either.
    pub fn classify(body: &str) -> Self {
        let value = match serde_json::from_str::<Value>(body) {
            Ok(value @ Value::Object(_)) => value,
            Ok(other) => return Envelope::Unparseable(format!("expected a JSON object, got {}", other)),
            Err(e) => return Envelope::Unparseable(e.to_string()),
        };

        if let Ok(rpc) = RpcEnvelope::deserialize(&value) {
            if !rpc.jsonrpc.is_empty() {
                return Envelope::Rpc(rpc);
            }
        }
        match StatusEnvelope::deserialize(&value) {
            Ok(status) => Envelope::Status(status),
            Err(e) => Envelope::Unparseable(e.to_string()),
        }
    }

    /// Unwrap the inner payload, or classify the failure.
    pub fn into_result(self) -> GatewayResult<Value> {
        match self {
            Envelope::Rpc(rpc) => match rpc.error {
                Some(err) => Err(err.into()),
                None => Ok(rpc.result),
            },
            Envelope::Status(resp) => {
                if resp.status == "1" || resp.status.is_empty() {
                    return Ok(resp.result);
                }
                // NOTOK is how the explorer refuses chains outside the free tier
                if resp.status == "0" && resp.message == "NOTOK" {
                    let detail = match resp.result {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    return Err(GatewayError::PaidPlanRequired(detail));
                }
                Err(GatewayError::UpstreamApi {
                    status: resp.status,
                    message: resp.message,
                })
            }
            Envelope::Unparseable(reason) => Err(GatewayError::Decode(format!(
                "failed to parse response: {}",
                reason
            ))),
        }
    }
}

/// Explorer API client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct EtherscanClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl EtherscanClient {
    pub fn new(base_url: &str, api_key: &str) -> GatewayResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Issue one GET against the explorer and unwrap whichever envelope comes back.
    pub async fn request(
        &self,
        chain_id: &str,
        module: &str,
        action: &str,
        params: &[(&str, String)],
    ) -> GatewayResult<Value> {
        let mut query: Vec<(&str, &str)> = vec![
            ("module", module),
            ("action", action),
            ("apikey", self.api_key.as_str()),
            ("chainid", chain_id),
        ];
        for (key, value) in params {
            match query.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value.as_str(),
                None => query.push((*key, value.as_str())),
            }
        }

        debug!(chain_id, module, action, "etherscan request");
        let body = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await?
            .text()
            .await?;

        Envelope::classify(&body).into_result()
    }

    /// Native balance in wei.
    pub async fn account_balance(&self, chain_id: &str, address: &str) -> GatewayResult<String> {
        let params = [("address", address.to_string()), ("tag", "latest".to_string())];
        let result = self.request(chain_id, "account", "balance", &params).await?;
        json_scalar(result, "balance")
    }

    pub async fn block_by_number(&self, chain_id: &str, block_number: &str) -> GatewayResult<Value> {
        let params = [("blockno", block_number.to_string())];
        self.request(chain_id, "block", "getblockreward", &params).await
    }

    /// Full block, with transaction objects, through the node proxy.
    pub async fn block_by_number_raw(&self, chain_id: &str, block_number: &str) -> GatewayResult<Value> {
        let params = [
            ("tag", to_rpc_quantity(block_number)),
            ("boolean", "true".to_string()),
        ];
        self.request(chain_id, "proxy", "eth_getBlockByNumber", &params).await
    }

    pub async fn block_rewards(&self, chain_id: &str, block_number: &str) -> GatewayResult<Value> {
        let params = [("blockno", block_number.to_string())];
        self.request(chain_id, "block", "getblockreward", &params).await
    }

    /// ABI of a verified contract, as the JSON text the explorer stores.
    pub async fn contract_abi(&self, chain_id: &str, contract_address: &str) -> GatewayResult<String> {
        let params = [("address", contract_address.to_string())];
        let result = self.request(chain_id, "contract", "getabi", &params).await?;
        json_scalar(result, "ABI")
    }

    pub async fn contract_source_code(&self, chain_id: &str, contract_address: &str) -> GatewayResult<Value> {
        let params = [("address", contract_address.to_string())];
        self.request(chain_id, "contract", "getsourcecode", &params).await
    }

    /// Read-only `eth_call` through the node proxy.
    pub async fn execute_contract_method(
        &self,
        chain_id: &str,
        contract_address: &str,
        data: &str,
        method_params: Option<&str>,
    ) -> GatewayResult<Value> {
        let mut params = vec![("to", contract_address.to_string()), ("data", data.to_string())];
        if let Some(extra) = method_params.filter(|p| !p.is_empty()) {
            params.push(("params", extra.to_string()));
        }
        self.request(chain_id, "proxy", "eth_call", &params).await
    }

    pub async fn gas_oracle(&self, chain_id: &str) -> GatewayResult<Value> {
        self.request(chain_id, "gastracker", "gasoracle", &[]).await
    }

    /// ERC-20 balance in the token's smallest unit.
    pub async fn token_balance(
        &self,
        chain_id: &str,
        contract_address: &str,
        address: &str,
    ) -> GatewayResult<String> {
        let params = [
            ("contractaddress", contract_address.to_string()),
            ("address", address.to_string()),
            ("tag", "latest".to_string()),
        ];
        let result = self.request(chain_id, "account", "tokenbalance", &params).await?;
        json_scalar(result, "token balance")
    }

    /// One-shot token metadata.
    pub async fn token_info(&self, chain_id: &str, contract_address: &str) -> GatewayResult<Value> {
        let params = [("contractaddress", contract_address.to_string())];
        self.request(chain_id, "token", "tokeninfo", &params).await
    }

    pub async fn transaction_by_hash(&self, chain_id: &str, tx_hash: &str) -> GatewayResult<Value> {
        let params = [("txhash", tx_hash.to_string())];
        self.request(chain_id, "proxy", "eth_getTransactionByHash", &params).await
    }

    pub async fn transaction_by_block_number_and_index(
        &self,
        chain_id: &str,
        block_number: &str,
        index: &str,
    ) -> GatewayResult<Value> {
        let params = [
            ("tag", to_rpc_quantity(block_number)),
            ("index", to_rpc_quantity(index)),
        ];
        self.request(chain_id, "proxy", "eth_getTransactionByBlockNumberAndIndex", &params)
            .await
    }

    pub async fn transaction_count(
        &self,
        chain_id: &str,
        address: &str,
        tag: Option<&str>,
    ) -> GatewayResult<Value> {
        let tag = to_rpc_quantity(tag.filter(|t| !t.is_empty()).unwrap_or("latest"));
        let params = [("address", address.to_string()), ("tag", tag)];
        self.request(chain_id, "proxy", "eth_getTransactionCount", &params).await
    }

    pub async fn transaction_receipt(&self, chain_id: &str, tx_hash: &str) -> GatewayResult<Value> {
        let params = [("txhash", tx_hash.to_string())];
        self.request(chain_id, "proxy", "eth_getTransactionReceipt", &params).await
    }

    /// Contract execution status (`isError`/`errDescription`).
    pub async fn transaction_status(&self, chain_id: &str, tx_hash: &str) -> GatewayResult<Value> {
        let params = [("txhash", tx_hash.to_string())];
        self.request(chain_id, "transaction", "getstatus", &params).await
    }

    pub async fn transactions_by_address(
        &self,
        chain_id: &str,
        address: &str,
        filter: &AddressFilter,
    ) -> GatewayResult<Value> {
        self.address_listing(chain_id, "txlist", address, filter).await
    }

    pub async fn internal_transactions_by_address(
        &self,
        chain_id: &str,
        address: &str,
        filter: &AddressFilter,
    ) -> GatewayResult<Value> {
        self.address_listing(chain_id, "txlistinternal", address, filter).await
    }

    pub async fn token_transfers_by_address(
        &self,
        chain_id: &str,
        address: &str,
        filter: &AddressFilter,
    ) -> GatewayResult<Value> {
        self.address_listing(chain_id, "tokentx", address, filter).await
    }

    pub async fn erc721_transfers_by_address(
        &self,
        chain_id: &str,
        address: &str,
        filter: &AddressFilter,
    ) -> GatewayResult<Value> {
        self.address_listing(chain_id, "tokennfttx", address, filter).await
    }

    async fn address_listing(
        &self,
        chain_id: &str,
        action: &str,
        address: &str,
        filter: &AddressFilter,
    ) -> GatewayResult<Value> {
        let mut params = filter.to_params();
        params.push(("address", address.to_string()));
        self.request(chain_id, "account", action, &params).await
    }

    /// Latest block number as decimal text.
    pub async fn latest_block_number(&self, chain_id: &str) -> GatewayResult<String> {
        let result = self.request(chain_id, "proxy", "eth_blockNumber", &[]).await?;
        let hex_block = json_scalar(result, "block number")?;
        Ok(hex_to_u64_string(&hex_block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    async fn client_for(server: &mockito::Server) -> EtherscanClient {
        EtherscanClient::new(&format!("{}/v2/api", server.url()), "test-key").unwrap()
    }

    #[test]
    fn test_classify_rpc_envelope() {
        let env = Envelope::classify(r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#);
        assert!(matches!(env, Envelope::Rpc(_)));
        assert_eq!(env.into_result().unwrap(), json!("0x10"));
    }

    #[test]
    fn test_classify_rpc_error() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#;
        match Envelope::classify(body).into_result() {
            Err(GatewayError::UpstreamRpc { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "execution reverted");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_classify_status_envelope() {
        let env = Envelope::classify(r#"{"status":"1","message":"OK","result":"123"}"#);
        assert!(matches!(env, Envelope::Status(_)));
        assert_eq!(env.into_result().unwrap(), json!("123"));

        // Listings with no hits still unwrap to the inner payload
        let env = Envelope::classify(r#"{"status":"1","message":"OK","result":[]}"#);
        assert_eq!(env.into_result().unwrap(), json!([]));
    }

    #[test]
    fn test_classify_paid_plan() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Free API access is not supported for this chain"}"#;
        match Envelope::classify(body).into_result() {
            Err(GatewayError::PaidPlanRequired(detail)) => {
                assert!(detail.contains("Free API access"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_classify_upstream_api_error() {
        let body = r#"{"status":"0","message":"No transactions found","result":[]}"#;
        match Envelope::classify(body).into_result() {
            Err(GatewayError::UpstreamApi { status, message }) => {
                assert_eq!(status, "0");
                assert_eq!(message, "No transactions found");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_classify_unparseable() {
        assert!(matches!(Envelope::classify("<html>502</html>"), Envelope::Unparseable(_)));
        assert!(matches!(
            Envelope::classify("").into_result(),
            Err(GatewayError::Decode(_))
        ));
    }

    #[test]
    fn test_classify_rejects_non_objects() {
        for body in ["[]", "[1,2]", "42", "\"ok\"", "null", "true"] {
            assert!(
                matches!(Envelope::classify(body), Envelope::Unparseable(_)),
                "{} should not classify",
                body
            );
            assert!(matches!(
                Envelope::classify(body).into_result(),
                Err(GatewayError::Decode(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_transaction_count_converts_numeric_tag() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "eth_getTransactionCount".into()),
                Matcher::UrlEncoded("address".into(), "0xabc".into()),
                Matcher::UrlEncoded("tag".into(), "0xff".into()),
            ]))
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x3"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let count = client.transaction_count("1", "0xabc", Some("255")).await.unwrap();
        assert_eq!(count, json!("0x3"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_sends_core_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("module".into(), "account".into()),
                Matcher::UrlEncoded("action".into(), "balance".into()),
                Matcher::UrlEncoded("apikey".into(), "test-key".into()),
                Matcher::UrlEncoded("chainid".into(), "1".into()),
                Matcher::UrlEncoded("address".into(), "0xabc".into()),
                Matcher::UrlEncoded("tag".into(), "latest".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"1","message":"OK","result":"1000000000000000000"}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let balance = client.account_balance("1", "0xabc").await.unwrap();
        assert_eq!(balance, "1000000000000000000");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rpc_error_surfaces_for_any_action() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", Matcher::Any)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid argument"}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.gas_oracle("1").await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamRpc { code: -32602, .. }));
        let err = client.contract_source_code("1", "0xabc").await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamRpc { code: -32602, .. }));
    }

    #[tokio::test]
    async fn test_raw_block_converts_number_to_quantity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "eth_getBlockByNumber".into()),
                Matcher::UrlEncoded("tag".into(), "0xff".into()),
                Matcher::UrlEncoded("boolean".into(), "true".into()),
            ]))
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"number":"0xff"}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let block = client.block_by_number_raw("1", "255").await.unwrap();
        assert_eq!(block, json!({"number": "0xff"}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_latest_tag_passes_through() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("tag".into(), "latest".into()),
                Matcher::UrlEncoded("index".into(), "0x2".into()),
            ]))
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":null}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let tx = client
            .transaction_by_block_number_and_index("1", "latest", "2")
            .await
            .unwrap();
        assert!(tx.is_null());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_latest_block_number_is_decimal() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::UrlEncoded("action".into(), "eth_blockNumber".into()))
            .with_body(r#"{"jsonrpc":"2.0","id":83,"result":"0x1312d00"}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.latest_block_number("1").await.unwrap(), "20000000");
    }

    #[tokio::test]
    async fn test_listing_forwards_filter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "tokentx".into()),
                Matcher::UrlEncoded("address".into(), "0xabc".into()),
                Matcher::UrlEncoded("contractaddress".into(), "0xdef".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_body(r#"{"status":"1","message":"OK","result":[{"hash":"0x1"}]}"#)
            .create_async()
            .await;

        let filter = AddressFilter {
            contract_address: Some("0xdef".into()),
            page: Some("1".into()),
            ..Default::default()
        };
        let client = client_for(&server).await;
        let transfers = client
            .token_transfers_by_address("1", "0xabc", &filter)
            .await
            .unwrap();
        assert_eq!(transfers, json!([{"hash": "0x1"}]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_string_balance_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", Matcher::Any)
            .with_body(r#"{"status":"1","message":"OK","result":{"unexpected":true}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.account_balance("1", "0xabc").await.unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Nothing listens on port 9 locally
        let client = EtherscanClient::new("http://127.0.0.1:9/v2/api", "k").unwrap();
        let err = client.gas_oracle("1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
