//! # MCP Handler Module
//!
//! This module implements the Model Context Protocol (MCP) for the Etherscan
//! query server. It handles incoming MCP requests and dispatches them to the
//! [`QueryGateway`](crate::blockchain::QueryGateway).
//!
//! Every tool takes a `chainID` argument. Queries go to the Etherscan v2 API
//! first; on chains where the free tier is refused and a public node is known,
//! supported queries are answered by that node instead.
//!
//! ## Supported Tools
//!
//! ### Accounts
//! - `getAccountBalance` - Native balance in wei
//! - `getTokenBalance` - ERC-20 balance in the token's smallest unit
//! - `getTransactionCount` - Nonce of an address
//! - `getTransactionsByAddress`, `getInternalTransactionsByAddress`,
//!   `getTokenTransfersByAddress`, `getERC721Transfers` - Paged listings
//!
//! ### Blocks and Transactions
//! - `getLatestBlockNumber`, `getBlockByNumber`, `getRawBlockByNumber`, `getBlockRewards`
//! - `getTransactionByHash`, `getTransactionByBlockNumberAndIndex`
//! - `getTransactionReceipt`, `getTransactionStatus`
//!
//! ### Contracts and Tokens
//! - `getContractABI`, `getContractSourceCode`
//! - `executeContractMethod` - Read-only `eth_call`
//! - `getTokenDetails` - ERC-20 name, symbol and decimals
//!
//! ### Network
//! - `getGasOracle`

use crate::{
    blockchain::{
        models::{AddressFilter, BalanceResponse, BlockNumberResponse, GatewayResult},
        QueryGateway,
    },
    mcp::protocol::{error_codes, Request, Response},
    utils, AppState,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const SERVER_NAME: &str = "etherscan_mcp";

/// Every tool advertised by `tools/list`.
const TOOL_NAMES: &[&str] = &[
    "getAccountBalance",
    "getBlockByNumber",
    "getRawBlockByNumber",
    "getBlockRewards",
    "getContractABI",
    "getContractSourceCode",
    "executeContractMethod",
    "getGasOracle",
    "getTokenBalance",
    "getTokenDetails",
    "getTransactionByHash",
    "getTransactionByBlockNumberAndIndex",
    "getTransactionCount",
    "getTransactionReceipt",
    "getTransactionStatus",
    "getTransactionsByAddress",
    "getInternalTransactionsByAddress",
    "getTokenTransfersByAddress",
    "getERC721Transfers",
    "getLatestBlockNumber",
];

// Helper: produce a result Value that always contains a text content array
// and preserves structured data for JSON-friendly clients.
fn make_texty_result(text: String, payload: Value) -> Value {
    let content = json!([{ "type": "text", "text": text }]);
    match payload {
        Value::Object(mut map) => {
            // Do not overwrite if caller already set content
            if !map.contains_key("content") {
                map.insert("content".into(), content);
            }
            Value::Object(map)
        }
        other => json!({
            "data": other,
            "content": content
        }),
    }
}

// Text rendering of a payload for the content array. Bare strings are shown unquoted.
fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, state).await,
        "ping" => Response::success(req.id, json!({})),
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the correct tool logic.
async fn handle_tool_call(req: Request, state: AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let empty_args = json!({});
    let args = params.get("arguments").unwrap_or(&empty_args);

    match call_tool(tool_name, args, &req.id, &state.gateway).await {
        Ok(result) => Response::success(req.id.clone(), result),
        Err(err_resp) => err_resp,
    }
}

// Lift a gateway result into the tool layer's error type.
fn gateway_result<T>(result: GatewayResult<T>, tool_name: &str, req_id: &Value) -> Result<T, Response> {
    result.map_err(|e| {
        warn!("{} failed: {}", tool_name, e);
        Response::gateway_error(req_id.clone(), &e)
    })
}

// Listing filters come straight from the tool arguments.
fn address_filter(args: &Value, allow_contract: bool, req_id: &Value) -> Result<AddressFilter, Response> {
    let mut filter: AddressFilter = serde_json::from_value(args.clone()).map_err(|e| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Invalid listing arguments: {}", e),
        )
    })?;
    if !allow_contract {
        filter.contract_address = None;
    }
    Ok(filter)
}

async fn call_tool(
    tool_name: &str,
    args: &Value,
    req_id: &Value,
    gateway: &QueryGateway,
) -> Result<Value, Response> {
    if !TOOL_NAMES.contains(&tool_name) {
        return Err(Response::error(
            req_id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("Tool not found: {}", tool_name),
        ));
    }

    let chain_id = utils::get_required_arg::<String>(args, "chainID", req_id)?;
    if chain_id.trim().is_empty() {
        return Err(Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            "Argument 'chainID' must not be empty".into(),
        ));
    }
    debug!(tool_name, chain_id = %chain_id, "tool call");

    match tool_name {
        "getAccountBalance" => {
            let address = utils::get_required_arg::<String>(args, "address", req_id)?;
            let balance = gateway_result(
                gateway.account_balance(&chain_id, &address).await,
                tool_name,
                req_id,
            )?;
            let summary = format!("Balance of {} on chain {}: {} wei", address, chain_id, balance);
            Ok(make_texty_result(summary, json!(BalanceResponse { balance })))
        }
        "getTokenBalance" => {
            let contract = utils::get_required_arg::<String>(args, "contractAddress", req_id)?;
            let address = utils::get_required_arg::<String>(args, "address", req_id)?;
            let balance = gateway_result(
                gateway.token_balance(&chain_id, &contract, &address).await,
                tool_name,
                req_id,
            )?;
            let summary = format!("Token {} balance of {}: {}", contract, address, balance);
            Ok(make_texty_result(summary, json!(BalanceResponse { balance })))
        }
        "getLatestBlockNumber" => {
            let block_number = gateway_result(
                gateway.latest_block_number(&chain_id).await,
                tool_name,
                req_id,
            )?;
            let summary = format!("Latest block on chain {}: {}", chain_id, block_number);
            Ok(make_texty_result(summary, json!(BlockNumberResponse { block_number })))
        }
        "getTokenDetails" => {
            let contract = utils::get_required_arg::<String>(args, "contractAddress", req_id)?;
            let details = gateway.token_details(&chain_id, &contract).await;
            let payload = json!(details);
            Ok(make_texty_result(payload_text(&payload), json!({ "data": payload })))
        }
        "getContractABI" => {
            let contract = utils::get_required_arg::<String>(args, "contractAddress", req_id)?;
            let abi = gateway_result(gateway.contract_abi(&chain_id, &contract).await, tool_name, req_id)?;
            Ok(make_texty_result(abi.clone(), Value::String(abi)))
        }
        "executeContractMethod" => {
            let contract = utils::get_required_arg::<String>(args, "contractAddress", req_id)?;
            let method_abi = utils::get_required_arg::<String>(args, "methodABI", req_id)?;
            let method_params = utils::get_optional_str(args, "methodParams");
            let result = gateway_result(
                gateway
                    .execute_contract_method(&chain_id, &contract, &method_abi, method_params)
                    .await,
                tool_name,
                req_id,
            )?;
            Ok(make_texty_result(payload_text(&result), result))
        }
        _ => {
            let result = query_tool(tool_name, args, &chain_id, req_id, gateway).await?;
            Ok(make_texty_result(payload_text(&result), result))
        }
    }
}

// Tools whose answer is the upstream payload itself.
async fn query_tool(
    tool_name: &str,
    args: &Value,
    chain_id: &str,
    req_id: &Value,
    gateway: &QueryGateway,
) -> Result<Value, Response> {
    let result = match tool_name {
        "getBlockByNumber" => {
            let block = utils::get_required_arg::<String>(args, "blockNumber", req_id)?;
            gateway.block_by_number(chain_id, &block).await
        }
        "getRawBlockByNumber" => {
            let block = utils::get_required_arg::<String>(args, "blockNumber", req_id)?;
            gateway.block_by_number_raw(chain_id, &block).await
        }
        "getBlockRewards" => {
            let block = utils::get_required_arg::<String>(args, "blockNumber", req_id)?;
            gateway.block_rewards(chain_id, &block).await
        }
        "getContractSourceCode" => {
            let contract = utils::get_required_arg::<String>(args, "contractAddress", req_id)?;
            gateway.contract_source_code(chain_id, &contract).await
        }
        "getGasOracle" => gateway.gas_oracle(chain_id).await,
        "getTransactionByHash" => {
            let tx_hash = utils::get_required_arg::<String>(args, "txHash", req_id)?;
            gateway.transaction_by_hash(chain_id, &tx_hash).await
        }
        "getTransactionByBlockNumberAndIndex" => {
            let block = utils::get_required_arg::<String>(args, "blockNumber", req_id)?;
            let index = utils::get_required_arg::<String>(args, "index", req_id)?;
            gateway
                .transaction_by_block_number_and_index(chain_id, &block, &index)
                .await
        }
        "getTransactionCount" => {
            let address = utils::get_required_arg::<String>(args, "address", req_id)?;
            let tag = utils::get_optional_str(args, "tag");
            gateway.transaction_count(chain_id, &address, tag).await
        }
        "getTransactionReceipt" => {
            let tx_hash = utils::get_required_arg::<String>(args, "txHash", req_id)?;
            gateway.transaction_receipt(chain_id, &tx_hash).await
        }
        "getTransactionStatus" => {
            let tx_hash = utils::get_required_arg::<String>(args, "txHash", req_id)?;
            gateway.transaction_status(chain_id, &tx_hash).await
        }
        "getTransactionsByAddress" => {
            let address = utils::get_required_arg::<String>(args, "address", req_id)?;
            let filter = address_filter(args, false, req_id)?;
            gateway.transactions_by_address(chain_id, &address, &filter).await
        }
        "getInternalTransactionsByAddress" => {
            let address = utils::get_required_arg::<String>(args, "address", req_id)?;
            let filter = address_filter(args, false, req_id)?;
            gateway
                .internal_transactions_by_address(chain_id, &address, &filter)
                .await
        }
        "getTokenTransfersByAddress" => {
            let address = utils::get_required_arg::<String>(args, "address", req_id)?;
            let filter = address_filter(args, true, req_id)?;
            gateway.token_transfers_by_address(chain_id, &address, &filter).await
        }
        "getERC721Transfers" => {
            let address = utils::get_required_arg::<String>(args, "address", req_id)?;
            let filter = address_filter(args, true, req_id)?;
            gateway.erc721_transfers_by_address(chain_id, &address, &filter).await
        }
        _ => {
            return Err(Response::error(
                req_id.clone(),
                error_codes::METHOD_NOT_FOUND,
                format!("Tool not found: {}", tool_name),
            ))
        }
    };

    gateway_result(result, tool_name, req_id)
}

/// Handles the 'initialize' request.
fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions =
        "Read-only EVM chain queries through the Etherscan v2 API, with public RPC fallback for chains that need a paid plan.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

fn string_prop(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn tool_schema(name: &str, description: &str, mut properties: Value, required: &[&str]) -> Value {
    if let Value::Object(map) = &mut properties {
        map.insert(
            "chainID".into(),
            string_prop("Chain ID, e.g. '1' for Ethereum mainnet or '56' for BNB Smart Chain"),
        );
    }
    let mut required_keys = vec!["chainID"];
    required_keys.extend_from_slice(required);
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required_keys
        }
    })
}

fn listing_properties(with_contract: bool) -> Value {
    let mut props = json!({
        "address": string_prop("The 0x... address to list activity for"),
        "startBlock": string_prop("First block to include"),
        "endBlock": string_prop("Last block to include"),
        "page": string_prop("Page number"),
        "offset": string_prop("Results per page")
    });
    if with_contract {
        props["contractAddress"] = string_prop("Only include transfers of this token contract");
    }
    props
}

/// Handles the 'tools/list' request by returning a JSON definition of all available tools.
fn handle_tools_list(req: &Request) -> Response {
    let tools = json!([
        tool_schema(
            "getAccountBalance",
            "Get the native balance of an address, in wei.",
            json!({ "address": string_prop("The 0x... address to check") }),
            &["address"],
        ),
        tool_schema(
            "getBlockByNumber",
            "Get block information by block number.",
            json!({ "blockNumber": string_prop("Block number in decimal") }),
            &["blockNumber"],
        ),
        tool_schema(
            "getRawBlockByNumber",
            "Get the full block, including transaction objects, from the node proxy.",
            json!({ "blockNumber": string_prop("Block number in decimal, or a tag such as 'latest'") }),
            &["blockNumber"],
        ),
        tool_schema(
            "getBlockRewards",
            "Get the block and uncle rewards of a block.",
            json!({ "blockNumber": string_prop("Block number in decimal") }),
            &["blockNumber"],
        ),
        tool_schema(
            "getContractABI",
            "Get the ABI of a verified contract.",
            json!({ "contractAddress": string_prop("The contract address") }),
            &["contractAddress"],
        ),
        tool_schema(
            "getContractSourceCode",
            "Get the verified source code of a contract.",
            json!({ "contractAddress": string_prop("The contract address") }),
            &["contractAddress"],
        ),
        tool_schema(
            "executeContractMethod",
            "Execute a read-only contract call (eth_call).",
            json!({
                "contractAddress": string_prop("The contract address"),
                "methodABI": string_prop("0x-prefixed call data: selector plus encoded arguments"),
                "methodParams": string_prop("Optional extra parameters passed to the explorer")
            }),
            &["contractAddress", "methodABI"],
        ),
        tool_schema(
            "getGasOracle",
            "Get current safe, proposed and fast gas prices.",
            json!({}),
            &[],
        ),
        tool_schema(
            "getTokenBalance",
            "Get the ERC-20 token balance of an address.",
            json!({
                "contractAddress": string_prop("The token contract address"),
                "address": string_prop("The holder address")
            }),
            &["contractAddress", "address"],
        ),
        tool_schema(
            "getTokenDetails",
            "Get ERC-20 token name, symbol and decimals. Use 0xeeee...eeee for the native asset.",
            json!({ "contractAddress": string_prop("The token contract address") }),
            &["contractAddress"],
        ),
        tool_schema(
            "getTransactionByHash",
            "Get a transaction by its hash.",
            json!({ "txHash": string_prop("The transaction hash") }),
            &["txHash"],
        ),
        tool_schema(
            "getTransactionByBlockNumberAndIndex",
            "Get a transaction by block number and index within the block.",
            json!({
                "blockNumber": string_prop("Block number in decimal"),
                "index": string_prop("Transaction index in decimal")
            }),
            &["blockNumber", "index"],
        ),
        tool_schema(
            "getTransactionCount",
            "Get the number of transactions sent from an address.",
            json!({
                "address": string_prop("The sender address"),
                "tag": string_prop("Block tag, defaults to 'latest'")
            }),
            &["address"],
        ),
        tool_schema(
            "getTransactionReceipt",
            "Get the receipt of a transaction.",
            json!({ "txHash": string_prop("The transaction hash") }),
            &["txHash"],
        ),
        tool_schema(
            "getTransactionStatus",
            "Get the execution status of a transaction.",
            json!({ "txHash": string_prop("The transaction hash") }),
            &["txHash"],
        ),
        tool_schema(
            "getTransactionsByAddress",
            "List normal transactions of an address.",
            listing_properties(false),
            &["address"],
        ),
        tool_schema(
            "getInternalTransactionsByAddress",
            "List internal transactions of an address.",
            listing_properties(false),
            &["address"],
        ),
        tool_schema(
            "getTokenTransfersByAddress",
            "List ERC-20 token transfers of an address.",
            listing_properties(true),
            &["address"],
        ),
        tool_schema(
            "getERC721Transfers",
            "List ERC-721 token transfers of an address.",
            listing_properties(true),
            &["address"],
        ),
        tool_schema(
            "getLatestBlockNumber",
            "Get the latest block number.",
            json!({}),
            &[],
        ),
    ]);

    Response::success(req.id.clone(), json!({ "tools": tools }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_state() -> AppState {
        let config = Config {
            etherscan_api_url: "http://127.0.0.1:9/v2/api".to_string(),
            etherscan_api_key: "test-key".to_string(),
            ..Config::default()
        };
        AppState::from_config(config).unwrap()
    }

    fn request(id: Value, method: &str, params: Option<Value>) -> Request {
        Request {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_make_texty_result_wraps_scalars() {
        let wrapped = make_texty_result("12".into(), json!("12"));
        assert_eq!(wrapped["data"], "12");
        assert_eq!(wrapped["content"][0]["text"], "12");

        let object = make_texty_result("b".into(), json!({"balance": "1"}));
        assert_eq!(object["balance"], "1");
        assert_eq!(object["content"][0]["type"], "text");
    }

    #[test]
    fn test_tools_list_requires_chain_id_everywhere() {
        let resp = handle_tools_list(&request(json!(1), "tools/list", None));
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 20);
        for tool in tools {
            let required = tool["inputSchema"]["required"].as_array().unwrap();
            assert_eq!(required[0], "chainID", "{}", tool["name"]);
        }
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let resp = handle_mcp_request(request(Value::Null, "notifications/initialized", None), test_state()).await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_missing_chain_id_is_invalid_params() {
        let params = json!({"name": "getGasOracle", "arguments": {}});
        let resp = handle_mcp_request(request(json!(2), "tools/call", Some(params)), test_state())
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[test]
    fn test_tools_list_matches_dispatch_table() {
        let resp = handle_tools_list(&request(json!(1), "tools/list", None));
        let listed: Vec<String> = resp.result.unwrap()["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(listed, TOOL_NAMES.iter().map(|n| n.to_string()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unknown_tool_without_chain_id() {
        let params = json!({"name": "sendTransaction", "arguments": {}});
        let resp = handle_mcp_request(request(json!(5), "tools/call", Some(params)), test_state())
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_chain_id_is_invalid_params() {
        let params = json!({"name": "getGasOracle", "arguments": {"chainID": ""}});
        let resp = handle_mcp_request(request(json!(6), "tools/call", Some(params)), test_state())
            .await
            .unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, error_codes::INVALID_PARAMS);
        assert!(error.message.contains("chainID"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let params = json!({"name": "sendTransaction", "arguments": {"chainID": "1"}});
        let resp = handle_mcp_request(request(json!(3), "tools/call", Some(params)), test_state())
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_native_token_details_need_no_network() {
        let params = json!({
            "name": "getTokenDetails",
            "arguments": {"chainID": "137", "contractAddress": "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"}
        });
        let resp = handle_mcp_request(request(json!(4), "tools/call", Some(params)), test_state())
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["data"]["symbol"], "MATIC");
        assert_eq!(result["data"]["decimals"], 18);
    }
}
