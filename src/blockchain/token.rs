// src/blockchain/token.rs
//! ERC-20 metadata resolution.
//!
//! Token metadata is display information, so resolution never fails: each
//! field that cannot be fetched or decoded keeps its default.

use serde_json::Value;
use tracing::{debug, warn};

use crate::blockchain::{
    backend::native_symbol,
    codec::{decode_abi_string, function_selector},
    gateway::QueryGateway,
    models::{GatewayResult, ResolvedToken, TokenDetails, DEFAULT_TOKEN_DECIMALS},
};

/// Placeholder address used for a chain's native asset.
pub const NATIVE_TOKEN_PLACEHOLDER: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

const NATIVE_DECIMALS: u8 = 18;

struct WellKnownToken {
    chain_id: &'static str,
    address: &'static str,
    name: &'static str,
    symbol: &'static str,
    decimals: u8,
}

/// Tokens answered from this table instead of the chain.
const WELL_KNOWN_TOKENS: &[WellKnownToken] = &[
    // USDT's decimals() historically trips up generic decoding
    WellKnownToken {
        chain_id: "1",
        address: "0xdAC17F958D2ee523a2206206994597C13D831ec7",
        name: "Tether USD",
        symbol: "USDT",
        decimals: 6,
    },
];

/// Details known without any network call: the native asset and well-known tokens.
pub fn static_token_details(chain_id: &str, contract_address: &str) -> Option<TokenDetails> {
    if contract_address.eq_ignore_ascii_case(NATIVE_TOKEN_PLACEHOLDER) {
        let symbol = native_symbol(chain_id);
        return Some(TokenDetails::new(symbol, symbol, NATIVE_DECIMALS));
    }

    WELL_KNOWN_TOKENS
        .iter()
        .find(|t| t.chain_id == chain_id && t.address.eq_ignore_ascii_case(contract_address))
        .map(|t| TokenDetails::new(t.name, t.symbol, t.decimals))
}

/// Resolve token metadata, trying the cheapest source first.
pub async fn resolve_token_details(
    gateway: &QueryGateway,
    chain_id: &str,
    contract_address: &str,
) -> ResolvedToken {
    if let Some(details) = static_token_details(chain_id, contract_address) {
        return ResolvedToken::Details(details);
    }

    match gateway.explorer().token_info(chain_id, contract_address).await {
        Ok(info) if info.get("status").and_then(Value::as_str) == Some("1") => {
            return ResolvedToken::Explorer(info);
        }
        Ok(_) => debug!(chain_id, contract_address, "token info carried no success status"),
        Err(e) => debug!(chain_id, contract_address, "token info unavailable: {}", e),
    }

    ResolvedToken::Details(details_from_contract_calls(gateway, chain_id, contract_address).await)
}

async fn details_from_contract_calls(
    gateway: &QueryGateway,
    chain_id: &str,
    contract_address: &str,
) -> TokenDetails {
    let name_data = function_selector("name()");
    let symbol_data = function_selector("symbol()");
    let decimals_data = function_selector("decimals()");

    let (name, symbol, decimals) = tokio::join!(
        gateway.execute_contract_method(chain_id, contract_address, &name_data, None),
        gateway.execute_contract_method(chain_id, contract_address, &symbol_data, None),
        gateway.execute_contract_method(chain_id, contract_address, &decimals_data, None),
    );

    let mut details = TokenDetails::default();
    if let Some(name) = decode_text_field(name, "name", contract_address) {
        details.name = name;
    }
    if let Some(symbol) = decode_text_field(symbol, "symbol", contract_address) {
        details.symbol = symbol;
    }
    if let Some(decimals) = decode_decimals_field(decimals, contract_address) {
        details.decimals = decimals;
    }
    details
}

fn decode_text_field(result: GatewayResult<Value>, field: &str, contract_address: &str) -> Option<String> {
    match result {
        Ok(Value::String(hex_value)) if !hex_value.is_empty() => {
            let decoded = decode_abi_string(&hex_value);
            (!decoded.is_empty()).then_some(decoded)
        }
        Ok(other) => {
            debug!(contract_address, "{}() returned a non-string result: {}", field, other);
            None
        }
        Err(e) => {
            warn!("{}() call failed for {}: {}", field, contract_address, e);
            None
        }
    }
}

fn decode_decimals_field(result: GatewayResult<Value>, contract_address: &str) -> Option<u8> {
    let hex_value = match result {
        Ok(Value::String(hex_value)) => hex_value,
        Ok(_) => return None,
        Err(e) => {
            warn!("decimals() call failed for {}: {}", contract_address, e);
            return None;
        }
    };

    let parsed = hex_value
        .strip_prefix("0x")
        .filter(|digits| !digits.is_empty())
        .and_then(|digits| u8::from_str_radix(digits, 16).ok());
    if parsed.is_none() {
        debug!(
            contract_address,
            "malformed decimals '{}', keeping {}", hex_value, DEFAULT_TOKEN_DECIMALS
        );
    }
    parsed
}
