// src/blockchain/models.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// --- Error types for gateway operations ---

/// Classified failure of a single gateway operation.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The backend could not be reached, or the request timed out.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The explorer answered with a non-success status.
    #[error("etherscan API error: {status} - {message}")]
    UpstreamApi { status: String, message: String },
    /// The explorer gates this chain behind a paid subscription.
    #[error("etherscan API: this chain requires a paid plan: {0}")]
    PaidPlanRequired(String),
    /// A JSON-RPC error object, from either backend.
    #[error("JSON-RPC error: {code} - {message}")]
    UpstreamRpc { code: i64, message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("no RPC endpoint configured for chain {0}")]
    UnsupportedChain(String),
}

impl GatewayError {
    pub fn is_paid_plan_required(&self) -> bool {
        matches!(self, GatewayError::PaidPlanRequired(_))
    }

    /// Stable machine-readable name, surfaced to MCP clients as error data.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "transport",
            GatewayError::UpstreamApi { .. } => "upstream-api",
            GatewayError::PaidPlanRequired(_) => "paid-plan-required",
            GatewayError::UpstreamRpc { .. } => "upstream-rpc",
            GatewayError::Decode(_) => "decode",
            GatewayError::UnsupportedChain(_) => "unsupported-chain",
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

// --- Backend selection ---

/// Which backends can serve a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    PrimaryOnly,
    FallbackCapable,
}

// --- Token Models ---

pub const DEFAULT_TOKEN_NAME: &str = "Unknown Token";
pub const DEFAULT_TOKEN_SYMBOL: &str = "UNKNOWN";
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// ERC-20 display metadata. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDetails {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenDetails {
    pub fn new(name: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
        }
    }
}

impl Default for TokenDetails {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_NAME, DEFAULT_TOKEN_SYMBOL, DEFAULT_TOKEN_DECIMALS)
    }
}

/// Outcome of token metadata resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResolvedToken {
    /// Assembled locally, from static tables or individual contract calls.
    Details(TokenDetails),
    /// The explorer's one-shot token info payload, untouched.
    Explorer(Value),
}

// --- Listing Models ---

/// Optional filters shared by the address-scoped listing actions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressFilter {
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub start_block: Option<String>,
    #[serde(default)]
    pub end_block: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
}

impl AddressFilter {
    /// Query parameters for the non-empty fields, keyed the way the explorer expects.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        [
            ("contractaddress", &self.contract_address),
            ("startblock", &self.start_block),
            ("endblock", &self.end_block),
            ("page", &self.page),
            ("offset", &self.offset),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (key, v.to_string()))
        })
        .collect()
    }
}

// --- Response Models ---

/// Balance answer for native and token balance queries.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNumberResponse {
    pub block_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_filter_skips_empty_fields() {
        let filter = AddressFilter {
            contract_address: Some(String::new()),
            start_block: Some("100".to_string()),
            end_block: None,
            page: Some("2".to_string()),
            offset: Some("10".to_string()),
        };

        let params = filter.to_params();
        assert_eq!(
            params,
            vec![
                ("startblock", "100".to_string()),
                ("page", "2".to_string()),
                ("offset", "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_token_details_serialization() {
        let details = ResolvedToken::Details(TokenDetails::default());
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Unknown Token", "symbol": "UNKNOWN", "decimals": 18})
        );
    }

    #[test]
    fn test_error_kinds() {
        assert!(GatewayError::PaidPlanRequired("x".into()).is_paid_plan_required());
        assert!(!GatewayError::Decode("x".into()).is_paid_plan_required());
        assert_eq!(
            GatewayError::UpstreamRpc { code: -32000, message: "x".into() }.kind(),
            "upstream-rpc"
        );
    }
}
