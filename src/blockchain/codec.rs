// src/blockchain/codec.rs
//! Hex and ABI helpers for the values that cross the backend boundary.
//!
//! Everything here is pure. Strict conversions return [`GatewayError::Decode`];
//! [`decode_abi_string`] is the one best-effort decoder and never fails, since
//! its output only feeds display fields.

use ethers_core::types::U256;
use ethers_core::utils::keccak256;
use serde_json::Value;

use crate::blockchain::models::{GatewayError, GatewayResult};

/// Hex characters in one 32-byte ABI word.
const WORD_HEX_LEN: usize = 64;

/// Decode an unprefixed, even-length hex string into bytes.
pub fn hex_to_bytes(text: &str) -> GatewayResult<Vec<u8>> {
    hex::decode(text).map_err(|e| GatewayError::Decode(format!("invalid hex '{}': {}", text, e)))
}

/// Lowercase, unprefixed hex encoding of `bytes`.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode the return value of a `string`/`bytes` call, or a legacy `bytes32`.
///
/// Returns an empty string for anything irregular: short input, bad hex,
/// zero length, or a declared length that runs past the data.
pub fn decode_abi_string(hex_data: &str) -> String {
    // 0x + offset word + length word
    if hex_data.len() < 2 + 2 * WORD_HEX_LEN {
        return decode_fixed_word(hex_data);
    }

    let Some(body) = hex_data.get(2..) else {
        return String::new();
    };
    let Some(length) = body
        .get(WORD_HEX_LEN..2 * WORD_HEX_LEN)
        .and_then(|word| u64::from_str_radix(word, 16).ok())
    else {
        return String::new();
    };
    if length == 0 {
        return String::new();
    }

    let start = 2 * WORD_HEX_LEN;
    let end = usize::try_from(length)
        .ok()
        .and_then(|len| len.checked_mul(2))
        .and_then(|len| len.checked_add(start));
    match end.and_then(|end| body.get(start..end)) {
        Some(data) => hex_to_bytes(data)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default(),
        None => String::new(),
    }
}

// bytes32: first word, trailing NULs stripped
fn decode_fixed_word(hex_data: &str) -> String {
    let Some(word) = hex_data.get(2..2 + WORD_HEX_LEN) else {
        return String::new();
    };
    match hex_to_bytes(word) {
        Ok(bytes) => {
            let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
        Err(_) => String::new(),
    }
}

/// Convert a decimal block number or index into the `0x` quantity expected by
/// raw node methods. Tags such as `latest`, and anything that is not a plain
/// decimal `u64`, pass through unchanged.
pub fn to_rpc_quantity(text: &str) -> String {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return text.to_string();
    }
    match text.parse::<u64>() {
        Ok(n) => format!("0x{:x}", n),
        Err(_) => text.to_string(),
    }
}

/// `0x`-prefixed block number to decimal text. Unparseable input is returned as-is.
pub fn hex_to_u64_string(hex_value: &str) -> String {
    match hex_value.strip_prefix("0x").filter(|digits| !digits.is_empty()) {
        Some(digits) => u64::from_str_radix(digits, 16)
            .map(|n| n.to_string())
            .unwrap_or_else(|_| hex_value.to_string()),
        None => hex_value.to_string(),
    }
}

/// `0x`-prefixed wei amount to decimal text.
pub fn hex_to_u256_string(hex_value: &str) -> GatewayResult<String> {
    match hex_value.strip_prefix("0x").filter(|digits| !digits.is_empty()) {
        Some(digits) => U256::from_str_radix(digits, 16)
            .map(|n| n.to_string())
            .map_err(|e| GatewayError::Decode(format!("invalid hex quantity '{}': {}", hex_value, e))),
        None => Ok(hex_value.to_string()),
    }
}

/// Extract a JSON string scalar from a raw result.
pub fn json_scalar(value: Value, what: &str) -> GatewayResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(GatewayError::Decode(format!(
            "failed to parse {}: expected a JSON string, got {}",
            what, other
        ))),
    }
}

/// `0x`-prefixed 4-byte function selector for a canonical signature.
pub fn function_selector(signature: &str) -> String {
    format!("0x{}", bytes_to_hex(&keccak256(signature.as_bytes())[..4]))
}

/// Left-pad an address to a full ABI word (unprefixed).
pub fn pad_address_word(address: &str) -> String {
    let bare = address.strip_prefix("0x").unwrap_or(address);
    format!("{:0>64}", bare)
}
