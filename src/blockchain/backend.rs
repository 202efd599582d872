// src/blockchain/backend.rs
//! Static routing tables: which chains have a public fallback node, and the
//! native asset symbol of each chain.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::blockchain::models::BackendChoice;

lazy_static! {
    /// Chains with a known-stable public JSON-RPC endpoint.
    pub static ref FALLBACK_RPC_URLS: HashMap<&'static str, &'static str> = HashMap::from([
        ("56", "https://binance.llamarpc.com"),              // BSC
        ("8453", "https://base.llamarpc.com"),               // Base
        ("43114", "https://api.avax.network/ext/bc/C/rpc"),  // Avalanche C-Chain
    ]);

    static ref NATIVE_SYMBOLS: HashMap<&'static str, &'static str> = HashMap::from([
        ("1", "ETH"),        // Ethereum Mainnet
        ("56", "BNB"),       // BNB Smart Chain
        ("137", "MATIC"),    // Polygon
        ("42161", "ETH"),    // Arbitrum One
        ("10", "ETH"),       // Optimism
        ("43114", "AVAX"),   // Avalanche C-Chain
        ("8453", "ETH"),     // Base
        ("324", "ETH"),      // zkSync Era
        ("100", "xDAI"),     // Gnosis
        ("250", "FTM"),      // Fantom
        ("5000", "MNT"),     // Mantle
        ("25", "CRO"),       // Cronos
        ("1101", "ETH"),     // Polygon zkEVM
        ("59144", "ETH"),    // Linea
        ("1284", "GLMR"),    // Moonbeam
        ("42220", "CELO"),   // Celo
        ("534352", "ETH"),   // Scroll
        ("204", "BNB"),      // opBNB
        ("1285", "MOVR"),    // Moonriver
        ("42170", "ETH"),    // Arbitrum Nova
        ("81457", "ETH"),    // Blast
        ("252", "frxETH"),   // Fraxtal
        ("1111", "WEMIX"),   // Wemix
        ("660279", "XAI"),   // Xai
        ("480", "ETH"),      // World Chain
        ("33139", "APE"),    // ApeChain
        ("255", "ETH"),      // Kroma
        ("167000", "ETH"),   // Taiko
        ("199", "BTT"),      // BitTorrent
        ("50", "XDC"),       // XDC
    ]);
}

const DEFAULT_NATIVE_SYMBOL: &str = "ETH";

/// Decide whether a chain can be served by a fallback node.
pub fn select_backend(chain_id: &str) -> BackendChoice {
    if FALLBACK_RPC_URLS.contains_key(chain_id) {
        BackendChoice::FallbackCapable
    } else {
        BackendChoice::PrimaryOnly
    }
}

/// Native asset symbol for a chain, `ETH` when the chain is not listed.
pub fn native_symbol(chain_id: &str) -> &'static str {
    NATIVE_SYMBOLS
        .get(chain_id)
        .copied()
        .unwrap_or(DEFAULT_NATIVE_SYMBOL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_backend() {
        for chain in ["56", "8453", "43114"] {
            assert_eq!(select_backend(chain), BackendChoice::FallbackCapable);
        }
        for chain in ["1", "137", "", "999999", "not-a-chain"] {
            assert_eq!(select_backend(chain), BackendChoice::PrimaryOnly);
        }
    }

    #[test]
    fn test_native_symbol() {
        assert_eq!(native_symbol("1"), "ETH");
        assert_eq!(native_symbol("56"), "BNB");
        assert_eq!(native_symbol("252"), "frxETH");
        assert_eq!(native_symbol("424242"), "ETH");
    }
}
