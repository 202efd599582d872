// src/config.rs

use std::collections::HashMap;
use std::env;
use anyhow::{Context, Result};

use crate::blockchain::etherscan::DEFAULT_ETHERSCAN_API_URL;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// How MCP requests reach the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout.
    Stdio,
    /// JSON-RPC over HTTP on `127.0.0.1:PORT`.
    Http,
}

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub transport: Transport,
    pub port: u16,
    pub log_level: String,

    // Explorer settings
    pub etherscan_api_key: String,
    pub etherscan_api_url: String,

    /// URL overrides for the compiled-in fallback chains
    /// (BNB Smart Chain 56, Base 8453, Avalanche C-Chain 43114).
    /// Entries for any other chain are ignored.
    pub fallback_rpc_urls: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            etherscan_api_key: String::new(),
            etherscan_api_url: DEFAULT_ETHERSCAN_API_URL.to_string(),
            fallback_rpc_urls: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables and command-line flags.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();
        let args: Vec<String> = env::args().skip(1).collect();
        Self::from_lookup_and_args(|key| env::var(key).ok(), &args)
    }

    /// Builds the configuration from any key lookup, so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_and_args(lookup, &[])
    }

    /// Like [`Config::from_lookup`], with command-line flags applied.
    ///
    /// `--mcp` selects stdio and `--http` selects HTTP; an explicit
    /// `MCP_MODE=true|false` overrides either flag. `--port N` (or `--port=N`)
    /// takes precedence over `PORT`.
    pub fn from_lookup_and_args<F>(lookup: F, args: &[String]) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flags = CliFlags::parse(args)?;
        let etherscan_api_key = lookup("ETHERSCAN_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .context("ETHERSCAN_API_KEY must be set")?;

        let etherscan_api_url = lookup("ETHERSCAN_API_URL")
            .unwrap_or_else(|| DEFAULT_ETHERSCAN_API_URL.to_string());
        url::Url::parse(&etherscan_api_url)
            .with_context(|| format!("ETHERSCAN_API_URL is not a valid URL: {}", etherscan_api_url))?;

        let fallback_rpc_urls = match lookup("FALLBACK_RPC_URLS") {
            Some(raw) if !raw.trim().is_empty() => {
                let urls: HashMap<String, String> = serde_json::from_str(&raw)
                    .context("Invalid FALLBACK_RPC_URLS JSON format, expected {\"chain_id\": \"url\"}")?;
                for (chain_id, rpc_url) in &urls {
                    url::Url::parse(rpc_url).with_context(|| {
                        format!("FALLBACK_RPC_URLS entry for chain {} is not a valid URL", chain_id)
                    })?;
                }
                urls
            }
            _ => HashMap::new(),
        };

        let port = match flags.port.or_else(|| lookup("PORT")) {
            Some(port) => port.parse().context("PORT must be a valid number")?,
            None => DEFAULT_PORT,
        };

        let mut transport = flags.transport.unwrap_or(Transport::Stdio);
        match lookup("MCP_MODE").as_deref() {
            Some("true") => transport = Transport::Stdio,
            Some("false") => transport = Transport::Http,
            _ => {}
        }

        Ok(Config {
            transport,
            port,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            etherscan_api_key,
            etherscan_api_url,
            fallback_rpc_urls,
        })
    }
}

#[derive(Debug, Default)]
struct CliFlags {
    transport: Option<Transport>,
    port: Option<String>,
}

impl CliFlags {
    fn parse(args: &[String]) -> Result<Self> {
        let mut flags = CliFlags::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--mcp" => flags.transport = Some(Transport::Stdio),
                "--http" => flags.transport = Some(Transport::Http),
                "--port" => {
                    let value = iter.next().context("--port requires a value")?;
                    flags.port = Some(value.clone());
                }
                other => {
                    if let Some(value) = other.strip_prefix("--port=") {
                        flags.port = Some(value.to_string());
                    }
                }
            }
        }
        Ok(flags)
    }
}
