//! # API Module
//!
//! HTTP handlers for the Etherscan MCP server.
//!
//! ## Available Endpoints
//!
//! - `GET /health` - Liveness check
//! - `POST /rpc` - MCP JSON-RPC requests over HTTP

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub mod health;
pub mod rpc;

/// Routes served under `/api`.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/rpc", post(rpc::rpc_handler))
}
