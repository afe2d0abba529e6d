//! JSON-RPC 1.0/2.0 over HTTP POST, used by the bitcoind and geth adapters.

use bf_03_thorchain_bridge::{HttpError, RetryingHttpClient};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ChainClientError;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC caller bound to one endpoint.
pub struct JsonRpcClient {
    http: RetryingHttpClient,
    version: &'static str,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Client speaking protocol `version` ("1.0" for bitcoind, "2.0" for
    /// Ethereum nodes). 5xx answers are not retried: bitcoind reports call
    /// errors that way.
    pub fn new(http: RetryingHttpClient, version: &'static str) -> Self {
        Self {
            http: http.without_server_error_retry(),
            version,
            next_id: AtomicU64::new(1),
        }
    }

    /// Call `method` and decode its `result`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainClientError> {
        let body = json!({
            "jsonrpc": self.version,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let text = match self.http.post_json("", &body).await {
            Ok(text) => text,
            Err(HttpError::Status { body, .. }) if rpc_error(&body).is_some() => body,
            Err(e) => return Err(e.into()),
        };
        let response: RpcResponse =
            serde_json::from_str(&text).map_err(|e| ChainClientError::decode("rpc response", e))?;
        if let Some(err) = response.error {
            return Err(ChainClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        serde_json::from_value(response.result)
            .map_err(|e| ChainClientError::Decode {
                what: "rpc result",
                message: format!("{method}: {e}"),
            })
    }
}

fn rpc_error(body: &str) -> Option<RpcErrorObject> {
    serde_json::from_str::<RpcResponse>(body).ok()?.error
}

/// `0x`-prefixed hex quantity to integer.
pub fn parse_hex_u64(text: &str) -> Result<u64, ChainClientError> {
    let digits = text.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| ChainClientError::decode("hex quantity", e))
}
