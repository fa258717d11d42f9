//! JSON-RPC 2.0 request encoding and method-aware response decoding for the
//! Solana RPC surface: batching, id assignment, parameter cleanup, and
//! base58-to-bytes normalization of method-specific result fields.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcClientApiError {
    /// The RPC server returned a structured `error` object.
    Rpc {
        code: i64,
        message: String,
        logs: Option<Vec<String>>,
    },
    /// A result field that should have been base58 could not be decoded.
    InvalidBase58Field(String),
}

impl std::fmt::Display for RpcClientApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RpcClientApiError::Rpc { code, message, .. } => {
                write!(f, "rpc error {code}: {message}")
            }
            RpcClientApiError::InvalidBase58Field(field) => {
                write!(f, "field `{field}` is not valid base58")
            }
        }
    }
}
impl std::error::Error for RpcClientApiError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

/// Strips empty option maps (`{}`) off the tail of `params`, the way a
/// hand-written request builder omits an unused trailing options argument
/// rather than sending it explicitly.
fn strip_trailing_empty_objects(params: &mut Vec<Value>) {
    while matches!(params.last(), Some(Value::Object(map)) if map.is_empty()) {
        params.pop();
    }
}

/// Builds a single JSON-RPC request with the given `id`.
pub fn encode_request(method: impl Into<String>, mut params: Vec<Value>, id: u64) -> RpcRequest {
    strip_trailing_empty_objects(&mut params);
    RpcRequest {
        jsonrpc: "2.0",
        id,
        method: method.into(),
        params,
    }
}

/// Builds a batch of requests with ascending ids starting at `0`. A single
/// request therefore always gets id `0`.
pub fn encode_batch(requests: Vec<(String, Vec<Value>)>) -> Vec<RpcRequest> {
    requests
        .into_iter()
        .enumerate()
        .map(|(id, (method, params))| encode_request(method, params, id as u64))
        .collect()
}

fn parse_rpc_error(error: &Value) -> RpcClientApiError {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown rpc error")
        .to_string();
    let logs = error
        .get("data")
        .and_then(|data| data.get("logs"))
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        });
    RpcClientApiError::Rpc { code, message, logs }
}

fn b58_to_json_bytes(s: &str, field: &str) -> Result<Value, RpcClientApiError> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|_| RpcClientApiError::InvalidBase58Field(field.to_string()))?;
    Ok(Value::Array(bytes.into_iter().map(Value::from).collect()))
}

/// Replaces `result[field]` (or `result.value[field]` when `result.value`
/// exists) with its base58-decoded byte array, if present.
fn decode_field_in_place(result: &mut Value, field: &str) -> Result<(), RpcClientApiError> {
    let target = if result.get("value").is_some() {
        result.get_mut("value")
    } else {
        Some(result)
    };
    if let Some(target) = target {
        if let Some(Value::String(s)) = target.get(field).cloned() {
            let decoded = b58_to_json_bytes(&s, field)?;
            target[field] = decoded;
        }
    }
    Ok(())
}

fn decode_account_info(account: &mut Value) -> Result<(), RpcClientApiError> {
    decode_field_in_place(account, "owner")
}

/// Applies the method-specific base58-to-bytes normalization described by
/// the RPC method table to a successful `result` payload.
pub fn decode_result(method: &str, mut result: Value) -> Result<Value, RpcClientApiError> {
    match method {
        "requestAirdrop" | "sendTransaction" => {
            if let Value::String(s) = &result {
                result = b58_to_json_bytes(s, "result")?;
            }
        }
        "getSignaturesForAddress" => {
            if let Some(entries) = result.as_array_mut() {
                for entry in entries {
                    decode_field_in_place(entry, "signature")?;
                }
            }
        }
        "getRecentBlockhash" | "getLatestBlockhash" => {
            decode_field_in_place(&mut result, "blockhash")?;
        }
        "getAccountInfo" => {
            decode_account_info(&mut result)?;
        }
        "getMultipleAccounts" => {
            let accounts = if let Some(value) = result.get_mut("value") {
                value.as_array_mut()
            } else {
                result.as_array_mut()
            };
            if let Some(accounts) = accounts {
                for account in accounts {
                    if !account.is_null() {
                        decode_account_info(account)?;
                    }
                }
            }
        }
        "getTransaction" => {
            if let Some(message) = result.get_mut("transaction").and_then(|t| t.get_mut("message"))
            {
                if let Some(keys) = message.get_mut("accountKeys").and_then(Value::as_array_mut) {
                    for key in keys.iter_mut() {
                        if let Value::String(s) = key.clone() {
                            *key = b58_to_json_bytes(&s, "accountKeys")?;
                        }
                    }
                }
                decode_field_in_place(message, "recentBlockhash")?;
            }
            if let Some(signatures) = result
                .get_mut("transaction")
                .and_then(|t| t.get_mut("signatures"))
                .and_then(Value::as_array_mut)
            {
                for signature in signatures.iter_mut() {
                    if let Value::String(s) = signature.clone() {
                        *signature = b58_to_json_bytes(&s, "signatures")?;
                    }
                }
            }
        }
        _ => {}
    }
    Ok(result)
}

/// Decodes a full JSON-RPC response object for a request that was sent with
/// `method`: surfaces a structured error, or applies [`decode_result`] to a
/// successful result.
pub fn decode_response(method: &str, response: &Value) -> Result<Value, RpcClientApiError> {
    if let Some(error) = response.get("error") {
        return Err(parse_rpc_error(error));
    }
    let result = response.get("result").cloned().unwrap_or(Value::Null);
    decode_result(method, result)
}

pub fn rpc_url_for_cluster(cluster: &str) -> String {
    match cluster {
        "devnet" | "mainnet-beta" | "testnet" => format!("https://api.{cluster}.solana.com"),
        "localhost" => "http://127.0.0.1:8899".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_request_gets_id_zero() {
        let batch = encode_batch(vec![("getBalance".to_string(), vec![json!("abc")])]);
        assert_eq!(batch[0].id, 0);
    }

    #[test]
    fn batch_ids_are_ascending() {
        let batch = encode_batch(vec![
            ("getBalance".to_string(), vec![]),
            ("getBalance".to_string(), vec![]),
            ("getBalance".to_string(), vec![]),
        ]);
        assert_eq!(batch.iter().map(|r| r.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn trailing_empty_option_map_is_stripped() {
        let req = encode_request("getBalance", vec![json!("abc"), json!({})], 0);
        assert_eq!(req.params, vec![json!("abc")]);
    }

    #[test]
    fn decodes_send_transaction_signature() {
        let sig_bytes = [7u8; 64];
        let sig_b58 = bs58::encode(sig_bytes).into_string();
        let response = json!({"jsonrpc":"2.0","id":0,"result": sig_b58});
        let decoded = decode_response("sendTransaction", &response).unwrap();
        assert_eq!(decoded.as_array().unwrap().len(), 64);
    }

    #[test]
    fn surfaces_structured_error() {
        let response = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "error": {"code": -32002, "message": "Transaction simulation failed", "data": {"logs": ["log A"]}}
        });
        let err = decode_response("sendTransaction", &response).unwrap_err();
        assert_eq!(
            err,
            RpcClientApiError::Rpc {
                code: -32002,
                message: "Transaction simulation failed".to_string(),
                logs: Some(vec!["log A".to_string()]),
            }
        );
    }

    #[test]
    fn cluster_urls_match_well_known_hosts() {
        assert_eq!(rpc_url_for_cluster("devnet"), "https://api.devnet.solana.com");
        assert_eq!(rpc_url_for_cluster("localhost"), "http://127.0.0.1:8899");
        assert_eq!(rpc_url_for_cluster("https://my-rpc.example"), "https://my-rpc.example");
    }
}
