//! An async JSON-RPC client for a Solana cluster: request/response codec
//! from [`keel_rpc_client_api`], a retrying HTTP transport, and
//! `send_and_confirm`, which submits transactions and awaits their
//! confirmation through a [`keel_signature_tracker`] subscription.

use {
    keel_rpc_client_api::{decode_response, encode_request, rpc_url_for_cluster, RpcClientApiError},
    keel_signature::Signature,
    keel_signature_tracker::{Commitment, SignatureStatus, StatusSource},
    serde_json::{json, Value},
    std::{future::Future, pin::Pin, sync::Arc, time::Duration},
};

pub const MAX_RETRY_ATTEMPTS: u32 = 10;
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, PartialEq)]
pub enum RpcClientError {
    Rpc {
        code: i64,
        message: String,
        logs: Option<Vec<String>>,
    },
    Http(u16),
    Transport(String),
    Timeout(Vec<Signature>),
}

impl std::fmt::Display for RpcClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RpcClientError::Rpc { code, message, .. } => write!(f, "rpc error {code}: {message}"),
            RpcClientError::Http(status) => write!(f, "http error: status {status}"),
            RpcClientError::Transport(msg) => write!(f, "transport error: {msg}"),
            RpcClientError::Timeout(partial) => {
                write!(f, "confirmation timed out with {} signatures outstanding", partial.len())
            }
        }
    }
}
impl std::error::Error for RpcClientError {}

impl From<RpcClientApiError> for RpcClientError {
    fn from(err: RpcClientApiError) -> Self {
        match err {
            RpcClientApiError::Rpc { code, message, logs } => {
                RpcClientError::Rpc { code, message, logs }
            }
            RpcClientApiError::InvalidBase58Field(field) => {
                RpcClientError::Transport(format!("invalid base58 in field `{field}`"))
            }
        }
    }
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
}

fn backoff_delay(attempt: u32) -> Duration {
    let millis = 200u64.saturating_mul(1u64 << attempt.min(10));
    Duration::from_millis(millis).min(MAX_RETRY_DELAY)
}

impl RpcClient {
    /// `endpoint` is either a cluster moniker (`devnet`, `mainnet-beta`,
    /// `testnet`, `localhost`) or an arbitrary URL used verbatim.
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: rpc_url_for_cluster(endpoint),
        }
    }

    /// Sends one JSON-RPC request, retrying transport failures and HTTP 5xx
    /// responses with exponential backoff, capped at
    /// [`MAX_RETRY_ATTEMPTS`] attempts and [`MAX_RETRY_DELAY`] per retry.
    pub async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcClientError> {
        let request = encode_request(method, params, 0);
        let body = json!(request);

        let mut last_err = RpcClientError::Transport("no attempts made".to_string());
        for attempt in 0..MAX_RETRY_ATTEMPTS {
            let response = self.http.post(&self.url).json(&body).send().await;
            match response {
                Ok(response) if response.status().is_server_error() => {
                    last_err = RpcClientError::Http(response.status().as_u16());
                }
                Ok(response) if !response.status().is_success() => {
                    return Err(RpcClientError::Http(response.status().as_u16()));
                }
                Ok(response) => match response.json::<Value>().await {
                    Ok(body) => return Ok(decode_response(method, &body)?),
                    Err(err) => last_err = RpcClientError::Transport(err.to_string()),
                },
                Err(err) => last_err = RpcClientError::Transport(err.to_string()),
            }
            tokio::time::sleep(backoff_delay(attempt)).await;
        }
        Err(last_err)
    }

    pub async fn get_latest_blockhash(&self) -> Result<Value, RpcClientError> {
        self.send("getLatestBlockhash", vec![]).await
    }

    pub async fn get_recent_blockhash(&self) -> Result<Value, RpcClientError> {
        self.send("getRecentBlockhash", vec![]).await
    }

    pub async fn get_balance(&self, pubkey_base58: &str) -> Result<Value, RpcClientError> {
        self.send("getBalance", vec![json!(pubkey_base58)]).await
    }

    pub async fn get_account_info(&self, pubkey_base58: &str) -> Result<Value, RpcClientError> {
        self.send("getAccountInfo", vec![json!(pubkey_base58)]).await
    }

    pub async fn get_multiple_accounts(
        &self,
        pubkeys_base58: &[&str],
    ) -> Result<Value, RpcClientError> {
        self.send("getMultipleAccounts", vec![json!(pubkeys_base58)]).await
    }

    pub async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: u64,
    ) -> Result<Value, RpcClientError> {
        self.send("getMinimumBalanceForRentExemption", vec![json!(data_len)])
            .await
    }

    pub async fn get_block(&self, slot: u64) -> Result<Value, RpcClientError> {
        self.send("getBlock", vec![json!(slot)]).await
    }

    pub async fn get_token_supply(&self, mint_base58: &str) -> Result<Value, RpcClientError> {
        self.send("getTokenSupply", vec![json!(mint_base58)]).await
    }

    pub async fn get_token_largest_accounts(&self, mint_base58: &str) -> Result<Value, RpcClientError> {
        self.send("getTokenLargestAccounts", vec![json!(mint_base58)]).await
    }

    pub async fn get_transaction(&self, signature_base58: &str) -> Result<Value, RpcClientError> {
        self.send("getTransaction", vec![json!(signature_base58)]).await
    }

    pub async fn get_signatures_for_address(
        &self,
        address_base58: &str,
    ) -> Result<Value, RpcClientError> {
        self.send("getSignaturesForAddress", vec![json!(address_base58)])
            .await
    }

    /// `requestAirdrop` — devnet/testnet only.
    pub async fn request_airdrop(
        &self,
        pubkey_base58: &str,
        lamports: u64,
    ) -> Result<Value, RpcClientError> {
        self.send("requestAirdrop", vec![json!(pubkey_base58), json!(lamports)])
            .await
    }

    /// `sendTransaction`, wire-encoding `transaction_bytes` as base64 and
    /// mapping the caller's commitment to `preflightCommitment`.
    pub async fn send_transaction(
        &self,
        transaction_bytes: &[u8],
        preflight_commitment: Option<&str>,
    ) -> Result<Value, RpcClientError> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(transaction_bytes);
        let mut options = json!({"encoding": "base64"});
        if let Some(commitment) = preflight_commitment {
            options["preflightCommitment"] = json!(commitment);
        }
        self.send("sendTransaction", vec![json!(encoded), options]).await
    }

    pub async fn get_signature_statuses(
        &self,
        signatures_base58: &[String],
    ) -> Result<Value, RpcClientError> {
        self.send(
            "getSignatureStatuses",
            vec![json!(signatures_base58), json!({"searchTransactionHistory": true})],
        )
        .await
    }

    /// Submits every transaction, drops (logging) any that fail pre-flight,
    /// subscribes the remainder to a confirmation tracker, and awaits
    /// confirmation up to `timeout`. Returns the signatures that confirmed,
    /// in confirmation order, and whether the deadline was hit.
    pub async fn send_and_confirm(
        self: &Arc<Self>,
        transactions: Vec<Vec<u8>>,
        commitment: Commitment,
        timeout: Duration,
    ) -> SendAndConfirmOutcome {
        let mut submitted = Vec::new();
        for tx_bytes in transactions {
            match self.send_transaction(&tx_bytes, Some(commitment_str(commitment))).await {
                Ok(Value::Array(bytes)) => {
                    let raw: Vec<u8> = bytes
                        .into_iter()
                        .filter_map(|b| b.as_u64().map(|n| n as u8))
                        .collect();
                    if raw.len() == 64 {
                        let mut array = [0u8; 64];
                        array.copy_from_slice(&raw);
                        submitted.push(Signature::from_bytes(array));
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!("sendTransaction pre-flight failed, dropping: {err}");
                }
            }
        }

        if submitted.is_empty() {
            return SendAndConfirmOutcome {
                timed_out: false,
                confirmed: Vec::new(),
            };
        }

        let tracker = keel_signature_tracker::spawn(self.clone(), keel_signature_tracker::DEFAULT_POLL_INTERVAL);
        let mut receiver = tracker.subscribe(submitted.clone(), commitment);

        let mut confirmed = Vec::new();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                let outstanding: Vec<Signature> = submitted
                    .iter()
                    .filter(|s| !confirmed.contains(*s))
                    .copied()
                    .collect();
                return SendAndConfirmOutcome {
                    timed_out: true,
                    confirmed: outstanding,
                };
            }
            match tokio::time::timeout(remaining, receiver.recv()).await {
                Ok(Some(mut batch)) => {
                    confirmed.append(&mut batch);
                    if confirmed.len() >= submitted.len() {
                        return SendAndConfirmOutcome {
                            timed_out: false,
                            confirmed,
                        };
                    }
                }
                Ok(None) => {
                    return SendAndConfirmOutcome {
                        timed_out: false,
                        confirmed,
                    };
                }
                Err(_) => {
                    let outstanding: Vec<Signature> = submitted
                        .iter()
                        .filter(|s| !confirmed.contains(*s))
                        .copied()
                        .collect();
                    return SendAndConfirmOutcome {
                        timed_out: true,
                        confirmed: outstanding,
                    };
                }
            }
        }
    }
}

fn commitment_str(commitment: Commitment) -> &'static str {
    match commitment {
        Commitment::Processed => "processed",
        Commitment::Confirmed => "confirmed",
        Commitment::Finalized => "finalized",
    }
}

#[derive(Debug, Clone)]
pub struct SendAndConfirmOutcome {
    pub timed_out: bool,
    pub confirmed: Vec<Signature>,
}

impl StatusSource for RpcClient {
    fn get_signature_statuses<'a>(
        &'a self,
        signatures: &'a [Signature],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Option<SignatureStatus>>, String>> + Send + 'a>> {
        Box::pin(async move {
            let encoded: Vec<String> = signatures.iter().map(|s| s.to_string()).collect();
            let response = self
                .get_signature_statuses(&encoded)
                .await
                .map_err(|err| err.to_string())?;
            let entries = response
                .get("value")
                .or(Some(&response))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            Ok(entries
                .into_iter()
                .map(|entry| {
                    if entry.is_null() {
                        return None;
                    }
                    let err = entry.get("err").filter(|e| !e.is_null()).map(|e| e.to_string());
                    let confirmation_status = entry
                        .get("confirmationStatus")
                        .and_then(Value::as_str)
                        .and_then(|s| match s {
                            "processed" => Some(Commitment::Processed),
                            "confirmed" => Some(Commitment::Confirmed),
                            "finalized" => Some(Commitment::Finalized),
                            _ => None,
                        });
                    Some(SignatureStatus { err, confirmation_status })
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        assert!(backoff_delay(20) <= MAX_RETRY_DELAY);
        assert!(backoff_delay(0) < backoff_delay(5));
    }

    #[test]
    fn cluster_endpoint_resolves_known_host() {
        let client = RpcClient::new("devnet");
        assert_eq!(client.url, "https://api.devnet.solana.com");
    }
}
