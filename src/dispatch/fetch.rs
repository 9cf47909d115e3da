use crate::error::FetchError;
use crate::solana::adapter::UpstreamTransaction;
use crate::solana::helius::HeliusTransaction;
use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_transaction_status::UiTransactionEncoding;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Retrieves the full payload for a signature from an upstream provider.
#[async_trait]
pub trait TransactionFetcher: Send + Sync {
    async fn fetch(&self, signature: &str) -> Result<UpstreamTransaction, FetchError>;
}

/// JSON-RPC `getTransaction` with parsed encoding.
pub struct RpcFetcher {
    client: SolanaRpcClient,
    timeout: Duration,
}

impl RpcFetcher {
    pub fn new(http_url: &str, timeout: Duration) -> Self {
        Self {
            client: SolanaRpcClient::new_with_timeout(http_url.to_string(), timeout),
            timeout,
        }
    }

    fn config() -> RpcTransactionConfig {
        RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        }
    }
}

#[async_trait]
impl TransactionFetcher for RpcFetcher {
    async fn fetch(&self, signature: &str) -> Result<UpstreamTransaction, FetchError> {
        let sig = Signature::from_str(signature)
            .map_err(|e| FetchError::InvalidPayload(format!("invalid signature: {}", e)))?;

        let response = timeout(self.timeout, self.client.get_transaction_with_config(&sig, Self::config()))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout.as_secs()))?
            .map_err(classify_client_error)?;

        Ok(UpstreamTransaction::Rpc(Box::new(response)))
    }
}

fn classify_client_error(err: ClientError) -> FetchError {
    match err.kind() {
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) | ClientErrorKind::RpcError(_) => {
            FetchError::Transient(err.to_string())
        }
        // A `null` result means the node has not seen the transaction yet.
        ClientErrorKind::SerdeJson(e) if e.to_string().contains("null") => {
            FetchError::Transient(format!("transaction not yet available: {}", e))
        }
        _ => FetchError::InvalidPayload(err.to_string()),
    }
}

/// Helius enhanced transaction API (`POST /v0/transactions`).
pub struct HeliusFetcher {
    client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HeliusFetcher {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transient(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            timeout,
        })
    }

    async fn request(&self, signature: &str) -> Result<UpstreamTransaction, FetchError> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("api-key", self.api_key.as_str())])
            .json(&serde_json::json!({ "transactions": [signature] }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout.as_secs())
                } else {
                    FetchError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Transient(format!("upstream returned {}", status)));
        }
        if !status.is_success() {
            return Err(FetchError::InvalidPayload(format!("upstream returned {}", status)));
        }

        let mut transactions: Vec<HeliusTransaction> = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidPayload(format!("undecodable enhanced transaction: {}", e)))?;

        match transactions.iter().position(|tx| tx.signature == signature) {
            Some(index) => Ok(UpstreamTransaction::Enhanced(Box::new(transactions.swap_remove(index)))),
            None => Err(FetchError::Transient("transaction not yet indexed".to_string())),
        }
    }
}

#[async_trait]
impl TransactionFetcher for HeliusFetcher {
    async fn fetch(&self, signature: &str) -> Result<UpstreamTransaction, FetchError> {
        timeout(self.timeout, self.request(signature))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout.as_secs()))?
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Fetch with bounded retries on transient failures only. `on_retry` sees
/// the attempt number and the error that caused it.
pub async fn fetch_with_retry<F>(
    fetcher: &dyn TransactionFetcher,
    signature: &str,
    policy: RetryPolicy,
    mut on_retry: F,
) -> Result<UpstreamTransaction, FetchError>
where
    F: FnMut(u32, &FetchError) + Send,
{
    let mut attempt = 0u32;
    loop {
        match fetcher.fetch(signature).await {
            Ok(tx) => return Ok(tx),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                on_retry(attempt, &e);
                let delay = policy.backoff * attempt;
                debug!(signature, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying fetch");
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
