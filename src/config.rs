use crate::error::AppError;
use crate::swap::core_assets::CoreAssets;
use crate::swap::deltas::{DeltaThresholds, DEFAULT_NATIVE_DUST_LAMPORTS, DEFAULT_TOKEN_DUST_RAW};
use crate::swap::models::Confidence;
use crate::swap::parser::ParserConfig;
use crate::swap::usd_filter::DEFAULT_MIN_USD_NOTIONAL;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_RPC_HTTP_URL: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_HELIUS_API_URL: &str = "https://api.helius.xyz/v0/transactions";
const DEFAULT_PRICE_API_URL: &str = "https://lite-api.jup.ag/price/v2";

/// Application configuration loaded from environment variables.
///
/// All values are validated during construction so a misconfigured
/// environment fails at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub grpc_endpoint: String,
    pub grpc_token: String,
    pub rpc_http_url: String,
    /// Selects the enhanced transaction provider when present
    pub helius_api_key: Option<String>,
    pub helius_api_url: String,
    pub price_api_url: String,
    pub database_url: String,
    /// In-memory lock store and job queue when absent
    pub redis_url: Option<String>,
    pub log_level: String,
    pub metrics_port: u16,
    pub include_failed_transactions: bool,
    pub whale_worker_concurrency: usize,
    pub kol_worker_concurrency: usize,
    pub lock_ttl: Duration,
    pub fetch_timeout: Duration,
    pub fetch_max_retries: u32,
    pub fetch_retry_backoff: Duration,
    pub min_confidence: Confidence,
    pub min_usd_notional: f64,
    pub core_assets: CoreAssets,
    pub native_dust_lamports: i128,
    pub token_dust_raw: i128,
    pub address_refresh_interval: Duration,
    pub ingest_channel_capacity: usize,
    pub queue_capacity: usize,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Required: `GRPC_ENDPOINT`, `GRPC_TOKEN`, `DATABASE_URL`. Everything
    /// else has a default.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{} not set", key)))
        };
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let grpc_endpoint = required("GRPC_ENDPOINT")?;
        let grpc_token = required("GRPC_TOKEN")?;
        let database_url = required("DATABASE_URL")?;
        Self::validate_grpc_url(&grpc_endpoint)?;

        let core_assets = match optional("CORE_ASSET_ADDRESSES") {
            Some(csv) => {
                let entries: Vec<&str> = csv.split(',').map(str::trim).filter(|e| !e.is_empty()).collect();
                for entry in &entries {
                    let mint = entry.split_once(':').map_or(*entry, |(mint, _)| mint);
                    Self::validate_base58_address(mint.trim())?;
                }
                let core = CoreAssets::from_entries(entries);
                if core.is_empty() {
                    return Err(AppError::Config("CORE_ASSET_ADDRESSES is empty".to_string()));
                }
                core
            }
            None => CoreAssets::default(),
        };

        let min_confidence = match optional("MIN_CONFIDENCE") {
            Some(value) => value
                .parse::<Confidence>()
                .map_err(|e| AppError::Config(format!("MIN_CONFIDENCE: {}", e)))?,
            None => Confidence::Low,
        };

        let min_usd_notional: f64 = parse_or(&lookup, "MIN_USD_NOTIONAL", DEFAULT_MIN_USD_NOTIONAL)?;
        if !min_usd_notional.is_finite() || min_usd_notional < 0.0 {
            return Err(AppError::Config(format!(
                "MIN_USD_NOTIONAL must be a non-negative number, got {}",
                min_usd_notional
            )));
        }

        let include_failed_transactions = match optional("INCLUDE_FAILED_TRANSACTIONS") {
            Some(value) => parse_env_bool(&value).ok_or_else(|| {
                AppError::Config(format!("INCLUDE_FAILED_TRANSACTIONS is not a boolean: {}", value))
            })?,
            None => false,
        };

        Ok(Self {
            grpc_endpoint,
            grpc_token,
            rpc_http_url: optional("RPC_HTTP_URL").unwrap_or_else(|| DEFAULT_RPC_HTTP_URL.to_string()),
            helius_api_key: optional("HELIUS_API_KEY"),
            helius_api_url: optional("HELIUS_API_URL").unwrap_or_else(|| DEFAULT_HELIUS_API_URL.to_string()),
            price_api_url: optional("PRICE_API_URL").unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string()),
            database_url,
            redis_url: optional("REDIS_URL"),
            log_level: optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            metrics_port: parse_or(&lookup, "METRICS_PORT", 9090)?,
            include_failed_transactions,
            whale_worker_concurrency: positive(parse_or(&lookup, "WHALE_WORKER_CONCURRENCY", 8)?, "WHALE_WORKER_CONCURRENCY")?,
            kol_worker_concurrency: positive(parse_or(&lookup, "KOL_WORKER_CONCURRENCY", 4)?, "KOL_WORKER_CONCURRENCY")?,
            lock_ttl: Duration::from_secs(positive(parse_or(&lookup, "LOCK_TTL_SECONDS", 300)?, "LOCK_TTL_SECONDS")?),
            fetch_timeout: Duration::from_secs(positive(parse_or(&lookup, "FETCH_TIMEOUT_SECONDS", 15)?, "FETCH_TIMEOUT_SECONDS")?),
            fetch_max_retries: parse_or(&lookup, "FETCH_MAX_RETRIES", 3)?,
            fetch_retry_backoff: Duration::from_millis(parse_or(&lookup, "FETCH_RETRY_BACKOFF_MS", 500)?),
            min_confidence,
            min_usd_notional,
            core_assets,
            native_dust_lamports: parse_or(&lookup, "NATIVE_DUST_LAMPORTS", DEFAULT_NATIVE_DUST_LAMPORTS)?,
            token_dust_raw: parse_or(&lookup, "TOKEN_DUST_RAW", DEFAULT_TOKEN_DUST_RAW)?,
            address_refresh_interval: Duration::from_secs(positive(parse_or(&lookup, "ADDRESS_REFRESH_SECONDS", 60)?, "ADDRESS_REFRESH_SECONDS")?),
            ingest_channel_capacity: positive(parse_or(&lookup, "INGEST_CHANNEL_CAPACITY", 1024)?, "INGEST_CHANNEL_CAPACITY")?,
            queue_capacity: positive(parse_or(&lookup, "QUEUE_CAPACITY", 10_000)?, "QUEUE_CAPACITY")?,
        })
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            core_assets: self.core_assets.clone(),
            thresholds: DeltaThresholds {
                native_dust_lamports: self.native_dust_lamports,
                token_dust_raw: self.token_dust_raw,
                ..DeltaThresholds::default()
            },
            min_confidence: self.min_confidence,
        }
    }

    /// Validate that a string is a valid base58-encoded Solana address.
    pub fn validate_base58_address(address: &str) -> Result<(), AppError> {
        let bytes = bs58::decode(address)
            .into_vec()
            .map_err(|e| AppError::Config(format!("Invalid base58 address {}: {}", address, e)))?;
        if bytes.len() != 32 {
            return Err(AppError::Config(format!(
                "Invalid address {}: decodes to {} bytes",
                address,
                bytes.len()
            )));
        }
        Ok(())
    }

    /// gRPC connections require http:// or https:// schemes.
    fn validate_grpc_url(url: &str) -> Result<(), AppError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "GRPC_ENDPOINT must be an HTTP/HTTPS URL (http:// or https://), got: {}",
                url
            )));
        }
        Ok(())
    }
}

pub(crate) fn parse_env_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{}={} is invalid: {}", key, value, e))),
        None => Ok(default),
    }
}

fn positive<T>(value: T, key: &str) -> Result<T, AppError>
where
    T: PartialOrd + Default + Copy + std::fmt::Display,
{
    if value <= T::default() {
        return Err(AppError::Config(format!("{} must be greater than zero, got {}", key, value)));
    }
    Ok(value)
}
