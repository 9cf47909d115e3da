use thiserror::Error;

/// Infrastructure failures. Classification outcomes are never errors; they
/// travel as `EraseRecord` values.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("gRPC connection error: {0}")]
    GrpcConnection(String),

    #[error("gRPC stream error: {0}")]
    GrpcStream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Job queue error: {0}")]
    Queue(String),

    #[error("Lock store error: {0}")]
    Lock(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Redis(err.to_string())
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Failure to obtain a transaction payload from the upstream provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("fetch timed out after {0}s")]
    Timeout(u64),

    /// Transport errors, 5xx responses, and not-yet-visible transactions.
    #[error("transient upstream failure: {0}")]
    Transient(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transient(_))
    }
}
