use crate::error::AppError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// Set-if-absent key store with expiry.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// `true` when this call created the key.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, AppError>;

    async fn release(&self, key: &str) -> Result<(), AppError>;
}

#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, AppError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, expires_at| *expires_at > now);
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<(), AppError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// `SET key 1 NX EX ttl`, so expiry is enforced by Redis across restarts.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: MultiplexedConnection,
}

impl RedisLockStore {
    pub async fn connect(client: &redis::Client) -> Result<Self, AppError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL").arg(key).query_async::<_, i64>(&mut conn).await?;
        Ok(())
    }
}

/// Per-signature processing claim. Cohorts use separate namespaces so a
/// signature touching both a whale and a KOL is processed once for each.
#[derive(Clone)]
pub struct DedupLock {
    store: Arc<dyn LockStore>,
    namespace: String,
    ttl: Duration,
}

impl DedupLock {
    pub fn new(store: Arc<dyn LockStore>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl,
        }
    }

    pub fn key(signature: &str) -> String {
        format!("processing:{}", signature)
    }

    /// Store key for this cohort: `processing:{signature}` with the cohort
    /// appended, so every claim on a signature shares one key prefix.
    pub fn scoped_key(&self, signature: &str) -> String {
        if self.namespace.is_empty() {
            Self::key(signature)
        } else {
            format!("{}:{}", Self::key(signature), self.namespace)
        }
    }

    pub async fn claim(&self, signature: &str) -> Result<bool, AppError> {
        let key = self.scoped_key(signature);
        let acquired = self.store.try_acquire(&key, self.ttl).await?;
        debug!(key = %key, acquired, "Dedup lock claim");
        Ok(acquired)
    }

    /// Give the claim back so a redelivery may try again.
    pub async fn abandon(&self, signature: &str) -> Result<(), AppError> {
        self.store.release(&self.scoped_key(signature)).await
    }
}
