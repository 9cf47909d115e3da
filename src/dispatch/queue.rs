use crate::dispatch::job::ProcessingJob;
use crate::error::AppError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};
use tracing::warn;

/// FIFO of processing jobs shared by the intake task and the worker pool.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Waits while the queue is full.
    async fn push(&self, job: ProcessingJob) -> Result<(), AppError>;

    /// Waits for the next job; `None` once the queue is closed and drained.
    async fn pop(&self) -> Result<Option<ProcessingJob>, AppError>;

    async fn len(&self) -> Result<usize, AppError>;

    async fn close(&self);
}

#[derive(Debug)]
struct QueueState {
    deque: VecDeque<ProcessingJob>,
    closed: bool,
}

/// Bounded in-process queue; producers block when it is full.
#[derive(Debug)]
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

impl InMemoryJobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                deque: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            capacity: capacity.max(1),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn push(&self, job: ProcessingJob) -> Result<(), AppError> {
        loop {
            let mut guard = self.state.lock().await;
            if guard.closed {
                return Err(AppError::Queue("queue closed".to_string()));
            }
            if guard.deque.len() < self.capacity {
                guard.deque.push_back(job);
                drop(guard);
                self.not_empty.notify_one();
                return Ok(());
            }
            // Registered before unlocking so a close() in between is not missed.
            let notified = self.not_full.notified();
            drop(guard);
            notified.await;
        }
    }

    async fn pop(&self) -> Result<Option<ProcessingJob>, AppError> {
        loop {
            let mut guard = self.state.lock().await;
            if let Some(job) = guard.deque.pop_front() {
                drop(guard);
                self.not_full.notify_one();
                return Ok(Some(job));
            }
            if guard.closed {
                return Ok(None);
            }
            let notified = self.not_empty.notified();
            drop(guard);
            notified.await;
        }
    }

    async fn len(&self) -> Result<usize, AppError> {
        Ok(self.state.lock().await.deque.len())
    }

    async fn close(&self) {
        let mut guard = self.state.lock().await;
        guard.closed = true;
        drop(guard);
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }
}

const REDIS_POP_TIMEOUT_SECS: u64 = 1;

/// Redis list queue (`RPUSH`/`BLPOP`). Jobs outlive a worker restart.
///
/// Pops use their own connection so a blocking `BLPOP` never stalls pushes.
pub struct RedisJobQueue {
    key: String,
    push_conn: MultiplexedConnection,
    pop_conn: Mutex<MultiplexedConnection>,
    closed: AtomicBool,
}

impl RedisJobQueue {
    pub async fn connect(client: &redis::Client, namespace: &str) -> Result<Self, AppError> {
        Ok(Self {
            key: format!("{}:jobs", namespace),
            push_conn: client.get_multiplexed_async_connection().await?,
            pop_conn: Mutex::new(client.get_multiplexed_async_connection().await?),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn push(&self, job: ProcessingJob) -> Result<(), AppError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::Queue("queue closed".to_string()));
        }
        let payload = serde_json::to_string(&job)
            .map_err(|e| AppError::Queue(format!("failed to encode job: {}", e)))?;
        let mut conn = self.push_conn.clone();
        redis::cmd("RPUSH")
            .arg(&self.key)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<ProcessingJob>, AppError> {
        let mut conn = self.pop_conn.lock().await;
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Ok(None);
            }
            let reply: Option<(String, String)> = redis::cmd("BLPOP")
                .arg(&self.key)
                .arg(REDIS_POP_TIMEOUT_SECS)
                .query_async(&mut *conn)
                .await?;
            let Some((_, payload)) = reply else {
                continue;
            };
            match serde_json::from_str::<ProcessingJob>(&payload) {
                Ok(job) => return Ok(Some(job)),
                Err(e) => warn!(error = %e, key = %self.key, "Discarding undecodable job"),
            }
        }
    }

    async fn len(&self) -> Result<usize, AppError> {
        let mut conn = self.push_conn.clone();
        let len: usize = redis::cmd("LLEN").arg(&self.key).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::job::Cohort;
    use std::sync::Arc;
    use std::time::Duration;

    fn job(signature: &str) -> ProcessingJob {
        ProcessingJob::new(signature, "Whale", Cohort::Whale)
    }

    #[tokio::test]
    async fn pops_in_fifo_order() {
        let queue = InMemoryJobQueue::new(4);
        queue.push(job("a")).await.unwrap();
        queue.push(job("b")).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 2);
        assert_eq!(queue.pop().await.unwrap().unwrap().signature, "a");
        assert_eq!(queue.pop().await.unwrap().unwrap().signature, "b");
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure_until_a_pop() {
        let queue = Arc::new(InMemoryJobQueue::new(1));
        queue.push(job("a")).await.unwrap();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(job("b")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        assert_eq!(queue.pop().await.unwrap().unwrap().signature, "a");
        producer.await.unwrap().unwrap();
        assert_eq!(queue.pop().await.unwrap().unwrap().signature, "b");
    }

    #[tokio::test]
    async fn closed_queue_drains_then_ends() {
        let queue = InMemoryJobQueue::new(4);
        queue.push(job("a")).await.unwrap();
        queue.close().await;
        assert!(queue.push(job("b")).await.is_err());
        assert!(queue.pop().await.unwrap().is_some());
        assert!(queue.pop().await.unwrap().is_none());
    }
}
