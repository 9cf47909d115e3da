use crate::database::address_book::AddressBook;
use crate::dispatch::job::{Cohort, ProcessingJob};
use crate::dispatch::lock::DedupLock;
use crate::dispatch::queue::JobQueue;
use crate::error::AppError;
use crate::matcher::{match_addresses, TransactionNotification};
use crate::metrics;
use crate::swap::models::EraseReason;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// No monitored address involved
    Ignored,
    /// Another delivery already claimed the signature
    Duplicate,
    Enqueued { jobs: usize },
}

/// Turns notifications into processing jobs, at most once per signature
/// while the claim lives.
pub struct IntakeCoordinator {
    cohort: Cohort,
    addresses: AddressBook,
    lock: DedupLock,
    queue: Arc<dyn JobQueue>,
}

impl IntakeCoordinator {
    pub fn new(cohort: Cohort, addresses: AddressBook, lock: DedupLock, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            cohort,
            addresses,
            lock,
            queue,
        }
    }

    pub async fn handle(&self, notification: &TransactionNotification) -> Result<IntakeOutcome, AppError> {
        let cohort = self.cohort.as_str();
        metrics::NOTIFICATIONS_RECEIVED.with_label_values(&[cohort]).inc();

        let matched = match_addresses(notification, &self.addresses.snapshot());
        if matched.is_empty() {
            debug!(signature = %notification.signature, cohort, "No monitored address in notification");
            return Ok(IntakeOutcome::Ignored);
        }

        if !self.lock.claim(&notification.signature).await? {
            metrics::DUPLICATES_DROPPED.with_label_values(&[cohort]).inc();
            metrics::ERASES_TOTAL
                .with_label_values(&[cohort, EraseReason::Duplicate.as_str()])
                .inc();
            info!(
                signature = %notification.signature,
                cohort,
                reason = EraseReason::Duplicate.as_str(),
                "Dropping notification"
            );
            return Ok(IntakeOutcome::Duplicate);
        }

        for address in &matched {
            let job = ProcessingJob::new(notification.signature.clone(), address.clone(), self.cohort);
            if let Err(e) = self.queue.push(job).await {
                if let Err(release) = self.lock.abandon(&notification.signature).await {
                    warn!(signature = %notification.signature, error = %release, "Failed to release claim");
                }
                return Err(e);
            }
        }

        metrics::JOBS_ENQUEUED.with_label_values(&[cohort]).inc_by(matched.len() as u64);
        if let Ok(depth) = self.queue.len().await {
            metrics::QUEUE_DEPTH.with_label_values(&[cohort]).set(depth as i64);
        }
        debug!(
            signature = %notification.signature,
            cohort,
            addresses = ?matched,
            "Enqueued processing jobs"
        );
        Ok(IntakeOutcome::Enqueued { jobs: matched.len() })
    }

    /// Drain the ingest channel until every sender is gone, then close the queue.
    pub async fn run(self, mut notifications: mpsc::Receiver<TransactionNotification>) {
        info!(cohort = %self.cohort, "Intake started");
        while let Some(notification) = notifications.recv().await {
            if let Err(e) = self.handle(&notification).await {
                metrics::INTAKE_ERRORS.inc();
                warn!(
                    signature = %notification.signature,
                    cohort = %self.cohort,
                    error = %e,
                    "Intake failed for notification"
                );
            }
        }
        self.queue.close().await;
        info!(cohort = %self.cohort, "Intake stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::lock::{InMemoryLockStore, DEFAULT_LOCK_TTL};
    use crate::dispatch::queue::InMemoryJobQueue;

    fn coordinator(queue: Arc<InMemoryJobQueue>) -> IntakeCoordinator {
        IntakeCoordinator::new(
            Cohort::Whale,
            AddressBook::new(["WhaleA".to_string(), "WhaleB".to_string()]),
            DedupLock::new(Arc::new(InMemoryLockStore::new()), "whale", DEFAULT_LOCK_TTL),
            queue,
        )
    }

    fn notification(keys: &[&str]) -> TransactionNotification {
        TransactionNotification {
            signature: "sig".to_string(),
            account_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn one_job_per_matched_address() {
        let queue = Arc::new(InMemoryJobQueue::new(16));
        let intake = coordinator(queue.clone());
        let outcome = intake.handle(&notification(&["WhaleA", "Other", "WhaleB"])).await.unwrap();
        assert_eq!(outcome, IntakeOutcome::Enqueued { jobs: 2 });
        assert_eq!(queue.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn redelivery_is_dropped_as_duplicate() {
        let queue = Arc::new(InMemoryJobQueue::new(16));
        let intake = coordinator(queue.clone());
        intake.handle(&notification(&["WhaleA"])).await.unwrap();
        let second = intake.handle(&notification(&["WhaleA"])).await.unwrap();
        assert_eq!(second, IntakeOutcome::Duplicate);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unmatched_notification_takes_no_claim() {
        let queue = Arc::new(InMemoryJobQueue::new(16));
        let intake = coordinator(queue.clone());
        assert_eq!(intake.handle(&notification(&["Other"])).await.unwrap(), IntakeOutcome::Ignored);
        assert_eq!(
            intake.handle(&notification(&["WhaleA"])).await.unwrap(),
            IntakeOutcome::Enqueued { jobs: 1 }
        );
    }

    #[tokio::test]
    async fn failed_enqueue_releases_the_claim() {
        let queue = Arc::new(InMemoryJobQueue::new(16));
        let intake = coordinator(queue.clone());
        queue.close().await;
        assert!(intake.handle(&notification(&["WhaleA"])).await.is_err());
        assert!(intake.lock.claim("sig").await.unwrap());
    }
}
