use crate::database::address_book::AddressBook;
use crate::error::AppError;
use crate::grpc::client::GeyserSubscription;
use crate::grpc::notification::notification_from_update;
use crate::matcher::TransactionNotification;
use crate::metrics;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const SNAPSHOT_CHECK_INTERVAL: Duration = Duration::from_secs(5);
const EMPTY_COHORT_RETRY: Duration = Duration::from_secs(30);

enum StreamEnd {
    /// Server closed the stream
    Closed,
    /// Monitored addresses changed; the filter must be rebuilt
    AddressesChanged,
    /// Intake is gone
    ReceiverDropped,
    /// Nothing to subscribe to yet
    Idle,
}

/// Keep one subscription alive for the cohort, forwarding notifications into
/// the bounded ingest channel.
///
/// Stream errors reconnect with exponential backoff capped at five minutes;
/// a clean close or an address change resubscribes immediately. Because the
/// channel is bounded, a slow intake task applies backpressure to the stream
/// rather than buffering without limit. Returns only once the receiving
/// side has shut down.
pub async fn run_cohort_stream(
    subscription: GeyserSubscription,
    addresses: AddressBook,
    sender: mpsc::Sender<TransactionNotification>,
) -> Result<(), AppError> {
    let cohort = subscription.cohort();
    let mut reconnect_attempts = 0;
    let max_reconnect_delay = Duration::from_secs(300); // 5 minutes

    loop {
        match subscribe_and_forward(&subscription, &addresses, &sender).await {
            Ok(StreamEnd::ReceiverDropped) => {
                info!(cohort = %cohort, "Ingest channel closed, stopping stream");
                metrics::STREAM_CONNECTED.with_label_values(&[cohort.as_str()]).set(0);
                return Ok(());
            }
            Ok(StreamEnd::Idle) => {}
            Ok(StreamEnd::AddressesChanged) => {
                info!(cohort = %cohort, "Monitored addresses changed, resubscribing");
                reconnect_attempts = 0;
            }
            Ok(StreamEnd::Closed) => {
                info!(cohort = %cohort, "Stream ended normally, reconnecting...");
                reconnect_attempts = 0;
                metrics::STREAM_CONNECTED.with_label_values(&[cohort.as_str()]).set(0);
                metrics::STREAM_RECONNECTIONS.with_label_values(&[cohort.as_str()]).inc();
            }
            Err(e) => {
                reconnect_attempts += 1;
                let delay = calculate_backoff_delay(reconnect_attempts, max_reconnect_delay);

                error!(
                    cohort = %cohort,
                    error = %e,
                    attempt = reconnect_attempts,
                    delay_seconds = delay.as_secs(),
                    "Stream error occurred, will retry after backoff"
                );

                metrics::STREAM_CONNECTED.with_label_values(&[cohort.as_str()]).set(0);
                metrics::STREAM_RECONNECTIONS.with_label_values(&[cohort.as_str()]).inc();
                sleep(delay).await;
            }
        }
    }
}

/// Subscribe with the current address snapshot and forward until the stream
/// ends, the snapshot changes, or intake goes away.
async fn subscribe_and_forward(
    subscription: &GeyserSubscription,
    addresses: &AddressBook,
    sender: &mpsc::Sender<TransactionNotification>,
) -> Result<StreamEnd, AppError> {
    let cohort = subscription.cohort();
    let snapshot = addresses.snapshot();
    if snapshot.is_empty() {
        // An empty include list would subscribe to every transaction.
        warn!(cohort = %cohort, "No monitored addresses, waiting before subscribing");
        sleep(EMPTY_COHORT_RETRY).await;
        return Ok(StreamEnd::Idle);
    }

    let mut client = subscription.connect().await?;
    let request = subscription.create_subscription_request(&snapshot);
    let stream = client
        .subscribe_once(request)
        .await
        .map_err(|e| AppError::GrpcStream(format!("Failed to subscribe: {}", e)))?;
    tokio::pin!(stream);

    info!(cohort = %cohort, addresses = snapshot.len(), "Subscribed to cohort transactions");

    // Mark stream as connected
    metrics::STREAM_CONNECTED.with_label_values(&[cohort.as_str()]).set(1);

    let mut snapshot_check = interval(SNAPSHOT_CHECK_INTERVAL);
    snapshot_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut forwarded = 0u64;

    loop {
        tokio::select! {
            message = stream.next() => {
                let update = match message {
                    Some(Ok(update)) => update,
                    Some(Err(status)) => {
                        return Err(AppError::GrpcStream(format!("Stream returned error: {}", status)));
                    }
                    None => return Ok(StreamEnd::Closed),
                };
                let Some(notification) = notification_from_update(update) else {
                    continue;
                };
                if sender.send(notification).await.is_err() {
                    return Ok(StreamEnd::ReceiverDropped);
                }
                forwarded += 1;
                if forwarded % 100 == 0 {
                    debug!(cohort = %cohort, forwarded, "Forwarding notifications");
                }
            }
            // A refresh installs a new snapshot; the filter has to follow it
            _ = snapshot_check.tick() => {
                if !Arc::ptr_eq(&snapshot, &addresses.snapshot()) {
                    return Ok(StreamEnd::AddressesChanged);
                }
            }
        }
    }
}

/// Calculate exponential backoff delay for reconnection attempts.
///
/// Doubles from one second per attempt and never exceeds `max_delay`.
fn calculate_backoff_delay(attempt: u32, max_delay: Duration) -> Duration {
    let base_delay = Duration::from_secs(1);
    let exponential_delay = base_delay * 2u32.saturating_pow(attempt.min(10));
    exponential_delay.min(max_delay)
}
