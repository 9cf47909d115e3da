use crate::database::address_book::AddressBook;
use crate::database::repository::SwapStore;
use crate::dispatch::fetch::{fetch_with_retry, RetryPolicy, TransactionFetcher};
use crate::dispatch::job::{Cohort, ProcessingJob};
use crate::dispatch::queue::JobQueue;
use crate::error::{AppError, FetchError};
use crate::metrics;
use crate::pricing::PriceOracle;
use crate::solana::adapter::canonicalize;
use crate::swap::models::{EraseReason, EraseRecord, ParserResult, SwapOutcome};
use crate::swap::parser::{parse_swap, ParserConfig};
use crate::swap::usd_filter::{fill_reserve_equivalents, UsdFilter};
use crate::swap::validator::validate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    Stored(SwapOutcome),
    Erased(EraseRecord),
}

/// Runs one job through fetch, canonicalization, classification, filtering
/// and storage.
pub struct SwapWorker {
    cohort: Cohort,
    fetcher: Arc<dyn TransactionFetcher>,
    retry: RetryPolicy,
    addresses: AddressBook,
    parser: ParserConfig,
    usd_filter: UsdFilter,
    prices: Arc<dyn PriceOracle>,
    store: Arc<dyn SwapStore>,
}

impl SwapWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cohort: Cohort,
        fetcher: Arc<dyn TransactionFetcher>,
        retry: RetryPolicy,
        addresses: AddressBook,
        parser: ParserConfig,
        usd_filter: UsdFilter,
        prices: Arc<dyn PriceOracle>,
        store: Arc<dyn SwapStore>,
    ) -> Self {
        Self {
            cohort,
            fetcher,
            retry,
            addresses,
            parser,
            usd_filter,
            prices,
            store,
        }
    }

    pub async fn process(&self, job: &ProcessingJob) -> Result<ProcessingOutcome, AppError> {
        let timer = metrics::JOB_PROCESSING_TIME.start_timer();
        let outcome = self.run_pipeline(job).await;
        timer.observe_duration();

        match &outcome {
            Ok(ProcessingOutcome::Stored(swap)) => {
                let kind = match swap {
                    SwapOutcome::Single(_) => "single",
                    SwapOutcome::Split(_) => "split",
                };
                metrics::SWAPS_STORED.with_label_values(&[self.cohort.as_str(), kind]).inc();
                metrics::LAST_SWAP_TIMESTAMP.set(chrono::Utc::now().timestamp() as f64);
                info!(
                    signature = %job.signature,
                    address = %job.monitored_address,
                    cohort = %self.cohort,
                    kind,
                    confidence = swap.confidence().as_str(),
                    "Stored swap"
                );
            }
            Ok(ProcessingOutcome::Erased(record)) => {
                metrics::ERASES_TOTAL
                    .with_label_values(&[self.cohort.as_str(), record.reason.as_str()])
                    .inc();
                debug!(
                    signature = %job.signature,
                    address = %job.monitored_address,
                    cohort = %self.cohort,
                    reason = record.reason.as_str(),
                    detail = record.debug_info.detail.as_deref().unwrap_or(""),
                    "Erased transaction"
                );
            }
            Err(e) => {
                warn!(
                    signature = %job.signature,
                    address = %job.monitored_address,
                    cohort = %self.cohort,
                    error = %e,
                    "Job failed"
                );
            }
        }
        outcome
    }

    async fn run_pipeline(&self, job: &ProcessingJob) -> Result<ProcessingOutcome, AppError> {
        let erase = |reason: EraseReason| EraseRecord::new(job.signature.clone(), reason);

        // The snapshot may have changed since intake matched the address.
        if !self.addresses.contains(&job.monitored_address) {
            return Ok(ProcessingOutcome::Erased(
                erase(self.cohort.not_found_reason()).with_detail(job.monitored_address.clone()),
            ));
        }

        let cohort = self.cohort.as_str();
        let upstream = match fetch_with_retry(self.fetcher.as_ref(), &job.signature, self.retry, |_, _| {
            metrics::FETCH_RETRIES.with_label_values(&[cohort]).inc();
        })
        .await
        {
            Ok(upstream) => upstream,
            Err(e) => {
                let reason = match e {
                    FetchError::Timeout(_) => EraseReason::FetchTimeout,
                    FetchError::Transient(_) => EraseReason::FetchFailed,
                    FetchError::InvalidPayload(_) => EraseReason::InvalidPayload,
                };
                return Ok(ProcessingOutcome::Erased(erase(reason).with_detail(e.to_string())));
            }
        };

        let tx = match canonicalize(&upstream) {
            Ok(tx) => tx,
            Err(e) => {
                return Ok(ProcessingOutcome::Erased(
                    erase(EraseReason::InvalidPayload).with_detail(e.to_string()),
                ))
            }
        };

        let mut outcome = match parse_swap(&tx, &job.monitored_address, &self.parser) {
            ParserResult::Success { data } => data,
            ParserResult::Erase(record) => return Ok(ProcessingOutcome::Erased(record)),
        };

        if let Err(violation) = validate(&outcome) {
            return Ok(ProcessingOutcome::Erased(erase(EraseReason::ValidatorErase).with_detail(violation)));
        }

        let reserve = self.parser.core_assets.implicit_reserve();
        let mut mints = UsdFilter::mints_to_price(&outcome);
        if !mints.contains(&reserve.mint) {
            mints.push(reserve.mint.clone());
        }
        let prices = self.prices.usd_prices(&mints).await;
        let evaluation = self.usd_filter.evaluate(&outcome, &prices);
        if !evaluation.passed {
            let detail = match evaluation.max_value() {
                Some(value) => format!("max notional ${:.2}", value),
                None => "no usd value".to_string(),
            };
            return Ok(ProcessingOutcome::Erased(erase(EraseReason::UsdFilter).with_detail(detail)));
        }
        fill_reserve_equivalents(&mut outcome, &evaluation, prices.get(&reserve.mint).copied());

        if self.store.is_recorded(outcome.signature(), outcome.swapper()).await? {
            return Ok(ProcessingOutcome::Erased(erase(EraseReason::Duplicate).with_detail("already stored")));
        }
        if !self.store.insert_outcome(&outcome, self.cohort).await? {
            return Ok(ProcessingOutcome::Erased(erase(EraseReason::Duplicate).with_detail("concurrent write")));
        }

        Ok(ProcessingOutcome::Stored(outcome))
    }
}

/// Pull jobs with at most `concurrency` in flight. Returns once the queue
/// is closed and every in-flight job has finished.
pub async fn run_worker_pool(worker: Arc<SwapWorker>, queue: Arc<dyn JobQueue>, concurrency: usize) {
    let concurrency = concurrency.max(1);
    let slots = Arc::new(Semaphore::new(concurrency));
    let cohort = worker.cohort;
    info!(cohort = %cohort, concurrency, "Worker pool started");

    loop {
        let Ok(permit) = slots.clone().acquire_owned().await else {
            break;
        };
        let job = match queue.pop().await {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(e) => {
                warn!(cohort = %cohort, error = %e, "Failed to pop job");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };
        if let Ok(depth) = queue.len().await {
            metrics::QUEUE_DEPTH.with_label_values(&[cohort.as_str()]).set(depth as i64);
        }

        let worker = worker.clone();
        tokio::spawn(async move {
            let _ = worker.process(&job).await;
            drop(permit);
        });
    }

    // Wait for in-flight jobs by reclaiming every slot.
    let _ = slots.acquire_many(concurrency as u32).await;
    info!(cohort = %cohort, "Worker pool stopped");
}
