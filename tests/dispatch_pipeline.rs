use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use whale_swap_tracker::database::address_book::AddressBook;
use whale_swap_tracker::database::repository::{InMemorySwapStore, SwapStore};
use whale_swap_tracker::dispatch::fetch::{RetryPolicy, TransactionFetcher};
use whale_swap_tracker::dispatch::lock::{DedupLock, InMemoryLockStore};
use whale_swap_tracker::dispatch::queue::{InMemoryJobQueue, JobQueue};
use whale_swap_tracker::dispatch::{Cohort, IntakeCoordinator, IntakeOutcome, ProcessingOutcome, SwapWorker};
use whale_swap_tracker::error::FetchError;
use whale_swap_tracker::matcher::{AccountRef, TransactionNotification};
use whale_swap_tracker::pricing::StaticPriceOracle;
use whale_swap_tracker::solana::adapter::UpstreamTransaction;
use whale_swap_tracker::solana::helius::HeliusTransaction;
use whale_swap_tracker::solana::models::NATIVE_SOL_MINT;
use whale_swap_tracker::swap::models::{Direction, EraseReason};
use whale_swap_tracker::swap::parser::ParserConfig;
use whale_swap_tracker::swap::usd_filter::UsdFilter;

const WHALE: &str = "Wha1e11111111111111111111111111111111111111";
const TOKEN: &str = "Token1111111111111111111111111111111111111";
const POOL: &str = "Poo1111111111111111111111111111111111111111";
const LOCK_TTL: Duration = Duration::from_secs(300);

/// Serves canned payloads keyed by signature.
struct CannedFetcher {
    responses: HashMap<String, Result<HeliusTransaction, FetchError>>,
}

#[async_trait]
impl TransactionFetcher for CannedFetcher {
    async fn fetch(&self, signature: &str) -> Result<UpstreamTransaction, FetchError> {
        match self.responses.get(signature) {
            Some(Ok(tx)) => Ok(UpstreamTransaction::Enhanced(Box::new(tx.clone()))),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::InvalidPayload("unknown signature".to_string())),
        }
    }
}

/// Whale spends `lamports` of SOL for 2.5 TOKEN on Raydium.
fn whale_buy(signature: &str, lamports: i64) -> HeliusTransaction {
    serde_json::from_value(json!({
        "signature": signature,
        "timestamp": 1_700_000_000,
        "fee": 5000,
        "feePayer": WHALE,
        "source": "RAYDIUM",
        "type": "SWAP",
        "transactionError": null,
        "accountData": [
            { "account": WHALE, "nativeBalanceChange": -(lamports + 5000), "tokenBalanceChanges": [] },
            { "account": "TokenAcct111111111111111111111111111111111", "nativeBalanceChange": 0,
              "tokenBalanceChanges": [{
                  "userAccount": WHALE,
                  "tokenAccount": "TokenAcct111111111111111111111111111111111",
                  "mint": TOKEN,
                  "rawTokenAmount": { "tokenAmount": "2500000", "decimals": 6 }
              }]
            }
        ],
        "tokenTransfers": [{
            "fromUserAccount": POOL,
            "toUserAccount": WHALE,
            "mint": TOKEN,
            "tokenAmount": 2.5
        }],
        "instructions": []
    }))
    .expect("valid enhanced fixture")
}

fn notification(signature: &str) -> TransactionNotification {
    TransactionNotification {
        signature: signature.to_string(),
        slot: 250_000_000,
        account_keys: vec![WHALE.to_string(), POOL.to_string()],
        inner_instructions: vec![vec![AccountRef::Index(1)]],
        ..Default::default()
    }
}

struct Harness {
    intake: IntakeCoordinator,
    queue: Arc<InMemoryJobQueue>,
    worker: SwapWorker,
    store: Arc<InMemorySwapStore>,
    addresses: AddressBook,
}

fn harness(responses: Vec<(&str, Result<HeliusTransaction, FetchError>)>) -> Harness {
    let cohort = Cohort::Whale;
    let addresses = AddressBook::new([WHALE.to_string()]);
    let queue = Arc::new(InMemoryJobQueue::new(64));
    let lock = DedupLock::new(Arc::new(InMemoryLockStore::new()), cohort.as_str(), LOCK_TTL);
    let store = Arc::new(InMemorySwapStore::new());

    let fetcher = CannedFetcher {
        responses: responses
            .into_iter()
            .map(|(sig, response)| (sig.to_string(), response))
            .collect(),
    };
    let prices = StaticPriceOracle::new([(NATIVE_SOL_MINT.to_string(), 150.0)]);

    let worker = SwapWorker::new(
        cohort,
        Arc::new(fetcher),
        RetryPolicy {
            max_retries: 0,
            backoff: Duration::from_millis(10),
        },
        addresses.clone(),
        ParserConfig::default(),
        UsdFilter::new(2.0),
        Arc::new(prices),
        store.clone(),
    );
    let intake = IntakeCoordinator::new(cohort, addresses.clone(), lock, queue.clone());

    Harness {
        intake,
        queue,
        worker,
        store,
        addresses,
    }
}

impl Harness {
    async fn process_next(&self) -> ProcessingOutcome {
        let job = assert_ok!(self.queue.pop().await).expect("queued job");
        assert_ok!(self.worker.process(&job).await)
    }
}

#[tokio::test]
async fn duplicate_delivery_stores_one_swap() {
    let h = harness(vec![("sigBuy", Ok(whale_buy("sigBuy", 1_000_000_000)))]);

    let first = assert_ok!(h.intake.handle(&notification("sigBuy")).await);
    let second = assert_ok!(h.intake.handle(&notification("sigBuy")).await);
    assert_eq!(first, IntakeOutcome::Enqueued { jobs: 1 });
    assert_eq!(second, IntakeOutcome::Duplicate);
    assert_eq!(assert_ok!(h.queue.len().await), 1);

    let ProcessingOutcome::Stored(outcome) = h.process_next().await else {
        panic!("expected stored swap");
    };
    assert_eq!(outcome.swapper(), WHALE);
    assert_eq!(outcome.legs()[0].direction, Direction::Buy);

    let records = h.store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].leg, "single");
    assert_eq!(records[0].token_address, TOKEN);
    assert_eq!(records[0].quote_address, NATIVE_SOL_MINT);
    assert_eq!(records[0].cohort, Cohort::Whale);
    assert_eq!(records[0].protocol.as_deref(), Some("raydium"));
}

#[tokio::test(start_paused = true)]
async fn redelivery_after_claim_expiry_is_caught_at_persistence() {
    let h = harness(vec![("sigLate", Ok(whale_buy("sigLate", 1_000_000_000)))]);

    assert_ok!(h.intake.handle(&notification("sigLate")).await);
    assert!(matches!(h.process_next().await, ProcessingOutcome::Stored(_)));

    tokio::time::advance(LOCK_TTL + Duration::from_secs(1)).await;

    let again = assert_ok!(h.intake.handle(&notification("sigLate")).await);
    assert_eq!(again, IntakeOutcome::Enqueued { jobs: 1 });
    let ProcessingOutcome::Erased(record) = h.process_next().await else {
        panic!("expected erase");
    };
    assert_eq!(record.reason, EraseReason::Duplicate);
    assert_eq!(h.store.records().await.len(), 1);
    assert!(assert_ok!(h.store.is_recorded("sigLate", WHALE).await));
}

#[tokio::test]
async fn notional_below_minimum_is_erased() {
    // 0.01 SOL at $150 is $1.50.
    let h = harness(vec![("sigSmall", Ok(whale_buy("sigSmall", 10_000_000)))]);

    assert_ok!(h.intake.handle(&notification("sigSmall")).await);
    let ProcessingOutcome::Erased(record) = h.process_next().await else {
        panic!("expected erase");
    };
    assert_eq!(record.reason, EraseReason::UsdFilter);
    assert!(h.store.records().await.is_empty());
}

#[tokio::test]
async fn address_removed_before_processing_is_erased() {
    let h = harness(vec![("sigGone", Ok(whale_buy("sigGone", 1_000_000_000)))]);

    assert_ok!(h.intake.handle(&notification("sigGone")).await);
    h.addresses.replace(Default::default());

    let ProcessingOutcome::Erased(record) = h.process_next().await else {
        panic!("expected erase");
    };
    assert_eq!(record.reason, EraseReason::WhaleNotFound);
    assert_eq!(record.debug_info.detail.as_deref(), Some(WHALE));
}

#[tokio::test]
async fn fetch_failures_map_to_erase_reasons() {
    let h = harness(vec![
        ("sigSlow", Err(FetchError::Timeout(10))),
        ("sigDown", Err(FetchError::Transient("503".to_string()))),
        ("sigBad", Err(FetchError::InvalidPayload("garbage".to_string()))),
    ]);

    let mut reasons = Vec::new();
    for sig in ["sigSlow", "sigDown", "sigBad"] {
        assert_ok!(h.intake.handle(&notification(sig)).await);
        match h.process_next().await {
            ProcessingOutcome::Erased(record) => reasons.push(record.reason),
            other => panic!("expected erase, got {:?}", other),
        }
    }

    assert_eq!(
        reasons,
        vec![EraseReason::FetchTimeout, EraseReason::FetchFailed, EraseReason::InvalidPayload]
    );
}

#[tokio::test]
async fn unrelated_notification_is_ignored() {
    let h = harness(Vec::new());
    let mut other = notification("sigOther");
    other.account_keys = vec![POOL.to_string()];

    let outcome = assert_ok!(h.intake.handle(&other).await);
    assert_eq!(outcome, IntakeOutcome::Ignored);
    assert_eq!(assert_ok!(h.queue.len().await), 0);
}
