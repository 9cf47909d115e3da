use crate::dispatch::job::Cohort;
use crate::error::AppError;
use crate::metrics;
use crate::swap::models::{Direction, ParsedSwap, SwapOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Client;
use tracing::debug;

/// Storage row for one swap record. Amounts are decimal strings so no
/// precision is lost between `i128` and `NUMERIC`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSwapRecord {
    pub signature: String,
    pub swapper: String,
    pub cohort: Cohort,
    /// `single`, or `sell`/`buy` for the legs of a split pair
    pub leg: String,
    pub direction: Direction,
    pub token_address: String,
    pub token_symbol: Option<String>,
    pub quote_address: String,
    pub quote_symbol: Option<String>,
    pub counter_address: Option<String>,
    pub amount: StoredAmount,
    pub sol_amount: StoredSolAmount,
    pub protocol: Option<String>,
    pub confidence: String,
    pub block_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAmount {
    pub buy_amount: String,
    pub sell_amount: String,
}

/// Quote-side totals: what a BUY cost and what a SELL returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSolAmount {
    pub buy_sol_amount: String,
    pub sell_sol_amount: String,
}

impl StoredSwapRecord {
    pub fn from_leg(swap: &ParsedSwap, leg: &str, cohort: Cohort) -> Self {
        let base = swap.amounts.base_amount.to_string();
        let (amount, sol_amount) = match swap.direction {
            Direction::Buy => (
                StoredAmount {
                    buy_amount: base,
                    sell_amount: "0".to_string(),
                },
                StoredSolAmount {
                    buy_sol_amount: swap.amounts.total_wallet_cost.to_string(),
                    sell_sol_amount: "0".to_string(),
                },
            ),
            Direction::Sell => (
                StoredAmount {
                    buy_amount: "0".to_string(),
                    sell_amount: base,
                },
                StoredSolAmount {
                    buy_sol_amount: "0".to_string(),
                    sell_sol_amount: swap.amounts.net_wallet_received.to_string(),
                },
            ),
        };

        Self {
            signature: swap.signature.clone(),
            swapper: swap.swapper.clone(),
            cohort,
            leg: leg.to_string(),
            direction: swap.direction,
            token_address: swap.base_asset.mint.clone(),
            token_symbol: swap.base_asset.symbol.clone(),
            quote_address: swap.quote_asset.mint.clone(),
            quote_symbol: swap.quote_asset.symbol.clone(),
            counter_address: swap.counter_asset.as_ref().map(|asset| asset.mint.clone()),
            amount,
            sol_amount,
            protocol: swap.protocol.clone(),
            confidence: swap.confidence.as_str().to_string(),
            block_time: swap.timestamp,
        }
    }

    /// One row per leg; a split pair always yields both.
    pub fn from_outcome(outcome: &SwapOutcome, cohort: Cohort) -> Vec<Self> {
        match outcome {
            SwapOutcome::Single(swap) => vec![Self::from_leg(swap, "single", cohort)],
            SwapOutcome::Split(pair) => vec![
                Self::from_leg(&pair.sell_record, "sell", cohort),
                Self::from_leg(&pair.buy_record, "buy", cohort),
            ],
        }
    }
}

/// Durable home of swap outcomes and the authoritative uniqueness check.
#[async_trait]
pub trait SwapStore: Send + Sync {
    async fn is_recorded(&self, signature: &str, swapper: &str) -> Result<bool, AppError>;

    /// Writes every leg or none. `false` when the outcome was already present.
    async fn insert_outcome(&self, outcome: &SwapOutcome, cohort: Cohort) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PostgresSwapStore {
    client: Arc<Mutex<Client>>,
}

impl PostgresSwapStore {
    pub fn new(client: Arc<Mutex<Client>>) -> Self {
        Self { client }
    }
}

const INSERT_SWAP: &str = r#"
    INSERT INTO swaps (
        signature, swapper, cohort, leg, direction,
        token_address, token_symbol, quote_address, quote_symbol, counter_address,
        buy_amount, sell_amount, buy_sol_amount, sell_sol_amount,
        protocol, confidence, block_time
    )
    VALUES (
        $1, $2, $3, $4, $5,
        $6, $7, $8, $9, $10,
        $11::text::numeric, $12::text::numeric, $13::text::numeric, $14::text::numeric,
        $15, $16, $17
    )
    ON CONFLICT (signature, swapper, leg) DO NOTHING
"#;

#[async_trait]
impl SwapStore for PostgresSwapStore {
    async fn is_recorded(&self, signature: &str, swapper: &str) -> Result<bool, AppError> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(
                "SELECT 1 FROM swaps WHERE signature = $1 AND swapper = $2 LIMIT 1",
                &[&signature, &swapper],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to check swap: {}", e)))?;
        Ok(row.is_some())
    }

    async fn insert_outcome(&self, outcome: &SwapOutcome, cohort: Cohort) -> Result<bool, AppError> {
        let records = StoredSwapRecord::from_outcome(outcome, cohort);
        let timer = metrics::DATABASE_OPERATION_TIME.start_timer();

        let mut client = self.client.lock().await;
        let transaction = client
            .transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut inserted = 0u64;
        for record in &records {
            inserted += transaction
                .execute(
                    INSERT_SWAP,
                    &[
                        &record.signature,
                        &record.swapper,
                        &record.cohort.as_str(),
                        &record.leg,
                        &record.direction.as_str(),
                        &record.token_address,
                        &record.token_symbol,
                        &record.quote_address,
                        &record.quote_symbol,
                        &record.counter_address,
                        &record.amount.buy_amount,
                        &record.amount.sell_amount,
                        &record.sol_amount.buy_sol_amount,
                        &record.sol_amount.sell_sol_amount,
                        &record.protocol,
                        &record.confidence,
                        &record.block_time,
                    ],
                )
                .await
                .map_err(|e| AppError::Database(format!("Failed to insert swap: {}", e)))?;
        }

        if inserted as usize != records.len() {
            // Some leg already existed; keep the earlier write intact.
            transaction
                .rollback()
                .await
                .map_err(|e| AppError::Database(format!("Failed to roll back: {}", e)))?;
            timer.observe_duration();
            debug!(signature = %outcome.signature(), swapper = %outcome.swapper(), "Duplicate swap skipped");
            return Ok(false);
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit swap: {}", e)))?;
        timer.observe_duration();

        debug!(
            signature = %outcome.signature(),
            swapper = %outcome.swapper(),
            legs = records.len(),
            "Inserted swap"
        );
        Ok(true)
    }
}

/// Process-local store for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemorySwapStore {
    records: Mutex<Vec<StoredSwapRecord>>,
}

impl InMemorySwapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<StoredSwapRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl SwapStore for InMemorySwapStore {
    async fn is_recorded(&self, signature: &str, swapper: &str) -> Result<bool, AppError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .any(|r| r.signature == signature && r.swapper == swapper))
    }

    async fn insert_outcome(&self, outcome: &SwapOutcome, cohort: Cohort) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        let fresh = StoredSwapRecord::from_outcome(outcome, cohort);
        let exists = fresh.iter().any(|new| {
            records
                .iter()
                .any(|r| r.signature == new.signature && r.swapper == new.swapper && r.leg == new.leg)
        });
        if exists {
            return Ok(false);
        }
        records.extend(fresh);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::amount::ScaledAmount;
    use crate::solana::models::NATIVE_SOL_MINT;
    use crate::swap::models::{AssetRef, Confidence, SplitSwapPair, SwapAmounts};

    fn swap(direction: Direction, base: &str) -> ParsedSwap {
        ParsedSwap {
            signature: "sig".to_string(),
            swapper: "Whale".to_string(),
            direction,
            quote_asset: AssetRef::new(NATIVE_SOL_MINT, Some("SOL".to_string())),
            base_asset: AssetRef::new(base, Some("BONK".to_string())),
            counter_asset: None,
            amounts: SwapAmounts {
                base_amount: ScaledAmount::new(1_500_000, 6),
                swap_input_amount: ScaledAmount::new(250_000_000, 9),
                swap_output_amount: ScaledAmount::new(1_500_000, 6),
                total_wallet_cost: ScaledAmount::new(250_005_000, 9),
                net_wallet_received: ScaledAmount::new(249_995_000, 9),
            },
            protocol: Some("jupiter".to_string()),
            confidence: Confidence::High,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn buy_maps_to_buy_amount_and_cost() {
        let record = StoredSwapRecord::from_leg(&swap(Direction::Buy, "Bonk"), "single", Cohort::Whale);
        assert_eq!(record.amount.buy_amount, "1.5");
        assert_eq!(record.amount.sell_amount, "0");
        assert_eq!(record.sol_amount.buy_sol_amount, "0.250005");
        assert_eq!(record.sol_amount.sell_sol_amount, "0");
        assert_eq!(record.token_symbol.as_deref(), Some("BONK"));
    }

    #[test]
    fn sell_maps_to_sell_amount_and_net_received() {
        let record = StoredSwapRecord::from_leg(&swap(Direction::Sell, "Bonk"), "single", Cohort::Kol);
        assert_eq!(record.amount.sell_amount, "1.5");
        assert_eq!(record.sol_amount.sell_sol_amount, "0.249995");
        assert_eq!(record.cohort, Cohort::Kol);
    }

    fn pair() -> SwapOutcome {
        SwapOutcome::Split(SplitSwapPair {
            signature: "sig".to_string(),
            swapper: "Whale".to_string(),
            sell_record: swap(Direction::Sell, "Y"),
            buy_record: swap(Direction::Buy, "Z"),
        })
    }

    #[tokio::test]
    async fn split_pair_is_written_as_two_rows_once() {
        let store = InMemorySwapStore::new();
        assert!(!store.is_recorded("sig", "Whale").await.unwrap());
        assert!(store.insert_outcome(&pair(), Cohort::Whale).await.unwrap());
        assert!(store.is_recorded("sig", "Whale").await.unwrap());
        assert!(!store.insert_outcome(&pair(), Cohort::Whale).await.unwrap());

        let legs: Vec<String> = store.records().await.into_iter().map(|r| r.leg).collect();
        assert_eq!(legs, vec!["sell", "buy"]);
    }
}
