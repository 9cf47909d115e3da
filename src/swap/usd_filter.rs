use crate::solana::models::NATIVE_SOL_DECIMALS;
use crate::swap::models::{Direction, ParsedSwap, SwapOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_MIN_USD_NOTIONAL: f64 = 2.0;

/// Notional USD value of one swap record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegValuation {
    pub base_mint: String,
    pub usd_value: Option<f64>,
    /// Base price inferred from the counter asset
    pub cross_priced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsdEvaluation {
    pub legs: Vec<LegValuation>,
    pub passed: bool,
}

impl UsdEvaluation {
    pub fn max_value(&self) -> Option<f64> {
        self.legs
            .iter()
            .filter_map(|leg| leg.usd_value)
            .fold(None, |max, value| Some(max.map_or(value, |m: f64| m.max(value))))
    }
}

/// Rejects swaps whose every leg is worth less than the minimum notional.
#[derive(Debug, Clone, Copy)]
pub struct UsdFilter {
    min_notional_cents: i64,
}

impl UsdFilter {
    pub fn new(min_notional_usd: f64) -> Self {
        Self {
            min_notional_cents: to_cents(min_notional_usd),
        }
    }

    /// Mints whose price the evaluation may need.
    pub fn mints_to_price(outcome: &SwapOutcome) -> Vec<String> {
        let mut mints: Vec<String> = Vec::new();
        for leg in outcome.legs() {
            let (counter_mint, _) = counter_side(leg);
            for mint in [leg.base_asset.mint.as_str(), counter_mint, leg.quote_asset.mint.as_str()] {
                if !mints.iter().any(|known| known == mint) {
                    mints.push(mint.to_string());
                }
            }
        }
        mints
    }

    pub fn evaluate(&self, outcome: &SwapOutcome, prices: &HashMap<String, f64>) -> UsdEvaluation {
        let legs: Vec<LegValuation> = outcome.legs().into_iter().map(|leg| value_leg(leg, prices)).collect();
        let passed = legs.iter().any(|leg| {
            leg.usd_value
                .map(|value| {
                    let cents = whole_cents(value);
                    cents > 0 && cents >= self.min_notional_cents
                })
                .unwrap_or(false)
        });
        UsdEvaluation { legs, passed }
    }
}

/// The asset on the other side of `leg` and how much of it moved.
fn counter_side(leg: &ParsedSwap) -> (&str, crate::solana::amount::ScaledAmount) {
    match &leg.counter_asset {
        Some(counter) => {
            let amount = match leg.direction {
                Direction::Sell => leg.amounts.swap_output_amount,
                Direction::Buy => leg.amounts.swap_input_amount,
            };
            (counter.mint.as_str(), amount)
        }
        None => {
            let amount = match leg.direction {
                Direction::Buy => leg.amounts.swap_input_amount,
                Direction::Sell => leg.amounts.swap_output_amount,
            };
            (leg.quote_asset.mint.as_str(), amount)
        }
    }
}

fn value_leg(leg: &ParsedSwap, prices: &HashMap<String, f64>) -> LegValuation {
    let base_amount = leg.amounts.base_amount.to_f64();
    let (counter_mint, counter_amount) = counter_side(leg);

    let (price, cross_priced) = match prices.get(&leg.base_asset.mint) {
        Some(price) => (Some(*price), false),
        None => match prices.get(counter_mint) {
            Some(counter_price) if base_amount > 0.0 => {
                (Some(counter_amount.to_f64() * counter_price / base_amount), true)
            }
            _ => (None, false),
        },
    };

    LegValuation {
        base_mint: leg.base_asset.mint.clone(),
        usd_value: price.map(|price| base_amount * price).filter(|v| v.is_finite()),
        cross_priced,
    }
}

/// Give split legs their reserve-denominated amounts once USD values are
/// known: the SELL leg "received" and the BUY leg "cost" that much reserve.
pub fn fill_reserve_equivalents(
    outcome: &mut SwapOutcome,
    evaluation: &UsdEvaluation,
    reserve_price: Option<f64>,
) {
    let SwapOutcome::Split(pair) = outcome else {
        return;
    };
    let Some(reserve_price) = reserve_price.filter(|p| *p > 0.0) else {
        return;
    };
    let lamports = |usd: Option<f64>| {
        usd.map(|usd| (usd / reserve_price * 1e9).round())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as i128)
    };

    if let Some(raw) = evaluation.legs.first().and_then(|leg| lamports(leg.usd_value)) {
        pair.sell_record.amounts.net_wallet_received.raw = raw;
        pair.sell_record.amounts.net_wallet_received.decimals = NATIVE_SOL_DECIMALS;
    }
    if let Some(raw) = evaluation.legs.get(1).and_then(|leg| lamports(leg.usd_value)) {
        pair.buy_record.amounts.total_wallet_cost.raw = raw;
        pair.buy_record.amounts.total_wallet_cost.decimals = NATIVE_SOL_DECIMALS;
    }
}

fn to_cents(usd: f64) -> i64 {
    if usd.is_finite() {
        (usd * 100.0).round() as i64
    } else {
        0
    }
}

/// Cents actually reached by a leg value. Fractions of a cent never count
/// towards the threshold; the epsilon absorbs float error on exact values.
fn whole_cents(usd: f64) -> i64 {
    if usd.is_finite() {
        (usd * 100.0 + 1e-6).floor() as i64
    } else {
        0
    }
}
