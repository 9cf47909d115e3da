use crate::solana::amount::ScaledAmount;
use crate::solana::models::{CanonicalTransaction, NATIVE_SOL_DECIMALS, NATIVE_SOL_MINT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Net lamport change at or below this is fee/rent noise, not a trade leg.
pub const DEFAULT_NATIVE_DUST_LAMPORTS: i128 = 5_000_000;

/// A residual of at most 1/1000 of the gross flow still counts as a round trip.
pub const DEFAULT_INTERMEDIATE_DUST_RATIO: i128 = 1_000;

/// Token nets of at most this many raw units are airdrop or rounding residue.
pub const DEFAULT_TOKEN_DUST_RAW: i128 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaThresholds {
    pub native_dust_lamports: i128,
    pub intermediate_dust_ratio: i128,
    pub token_dust_raw: i128,
}

impl Default for DeltaThresholds {
    fn default() -> Self {
        Self {
            native_dust_lamports: DEFAULT_NATIVE_DUST_LAMPORTS,
            intermediate_dust_ratio: DEFAULT_INTERMEDIATE_DUST_RATIO,
            token_dust_raw: DEFAULT_TOKEN_DUST_RAW,
        }
    }
}

/// Net movement of one mint for the target account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDelta {
    pub mint: String,
    pub decimals: u8,
    pub net: i128,
    pub gross_in: i128,
    pub gross_out: i128,
    /// Flowed in and back out within the transaction (multi-hop routing)
    pub is_intermediate: bool,
    /// Net too small to be a trade leg
    pub is_dust: bool,
}

impl AssetDelta {
    fn empty(mint: &str, decimals: u8) -> Self {
        Self {
            mint: mint.to_string(),
            decimals,
            net: 0,
            gross_in: 0,
            gross_out: 0,
            is_intermediate: false,
            is_dust: false,
        }
    }

    pub fn amount(&self) -> ScaledAmount {
        ScaledAmount::new(self.net, self.decimals)
    }

    /// Usable as a swap leg: moved more than dust, and not a pass-through hop.
    pub fn qualifies(&self) -> bool {
        self.net != 0 && !self.is_intermediate && !self.is_dust
    }
}

/// Everything the classifier needs to know about one (transaction, target) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub tokens: BTreeMap<String, AssetDelta>,
    /// Lamports, fee added back when the target paid it, wrapped SOL folded in
    pub native_delta: i128,
    pub has_significant_native: bool,
    pub token_count: usize,
    /// Every balance entry of the target carried a pre/post pair
    pub full_coverage: bool,
}

impl DeltaSummary {
    /// Legs eligible for classification. A significant native delta appears
    /// as a SOL leg.
    pub fn qualifying_assets(&self) -> Vec<AssetDelta> {
        let mut assets: Vec<AssetDelta> = self
            .tokens
            .values()
            .filter(|delta| delta.qualifies())
            .cloned()
            .collect();
        if self.has_significant_native {
            assets.push(AssetDelta {
                mint: NATIVE_SOL_MINT.to_string(),
                decimals: NATIVE_SOL_DECIMALS,
                net: self.native_delta,
                gross_in: self.native_delta.max(0),
                gross_out: (-self.native_delta).max(0),
                is_intermediate: false,
                is_dust: false,
            });
        }
        assets
    }

    pub fn intermediate_mints(&self) -> Vec<&str> {
        self.tokens
            .values()
            .filter(|delta| delta.is_intermediate)
            .map(|delta| delta.mint.as_str())
            .collect()
    }
}

/// Aggregate the target's balance changes per mint.
pub fn collect_deltas(
    tx: &CanonicalTransaction,
    target: &str,
    thresholds: &DeltaThresholds,
) -> DeltaSummary {
    let mut tokens: BTreeMap<String, AssetDelta> = BTreeMap::new();
    let mut transfer_flow: BTreeMap<String, (i128, i128)> = BTreeMap::new();
    let mut full_coverage = true;
    let mut saw_entry = false;

    for change in tx.balance_changes.iter().filter(|c| c.owner == target) {
        saw_entry = true;
        full_coverage &= change.delta.has_pre_post();
        let entry = tokens
            .entry(change.mint.clone())
            .or_insert_with(|| AssetDelta::empty(&change.mint, change.decimals));
        let net = change.net();
        entry.net = entry.net.saturating_add(net);
        if net > 0 {
            entry.gross_in = entry.gross_in.saturating_add(net);
        } else {
            entry.gross_out = entry.gross_out.saturating_add(-net);
        }
    }

    // Transfers expose flows that per-account nets hide, e.g. a route token
    // that lands in the wallet and leaves again.
    for transfer in &tx.token_transfers {
        let incoming = transfer.to_owner.as_deref() == Some(target);
        let outgoing = transfer.from_owner.as_deref() == Some(target);
        if incoming == outgoing {
            continue;
        }
        tokens
            .entry(transfer.mint.clone())
            .or_insert_with(|| AssetDelta::empty(&transfer.mint, transfer.amount.decimals));
        let flow = transfer_flow.entry(transfer.mint.clone()).or_default();
        let amount = transfer.amount.raw.saturating_abs();
        if incoming {
            flow.0 = flow.0.saturating_add(amount);
        } else {
            flow.1 = flow.1.saturating_add(amount);
        }
    }
    for (mint, (flow_in, flow_out)) in transfer_flow {
        if let Some(entry) = tokens.get_mut(&mint) {
            entry.gross_in = entry.gross_in.max(flow_in);
            entry.gross_out = entry.gross_out.max(flow_out);
        }
    }

    let mut native_delta: i128 = tx
        .native_changes
        .iter()
        .filter(|change| change.account == target)
        .map(|change| change.delta.net())
        .sum();
    if tx.fee_payer == target {
        native_delta = native_delta.saturating_add(tx.fee as i128);
    }
    // Wrapped SOL is the same asset as native SOL for classification.
    if let Some(wrapped) = tokens.remove(NATIVE_SOL_MINT) {
        native_delta = native_delta.saturating_add(wrapped.net);
    }

    for delta in tokens.values_mut() {
        delta.is_intermediate = is_round_trip(delta, thresholds.intermediate_dust_ratio);
        delta.is_dust = delta.net.saturating_abs() <= thresholds.token_dust_raw;
    }

    DeltaSummary {
        token_count: tokens.len(),
        tokens,
        native_delta,
        has_significant_native: native_delta.saturating_abs() > thresholds.native_dust_lamports,
        full_coverage: saw_entry && full_coverage,
    }
}

fn is_round_trip(delta: &AssetDelta, dust_ratio: i128) -> bool {
    if delta.gross_in == 0 || delta.gross_out == 0 {
        return false;
    }
    let gross = delta.gross_in.max(delta.gross_out);
    delta.net.saturating_abs().saturating_mul(dust_ratio.max(1)) <= gross
}
