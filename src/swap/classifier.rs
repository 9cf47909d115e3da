use crate::solana::amount::ScaledAmount;
use crate::solana::models::{CanonicalTransaction, NATIVE_SOL_DECIMALS, NATIVE_SOL_MINT};
use crate::swap::core_assets::{CoreAssets, PairRoles};
use crate::swap::deltas::{AssetDelta, DeltaSummary};
use crate::swap::models::{
    AssetRef, Confidence, Direction, EraseReason, ParsedSwap, SplitSwapPair, SwapAmounts,
    SwapOutcome,
};
use tracing::trace;

/// Classification state. `AwaitingClassification` is the only non-terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierState {
    AwaitingClassification,
    Single(ParsedSwap),
    Split(SplitSwapPair),
    Erased(EraseReason),
}

impl ClassifierState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::AwaitingClassification)
    }

    pub fn into_outcome(self) -> Result<SwapOutcome, EraseReason> {
        match self {
            Self::Single(swap) => Ok(SwapOutcome::Single(swap)),
            Self::Split(pair) => Ok(SwapOutcome::Split(pair)),
            Self::Erased(reason) => Err(reason),
            Self::AwaitingClassification => Err(EraseReason::Unknown),
        }
    }
}

/// Decides BUY/SELL, a split pair, or an erase from a target's asset deltas.
pub struct SwapClassifier<'a> {
    core: &'a CoreAssets,
}

impl<'a> SwapClassifier<'a> {
    pub fn new(core: &'a CoreAssets) -> Self {
        Self { core }
    }

    pub fn classify(
        &self,
        tx: &CanonicalTransaction,
        target: &str,
        summary: &DeltaSummary,
    ) -> ClassifierState {
        let state = ClassifierState::AwaitingClassification;
        let next = self.step(tx, target, summary);
        trace!(signature = %tx.signature, from = ?state, to = ?next, "Classifier transition");
        next
    }

    fn step(&self, tx: &CanonicalTransaction, target: &str, summary: &DeltaSummary) -> ClassifierState {
        if !is_identifiable(tx, target) {
            return ClassifierState::Erased(EraseReason::TargetNotIdentified);
        }

        let assets = summary.qualifying_assets();
        let (core, non_core): (Vec<&AssetDelta>, Vec<&AssetDelta>) =
            assets.iter().partition(|asset| self.core.is_core(&asset.mint));

        // A core pair carries unambiguous economic meaning, so it is tried first.
        if let Some((quote, base)) = self.core_pair(&core, &non_core) {
            return ClassifierState::Single(self.single(tx, target, quote, base));
        }

        match (core.len(), non_core.len()) {
            (2, 0) => match self.core.roles(&core[0].mint, &core[1].mint) {
                PairRoles::BothCore => ClassifierState::Erased(EraseReason::CoreToCoreSuppressed),
                _ => ClassifierState::Erased(EraseReason::Unknown),
            },
            (0, 2) if opposite(non_core[0], non_core[1]) => {
                let (sold, bought) = if non_core[0].net < 0 {
                    (non_core[0], non_core[1])
                } else {
                    (non_core[1], non_core[0])
                };
                ClassifierState::Split(self.split(tx, target, sold, bought))
            }
            _ => ClassifierState::Erased(EraseReason::NoQualifyingAssets),
        }
    }

    /// The single core asset and the single non-core asset moving against it.
    /// Only competes with a split when at most two non-core assets moved;
    /// wider fan-outs are not a swap.
    fn core_pair<'d>(
        &self,
        core: &[&'d AssetDelta],
        non_core: &[&'d AssetDelta],
    ) -> Option<(&'d AssetDelta, &'d AssetDelta)> {
        let [quote] = core else {
            return None;
        };
        if non_core.len() > 2 {
            return None;
        }
        let mut against = non_core.iter().filter(|asset| opposite(quote, asset));
        let base = against.next()?;
        if against.next().is_some() {
            return None;
        }
        match self.core.roles(&quote.mint, &base.mint) {
            PairRoles::CoreQuote { .. } => Some((*quote, *base)),
            _ => None,
        }
    }

    fn single(
        &self,
        tx: &CanonicalTransaction,
        target: &str,
        quote: &AssetDelta,
        base: &AssetDelta,
    ) -> ParsedSwap {
        let direction = if quote.net < 0 { Direction::Buy } else { Direction::Sell };

        // Native deltas have the fee added back; fee is charged separately.
        let fee_in_quote = if quote.mint == NATIVE_SOL_MINT && tx.fee_payer == target {
            tx.fee as i128
        } else {
            0
        };
        let quote_moved = ScaledAmount::new(quote.net.saturating_abs(), quote.decimals);
        let base_moved = ScaledAmount::new(base.net.saturating_abs(), base.decimals);

        let amounts = match direction {
            Direction::Buy => SwapAmounts {
                base_amount: base_moved,
                swap_input_amount: quote_moved,
                swap_output_amount: base_moved,
                total_wallet_cost: ScaledAmount::new(
                    quote_moved.raw.saturating_add(fee_in_quote),
                    quote.decimals,
                ),
                net_wallet_received: ScaledAmount::zero(quote.decimals),
            },
            Direction::Sell => SwapAmounts {
                base_amount: base_moved,
                swap_input_amount: base_moved,
                swap_output_amount: quote_moved,
                total_wallet_cost: ScaledAmount::new(fee_in_quote, quote.decimals),
                net_wallet_received: ScaledAmount::new(
                    quote_moved.raw.saturating_sub(fee_in_quote),
                    quote.decimals,
                ),
            },
        };

        ParsedSwap {
            signature: tx.signature.clone(),
            swapper: target.to_string(),
            direction,
            quote_asset: self.core.asset_ref(&quote.mint),
            base_asset: AssetRef::new(base.mint.clone(), None),
            counter_asset: None,
            amounts,
            protocol: tx.protocol.clone(),
            confidence: Confidence::Low,
            timestamp: tx.timestamp,
        }
    }

    /// Two core-denominated legs for a token-to-token trade. Reserve amounts
    /// stay zero until the USD stage prices them.
    fn split(
        &self,
        tx: &CanonicalTransaction,
        target: &str,
        sold: &AssetDelta,
        bought: &AssetDelta,
    ) -> SplitSwapPair {
        let sold_amount = ScaledAmount::new(sold.net.saturating_abs(), sold.decimals);
        let bought_amount = ScaledAmount::new(bought.net, bought.decimals);
        let reserve = self.core.implicit_reserve();
        let sold_ref = AssetRef::new(sold.mint.clone(), None);
        let bought_ref = AssetRef::new(bought.mint.clone(), None);

        let leg = |direction: Direction, base: &AssetRef, counter: &AssetRef, base_amount| ParsedSwap {
            signature: tx.signature.clone(),
            swapper: target.to_string(),
            direction,
            quote_asset: reserve.clone(),
            base_asset: base.clone(),
            counter_asset: Some(counter.clone()),
            amounts: SwapAmounts {
                base_amount,
                swap_input_amount: sold_amount,
                swap_output_amount: bought_amount,
                total_wallet_cost: ScaledAmount::zero(NATIVE_SOL_DECIMALS),
                net_wallet_received: ScaledAmount::zero(NATIVE_SOL_DECIMALS),
            },
            protocol: tx.protocol.clone(),
            confidence: Confidence::Low,
            timestamp: tx.timestamp,
        };

        SplitSwapPair {
            signature: tx.signature.clone(),
            swapper: target.to_string(),
            sell_record: leg(Direction::Sell, &sold_ref, &bought_ref, sold_amount),
            buy_record: leg(Direction::Buy, &bought_ref, &sold_ref, bought_amount),
        }
    }
}

fn opposite(a: &AssetDelta, b: &AssetDelta) -> bool {
    (a.net < 0 && b.net > 0) || (a.net > 0 && b.net < 0)
}

fn is_identifiable(tx: &CanonicalTransaction, target: &str) -> bool {
    tx.fee_payer == target || tx.is_signer(target) || tx.owns_balance_change(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::models::{BalanceChange, BalanceDelta, NativeChange, TransactionStatus};
    use crate::swap::core_assets::USDC_MINT;
    use crate::swap::deltas::{collect_deltas, DeltaThresholds};
    use chrono::Utc;

    const WALLET: &str = "Wallet1111111111111111111111111111111111111";

    fn tx(changes: Vec<(&str, i128, u8)>, native: i128) -> CanonicalTransaction {
        CanonicalTransaction {
            signature: "sigClassify".to_string(),
            timestamp: Utc::now(),
            status: TransactionStatus::Success,
            fee: 5_000,
            fee_payer: WALLET.to_string(),
            signers: vec![WALLET.to_string()],
            protocol: Some("jupiter".to_string()),
            balance_changes: changes
                .into_iter()
                .map(|(mint, net, decimals)| BalanceChange {
                    mint: mint.to_string(),
                    owner: WALLET.to_string(),
                    decimals,
                    delta: BalanceDelta::Net(net),
                })
                .collect(),
            native_changes: vec![NativeChange {
                account: WALLET.to_string(),
                delta: BalanceDelta::Net(native),
            }],
            token_transfers: Vec::new(),
            instructions: Vec::new(),
        }
    }

    fn classify(tx: &CanonicalTransaction) -> ClassifierState {
        let core = CoreAssets::default();
        let summary = collect_deltas(tx, WALLET, &DeltaThresholds::default());
        SwapClassifier::new(&core).classify(tx, WALLET, &summary)
    }

    #[test]
    fn sol_out_token_in_is_buy() {
        let tx = tx(vec![("TokenB", 1_000_000, 6)], -1_000_005_000);
        let ClassifierState::Single(swap) = classify(&tx) else {
            panic!("expected single swap");
        };
        assert_eq!(swap.direction, Direction::Buy);
        assert_eq!(swap.quote_asset.mint, NATIVE_SOL_MINT);
        assert_eq!(swap.quote_asset.symbol.as_deref(), Some("SOL"));
        assert_eq!(swap.base_asset.mint, "TokenB");
        assert_eq!(swap.amounts.base_amount, ScaledAmount::new(1_000_000, 6));
        assert_eq!(swap.amounts.swap_input_amount, ScaledAmount::new(1_000_000_000, 9));
        assert_eq!(swap.amounts.total_wallet_cost, ScaledAmount::new(1_000_005_000, 9));
    }

    #[test]
    fn token_out_stable_in_is_sell() {
        let tx = tx(vec![("TokenB", -2_000_000, 6), (USDC_MINT, 150_000_000, 6)], -5_000);
        let ClassifierState::Single(swap) = classify(&tx) else {
            panic!("expected single swap");
        };
        assert_eq!(swap.direction, Direction::Sell);
        assert_eq!(swap.quote_asset.mint, USDC_MINT);
        assert_eq!(swap.amounts.net_wallet_received, ScaledAmount::new(150_000_000, 6));
        assert_eq!(swap.amounts.swap_input_amount, ScaledAmount::new(2_000_000, 6));
    }

    #[test]
    fn sol_sell_nets_fee_out_of_received() {
        let tx = tx(vec![("TokenB", -2_000_000, 6)], 499_995_000);
        let ClassifierState::Single(swap) = classify(&tx) else {
            panic!("expected single swap");
        };
        assert_eq!(swap.direction, Direction::Sell);
        assert_eq!(swap.amounts.swap_output_amount, ScaledAmount::new(500_000_000, 9));
        assert_eq!(swap.amounts.net_wallet_received, ScaledAmount::new(499_995_000, 9));
    }

    #[test]
    fn core_to_core_is_suppressed() {
        let tx = tx(vec![(USDC_MINT, 150_000_000, 6)], -1_000_005_000);
        assert_eq!(
            classify(&tx),
            ClassifierState::Erased(EraseReason::CoreToCoreSuppressed)
        );
    }

    #[test]
    fn token_for_token_synthesizes_split_pair() {
        let tx = tx(vec![("TokenY", -500, 6), ("TokenZ", 500, 9)], -5_000);
        let ClassifierState::Split(pair) = classify(&tx) else {
            panic!("expected split pair");
        };
        assert_eq!(pair.sell_record.base_asset.mint, "TokenY");
        assert_eq!(pair.buy_record.base_asset.mint, "TokenZ");
        assert_ne!(pair.sell_record.base_asset, pair.buy_record.base_asset);
        assert_eq!(pair.sell_record.swapper, pair.swapper);
        assert_eq!(pair.buy_record.swapper, pair.swapper);
        assert_eq!(pair.sell_record.signature, pair.buy_record.signature);
        assert_eq!(pair.sell_record.quote_asset.mint, NATIVE_SOL_MINT);
        assert_eq!(pair.buy_record.counter_asset.as_ref().map(|a| a.mint.as_str()), Some("TokenY"));
    }

    #[test]
    fn three_hop_route_keeps_outer_legs() {
        let tx = tx(
            vec![("TokenX", 500, 6), ("TokenX", -500, 6), ("TokenY", -500, 6), ("TokenZ", 500, 6)],
            -5_000,
        );
        assert!(matches!(classify(&tx), ClassifierState::Split(_)));
    }

    #[test]
    fn core_pair_wins_over_split() {
        // SOL spent, Y and Z both moving: core pair SOL/Z is taken.
        let tx = tx(vec![("TokenY", 300, 6), ("TokenZ", -100, 6)], 900_005_000);
        let ClassifierState::Single(swap) = classify(&tx) else {
            panic!("expected core pair to win");
        };
        assert_eq!(swap.direction, Direction::Sell);
        assert_eq!(swap.base_asset.mint, "TokenZ");
    }

    #[test]
    fn core_pair_with_extra_outgoing_legs_erases() {
        // SOL in against A, but B and C also left the wallet.
        let tx = tx(
            vec![("TokenA", 1_000_000, 6), ("TokenB", -1_000_000, 6), ("TokenC", -2_000_000, 6)],
            -1_000_005_000,
        );
        assert_eq!(classify(&tx), ClassifierState::Erased(EraseReason::NoQualifyingAssets));
    }

    #[test]
    fn airdropped_dust_does_not_break_a_buy() {
        let tx = tx(vec![("TokenB", 5_000, 6), ("Airdrop", 1, 6)], -1_000_005_000);
        let ClassifierState::Single(swap) = classify(&tx) else {
            panic!("expected single swap");
        };
        assert_eq!(swap.direction, Direction::Buy);
        assert_eq!(swap.base_asset.mint, "TokenB");
    }

    #[test]
    fn nothing_moved_erases() {
        let tx = tx(Vec::new(), -5_000);
        assert_eq!(classify(&tx), ClassifierState::Erased(EraseReason::NoQualifyingAssets));
    }

    #[test]
    fn same_direction_pair_erases() {
        let tx = tx(vec![("TokenY", 300, 6), ("TokenZ", 100, 6)], -5_000);
        assert_eq!(classify(&tx), ClassifierState::Erased(EraseReason::NoQualifyingAssets));
    }

    #[test]
    fn unrelated_target_erases() {
        let tx = tx(vec![("TokenY", 300, 6)], -5_000);
        let core = CoreAssets::default();
        let summary = collect_deltas(&tx, "Stranger", &DeltaThresholds::default());
        assert_eq!(
            SwapClassifier::new(&core).classify(&tx, "Stranger", &summary),
            ClassifierState::Erased(EraseReason::TargetNotIdentified)
        );
    }
}
