use crate::swap::models::{Direction, ParsedSwap, SwapOutcome};

/// Structural checks against what the storage mapper needs. Returns the
/// first violation found.
pub fn validate(outcome: &SwapOutcome) -> Result<(), String> {
    match outcome {
        SwapOutcome::Single(swap) => validate_leg(swap),
        SwapOutcome::Split(pair) => {
            validate_leg(&pair.sell_record)?;
            validate_leg(&pair.buy_record)?;
            if pair.sell_record.direction != Direction::Sell
                || pair.buy_record.direction != Direction::Buy
            {
                return Err("split legs must be one SELL and one BUY".to_string());
            }
            if pair.sell_record.base_asset.mint == pair.buy_record.base_asset.mint {
                return Err("split legs share a base asset".to_string());
            }
            for leg in [&pair.sell_record, &pair.buy_record] {
                if leg.signature != pair.signature || leg.swapper != pair.swapper {
                    return Err("split leg does not match pair signature/swapper".to_string());
                }
            }
            Ok(())
        }
    }
}

fn validate_leg(swap: &ParsedSwap) -> Result<(), String> {
    if swap.signature.is_empty() {
        return Err("missing signature".to_string());
    }
    if swap.swapper.is_empty() {
        return Err("missing swapper".to_string());
    }
    if swap.base_asset.mint.is_empty() || swap.quote_asset.mint.is_empty() {
        return Err("missing asset mint".to_string());
    }
    if swap.base_asset.mint == swap.quote_asset.mint {
        return Err(format!("base and quote are both {}", swap.base_asset.mint));
    }
    let amounts = &swap.amounts;
    if amounts.base_amount.raw <= 0 {
        return Err("base amount must be positive".to_string());
    }
    if amounts.swap_input_amount.raw <= 0 || amounts.swap_output_amount.raw <= 0 {
        return Err("swap input and output must be positive".to_string());
    }
    if amounts.total_wallet_cost.raw < 0 || amounts.net_wallet_received.raw < 0 {
        return Err("wallet totals must not be negative".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::amount::ScaledAmount;
    use crate::swap::models::{AssetRef, Confidence, SplitSwapPair, SwapAmounts};
    use chrono::Utc;

    fn leg(direction: Direction, base: &str) -> ParsedSwap {
        ParsedSwap {
            signature: "sig".to_string(),
            swapper: "wallet".to_string(),
            direction,
            quote_asset: AssetRef::new("SOL", None),
            base_asset: AssetRef::new(base, None),
            counter_asset: None,
            amounts: SwapAmounts {
                base_amount: ScaledAmount::new(10, 6),
                swap_input_amount: ScaledAmount::new(10, 6),
                swap_output_amount: ScaledAmount::new(10, 6),
                total_wallet_cost: ScaledAmount::zero(9),
                net_wallet_received: ScaledAmount::zero(9),
            },
            protocol: None,
            confidence: Confidence::Low,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn well_formed_single_passes() {
        assert!(validate(&SwapOutcome::Single(leg(Direction::Buy, "Token"))).is_ok());
    }

    #[test]
    fn zero_base_amount_fails() {
        let mut swap = leg(Direction::Buy, "Token");
        swap.amounts.base_amount = ScaledAmount::zero(6);
        assert!(validate(&SwapOutcome::Single(swap)).is_err());
    }

    #[test]
    fn split_with_same_base_fails() {
        let pair = SplitSwapPair {
            signature: "sig".to_string(),
            swapper: "wallet".to_string(),
            sell_record: leg(Direction::Sell, "Token"),
            buy_record: leg(Direction::Buy, "Token"),
        };
        assert!(validate(&SwapOutcome::Split(pair)).is_err());
    }

    #[test]
    fn split_leg_with_foreign_swapper_fails() {
        let mut buy = leg(Direction::Buy, "Other");
        buy.swapper = "someone-else".to_string();
        let pair = SplitSwapPair {
            signature: "sig".to_string(),
            swapper: "wallet".to_string(),
            sell_record: leg(Direction::Sell, "Token"),
            buy_record: buy,
        };
        assert!(validate(&SwapOutcome::Split(pair)).is_err());
    }
}
