use crate::solana::models::{CanonicalTransaction, TransactionStatus};
use crate::swap::classifier::SwapClassifier;
use crate::swap::confidence;
use crate::swap::core_assets::CoreAssets;
use crate::swap::deltas::{collect_deltas, DeltaSummary, DeltaThresholds};
use crate::swap::models::{
    Confidence, DebugInfo, EraseReason, EraseRecord, ParserResult, SwapOutcome,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub core_assets: CoreAssets,
    pub thresholds: DeltaThresholds,
    pub min_confidence: Confidence,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            core_assets: CoreAssets::default(),
            thresholds: DeltaThresholds::default(),
            min_confidence: Confidence::Low,
        }
    }
}

/// Interpret `tx` from the point of view of `target`.
pub fn parse_swap(tx: &CanonicalTransaction, target: &str, config: &ParserConfig) -> ParserResult {
    if tx.status == TransactionStatus::Failed {
        return erase(tx, None, EraseReason::TransactionFailed);
    }

    let summary = collect_deltas(tx, target, &config.thresholds);
    let state = SwapClassifier::new(&config.core_assets).classify(tx, target, &summary);

    let mut outcome = match state.into_outcome() {
        Ok(outcome) => outcome,
        Err(reason) => return erase(tx, Some(&summary), reason),
    };

    let level = confidence::score(tx, &summary, target);
    for leg in outcome.legs_mut() {
        leg.confidence = level;
    }

    if level < config.min_confidence {
        return ParserResult::Erase(
            erase_record(tx, Some(&summary), EraseReason::ConfidenceBelowMin).with_detail(format!(
                "confidence {} below {}",
                level.as_str(),
                config.min_confidence.as_str()
            )),
        );
    }

    debug!(
        signature = %tx.signature,
        swapper = %target,
        kind = match &outcome {
            SwapOutcome::Single(_) => "single",
            SwapOutcome::Split(_) => "split",
        },
        confidence = level.as_str(),
        "Parsed swap"
    );
    ParserResult::Success { data: outcome }
}

fn erase(tx: &CanonicalTransaction, summary: Option<&DeltaSummary>, reason: EraseReason) -> ParserResult {
    ParserResult::Erase(erase_record(tx, summary, reason))
}

fn erase_record(
    tx: &CanonicalTransaction,
    summary: Option<&DeltaSummary>,
    reason: EraseReason,
) -> EraseRecord {
    EraseRecord {
        signature: tx.signature.clone(),
        reason,
        debug_info: DebugInfo {
            fee_payer: Some(tx.fee_payer.clone()),
            signers: tx.signers.clone(),
            asset_deltas: summary
                .map(|s| s.tokens.values().cloned().collect())
                .unwrap_or_default(),
            detail: None,
        },
        timestamp: tx.timestamp,
    }
}
