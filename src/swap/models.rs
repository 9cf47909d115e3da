use crate::solana::amount::ScaledAmount;
use crate::swap::deltas::AssetDelta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Qualitative confidence in a classification, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown confidence level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub mint: String,
    pub symbol: Option<String>,
}

impl AssetRef {
    pub fn new(mint: impl Into<String>, symbol: Option<String>) -> Self {
        Self {
            mint: mint.into(),
            symbol,
        }
    }
}

/// Amounts of one swap record; each carries its own decimal count.
///
/// `swap_input_amount` left the wallet and `swap_output_amount` entered it.
/// `total_wallet_cost` is what a BUY cost including fees paid in the quote
/// asset; `net_wallet_received` is what a SELL returned net of those fees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapAmounts {
    pub base_amount: ScaledAmount,
    pub swap_input_amount: ScaledAmount,
    pub swap_output_amount: ScaledAmount,
    pub total_wallet_cost: ScaledAmount,
    pub net_wallet_received: ScaledAmount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSwap {
    pub signature: String,
    pub swapper: String,
    pub direction: Direction,
    pub quote_asset: AssetRef,
    pub base_asset: AssetRef,
    /// The other token of a split leg; `None` for swaps against a core asset
    pub counter_asset: Option<AssetRef>,
    pub amounts: SwapAmounts,
    pub protocol: Option<String>,
    pub confidence: Confidence,
    pub timestamp: DateTime<Utc>,
}

/// Two synthesized legs of a token-to-token trade with no core asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSwapPair {
    pub signature: String,
    pub swapper: String,
    pub sell_record: ParsedSwap,
    pub buy_record: ParsedSwap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SwapOutcome {
    Single(ParsedSwap),
    Split(SplitSwapPair),
}

impl SwapOutcome {
    pub fn signature(&self) -> &str {
        match self {
            Self::Single(swap) => &swap.signature,
            Self::Split(pair) => &pair.signature,
        }
    }

    pub fn swapper(&self) -> &str {
        match self {
            Self::Single(swap) => &swap.swapper,
            Self::Split(pair) => &pair.swapper,
        }
    }

    pub fn legs(&self) -> Vec<&ParsedSwap> {
        match self {
            Self::Single(swap) => vec![swap],
            Self::Split(pair) => vec![&pair.sell_record, &pair.buy_record],
        }
    }

    pub fn legs_mut(&mut self) -> Vec<&mut ParsedSwap> {
        match self {
            Self::Single(swap) => vec![swap],
            Self::Split(pair) => vec![&mut pair.sell_record, &mut pair.buy_record],
        }
    }

    pub fn confidence(&self) -> Confidence {
        self.legs()
            .iter()
            .map(|leg| leg.confidence)
            .min()
            .unwrap_or(Confidence::Low)
    }
}

/// Why a transaction produced no usable swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraseReason {
    TransactionFailed,
    InvalidPayload,
    FetchFailed,
    FetchTimeout,
    NoQualifyingAssets,
    CoreToCoreSuppressed,
    TargetNotIdentified,
    WhaleNotFound,
    KolNotFound,
    ConfidenceBelowMin,
    UsdFilter,
    ValidatorErase,
    Duplicate,
    Unknown,
}

impl EraseReason {
    pub const ALL: [EraseReason; 14] = [
        Self::TransactionFailed,
        Self::InvalidPayload,
        Self::FetchFailed,
        Self::FetchTimeout,
        Self::NoQualifyingAssets,
        Self::CoreToCoreSuppressed,
        Self::TargetNotIdentified,
        Self::WhaleNotFound,
        Self::KolNotFound,
        Self::ConfidenceBelowMin,
        Self::UsdFilter,
        Self::ValidatorErase,
        Self::Duplicate,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransactionFailed => "transaction_failed",
            Self::InvalidPayload => "invalid_payload",
            Self::FetchFailed => "fetch_failed",
            Self::FetchTimeout => "fetch_timeout",
            Self::NoQualifyingAssets => "no_qualifying_assets",
            Self::CoreToCoreSuppressed => "core_to_core_suppressed",
            Self::TargetNotIdentified => "target_not_identified",
            Self::WhaleNotFound => "whale_not_found",
            Self::KolNotFound => "kol_not_found",
            Self::ConfidenceBelowMin => "confidence_below_min",
            Self::UsdFilter => "usd_filter",
            Self::ValidatorErase => "validator_erase",
            Self::Duplicate => "duplicate",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EraseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub fee_payer: Option<String>,
    pub signers: Vec<String>,
    pub asset_deltas: Vec<AssetDelta>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EraseRecord {
    pub signature: String,
    pub reason: EraseReason,
    pub debug_info: DebugInfo,
    pub timestamp: DateTime<Utc>,
}

impl EraseRecord {
    pub fn new(signature: impl Into<String>, reason: EraseReason) -> Self {
        Self {
            signature: signature.into(),
            reason,
            debug_info: DebugInfo::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.debug_info.detail = Some(detail.into());
        self
    }
}

/// Result of parsing one transaction for one target address. Never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ParserResult {
    Success { data: SwapOutcome },
    Erase(EraseRecord),
}
