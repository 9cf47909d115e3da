use crate::solana::amount::ScaledAmount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mint address of wrapped SOL; also used as the mint of native SOL legs.
pub const NATIVE_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Decimal count of native SOL (lamports).
pub const NATIVE_SOL_DECIMALS: u8 = 9;

/// On-chain outcome of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// Provider-independent representation of a confirmed transaction.
///
/// Both upstream shapes are converted into this by [`crate::solana::adapter`]
/// before any classification logic runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    /// Base58-encoded transaction signature (unique identifier)
    pub signature: String,

    /// Block time of the transaction
    pub timestamp: DateTime<Utc>,

    pub status: TransactionStatus,

    /// Transaction fee paid in lamports (1 SOL = 1,000,000,000 lamports)
    pub fee: u64,

    /// Base58-encoded public key of the account that paid the fee
    pub fee_payer: String,

    pub signers: Vec<String>,

    /// Protocol tag (e.g. "jupiter", "raydium") when the provider supplies
    /// one or a known program was invoked
    pub protocol: Option<String>,

    /// SPL token balance changes, one per token account entry
    pub balance_changes: Vec<BalanceChange>,

    /// Native SOL balance changes, one per account
    pub native_changes: Vec<NativeChange>,

    /// Token transfers with resolved owners, when the provider supplies them
    pub token_transfers: Vec<TokenTransfer>,

    pub instructions: Vec<InstructionSummary>,
}

impl CanonicalTransaction {
    pub fn is_signer(&self, address: &str) -> bool {
        self.signers.iter().any(|signer| signer == address)
    }

    pub fn owns_balance_change(&self, address: &str) -> bool {
        self.balance_changes.iter().any(|change| change.owner == address)
            || self.native_changes.iter().any(|change| change.account == address)
    }
}

/// Exact balance movement of one account entry.
///
/// RPC payloads carry the pre/post pair; enhanced payloads only carry the
/// signed net change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceDelta {
    PrePost { pre: i128, post: i128 },
    Net(i128),
}

impl BalanceDelta {
    /// Net change (post - pre). Positive values indicate an increase.
    pub fn net(&self) -> i128 {
        match self {
            Self::PrePost { pre, post } => post.saturating_sub(*pre),
            Self::Net(net) => *net,
        }
    }

    pub fn has_pre_post(&self) -> bool {
        matches!(self, Self::PrePost { .. })
    }
}

/// Change in a token account's balance during a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub mint: String,

    /// Wallet that owns the token account
    pub owner: String,

    pub decimals: u8,

    /// Scaled by `10^decimals`
    pub delta: BalanceDelta,
}

impl BalanceChange {
    pub fn net(&self) -> i128 {
        self.delta.net()
    }

    pub fn net_amount(&self) -> ScaledAmount {
        ScaledAmount::new(self.net(), self.decimals)
    }
}

/// Change in an account's lamport balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeChange {
    pub account: String,
    pub delta: BalanceDelta,
}

/// A token movement between two wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub mint: String,
    pub from_owner: Option<String>,
    pub to_owner: Option<String>,
    pub amount: ScaledAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSummary {
    pub program_id: String,
    pub name: Option<String>,
    pub data: String,
}
