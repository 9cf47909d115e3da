use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Enhanced transaction as returned by the Helius `/v0/transactions` API.
///
/// Only the fields the adapter reads are modelled; amounts are kept as raw
/// JSON values because the API mixes numbers and strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeliusTransaction {
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub fee: Option<Value>,
    #[serde(default)]
    pub fee_payer: Option<String>,
    /// Protocol tag such as "JUPITER" or "RAYDIUM"; "UNKNOWN" when absent
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub transaction_error: Option<Value>,
    #[serde(default)]
    pub account_data: Vec<HeliusAccountData>,
    #[serde(default)]
    pub token_transfers: Vec<HeliusTokenTransfer>,
    #[serde(default)]
    pub instructions: Vec<HeliusInstruction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeliusAccountData {
    pub account: String,
    #[serde(default)]
    pub native_balance_change: Option<Value>,
    #[serde(default)]
    pub token_balance_changes: Vec<HeliusTokenBalanceChange>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeliusTokenBalanceChange {
    #[serde(default)]
    pub user_account: Option<String>,
    #[serde(default)]
    pub token_account: Option<String>,
    pub mint: String,
    pub raw_token_amount: HeliusRawTokenAmount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeliusRawTokenAmount {
    /// Signed raw amount, usually a string of base units
    pub token_amount: Value,
    pub decimals: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeliusTokenTransfer {
    #[serde(default)]
    pub from_user_account: Option<String>,
    #[serde(default)]
    pub to_user_account: Option<String>,
    pub mint: String,
    /// UI amount; may arrive in scientific notation
    pub token_amount: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeliusInstruction {
    #[serde(default)]
    pub program_id: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub inner_instructions: Vec<HeliusInstruction>,
}
