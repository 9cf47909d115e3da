use crate::solana::amount::{normalize, normalize_str, RawAmount, ScaledAmount};
use crate::solana::helius::{HeliusInstruction, HeliusTransaction};
use crate::solana::models::{
    BalanceChange, BalanceDelta, CanonicalTransaction, InstructionSummary, NativeChange,
    TokenTransfer, TransactionStatus,
};
use crate::solana::program_ids::detect_protocol;
use chrono::{DateTime, Utc};
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionTokenBalance,
};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Transaction payload in one of the two upstream shapes.
#[derive(Debug)]
pub enum UpstreamTransaction {
    /// Solana JSON-RPC `getTransaction` response
    Rpc(Box<EncodedConfirmedTransactionWithStatusMeta>),
    /// Helius enhanced transaction
    Enhanced(Box<HeliusTransaction>),
}

/// Structural problems with an upstream payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("transaction missing metadata")]
    MissingMeta,

    #[error("unsupported transaction encoding")]
    UnsupportedEncoding,

    #[error("transaction has no signature")]
    MissingSignature,

    #[error("transaction has no fee payer")]
    MissingFeePayer,
}

/// Convert either upstream shape into the canonical transaction.
pub fn canonicalize(upstream: &UpstreamTransaction) -> Result<CanonicalTransaction, AdapterError> {
    let canonical = match upstream {
        UpstreamTransaction::Rpc(tx) => from_rpc(tx)?,
        UpstreamTransaction::Enhanced(tx) => from_enhanced(tx)?,
    };

    debug!(
        signature = %canonical.signature,
        fee_payer = %canonical.fee_payer,
        balance_changes = canonical.balance_changes.len(),
        protocol = ?canonical.protocol,
        "Canonicalized transaction"
    );

    Ok(canonical)
}

fn from_rpc(
    encoded_tx: &EncodedConfirmedTransactionWithStatusMeta,
) -> Result<CanonicalTransaction, AdapterError> {
    let meta = encoded_tx
        .transaction
        .meta
        .as_ref()
        .ok_or(AdapterError::MissingMeta)?;

    let ui_tx = match &encoded_tx.transaction.transaction {
        EncodedTransaction::Json(ui_tx) => ui_tx,
        _ => return Err(AdapterError::UnsupportedEncoding),
    };

    let signature = ui_tx
        .signatures
        .first()
        .cloned()
        .ok_or(AdapterError::MissingSignature)?;

    let mut program_ids: Vec<String> = Vec::new();
    let mut instructions = Vec::new();
    let (mut account_keys, signers) = match &ui_tx.message {
        UiMessage::Parsed(parsed) => {
            let keys: Vec<String> = parsed.account_keys.iter().map(|k| k.pubkey.clone()).collect();
            let signers = parsed
                .account_keys
                .iter()
                .filter(|k| k.signer)
                .map(|k| k.pubkey.clone())
                .collect();
            for ix in &parsed.instructions {
                if let Some(summary) = summarize_ui_instruction(ix, &keys) {
                    instructions.push(summary);
                }
            }
            (keys, signers)
        }
        UiMessage::Raw(raw) => {
            let keys = raw.account_keys.clone();
            let signers = keys
                .iter()
                .take(raw.header.num_required_signatures as usize)
                .cloned()
                .collect();
            for ix in &raw.instructions {
                if let Some(program_id) = keys.get(ix.program_id_index as usize) {
                    instructions.push(InstructionSummary {
                        program_id: program_id.clone(),
                        name: None,
                        data: ix.data.clone(),
                    });
                }
            }
            (keys, signers)
        }
    };

    // Raw messages list lookup-table addresses separately; balances index past them.
    if let (UiMessage::Raw(_), OptionSerializer::Some(loaded)) =
        (&ui_tx.message, &meta.loaded_addresses)
    {
        account_keys.extend(loaded.writable.iter().cloned());
        account_keys.extend(loaded.readonly.iter().cloned());
    }

    let fee_payer = account_keys
        .first()
        .cloned()
        .ok_or(AdapterError::MissingFeePayer)?;

    program_ids.extend(instructions.iter().map(|ix| ix.program_id.clone()));
    if let OptionSerializer::Some(inner_groups) = &meta.inner_instructions {
        for group in inner_groups {
            for ix in &group.instructions {
                if let Some(summary) = summarize_ui_instruction(ix, &account_keys) {
                    program_ids.push(summary.program_id);
                }
            }
        }
    }
    let protocol = detect_protocol(program_ids.iter().map(String::as_str)).map(str::to_string);

    let native_changes = meta
        .pre_balances
        .iter()
        .zip(meta.post_balances.iter())
        .enumerate()
        .filter(|(_, (pre, post))| pre != post)
        .filter_map(|(index, (pre, post))| {
            account_keys.get(index).map(|account| NativeChange {
                account: account.clone(),
                delta: BalanceDelta::PrePost {
                    pre: *pre as i128,
                    post: *post as i128,
                },
            })
        })
        .collect();

    let balance_changes =
        pair_token_balances(token_balances(&meta.pre_token_balances), token_balances(&meta.post_token_balances));

    let timestamp = encoded_tx
        .block_time
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    Ok(CanonicalTransaction {
        signature,
        timestamp,
        status: if meta.err.is_some() {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Success
        },
        fee: meta.fee,
        fee_payer,
        signers,
        protocol,
        balance_changes,
        native_changes,
        token_transfers: Vec::new(),
        instructions,
    })
}

fn summarize_ui_instruction(ix: &UiInstruction, account_keys: &[String]) -> Option<InstructionSummary> {
    match ix {
        UiInstruction::Compiled(compiled) => {
            account_keys
                .get(compiled.program_id_index as usize)
                .map(|program_id| InstructionSummary {
                    program_id: program_id.clone(),
                    name: None,
                    data: compiled.data.clone(),
                })
        }
        UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => Some(InstructionSummary {
            program_id: parsed.program_id.clone(),
            name: parsed
                .parsed
                .get("type")
                .and_then(|t| t.as_str())
                .map(str::to_string),
            data: String::new(),
        }),
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(partial)) => {
            Some(InstructionSummary {
                program_id: partial.program_id.clone(),
                name: None,
                data: partial.data.clone(),
            })
        }
    }
}

fn token_balances(balances: &OptionSerializer<Vec<UiTransactionTokenBalance>>) -> &[UiTransactionTokenBalance] {
    match balances {
        OptionSerializer::Some(balances) => balances.as_slice(),
        _ => &[],
    }
}

/// Pair pre/post token balances by account index. An account missing from
/// one side was opened or closed by the transaction and counts as zero there.
fn pair_token_balances(
    pre: &[UiTransactionTokenBalance],
    post: &[UiTransactionTokenBalance],
) -> Vec<BalanceChange> {
    let mut by_index: BTreeMap<u8, (Option<&UiTransactionTokenBalance>, Option<&UiTransactionTokenBalance>)> =
        BTreeMap::new();
    for balance in pre {
        by_index.entry(balance.account_index).or_default().0 = Some(balance);
    }
    for balance in post {
        by_index.entry(balance.account_index).or_default().1 = Some(balance);
    }

    by_index
        .into_values()
        .filter_map(|(pre, post)| {
            let reference = post.or(pre)?;
            let owner = match &reference.owner {
                OptionSerializer::Some(owner) => owner.clone(),
                _ => return None,
            };
            let decimals = reference.ui_token_amount.decimals;
            Some(BalanceChange {
                mint: reference.mint.clone(),
                owner,
                decimals,
                delta: BalanceDelta::PrePost {
                    pre: pre.map(|b| raw_token_amount(b, decimals)).unwrap_or(0),
                    post: post.map(|b| raw_token_amount(b, decimals)).unwrap_or(0),
                },
            })
        })
        .collect()
}

fn raw_token_amount(balance: &UiTransactionTokenBalance, decimals: u8) -> i128 {
    let amount = &balance.ui_token_amount;
    if amount.amount.is_empty() {
        normalize_str(&amount.ui_amount_string, decimals)
    } else {
        normalize_str(&amount.amount, 0)
    }
}

fn from_enhanced(tx: &HeliusTransaction) -> Result<CanonicalTransaction, AdapterError> {
    if tx.signature.is_empty() {
        return Err(AdapterError::MissingSignature);
    }
    let fee_payer = tx
        .fee_payer
        .clone()
        .filter(|payer| !payer.is_empty())
        .ok_or(AdapterError::MissingFeePayer)?;

    let fee = tx
        .fee
        .as_ref()
        .and_then(RawAmount::from_json)
        .map(|fee| normalize(&fee, 0).max(0) as u64)
        .unwrap_or(0);

    let mut native_changes = Vec::new();
    let mut balance_changes = Vec::new();
    let mut decimals_by_mint: HashMap<&str, u8> = HashMap::new();
    for account in &tx.account_data {
        let native = account
            .native_balance_change
            .as_ref()
            .and_then(RawAmount::from_json)
            .map(|change| normalize(&change, 0))
            .unwrap_or(0);
        if native != 0 {
            native_changes.push(NativeChange {
                account: account.account.clone(),
                delta: BalanceDelta::Net(native),
            });
        }

        for change in &account.token_balance_changes {
            let decimals = change.raw_token_amount.decimals;
            decimals_by_mint.insert(change.mint.as_str(), decimals);
            let Some(owner) = change.user_account.clone() else {
                continue;
            };
            let net = RawAmount::from_json(&change.raw_token_amount.token_amount)
                .map(|raw| normalize(&raw, 0))
                .unwrap_or(0);
            balance_changes.push(BalanceChange {
                mint: change.mint.clone(),
                owner,
                decimals,
                delta: BalanceDelta::Net(net),
            });
        }
    }

    let token_transfers = tx
        .token_transfers
        .iter()
        .filter_map(|transfer| {
            let decimals = *decimals_by_mint.get(transfer.mint.as_str())?;
            let amount = RawAmount::from_json(&transfer.token_amount)?;
            Some(TokenTransfer {
                mint: transfer.mint.clone(),
                from_owner: transfer.from_user_account.clone().filter(|a| !a.is_empty()),
                to_owner: transfer.to_user_account.clone().filter(|a| !a.is_empty()),
                amount: ScaledAmount::parse(&amount, decimals),
            })
        })
        .collect();

    let mut instructions = Vec::new();
    flatten_enhanced_instructions(&tx.instructions, &mut instructions);

    let protocol = tx
        .source
        .as_deref()
        .map(|source| source.trim().to_ascii_lowercase())
        .filter(|source| !source.is_empty() && source != "unknown")
        .or_else(|| {
            detect_protocol(instructions.iter().map(|ix| ix.program_id.as_str()))
                .map(str::to_string)
        });

    let failed = tx
        .transaction_error
        .as_ref()
        .map(|err| !err.is_null())
        .unwrap_or(false);

    Ok(CanonicalTransaction {
        signature: tx.signature.clone(),
        timestamp: tx
            .timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now),
        status: if failed {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Success
        },
        fee,
        signers: vec![fee_payer.clone()],
        fee_payer,
        protocol,
        balance_changes,
        native_changes,
        token_transfers,
        instructions,
    })
}

fn flatten_enhanced_instructions(source: &[HeliusInstruction], out: &mut Vec<InstructionSummary>) {
    for ix in source {
        out.push(InstructionSummary {
            program_id: ix.program_id.clone(),
            name: None,
            data: ix.data.clone(),
        });
        flatten_enhanced_instructions(&ix.inner_instructions, out);
    }
}
