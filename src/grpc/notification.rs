use crate::matcher::{AccountRef, TransactionNotification};
use yellowstone_grpc_proto::prelude::{
    subscribe_update, SubscribeUpdate, SubscribeUpdateTransaction, TransactionStatusMeta,
};

/// Convert a Yellowstone update into the matcher's notification shape.
///
/// Only transaction updates become notifications; pings, slot updates and
/// anything missing a signature are skipped. No payload decoding happens
/// here beyond base58-encoding keys: the full transaction is fetched again
/// by the worker after the dispatch lock is won.
pub fn notification_from_update(update: SubscribeUpdate) -> Option<TransactionNotification> {
    match update.update_oneof? {
        subscribe_update::UpdateOneof::Transaction(tx_update) => from_transaction_update(tx_update),
        _ => None,
    }
}

fn from_transaction_update(tx_update: SubscribeUpdateTransaction) -> Option<TransactionNotification> {
    let info = tx_update.transaction?;
    if info.is_vote {
        return None;
    }

    // Some providers leave the top-level signature empty
    let signature = if !info.signature.is_empty() {
        bs58::encode(&info.signature).into_string()
    } else {
        bs58::encode(info.transaction.as_ref()?.signatures.first()?).into_string()
    };

    let mut account_keys: Vec<String> = info
        .transaction
        .as_ref()
        .and_then(|tx| tx.message.as_ref())
        .map(|message| message.account_keys.iter().map(|raw| bs58::encode(raw).into_string()).collect())
        .unwrap_or_default();

    let (token_balance_owners, inner_instructions) = match info.meta.as_ref() {
        Some(meta) => {
            account_keys.extend(loaded_addresses(meta));
            (token_owners(meta), inner_accounts(meta))
        }
        None => (Vec::new(), Vec::new()),
    };

    Some(TransactionNotification {
        signature,
        slot: tx_update.slot,
        account_keys,
        token_balance_owners,
        inner_instructions,
    })
}

/// Address lookup table entries, in the order the runtime appends them to
/// the account table: writable first, then readonly.
fn loaded_addresses(meta: &TransactionStatusMeta) -> impl Iterator<Item = String> + '_ {
    meta.loaded_writable_addresses
        .iter()
        .chain(meta.loaded_readonly_addresses.iter())
        .map(|raw| bs58::encode(raw).into_string())
}

/// Owners of token balances. An owner whose token account was created in
/// this transaction appears only in the post balances.
fn token_owners(meta: &TransactionStatusMeta) -> Vec<String> {
    meta.post_token_balances
        .iter()
        .chain(meta.pre_token_balances.iter())
        .map(|balance| balance.owner.clone())
        .filter(|owner| !owner.is_empty())
        .collect()
}

fn inner_accounts(meta: &TransactionStatusMeta) -> Vec<Vec<AccountRef>> {
    meta.inner_instructions
        .iter()
        .flat_map(|group| group.instructions.iter())
        .map(|ix| {
            std::iter::once(AccountRef::Index(ix.program_id_index))
                .chain(ix.accounts.iter().map(|index| AccountRef::Index(u32::from(*index))))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use yellowstone_grpc_proto::prelude::{
        InnerInstruction, InnerInstructions, Message, SubscribeUpdateTransactionInfo, TokenBalance,
        Transaction,
    };

    fn key(byte: u8) -> Vec<u8> {
        vec![byte; 32]
    }

    fn address(byte: u8) -> String {
        bs58::encode(key(byte)).into_string()
    }

    fn update(meta: TransactionStatusMeta) -> SubscribeUpdate {
        SubscribeUpdate {
            update_oneof: Some(subscribe_update::UpdateOneof::Transaction(SubscribeUpdateTransaction {
                slot: 42,
                transaction: Some(SubscribeUpdateTransactionInfo {
                    signature: vec![7; 64],
                    is_vote: false,
                    transaction: Some(Transaction {
                        signatures: vec![vec![7; 64]],
                        message: Some(Message {
                            account_keys: vec![key(1), key(2)],
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    meta: Some(meta),
                    ..Default::default()
                }),
            })),
            ..Default::default()
        }
    }

    #[test]
    fn collects_every_address_source() {
        let meta = TransactionStatusMeta {
            loaded_writable_addresses: vec![key(3)],
            loaded_readonly_addresses: vec![key(4)],
            post_token_balances: vec![TokenBalance {
                owner: address(9),
                ..Default::default()
            }],
            inner_instructions: vec![InnerInstructions {
                index: 0,
                instructions: vec![InnerInstruction {
                    program_id_index: 1,
                    accounts: vec![3],
                    ..Default::default()
                }],
            }],
            ..Default::default()
        };

        let notification = notification_from_update(update(meta)).expect("transaction update");
        assert_eq!(notification.slot, 42);
        assert_eq!(notification.signature, bs58::encode(vec![7u8; 64]).into_string());
        assert_eq!(
            notification.account_keys,
            vec![address(1), address(2), address(3), address(4)]
        );
        assert_eq!(notification.token_balance_owners, vec![address(9)]);
        assert_eq!(
            notification.inner_instructions,
            vec![vec![AccountRef::Index(1), AccountRef::Index(3)]]
        );
    }

    #[test]
    fn non_transaction_updates_are_skipped() {
        assert!(notification_from_update(SubscribeUpdate::default()).is_none());
    }
}
