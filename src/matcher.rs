use std::collections::{BTreeSet, HashSet};

/// Account reference inside an inner instruction. The RPC shape carries
/// indexes into the account table; parsed shapes carry addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    Index(u32),
    Address(String),
}

/// Lightweight view of a streamed transaction, enough to decide which
/// monitored addresses it touches before anything is fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionNotification {
    pub signature: String,
    pub slot: u64,
    /// Static keys followed by lookup-table loaded writable then readonly
    pub account_keys: Vec<String>,
    pub token_balance_owners: Vec<String>,
    pub inner_instructions: Vec<Vec<AccountRef>>,
}

impl TransactionNotification {
    fn resolve<'a>(&'a self, account: &'a AccountRef) -> Option<&'a str> {
        match account {
            AccountRef::Index(index) => self.account_keys.get(*index as usize).map(String::as_str),
            AccountRef::Address(address) => Some(address.as_str()),
        }
    }

    /// Every address the transaction references through any source.
    pub fn referenced_addresses(&self) -> HashSet<&str> {
        let mut addresses: HashSet<&str> = self.account_keys.iter().map(String::as_str).collect();
        addresses.extend(self.token_balance_owners.iter().map(String::as_str));
        for accounts in &self.inner_instructions {
            addresses.extend(accounts.iter().filter_map(|account| self.resolve(account)));
        }
        addresses
    }
}

/// Monitored addresses referenced by `notification`, sorted for stable job order.
pub fn match_addresses(
    notification: &TransactionNotification,
    monitored: &HashSet<String>,
) -> Vec<String> {
    if monitored.is_empty() {
        return Vec::new();
    }
    notification
        .referenced_addresses()
        .into_iter()
        .filter(|address| monitored.contains(*address))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitored(addresses: &[&str]) -> HashSet<String> {
        addresses.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn matches_account_table_keys() {
        let notification = TransactionNotification {
            signature: "sig".to_string(),
            account_keys: vec!["Payer".to_string(), "Whale".to_string()],
            ..Default::default()
        };
        assert_eq!(match_addresses(&notification, &monitored(&["Whale"])), vec!["Whale"]);
    }

    #[test]
    fn matches_owner_seen_only_in_post_token_balances() {
        let notification = TransactionNotification {
            signature: "sig".to_string(),
            account_keys: vec!["Payer".to_string(), "TokenAccount".to_string()],
            token_balance_owners: vec!["Whale".to_string()],
            ..Default::default()
        };
        assert_eq!(match_addresses(&notification, &monitored(&["Whale"])), vec!["Whale"]);
    }

    #[test]
    fn resolves_inner_instruction_indexes_through_account_table() {
        let notification = TransactionNotification {
            signature: "sig".to_string(),
            account_keys: vec!["Payer".to_string(), "Loaded".to_string()],
            inner_instructions: vec![vec![AccountRef::Index(1), AccountRef::Index(9)]],
            ..Default::default()
        };
        assert_eq!(match_addresses(&notification, &monitored(&["Loaded"])), vec!["Loaded"]);
    }

    #[test]
    fn returns_every_intersecting_address_once() {
        let notification = TransactionNotification {
            signature: "sig".to_string(),
            account_keys: vec!["A".to_string(), "B".to_string()],
            token_balance_owners: vec!["B".to_string(), "C".to_string()],
            inner_instructions: vec![vec![AccountRef::Address("A".to_string())]],
            ..Default::default()
        };
        assert_eq!(
            match_addresses(&notification, &monitored(&["A", "B", "C", "D"])),
            vec!["A", "B", "C"]
        );
    }

    #[test]
    fn no_overlap_yields_nothing() {
        let notification = TransactionNotification {
            account_keys: vec!["X".to_string()],
            ..Default::default()
        };
        assert!(match_addresses(&notification, &monitored(&["Whale"])).is_empty());
    }
}
