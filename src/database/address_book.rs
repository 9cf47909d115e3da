use crate::dispatch::job::Cohort;
use crate::error::AppError;
use crate::metrics;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::Client;
use tracing::{info, warn};

pub type AddressSnapshot = Arc<HashSet<String>>;

/// Monitored addresses of one cohort. Readers take a cheap snapshot; a
/// refresh swaps the whole set at once.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    current: Arc<RwLock<AddressSnapshot>>,
}

impl AddressBook {
    pub fn new(addresses: impl IntoIterator<Item = String>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(addresses.into_iter().collect()))),
        }
    }

    pub fn snapshot(&self) -> AddressSnapshot {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.snapshot().contains(address)
    }

    /// Install a new set. Returns `false`, keeping the current snapshot
    /// pointer, when the contents are unchanged.
    pub fn replace(&self, addresses: HashSet<String>) -> bool {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if **guard == addresses {
            return false;
        }
        *guard = Arc::new(addresses);
        true
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

fn table_for(cohort: Cohort) -> &'static str {
    match cohort {
        Cohort::Whale => "whale_wallets",
        Cohort::Kol => "kol_wallets",
    }
}

pub async fn load_addresses(client: &Mutex<Client>, cohort: Cohort) -> Result<HashSet<String>, AppError> {
    let query = format!("SELECT address FROM {} WHERE active", table_for(cohort));
    let rows = client
        .lock()
        .await
        .query(query.as_str(), &[])
        .await
        .map_err(|e| AppError::Database(format!("Failed to load {} addresses: {}", cohort, e)))?;
    Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
}

/// Reload the cohort's addresses on a fixed interval. A failed reload keeps
/// the previous snapshot.
pub async fn refresh_periodically(
    client: Arc<Mutex<Client>>,
    book: AddressBook,
    cohort: Cohort,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match load_addresses(&client, cohort).await {
            Ok(addresses) => {
                let previous = book.len();
                if book.replace(addresses) {
                    metrics::MONITORED_ADDRESSES
                        .with_label_values(&[cohort.as_str()])
                        .set(book.len() as i64);
                    info!(cohort = %cohort, previous, current = book.len(), "Monitored addresses refreshed");
                }
            }
            Err(e) => warn!(cohort = %cohort, error = %e, "Address refresh failed, keeping previous snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_unaffected_by_later_replace() {
        let book = AddressBook::new(["A".to_string()]);
        let before = book.snapshot();
        book.replace(HashSet::from(["B".to_string()]));
        assert!(before.contains("A"));
        assert!(book.contains("B"));
        assert!(!book.contains("A"));
    }

    #[test]
    fn clones_share_the_same_book() {
        let book = AddressBook::default();
        let reader = book.clone();
        assert!(reader.is_empty());
        book.replace(HashSet::from(["Whale".to_string()]));
        assert!(reader.contains("Whale"));
    }

    #[test]
    fn unchanged_set_keeps_the_snapshot_pointer() {
        let book = AddressBook::new(["A".to_string(), "B".to_string()]);
        let before = book.snapshot();
        assert!(!book.replace(HashSet::from(["B".to_string(), "A".to_string()])));
        assert!(Arc::ptr_eq(&before, &book.snapshot()));
        assert!(book.replace(HashSet::from(["A".to_string()])));
        assert!(!Arc::ptr_eq(&before, &book.snapshot()));
    }
}
