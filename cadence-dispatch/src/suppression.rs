//! Run-scoped suppression snapshot.
//!
//! Suppression is checked at send time, not at enqueue time, because entries
//! arrive between scheduling and execution (a bounce from an earlier,
//! unrelated send, an unsubscribe, …). One run takes one snapshot at its
//! start — a single batch query for the whole address universe — and every
//! decision inside the run is made against it. Entries written mid-run are
//! honored by the next run.

use std::collections::HashSet;

use cadence_store::{Store, StoreError, normalize_email};

/// The suppressed subset of one run's address universe.
#[derive(Debug, Clone, Default)]
pub struct SuppressionSnapshot {
    blocked: HashSet<String>,
}

impl SuppressionSnapshot {
    /// Build a snapshot from an already-queried blocked set.
    #[must_use]
    pub const fn new(blocked: HashSet<String>) -> Self {
        Self { blocked }
    }

    /// Query the store once for the whole `universe` of candidate addresses.
    ///
    /// # Errors
    /// Returns the store's error if the batch query fails.
    pub async fn load(store: &dyn Store, universe: &HashSet<String>) -> Result<Self, StoreError> {
        let blocked = store.suppressed(universe).await?;
        Ok(Self { blocked })
    }

    /// Case-insensitive membership test.
    #[must_use]
    pub fn is_suppressed(&self, address: &str) -> bool {
        self.blocked.contains(&normalize_email(address))
    }

    /// Number of suppressed addresses in this snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    /// Whether the snapshot blocks nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}
