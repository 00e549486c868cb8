//! In-process inscription store.
//!
//! Used for dry runs and tests. Behaves like the `DuckDB` store: `id` is
//! unique, and inserting an existing `id` leaves the stored row as it was.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use ord_harvest_models::{Height, InscriptionRow};

use crate::{DbError, InscriptionStore, InsertOutcome};

/// An [`InscriptionStore`] backed by a map in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<String, InscriptionRow>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored row, ordered by `id`.
    #[must_use]
    pub fn rows(&self) -> Vec<InscriptionRow> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, InscriptionRow>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InscriptionStore for MemoryStore {
    fn max_genesis_height(&self) -> Result<Option<Height>, DbError> {
        Ok(self.lock().values().map(|r| r.genesis_block_height).max())
    }

    fn delete_by_genesis_height(&self, height: Height) -> Result<u64, DbError> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|_, r| r.genesis_block_height != height);
        Ok((before - rows.len()) as u64)
    }

    fn insert_unordered(&self, rows: &[InscriptionRow]) -> Result<InsertOutcome, DbError> {
        let mut stored = self.lock();
        let mut outcome = InsertOutcome::default();

        for row in rows {
            if !stored.contains_key(&row.id) {
                stored.insert(row.id.clone(), row.clone());
                outcome.inserted += 1;
            }
        }

        Ok(outcome)
    }

    fn count(&self) -> Result<u64, DbError> {
        Ok(self.lock().len() as u64)
    }

    fn count_at_height(&self, height: Height) -> Result<u64, DbError> {
        Ok(self
            .lock()
            .values()
            .filter(|r| r.genesis_block_height == height)
            .count() as u64)
    }
}
