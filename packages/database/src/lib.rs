#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Storage for harvested inscriptions.
//!
//! The harvester needs very little from its store: an unordered bulk
//! insert that ignores rows already present, a delete by genesis height
//! (to roll back a partially written block), and the maximum genesis
//! height stored (the resume checkpoint). [`InscriptionStore`] captures
//! that; [`duckdb_store::DuckDbStore`] is the durable implementation and
//! [`memory::MemoryStore`] keeps everything in process.

pub mod duckdb_store;
pub mod memory;

use ord_harvest_models::{Height, InscriptionRow};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// A row could not be serialized into its stored document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Result of an unordered bulk insert.
///
/// Rows whose ID is already stored are skipped silently; they count as
/// neither inserted nor failed. Rows in a batch that the store rejected
/// count as failed; the other batches are still written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Rows newly written.
    pub inserted: u64,
    /// Rows in batches that failed to write.
    pub failed: u64,
}

/// Persistent home of harvested inscriptions.
pub trait InscriptionStore {
    /// Returns the largest `genesis_block_height` among stored rows, or
    /// `None` if the store is empty.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn max_genesis_height(&self) -> Result<Option<Height>, DbError>;

    /// Deletes every row whose `genesis_block_height` equals `height` and
    /// returns how many were removed. Rows at other heights are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    fn delete_by_genesis_height(&self, height: Height) -> Result<u64, DbError>;

    /// Writes `rows` as an unordered bulk insert. Rows whose `id` is
    /// already stored are ignored, and a failing batch does not prevent
    /// the remaining batches from being written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] only if the insert could not be attempted at
    /// all; per-batch failures are reported in [`InsertOutcome::failed`].
    fn insert_unordered(&self, rows: &[InscriptionRow]) -> Result<InsertOutcome, DbError>;

    /// Returns the total number of stored rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn count(&self) -> Result<u64, DbError>;

    /// Returns the number of stored rows at one genesis height.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn count_at_height(&self, height: Height) -> Result<u64, DbError>;
}

/// Converts a height into the signed integer stored in the database.
pub(crate) fn height_to_i64(height: Height) -> Result<i64, DbError> {
    i64::try_from(height).map_err(|_| DbError::Conversion {
        message: format!("height {height} does not fit in BIGINT"),
    })
}
