//! Resume point resolution.
//!
//! There is no separate checkpoint ledger: the highest genesis height in
//! the store is the last block written. Since that block may only have
//! been written in part, it is deleted and harvested again on resume.

use ord_harvest_database::{DbError, InscriptionStore};
use ord_harvest_models::Height;

/// Returns the block to resume at: the highest genesis height stored, or
/// `genesis_height` if the store is empty.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot be queried.
pub fn resolve<St: InscriptionStore + ?Sized>(
    store: &St,
    genesis_height: Height,
) -> Result<Height, DbError> {
    Ok(match store.max_genesis_height()? {
        Some(height) => {
            log::debug!("Checkpoint found at block {height}");
            height
        }
        None => {
            log::info!("Store is empty, starting at genesis block {genesis_height}");
            genesis_height
        }
    })
}

/// Deletes every row at `height` so the block can be harvested again from
/// scratch. Returns the number of rows removed.
///
/// # Errors
///
/// Returns [`DbError`] if the delete fails.
pub fn rollback<St: InscriptionStore + ?Sized>(store: &St, height: Height) -> Result<u64, DbError> {
    let removed = store.delete_by_genesis_height(height)?;
    if removed > 0 {
        log::info!("Rolled back {removed} rows at block {height}");
    }
    Ok(removed)
}
