//! Walking a block's paginated inscription listing.

use ord_harvest_models::Height;
use ord_harvest_source::{InscriptionSource, progress::ProgressCallback};

use crate::{FailurePolicy, HarvestError};

/// Number of failed pages in a row after which a lenient enumeration
/// stops asking for more.
pub const MAX_CONSECUTIVE_PAGE_FAILURES: u32 = 3;

/// The inscription IDs listed for one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    /// IDs in listing order, duplicates included.
    pub ids: Vec<String>,
    /// Set when a lenient walk stopped after
    /// [`MAX_CONSECUTIVE_PAGE_FAILURES`] failed pages, before the source
    /// signalled the last page. `ids` may then be incomplete.
    pub truncated: bool,
}

/// Returns every inscription ID listed for `height`, in listing order.
///
/// Pages are requested from 0 upward until one comes back without `more`.
/// IDs are concatenated as listed; an ID repeated across pages appears
/// twice.
///
/// A page that cannot be fetched ends the block under
/// [`FailurePolicy::Strict`]. Under [`FailurePolicy::Lenient`] it counts
/// as an empty page and the walk moves on to the next page index, until
/// [`MAX_CONSECUTIVE_PAGE_FAILURES`] pages in a row have failed; then the
/// IDs gathered so far are returned with [`Enumeration::truncated`] set.
///
/// # Errors
///
/// Returns [`HarvestError::UnitIncomplete`] if a page fails under the
/// strict policy.
pub async fn enumerate<S: InscriptionSource + ?Sized>(
    source: &S,
    height: Height,
    policy: FailurePolicy,
    progress: &dyn ProgressCallback,
) -> Result<Enumeration, HarvestError> {
    let mut ids = Vec::new();
    let mut truncated = false;
    let mut page: u32 = 0;
    let mut consecutive_failures = 0;

    progress.set_message(format!("Listing block {height}"));

    loop {
        match source.block_page(height, page).await {
            Ok(listing) => {
                consecutive_failures = 0;
                log::debug!(
                    "Block {height} page {page}: {} inscriptions (more: {})",
                    listing.inscriptions.len(),
                    listing.more,
                );
                ids.extend(listing.inscriptions);
                progress.inc(1);

                if !listing.more {
                    break;
                }
            }
            Err(e) => match policy {
                FailurePolicy::Strict => {
                    return Err(HarvestError::UnitIncomplete {
                        height,
                        message: format!("listing page {page}: {e}"),
                    });
                }
                FailurePolicy::Lenient => {
                    consecutive_failures += 1;
                    log::warn!("Block {height} page {page} failed, treating as empty: {e}");

                    if consecutive_failures >= MAX_CONSECUTIVE_PAGE_FAILURES {
                        log::error!(
                            "Block {height}: {consecutive_failures} listing pages in a row failed, \
                             keeping the {} inscriptions found so far",
                            ids.len(),
                        );
                        truncated = true;
                        break;
                    }
                }
            },
        }

        page += 1;
    }

    Ok(Enumeration { ids, truncated })
}
