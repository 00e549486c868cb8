//! Concurrent fetching of one block's inscriptions.
//!
//! Every ID becomes its own task on a [`JoinSet`]. A semaphore sized to the
//! throttle width bounds how many fetches are in flight. Each finished
//! fetch locks the block's result set just long enough to insert its
//! record. [`aggregate`] only returns once every task has finished or been
//! cancelled.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ord_harvest_models::{Height, UnitResultSet};
use ord_harvest_source::{InscriptionSource, SourceError, progress::ProgressCallback};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::{FailurePolicy, HarvestError};

/// Aggregation state of a single block.
///
/// Created empty when the block starts and consumed by [`aggregate`];
/// nothing outlives the block.
#[derive(Debug)]
pub struct UnitContext {
    height: Height,
    records: Arc<Mutex<UnitResultSet>>,
}

impl UnitContext {
    #[must_use]
    pub fn new(height: Height) -> Self {
        Self {
            height,
            records: Arc::new(Mutex::new(UnitResultSet::new())),
        }
    }

    #[must_use]
    pub const fn height(&self) -> Height {
        self.height
    }

    fn into_records(self) -> UnitResultSet {
        match Arc::try_unwrap(self.records) {
            Ok(records) => records.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => lock(&shared).clone(),
        }
    }
}

fn lock(records: &Mutex<UnitResultSet>) -> MutexGuard<'_, UnitResultSet> {
    records.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The outcome of aggregating one block.
#[derive(Debug, Default)]
pub struct Aggregation {
    /// One record per distinct inscription ID fetched.
    pub records: UnitResultSet,
    /// IDs whose fetch failed and were skipped under
    /// [`FailurePolicy::Lenient`].
    pub skipped: Vec<String>,
}

/// Fetches every inscription in `ids` into the block's result set.
///
/// At most `throttle_width` fetches run at once. IDs listed more than once
/// are fetched once and stored once.
///
/// # Errors
///
/// * [`HarvestError::UnitIncomplete`] if a fetch fails under
///   [`FailurePolicy::Strict`]; fetches still in flight are cancelled
///   first
/// * [`HarvestError::Join`] if a fetch task panics
pub async fn aggregate<S>(
    source: &Arc<S>,
    context: UnitContext,
    ids: &[String],
    throttle_width: usize,
    policy: FailurePolicy,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Aggregation, HarvestError>
where
    S: InscriptionSource + 'static,
{
    let height = context.height;
    let distinct: BTreeSet<&String> = ids.iter().collect();

    progress.set_message(format!("Block {height}"));
    progress.set_total(distinct.len() as u64);

    let permits = Arc::new(Semaphore::new(throttle_width.max(1)));
    let mut tasks: JoinSet<Result<(), (String, SourceError)>> = JoinSet::new();

    for id in distinct {
        let id = id.clone();
        let source = Arc::clone(source);
        let records = Arc::clone(&context.records);
        let permits = Arc::clone(&permits);
        let progress = Arc::clone(progress);

        tasks.spawn(async move {
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();

            let result = source.inscription(&id).await;
            progress.inc(1);

            match result {
                Ok(inscription) => {
                    lock(&records).insert(id, inscription);
                    Ok(())
                }
                Err(e) => Err((id, e)),
            }
        });
    }

    let mut skipped = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err((id, e))) => match policy {
                FailurePolicy::Strict => {
                    tasks.shutdown().await;
                    return Err(HarvestError::UnitIncomplete {
                        height,
                        message: format!("inscription {id}: {e}"),
                    });
                }
                FailurePolicy::Lenient => {
                    log::warn!("Block {height}: skipping inscription {id}: {e}");
                    skipped.push(id);
                }
            },
            Err(e) => {
                tasks.shutdown().await;
                return Err(HarvestError::Join(e));
            }
        }
    }

    skipped.sort();

    Ok(Aggregation {
        records: context.into_records(),
        skipped,
    })
}
