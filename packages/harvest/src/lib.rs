#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incremental, block-by-block harvesting of ord inscriptions.
//!
//! [`run_harvest`] drives the whole pipeline. It resolves the resume
//! point from the store, rolls back whatever was written for that block
//! by an interrupted run, and then walks every block up to the source's
//! frontier in order:
//!
//! 1. [`enumerate::enumerate`] walks the block's listing pages into a list
//!    of inscription IDs.
//! 2. [`aggregate::aggregate`] fetches every inscription concurrently,
//!    bounded by the throttle width, into one [`UnitResultSet`].
//! 3. [`persist::persist`] converts the set into rows and bulk-inserts
//!    them.
//!
//! A block is never started before the previous one has been persisted,
//! so at most the most recent block can be partially written. Resuming
//! always deletes and re-harvests that block.

pub mod aggregate;
pub mod checkpoint;
pub mod config;
pub mod enumerate;
pub mod metadata;
pub mod persist;

#[cfg(test)]
mod fixtures;

use std::sync::Arc;
use std::time::Instant;

use ord_harvest_database::{DbError, InscriptionStore};
use ord_harvest_models::{Height, UnitResultSet};
use ord_harvest_source::{
    InscriptionSource, SourceError,
    client::DEFAULT_THROTTLE_WIDTH,
    progress::{ProgressCallback, null_progress},
};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::aggregate::UnitContext;

/// First block that carries inscriptions.
pub const DEFAULT_GENESIS_HEIGHT: Height = 767_430;

/// Errors that stop a harvest run.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// The source could not be queried.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The store could not be queried or modified.
    #[error("Store error: {0}")]
    Db(#[from] DbError),

    /// A block could not be harvested completely under the strict
    /// failure policy.
    #[error("Block {height} incomplete: {message}")]
    UnitIncomplete {
        /// The block being harvested.
        height: Height,
        /// What failed.
        message: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what is wrong.
        message: String,
    },

    /// A fetch task panicked.
    #[error("Fetch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// What to do when a listing page or an inscription cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the block on the first failure. Nothing of the block is
    /// written and the run stops.
    #[default]
    Strict,
    /// Log the failure, skip the page or inscription, and carry on. The
    /// block may be stored incomplete.
    Lenient,
}

/// Parameters of one harvest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOptions {
    /// Block to start from when the store is empty.
    pub genesis_height: Height,
    /// Last block to harvest, if lower than the source's frontier.
    pub stop_height: Option<Height>,
    /// Maximum number of inscription fetches in flight.
    pub throttle_width: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            genesis_height: DEFAULT_GENESIS_HEIGHT,
            stop_height: None,
            throttle_width: DEFAULT_THROTTLE_WIDTH,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Progress sinks for a harvest run.
#[derive(Clone)]
pub struct HarvestProgress {
    /// Advanced once per block.
    pub blocks: Arc<dyn ProgressCallback>,
    /// Tracks the listing pages, then the inscription fetches, of the
    /// block in progress.
    pub inscriptions: Arc<dyn ProgressCallback>,
}

impl HarvestProgress {
    /// Progress that goes nowhere.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            blocks: null_progress(),
            inscriptions: null_progress(),
        }
    }
}

/// Totals of a harvest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    /// First block harvested, if any.
    pub first_height: Option<Height>,
    /// Last block harvested, if any.
    pub last_height: Option<Height>,
    pub blocks_processed: u64,
    /// Distinct inscriptions fetched.
    pub inscriptions_fetched: u64,
    /// Rows newly written to the store.
    pub rows_written: u64,
    /// Inscriptions skipped under the lenient policy.
    pub inscriptions_skipped: u64,
    /// Blocks whose listing was cut short under the lenient policy after
    /// too many failed pages in a row.
    pub blocks_truncated: u64,
}

impl HarvestSummary {
    fn record(&mut self, height: Height, block: &BlockOutcome) {
        self.first_height.get_or_insert(height);
        self.last_height = Some(height);
        self.blocks_processed += 1;
        self.inscriptions_fetched += block.fetched;
        self.rows_written += block.written;
        self.inscriptions_skipped += block.skipped;
        if block.truncated {
            self.blocks_truncated += 1;
        }
    }
}

struct BlockOutcome {
    fetched: u64,
    written: u64,
    skipped: u64,
    truncated: bool,
}

/// Harvests every block from the resume point up to the source's frontier
/// (or `options.stop_height`, whichever is lower).
///
/// The resume point is the highest genesis height in the store, or
/// `options.genesis_height` if the store is empty. Rows already stored at
/// the resume point are deleted first, since the run that wrote them may
/// have been interrupted halfway through the block.
///
/// # Errors
///
/// * [`HarvestError::Source`] if the frontier cannot be read
/// * [`HarvestError::Db`] if the checkpoint cannot be read or rolled back
/// * [`HarvestError::UnitIncomplete`] if a block fails under
///   [`FailurePolicy::Strict`]
/// * [`HarvestError::Join`] if a fetch task panics
pub async fn run_harvest<S, St>(
    source: &Arc<S>,
    store: &St,
    options: &HarvestOptions,
    progress: &HarvestProgress,
) -> Result<HarvestSummary, HarvestError>
where
    S: InscriptionSource + 'static,
    St: InscriptionStore + ?Sized,
{
    let start = Instant::now();

    let source_height = source.current_height().await?;
    let frontier = options
        .stop_height
        .map_or(source_height, |stop| stop.min(source_height));

    let current = checkpoint::resolve(store, options.genesis_height)?;
    log::info!("Resuming at block {current}, frontier is block {frontier}");

    let mut summary = HarvestSummary::default();

    if current > frontier {
        log::info!("Store is ahead of block {frontier}, nothing to harvest");
        return Ok(summary);
    }

    checkpoint::rollback(store, current)?;

    progress.blocks.set_total(frontier - current + 1);

    for height in current..=frontier {
        progress.blocks.set_message(format!("Block {height}"));

        let block = harvest_block(source, store, height, options, progress).await?;
        summary.record(height, &block);

        progress.blocks.set_position(height - current + 1);
    }

    progress.blocks.finish(format!("Harvested {} blocks", summary.blocks_processed));

    log::info!(
        "Harvest complete: blocks {}..={} ({} blocks), {} inscriptions fetched, {} rows written, {} skipped, {} listings truncated, took {:.1}s",
        summary.first_height.unwrap_or(current),
        summary.last_height.unwrap_or(frontier),
        summary.blocks_processed,
        summary.inscriptions_fetched,
        summary.rows_written,
        summary.inscriptions_skipped,
        summary.blocks_truncated,
        start.elapsed().as_secs_f64(),
    );

    Ok(summary)
}

async fn harvest_block<S, St>(
    source: &Arc<S>,
    store: &St,
    height: Height,
    options: &HarvestOptions,
    progress: &HarvestProgress,
) -> Result<BlockOutcome, HarvestError>
where
    S: InscriptionSource + 'static,
    St: InscriptionStore + ?Sized,
{
    let listing = enumerate::enumerate(
        source.as_ref(),
        height,
        options.failure_policy,
        progress.inscriptions.as_ref(),
    )
    .await?;

    let aggregation = aggregate::aggregate(
        source,
        UnitContext::new(height),
        &listing.ids,
        options.throttle_width,
        options.failure_policy,
        &progress.inscriptions,
    )
    .await?;

    let written = persist::persist(store, height, &aggregation.records);
    log_block(height, &aggregation.records, written);

    Ok(BlockOutcome {
        fetched: aggregation.records.len() as u64,
        written,
        skipped: aggregation.skipped.len() as u64,
        truncated: listing.truncated,
    })
}

fn log_block(height: Height, records: &UnitResultSet, written: u64) {
    let Some(timestamp) = records.values().map(|ins| ins.timestamp).next() else {
        log::info!("Block {height}: no inscriptions");
        return;
    };

    let block_time = chrono::DateTime::from_timestamp(timestamp, 0)
        .map_or_else(|| timestamp.to_string(), |t| t.to_rfc3339());
    log::info!("Block {height} ({block_time}): wrote {written} inscriptions");
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ord_harvest_database::memory::MemoryStore;

    use super::*;
    use crate::fixtures::{FakeSource, inscription, result_set};

    fn options(genesis_height: Height) -> HarvestOptions {
        HarvestOptions {
            genesis_height,
            throttle_width: 4,
            ..HarvestOptions::default()
        }
    }

    #[test]
    fn failure_policy_parses_lowercase() {
        assert_eq!(FailurePolicy::from_str("strict").unwrap(), FailurePolicy::Strict);
        assert_eq!(FailurePolicy::from_str("lenient").unwrap(), FailurePolicy::Lenient);
        assert!(FailurePolicy::from_str("sloppy").is_err());
        assert_eq!(FailurePolicy::Lenient.to_string(), "lenient");
    }

    #[tokio::test]
    async fn harvests_from_genesis_to_frontier_in_order() {
        let source = Arc::new(
            FakeSource::new(5)
                .with_block(3, &[&["a3", "b3"]])
                .with_block(4, &[&["a4"]])
                .with_block(5, &[&["a5"], &["b5"]]),
        );
        let store = MemoryStore::new();

        let summary = run_harvest(&source, &store, &options(3), &HarvestProgress::silent())
            .await
            .unwrap();

        assert_eq!(summary.first_height, Some(3));
        assert_eq!(summary.last_height, Some(5));
        assert_eq!(summary.blocks_processed, 3);
        assert_eq!(summary.rows_written, 5);
        assert_eq!(source.listed_heights(), vec![3, 4, 5]);
        assert_eq!(store.count_at_height(3).unwrap(), 2);
        assert_eq!(store.count_at_height(4).unwrap(), 1);
        assert_eq!(store.count_at_height(5).unwrap(), 2);
    }

    #[tokio::test]
    async fn checkpoint_is_last_block_after_run() {
        let source = Arc::new(
            FakeSource::new(4)
                .with_block(3, &[&["a3"]])
                .with_block(4, &[&["a4"]]),
        );
        let store = MemoryStore::new();

        run_harvest(&source, &store, &options(3), &HarvestProgress::silent())
            .await
            .unwrap();

        assert_eq!(checkpoint::resolve(&store, 3).unwrap(), 4);
    }

    #[tokio::test]
    async fn resume_after_partial_persist_matches_uninterrupted_run() {
        let blocks = |source: FakeSource| {
            source
                .with_block(3, &[&["a3", "b3"]])
                .with_block(4, &[&["a4", "b4", "c4"]])
        };

        let clean_store = MemoryStore::new();
        run_harvest(
            &Arc::new(blocks(FakeSource::new(4))),
            &clean_store,
            &options(3),
            &HarvestProgress::silent(),
        )
        .await
        .unwrap();

        // Block 3 complete, block 4 interrupted after one row.
        let crashed_store = MemoryStore::new();
        persist::persist(
            &crashed_store,
            3,
            &result_set(&[inscription("a3", 3), inscription("b3", 3)]),
        );
        persist::persist(&crashed_store, 4, &result_set(&[inscription("a4", 4)]));

        let source = Arc::new(blocks(FakeSource::new(4)));
        let summary = run_harvest(&source, &crashed_store, &options(3), &HarvestProgress::silent())
            .await
            .unwrap();

        assert_eq!(source.listed_heights(), vec![4]);
        assert_eq!(summary.rows_written, 3);
        assert_eq!(crashed_store.count().unwrap(), clean_store.count().unwrap());
        assert_eq!(crashed_store.count_at_height(4).unwrap(), 3);
    }

    #[tokio::test]
    async fn rerun_at_frontier_rewrites_only_last_block() {
        let source = Arc::new(
            FakeSource::new(4)
                .with_block(3, &[&["a3"]])
                .with_block(4, &[&["a4", "b4"]]),
        );
        let store = MemoryStore::new();

        run_harvest(&source, &store, &options(3), &HarvestProgress::silent())
            .await
            .unwrap();
        let summary = run_harvest(&source, &store, &options(3), &HarvestProgress::silent())
            .await
            .unwrap();

        assert_eq!(summary.first_height, Some(4));
        assert_eq!(summary.blocks_processed, 1);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn stop_height_caps_frontier() {
        let source = Arc::new(
            FakeSource::new(10)
                .with_block(3, &[&["a3"]])
                .with_block(4, &[&["a4"]]),
        );
        let store = MemoryStore::new();
        let opts = HarvestOptions {
            stop_height: Some(4),
            ..options(3)
        };

        let summary = run_harvest(&source, &store, &opts, &HarvestProgress::silent())
            .await
            .unwrap();

        assert_eq!(summary.last_height, Some(4));
        assert_eq!(source.listed_heights(), vec![3, 4]);
    }

    #[tokio::test]
    async fn store_ahead_of_frontier_is_left_alone() {
        let store = MemoryStore::new();
        persist::persist(&store, 9, &result_set(&[inscription("a9", 9)]));
        let source = Arc::new(FakeSource::new(5));

        let summary = run_harvest(&source, &store, &options(3), &HarvestProgress::silent())
            .await
            .unwrap();

        assert_eq!(summary, HarvestSummary::default());
        assert_eq!(store.count_at_height(9).unwrap(), 1);
        assert!(source.listed_heights().is_empty());
    }

    #[tokio::test]
    async fn empty_blocks_advance_without_writing() {
        let source = Arc::new(FakeSource::new(4).with_block(4, &[&["a4"]]));
        let store = MemoryStore::new();

        let summary = run_harvest(&source, &store, &options(3), &HarvestProgress::silent())
            .await
            .unwrap();

        assert_eq!(summary.blocks_processed, 2);
        assert_eq!(summary.rows_written, 1);
        assert_eq!(store.count_at_height(3).unwrap(), 0);
    }

    #[tokio::test]
    async fn strict_failure_stops_before_writing_block() {
        let source = Arc::new(
            FakeSource::new(4)
                .with_block(3, &[&["a3"]])
                .with_block(4, &[&["a4", "bad4"]])
                .failing_inscription("bad4"),
        );
        let store = MemoryStore::new();

        let err = run_harvest(&source, &store, &options(3), &HarvestProgress::silent())
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::UnitIncomplete { height: 4, .. }));
        assert_eq!(store.count_at_height(3).unwrap(), 1);
        assert_eq!(store.count_at_height(4).unwrap(), 0);
    }

    #[tokio::test]
    async fn lenient_failure_skips_inscription() {
        let source = Arc::new(
            FakeSource::new(4)
                .with_block(4, &[&["a4", "bad4"]])
                .failing_inscription("bad4"),
        );
        let store = MemoryStore::new();
        let opts = HarvestOptions {
            failure_policy: FailurePolicy::Lenient,
            ..options(4)
        };

        let summary = run_harvest(&source, &store, &opts, &HarvestProgress::silent())
            .await
            .unwrap();

        assert_eq!(summary.inscriptions_skipped, 1);
        assert_eq!(summary.rows_written, 1);
    }

    #[tokio::test]
    async fn truncated_listing_is_counted() {
        let source = Arc::new(
            FakeSource::new(4)
                .with_block(3, &[&["a3"]])
                .with_block(4, &[&["a4"], &["b4"], &["c4"], &["d4"], &["e4"]])
                .failing_page(4, 1)
                .failing_page(4, 2)
                .failing_page(4, 3),
        );
        let store = MemoryStore::new();
        let opts = HarvestOptions {
            failure_policy: FailurePolicy::Lenient,
            ..options(3)
        };

        let summary = run_harvest(&source, &store, &opts, &HarvestProgress::silent())
            .await
            .unwrap();

        assert_eq!(summary.blocks_processed, 2);
        assert_eq!(summary.blocks_truncated, 1);
        assert_eq!(store.count_at_height(4).unwrap(), 1);
    }

    #[tokio::test]
    async fn frontier_error_is_fatal() {
        let source = Arc::new(FakeSource::new(4).failing_height());
        let store = MemoryStore::new();

        let err = run_harvest(&source, &store, &options(3), &HarvestProgress::silent())
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Source(_)));
    }
}
