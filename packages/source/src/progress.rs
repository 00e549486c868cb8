//! Progress reporting for long-running harvest steps.
//!
//! The harvester reports through [`ProgressCallback`] and never touches a
//! terminal itself. Bars are drawn by `ord_harvest_cli_utils`; tests and
//! library callers pass [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from the harvester.
///
/// Inscription fetches report from spawned tasks, hence `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Total units of work once known, e.g. the inscriptions in a block.
    fn set_total(&self, total: u64);

    /// Absolute position within the total.
    fn set_position(&self, pos: u64);

    fn inc(&self, delta: u64);

    /// Text shown beside the indicator, usually the block being worked on.
    fn set_message(&self, msg: String);

    fn finish(&self, msg: String);

    /// Completes the indicator and removes it from the display.
    fn finish_and_clear(&self);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _: u64) {}
    fn set_position(&self, _: u64) {}
    fn inc(&self, _: u64) {}
    fn set_message(&self, _: String) {}
    fn finish(&self, _: String) {}
    fn finish_and_clear(&self) {}
}

/// A shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
