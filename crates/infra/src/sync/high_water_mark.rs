use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Latest known maximum product id, published by the watch job.
///
/// `0` means unknown. The value only ever grows.
#[derive(Debug, Clone, Default)]
pub struct HighWaterMark(Arc<AtomicI64>);

impl HighWaterMark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Raise the mark to `observed`. Returns `true` if it moved.
    pub fn advance(&self, observed: i64) -> bool {
        self.0.fetch_max(observed, Ordering::AcqRel) < observed
    }

    /// Whether a cursor at `position` has nothing left to read.
    pub fn is_reached_by(&self, position: i64) -> bool {
        let mark = self.get();
        mark > 0 && position >= mark
    }
}
