//! Execution counters for a [`Runner`](crate::Runner).
//!
//! Counters are plain atomics updated from leaf tasks and from the stream that combines their
//! results. They are cumulative over the lifetime of the runner; take a [`MetricsSnapshot`]
//! before and after a request to measure just that request.
//!
//! ```
//! use ironsketch::{PartitionedDataset, Runner};
//! use ironsketch::config::EngineConfig;
//! use ironsketch::ops::sketch_fn;
//! use ironsketch::sketches::CountMonoid;
//!
//! let runner = Runner::new(EngineConfig::sequential())?;
//! let ds = PartitionedDataset::from_leaves(vec![vec![1u8; 3], vec![2u8; 4]], 2)?;
//! let rows = runner.run_sketch(&ds, sketch_fn(CountMonoid, |s: &Vec<u8>| Ok(s.len() as u64)))?;
//! assert_eq!(rows, 7);
//! assert_eq!(runner.metrics().snapshot().leaves_completed, 2);
//! # Ok::<_, ironsketch::SketchError>(())
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by all requests of one runner.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    requests_started: AtomicU64,
    requests_finished: AtomicU64,
    requests_cancelled: AtomicU64,
    leaves_started: AtomicU64,
    leaves_completed: AtomicU64,
    leaves_failed: AtomicU64,
    leaves_skipped: AtomicU64,
    combines: AtomicU64,
}

/// Point-in-time copy of [`ExecutionMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests_started: u64,
    pub requests_finished: u64,
    pub requests_cancelled: u64,
    pub leaves_started: u64,
    pub leaves_completed: u64,
    pub leaves_failed: u64,
    /// Leaves never started because their request was cancelled first.
    pub leaves_skipped: u64,
    /// Pairwise monoid `add` calls performed while reducing results.
    pub combines: u64,
}

impl ExecutionMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn request_started(&self) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn request_finished(&self) {
        self.requests_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn request_cancelled(&self) {
        self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn leaf_started(&self) {
        self.leaves_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn leaf_completed(&self) {
        self.leaves_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn leaf_failed(&self) {
        self.leaves_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn leaf_skipped(&self) {
        self.leaves_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn combined(&self, n: u64) {
        self.combines.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_started: self.requests_started.load(Ordering::Relaxed),
            requests_finished: self.requests_finished.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
            leaves_started: self.leaves_started.load(Ordering::Relaxed),
            leaves_completed: self.leaves_completed.load(Ordering::Relaxed),
            leaves_failed: self.leaves_failed.load(Ordering::Relaxed),
            leaves_skipped: self.leaves_skipped.load(Ordering::Relaxed),
            combines: self.combines.load(Ordering::Relaxed),
        }
    }

    /// All counters as a JSON object, with a short description per counter.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let s = self.snapshot();
        json!({
            "requests_started": { "value": s.requests_started, "description": "Map and sketch requests submitted" },
            "requests_finished": { "value": s.requests_finished, "description": "Requests that delivered a final result" },
            "requests_cancelled": { "value": s.requests_cancelled, "description": "Requests terminated by cancellation" },
            "leaves_started": { "value": s.leaves_started, "description": "Leaf computations started" },
            "leaves_completed": { "value": s.leaves_completed, "description": "Leaf computations that succeeded" },
            "leaves_failed": { "value": s.leaves_failed, "description": "Leaf computations that returned an error" },
            "leaves_skipped": { "value": s.leaves_skipped, "description": "Leaf computations skipped after cancellation" },
            "combines": { "value": s.combines, "description": "Monoid additions performed during reduction" },
        })
    }
}

impl MetricsSnapshot {
    /// Counter-wise difference `self - earlier`.
    #[must_use]
    pub const fn since(&self, earlier: &Self) -> Self {
        Self {
            requests_started: self.requests_started - earlier.requests_started,
            requests_finished: self.requests_finished - earlier.requests_finished,
            requests_cancelled: self.requests_cancelled - earlier.requests_cancelled,
            leaves_started: self.leaves_started - earlier.leaves_started,
            leaves_completed: self.leaves_completed - earlier.leaves_completed,
            leaves_failed: self.leaves_failed - earlier.leaves_failed,
            leaves_skipped: self.leaves_skipped - earlier.leaves_skipped,
            combines: self.combines - earlier.combines,
        }
    }
}
