//! Partial-result streams, tree reduction, and cancellation.
//!
//! A [`SketchStream`] is the caller's view of one sketch request. Each item is a snapshot of
//! the value combined so far, as a [`PartialResult`] whose `done` never decreases; the last
//! item has `done == 1.0` and carries the fully combined value.
//!
//! Combining happens in a [`Reducer`] that mirrors the dataset tree: each internal node holds
//! the left-to-right sum of its children, recomputed whenever a leaf below it completes. Leaves
//! that have not reported yet contribute `zero()`, so the root is always a valid partial sum
//! and the final root equals a flat fold over all leaves.

use crate::dataset::{NodePath, PartitionedDataset};
use crate::error::{LeafFailure, SketchError};
use crate::metrics::ExecutionMetrics;
use crate::monoid::{Monoid, PartialResult};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

/// Shared cancellation flag for one request.
///
/// Cloning yields a handle to the same flag. Leaf tasks check it before starting; once set,
/// no new leaf computation begins and the stream ends with [`SketchError::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one leaf, reported to the stream.
pub(crate) enum LeafEvent<T> {
    Done {
        index: usize,
        result: anyhow::Result<T>,
    },
    /// The leaf never ran because the request was cancelled.
    Skipped,
}

pub(crate) type LeafJob<T> = Box<dyn FnOnce() -> anyhow::Result<T> + Send>;

/// Where leaf events come from.
pub(crate) enum LeafSource<T> {
    /// Jobs run lazily, one per `next()`, on the consuming thread.
    Inline(VecDeque<(usize, LeafJob<T>)>),
    /// Jobs were spawned on a pool and report through a channel.
    Channel(Receiver<LeafEvent<T>>),
}

/* ===================== Reducer ===================== */

struct ReduceNode<T> {
    parent: Option<usize>,
    children: Vec<usize>,
    acc: PartialResult<T>,
}

/// Mirror of a dataset tree holding the partial sum at every node.
pub(crate) struct Reducer<T> {
    monoid: Arc<dyn Monoid<Item = T>>,
    nodes: Vec<ReduceNode<T>>,
    /// Node index of each leaf, left to right.
    leaves: Vec<usize>,
    /// Progress weight of each leaf, left to right.
    weights: Vec<u64>,
    total_weight: u64,
    done_weight: u64,
}

impl<T: Clone + Send + 'static> Reducer<T> {
    pub(crate) fn new<S>(
        dataset: &PartitionedDataset<S>,
        monoid: Arc<dyn Monoid<Item = T>>,
        by_size: bool,
    ) -> Self {
        let mut r = Self {
            monoid,
            nodes: Vec::new(),
            leaves: Vec::new(),
            weights: Vec::new(),
            total_weight: 0,
            done_weight: 0,
        };
        r.build(dataset, None, by_size);
        r.total_weight = r.weights.iter().sum();
        r
    }

    fn build<S>(&mut self, ds: &PartitionedDataset<S>, parent: Option<usize>, by_size: bool) {
        let idx = self.nodes.len();
        self.nodes.push(ReduceNode {
            parent,
            children: Vec::new(),
            acc: PartialResult::new(0.0, self.monoid.zero()),
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(idx);
        }
        if ds.is_leaf() {
            self.leaves.push(idx);
            self.weights.push(if by_size { ds.weight() } else { 1 });
        } else {
            for c in ds.children() {
                self.build(c, Some(idx), by_size);
            }
        }
    }

    pub(crate) fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Record leaf `leaf`'s value and recompute every ancestor. Returns the number of monoid
    /// additions performed.
    pub(crate) fn complete_leaf(&mut self, leaf: usize, value: T) -> u64 {
        let weight = self.weights[leaf];
        let share = weight as f64 / self.total_weight.max(1) as f64;
        self.done_weight += weight;

        let node = self.leaves[leaf];
        self.nodes[node].acc = PartialResult::new(share, value);

        let mut adds = 0;
        let mut cur = self.nodes[node].parent;
        while let Some(p) = cur {
            let mut done = 0.0;
            let mut value = self.monoid.zero();
            for &c in &self.nodes[p].children {
                let child = &self.nodes[c].acc;
                done += child.done;
                value = self.monoid.add(&value, &child.value);
                adds += 1;
            }
            self.nodes[p].acc = PartialResult::new(done, value);
            cur = self.nodes[p].parent;
        }
        adds
    }

    /// Fraction of the total weight completed; exactly `1.0` once every leaf reported.
    pub(crate) fn fraction_done(&self) -> f64 {
        if self.done_weight >= self.total_weight {
            1.0
        } else {
            self.done_weight as f64 / self.total_weight as f64
        }
    }

    pub(crate) fn root_value(&self) -> T {
        self.nodes
            .first()
            .map_or_else(|| self.monoid.zero(), |n| n.acc.value.clone())
    }
}

/* ===================== SketchStream ===================== */

/// Stream of partial results for one sketch request. See the [module docs](self).
///
/// Dropping the stream cancels the request.
pub struct SketchStream<T> {
    request: u64,
    token: CancellationToken,
    source: LeafSource<T>,
    reducer: Reducer<T>,
    paths: Vec<NodePath>,
    remaining: usize,
    last_done: f64,
    finished: bool,
    emit_partials: bool,
    tolerate_failures: bool,
    failures: Vec<LeafFailure>,
    metrics: Arc<ExecutionMetrics>,
}

pub(crate) struct StreamParts<T> {
    pub request: u64,
    pub token: CancellationToken,
    pub source: LeafSource<T>,
    pub reducer: Reducer<T>,
    pub paths: Vec<NodePath>,
    pub emit_partials: bool,
    pub tolerate_failures: bool,
    pub metrics: Arc<ExecutionMetrics>,
}

impl<T: Clone + Send + 'static> SketchStream<T> {
    pub(crate) fn new(parts: StreamParts<T>) -> Self {
        let remaining = parts.reducer.leaf_count();
        Self {
            request: parts.request,
            token: parts.token,
            source: parts.source,
            reducer: parts.reducer,
            paths: parts.paths,
            remaining,
            last_done: 0.0,
            finished: false,
            emit_partials: parts.emit_partials,
            tolerate_failures: parts.tolerate_failures,
            failures: Vec::new(),
            metrics: parts.metrics,
        }
    }

    /// Handle that cancels this request from another thread.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Leaves that failed while failures were tolerated.
    #[must_use]
    pub fn failures(&self) -> &[LeafFailure] {
        &self.failures
    }

    /// Drain the stream and return the final combined value.
    ///
    /// # Errors
    /// The first error the stream yields: cancellation or leaf failures.
    pub fn complete(mut self) -> Result<T, SketchError> {
        let mut last = None;
        for item in self.by_ref() {
            last = Some(item?);
        }
        Ok(last.map_or_else(|| self.reducer.root_value(), |p| p.value))
    }

    fn snapshot(&mut self) -> PartialResult<T> {
        let done = self.reducer.fraction_done().max(self.last_done);
        self.last_done = done;
        PartialResult::new(done, self.reducer.root_value())
    }

    fn next_event(&mut self) -> Option<LeafEvent<T>> {
        match &mut self.source {
            LeafSource::Inline(jobs) => {
                let (index, job) = jobs.pop_front()?;
                if self.token.is_cancelled() {
                    self.metrics.leaf_skipped();
                    return Some(LeafEvent::Skipped);
                }
                self.metrics.leaf_started();
                Some(LeafEvent::Done {
                    index,
                    result: run_guarded(job),
                })
            }
            LeafSource::Channel(rx) => rx.recv().ok(),
        }
    }

    fn cancelled(&mut self) -> Option<Result<PartialResult<T>, SketchError>> {
        self.finished = true;
        self.metrics.request_cancelled();
        debug!(request = self.request, remaining = self.remaining, "sketch cancelled");
        Some(Err(SketchError::Cancelled))
    }

    fn fail(&mut self, first: LeafFailure) -> Option<Result<PartialResult<T>, SketchError>> {
        self.token.cancel();
        self.finished = true;
        let mut failures = vec![first];
        // Collect failures from siblings that already reported.
        if let LeafSource::Channel(rx) = &self.source {
            while let Ok(ev) = rx.try_recv() {
                if let LeafEvent::Done {
                    index,
                    result: Err(e),
                } = ev
                {
                    self.metrics.leaf_failed();
                    failures.push(LeafFailure::new(self.paths[index].clone(), e));
                }
            }
        }
        warn!(
            request = self.request,
            failed = failures.len(),
            "sketch aborted by leaf failure"
        );
        Some(Err(SketchError::LeafFailures(failures)))
    }
}

impl<T: Clone + Send + 'static> Iterator for SketchStream<T> {
    type Item = Result<PartialResult<T>, SketchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if self.token.is_cancelled() {
                return self.cancelled();
            }
            if self.remaining == 0 {
                self.finished = true;
                self.metrics.request_finished();
                info!(
                    request = self.request,
                    failed = self.failures.len(),
                    "sketch complete"
                );
                return Some(Ok(self.snapshot()));
            }

            let Some(event) = self.next_event() else {
                // Every sender is gone before all leaves reported.
                return self.cancelled();
            };
            match event {
                LeafEvent::Skipped => return self.cancelled(),
                LeafEvent::Done { index, result } => {
                    self.remaining -= 1;
                    let value = match result {
                        Ok(v) => {
                            self.metrics.leaf_completed();
                            v
                        }
                        Err(e) => {
                            self.metrics.leaf_failed();
                            let failure = LeafFailure::new(self.paths[index].clone(), e);
                            if !self.tolerate_failures {
                                return self.fail(failure);
                            }
                            warn!(request = self.request, error = %failure, "tolerating leaf failure");
                            self.failures.push(failure);
                            self.reducer.monoid.zero()
                        }
                    };
                    let adds = self.reducer.complete_leaf(index, value);
                    self.metrics.combined(adds);
                    debug!(
                        request = self.request,
                        leaf = %self.paths[index],
                        done = self.reducer.fraction_done(),
                        "leaf reported"
                    );
                    if self.remaining > 0 && self.emit_partials {
                        return Some(Ok(self.snapshot()));
                    }
                }
            }
        }
    }
}

impl<T> Drop for SketchStream<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.token.cancel();
        }
    }
}

/// Run a leaf job, turning a panic into a leaf error.
pub(crate) fn run_guarded<T, F>(job: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).unwrap_or_else(|panic| {
        let msg = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(anyhow::anyhow!("leaf computation panicked: {msg}"))
    })
}
