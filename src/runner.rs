//! Execution engine for `map` and `sketch` requests.
//!
//! A [`Runner`] owns an [`EngineConfig`], an optional dedicated Rayon pool, and the
//! [`ExecutionMetrics`] of every request it serves. It is `Sync`, so one runner can serve any
//! number of concurrent requests against shared datasets.
//!
//! - **Sequential** mode runs one leaf per stream step on the consuming thread.
//! - **Parallel** mode spawns every leaf on the pool up front; leaves report through a channel
//!   and the stream combines them as they arrive.
//!
//! Both modes produce identical final values.

use crate::config::{EngineConfig, ExecMode, ProgressWeighting};
use crate::dataset::{NodePath, PartitionedDataset};
use crate::error::{LeafFailure, Result, SketchError};
use crate::metrics::ExecutionMetrics;
use crate::monoid::Monoid;
use crate::ops::{Map, Sketch};
use crate::postprocess::CompleteSketch;
use crate::stream::{
    CancellationToken, LeafEvent, LeafJob, LeafSource, Reducer, SketchStream, StreamParts,
    run_guarded,
};
use anyhow::anyhow;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use tracing::{debug, info};

pub struct Runner {
    config: EngineConfig,
    pool: Option<Arc<ThreadPool>>,
    metrics: Arc<ExecutionMetrics>,
    next_request: AtomicU64,
}

impl Default for Runner {
    /// Parallel runner on Rayon's global pool.
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            pool: None,
            metrics: Arc::new(ExecutionMetrics::new()),
            next_request: AtomicU64::new(0),
        }
    }
}

impl Runner {
    /// Build a runner; parallel mode gets its own pool (one thread per CPU unless configured).
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] if the configuration is invalid or the pool cannot be
    /// built.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.mode {
            ExecMode::Sequential => None,
            ExecMode::Parallel { threads } => {
                let threads = threads.unwrap_or_else(|| num_cpus::get().max(1));
                let pool = ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("ironsketch-leaf-{i}"))
                    .build()
                    .map_err(|e| SketchError::invalid(format!("cannot build thread pool: {e}")))?;
                Some(Arc::new(pool))
            }
        };
        Ok(Self {
            config,
            pool,
            metrics: Arc::new(ExecutionMetrics::new()),
            next_request: AtomicU64::new(0),
        })
    }

    /// A single-threaded runner.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            config: EngineConfig::sequential(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }

    /// Number of threads leaves may run on.
    #[must_use]
    pub fn threads(&self) -> usize {
        match (self.config.mode, &self.pool) {
            (ExecMode::Sequential, _) => 1,
            (ExecMode::Parallel { .. }, Some(pool)) => pool.current_num_threads(),
            (ExecMode::Parallel { .. }, None) => rayon::current_num_threads(),
        }
    }

    fn begin(&self) -> u64 {
        self.metrics.request_started();
        self.next_request.fetch_add(1, Ordering::Relaxed)
    }

    /* ---------------- map ---------------- */

    /// Apply `op` to every leaf, preserving the tree shape.
    ///
    /// Every leaf runs even if a sibling fails, so all failures are reported together.
    ///
    /// # Errors
    /// [`SketchError::LeafFailures`] listing each failed leaf, or [`SketchError::Cancelled`].
    pub fn map<S, M>(
        &self,
        dataset: &PartitionedDataset<S>,
        op: M,
    ) -> Result<PartitionedDataset<M::Output>>
    where
        S: Send + Sync + 'static,
        M: Map<S>,
    {
        self.map_with_cancel(dataset, op, &CancellationToken::new())
    }

    /// [`map`](Self::map) with a caller-owned cancellation token.
    ///
    /// # Errors
    /// As for [`map`](Self::map).
    pub fn map_with_cancel<S, M>(
        &self,
        dataset: &PartitionedDataset<S>,
        op: M,
        token: &CancellationToken,
    ) -> Result<PartitionedDataset<M::Output>>
    where
        S: Send + Sync + 'static,
        M: Map<S>,
    {
        let request = self.begin();
        let leaves = dataset.leaves();
        info!(request, leaves = leaves.len(), mode = ?self.config.mode, "map started");

        let run_leaf = |(path, leaf): &(NodePath, PartitionedDataset<S>)| {
            if token.is_cancelled() {
                self.metrics.leaf_skipped();
                return None;
            }
            self.metrics.leaf_started();
            let result = run_guarded(|| {
                let shard = leaf.shard().ok_or_else(|| anyhow!("expected a leaf at {path}"))?;
                op.apply(shard)
            });
            match &result {
                Ok(_) => self.metrics.leaf_completed(),
                Err(_) => self.metrics.leaf_failed(),
            }
            debug!(request, leaf = %path, ok = result.is_ok(), "map leaf finished");
            Some(result.map_err(|e| LeafFailure::new(path.clone(), e)))
        };

        let results: Vec<Option<Result<M::Output, LeafFailure>>> =
            match (self.config.mode, &self.pool) {
                (ExecMode::Sequential, _) => leaves.iter().map(run_leaf).collect(),
                (ExecMode::Parallel { .. }, Some(pool)) => {
                    pool.install(|| leaves.par_iter().map(run_leaf).collect())
                }
                (ExecMode::Parallel { .. }, None) => leaves.par_iter().map(run_leaf).collect(),
            };

        if token.is_cancelled() {
            self.metrics.request_cancelled();
            debug!(request, "map cancelled");
            return Err(SketchError::Cancelled);
        }

        let mut outputs = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for r in results {
            match r {
                Some(Ok(out)) => outputs.push(out),
                Some(Err(f)) => failures.push(f),
                None => return Err(SketchError::Cancelled),
            }
        }
        if !failures.is_empty() {
            return Err(SketchError::LeafFailures(failures));
        }

        self.metrics.request_finished();
        info!(request, "map complete");
        Ok(dataset.rebuild(&mut outputs.into_iter()))
    }

    /* ---------------- sketch ---------------- */

    /// Start a sketch request and return its stream of partial results.
    pub fn sketch<S, K>(&self, dataset: &PartitionedDataset<S>, op: K) -> SketchStream<K::Item>
    where
        S: Send + Sync + 'static,
        K: Sketch<S>,
    {
        self.sketch_with_cancel(dataset, op, CancellationToken::new())
    }

    /// [`sketch`](Self::sketch) with a caller-owned cancellation token.
    pub fn sketch_with_cancel<S, K>(
        &self,
        dataset: &PartitionedDataset<S>,
        op: K,
        token: CancellationToken,
    ) -> SketchStream<K::Item>
    where
        S: Send + Sync + 'static,
        K: Sketch<S>,
    {
        let request = self.begin();
        let op = Arc::new(op);
        let monoid: Arc<dyn Monoid<Item = K::Item>> = op.clone();
        let by_size = self.config.progress == ProgressWeighting::ShardSize;
        let reducer = Reducer::new(dataset, monoid, by_size);

        let leaves = dataset.leaves();
        info!(request, leaves = leaves.len(), mode = ?self.config.mode, "sketch started");
        let paths: Vec<NodePath> = leaves.iter().map(|(p, _)| p.clone()).collect();
        let jobs: Vec<(usize, LeafJob<K::Item>)> = leaves
            .into_iter()
            .enumerate()
            .map(|(index, (path, leaf))| {
                let op = Arc::clone(&op);
                let job: LeafJob<K::Item> = Box::new(move || {
                    let shard = leaf
                        .shard()
                        .ok_or_else(|| anyhow!("expected a leaf at {path}"))?;
                    op.create(shard)
                });
                (index, job)
            })
            .collect();

        let source = match self.config.mode {
            ExecMode::Sequential => LeafSource::Inline(jobs.into()),
            ExecMode::Parallel { .. } => LeafSource::Channel(self.spawn_leaves(jobs, &token)),
        };

        SketchStream::new(StreamParts {
            request,
            token,
            source,
            reducer,
            paths,
            emit_partials: self.config.emit_partials,
            tolerate_failures: self.config.tolerate_leaf_failures,
            metrics: Arc::clone(&self.metrics),
        })
    }

    fn spawn_leaves<T: Send + 'static>(
        &self,
        jobs: Vec<(usize, LeafJob<T>)>,
        token: &CancellationToken,
    ) -> mpsc::Receiver<LeafEvent<T>> {
        let (tx, rx) = mpsc::channel();
        for (index, job) in jobs {
            let tx = tx.clone();
            let token = token.clone();
            let metrics = Arc::clone(&self.metrics);
            let task = move || {
                if token.is_cancelled() {
                    metrics.leaf_skipped();
                    // The stream may already be gone; nothing to report to.
                    let _ = tx.send(LeafEvent::Skipped);
                    return;
                }
                metrics.leaf_started();
                let result = run_guarded(job);
                let _ = tx.send(LeafEvent::Done { index, result });
            };
            match &self.pool {
                Some(pool) => pool.spawn(task),
                None => rayon::spawn(task),
            }
        }
        rx
    }

    /// Run a sketch to completion and return the combined value.
    ///
    /// # Errors
    /// Leaf failures (unless tolerated) or cancellation.
    pub fn run_sketch<S, K>(&self, dataset: &PartitionedDataset<S>, op: K) -> Result<K::Item>
    where
        S: Send + Sync + 'static,
        K: Sketch<S>,
    {
        self.sketch(dataset, op).complete()
    }

    /// Run a post-processed sketch: one distributed pass, then one local transform.
    ///
    /// # Errors
    /// As for [`run_sketch`](Self::run_sketch).
    pub fn run_complete<S, Q>(&self, dataset: &PartitionedDataset<S>, sketch: Q) -> Result<Q::Output>
    where
        S: Send + Sync + 'static,
        Q: CompleteSketch<S>,
    {
        sketch.run_complete(self, dataset)
    }
}
