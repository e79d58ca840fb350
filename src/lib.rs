//! # Ironsketch
//!
//! A **distributed sketch/map engine** over partitioned datasets. Data lives in a tree of
//! shards; every question about it is answered by running a small operator independently at
//! each leaf and merging the per-leaf answers bottom-up through a [`Monoid`](monoid::Monoid).
//!
//! ## Key Features
//!
//! - **Two primitives**: [`map`](Runner::map) transforms every shard and keeps the tree shape;
//!   [`sketch`](Runner::sketch) reduces every shard to a mergeable summary
//! - **Streaming partial results**: a [`SketchStream`] yields up-to-date combined values with a
//!   non-decreasing progress fraction
//! - **Cancellation** that stops leaf work for one request without touching others
//! - **Failure attribution**: failed leaves are reported with their [`NodePath`]
//! - **Bounded-memory summaries**: top-K, histograms, heatmaps, HyperLogLog, quantile samples
//! - **Post-processing** applied exactly once to the final result, e.g. differential-privacy noise
//! - **Sequential and parallel execution** on Rayon, with identical results
//!
//! ## Quick Start
//!
//! ```
//! use ironsketch::{PartitionedDataset, Runner};
//! use ironsketch::buckets::EqualWidthBuckets;
//! use ironsketch::sketches::HistogramSketch;
//! use ironsketch::testing::uniform_table;
//!
//! # fn main() -> anyhow::Result<()> {
//! let table = uniform_table(10_000, 42)?;
//! let ds = PartitionedDataset::from_tables(table.split(8), 4)?;
//!
//! let runner = Runner::default();
//! let hist = runner.run_sketch(&ds, HistogramSketch::new("x", EqualWidthBuckets::new(0.0, 1.0, 10)?))?;
//! assert_eq!(hist.total(), 10_000);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Partitioned Dataset
//!
//! A [`PartitionedDataset<S>`] is an immutable, cheaply cloned tree: leaves hold shards of type
//! `S`, internal nodes concatenate their children. Any number of requests may share one handle.
//!
//! ### Operators
//!
//! - [`Map<S>`](ops::Map): `&S -> anyhow::Result<Output>`, applied once per leaf
//! - [`Sketch<S>`](ops::Sketch): a monoid plus `create(&S)`, merged through the tree
//! - [`PostProcessed`](postprocess::PostProcessed): a sketch plus a local, one-shot transform
//!
//! Closures can be lifted with [`map_fn`](ops::map_fn), [`sketch_fn`](ops::sketch_fn) and
//! [`post_fn`](postprocess::post_fn).
//!
//! ### Streams
//!
//! [`Runner::sketch`] returns a [`SketchStream`], an iterator of
//! `Result<PartialResult<T>, SketchError>`. Every item is a cumulative snapshot; the last one
//! has `done == 1.0`. Drop the stream or call [`SketchStream::cancel`] to stop the request.
//!
//! ```
//! use ironsketch::{PartitionedDataset, Runner};
//! use ironsketch::ops::sketch_fn;
//! use ironsketch::sketches::CountMonoid;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ds = PartitionedDataset::from_leaves(vec![vec![1, 2], vec![3], vec![4, 5, 6]], 2)?;
//! let runner = Runner::sequential();
//! let mut last = 0.0;
//! for partial in runner.sketch(&ds, sketch_fn(CountMonoid, |s: &Vec<i32>| Ok(s.len() as u64))) {
//!     let partial = partial?;
//!     assert!(partial.done >= last);
//!     last = partial.done;
//! }
//! assert_eq!(last, 1.0);
//! # Ok(())
//! # }
//! ```
//!
//! ### Execution Modes
//!
//! [`EngineConfig`] selects sequential or parallel execution, progress weighting, and whether
//! leaf failures abort the request or are tolerated. It can be loaded from JSON.
//!
//! ## Module Overview
//!
//! - [`dataset`] - the partitioned dataset tree and node paths
//! - [`monoid`] - the combination algebra and partial results
//! - [`ops`] - map and sketch operator traits and adapters
//! - [`postprocess`] - one-shot transforms of combined results
//! - [`runner`] / [`stream`] - execution, streaming, cancellation
//! - [`table`] - columnar shards with membership sets
//! - [`maps`] - filter, projection, and sampling maps over tables
//! - [`buckets`] - bucket descriptions and quantization
//! - [`sketches`] - the summary algorithms
//! - [`privacy`] - Laplace-noise post-processors
//! - [`config`], [`error`], [`metrics`] - configuration, errors, counters
//! - [`testing`] - assertions and fixtures for tests

pub mod buckets;
pub mod config;
pub mod dataset;
pub mod error;
pub mod maps;
pub mod metrics;
pub mod monoid;
pub mod ops;
pub mod postprocess;
pub mod privacy;
pub mod runner;
pub mod sketches;
pub mod stream;
pub mod table;
pub mod testing;
pub mod utils;

// General re-exports
pub use config::{EngineConfig, ExecMode, ProgressWeighting};
pub use dataset::{NodePath, PartitionedDataset};
pub use error::{LeafFailure, Result, SketchError};
pub use monoid::{Monoid, PartialResult};
pub use ops::{Map, Sketch};
pub use runner::Runner;
pub use stream::{CancellationToken, SketchStream};
