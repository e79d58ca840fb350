//! Mergeable bounded-memory summaries.
//!
//! Each summary is a commutative [`Monoid`] over its own result type, plus a [`Sketch`] over
//! [`Table`](crate::table::Table) shards that builds that result from one leaf:
//!
//! | Sketch | Result | Combine |
//! |---|---|---|
//! | [`TopKSketch`] | [`BoundedTopK`] | k-way merge, truncated to K |
//! | [`HistogramSketch`] | [`Histogram`] | element-wise sum |
//! | [`HeatmapSketch`] | [`Heatmap`] | element-wise sum |
//! | [`HllSketch`] | [`HyperLogLog`] | register-wise max |
//! | [`SampleQuantileSketch`] | [`SampleList`] | union, keep lowest priorities |
//! | [`RangeSketch`] | [`DataRange`] | min / max / sum |
//!
//! Merging results built with different parameters is a programming error and panics.
//!
//! [`Sketch`]: crate::ops::Sketch

mod heatmap;
mod histogram;
mod hll;
mod quantile;
mod range;
mod topk;

pub use heatmap::{Heatmap, HeatmapSketch};
pub use histogram::{Histogram, HistogramSketch};
pub use hll::{HllSketch, HyperLogLog};
pub use quantile::{SampleList, SampleQuantileSketch};
pub use range::{DataRange, RangeSketch};
pub use topk::{Ascending, BoundedTopK, Descending, KeyOrder, OrderBy, TopKMonoid, TopKSketch};

use crate::monoid::Monoid;

/// Sum of counts.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountMonoid;

impl Monoid for CountMonoid {
    type Item = u64;

    fn zero(&self) -> u64 {
        0
    }

    fn add(&self, left: &u64, right: &u64) -> u64 {
        left + right
    }
}

/// Sum of floating-point values. Associative only up to rounding.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumMonoid;

impl Monoid for SumMonoid {
    type Item = f64;

    fn zero(&self) -> f64 {
        0.0
    }

    fn add(&self, left: &f64, right: &f64) -> f64 {
        left + right
    }
}
