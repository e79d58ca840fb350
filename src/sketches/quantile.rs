//! Approximate quantiles from a mergeable uniform sample.
//!
//! Every row gets a pseudo-random priority derived from `(seed, row, value)`; a sample keeps the
//! `capacity` rows of lowest priority. The lowest-`k` of a union is the lowest-`k` of the two
//! lowest-`k` sets, so merging is exact, associative, and order independent, and the merged
//! sample is a uniform sample of the merged population.

use crate::error::{Result, SketchError};
use crate::monoid::Monoid;
use crate::ops::Sketch;
use crate::table::{Table, Value};
use crate::utils::seeded_hash;
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;

/// Uniform sample of at most `capacity` values, with the number of rows it represents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleList {
    capacity: usize,
    rows_seen: u64,
    /// `(priority, value)`, sorted ascending.
    entries: Vec<(u64, Value)>,
}

impl SampleList {
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SketchError::invalid("sample capacity must be positive"));
        }
        Ok(Self::empty(capacity))
    }

    const fn empty(capacity: usize) -> Self {
        Self {
            capacity,
            rows_seen: 0,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Non-missing rows the sample was drawn from.
    #[must_use]
    pub const fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sampled values in ascending value order.
    #[must_use]
    pub fn sorted_values(&self) -> Vec<Value> {
        let mut v: Vec<Value> = self.entries.iter().map(|(_, v)| v.clone()).collect();
        v.sort_unstable();
        v
    }

    /// Estimated `q`-quantile for `q` in `[0, 1]`; `None` for an empty sample.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn quantile(&self, q: f64) -> Option<Value> {
        let mut sorted = self.sorted_values();
        if sorted.is_empty() {
            return None;
        }
        let idx = (q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(sorted.swap_remove(idx))
    }

    /// Estimated value at population rank `rank` (0-based) out of [`rows_seen`](Self::rows_seen).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value_at_rank(&self, rank: u64) -> Option<Value> {
        if self.rows_seen == 0 {
            return None;
        }
        let q = rank.min(self.rows_seen - 1) as f64 / (self.rows_seen - 1).max(1) as f64;
        self.quantile(q)
    }

    /// Bound on the rank error, as a fraction of the population, that holds with probability
    /// `confidence` (Dvoretzky–Kiefer–Wolfowitz). Zero when the sample is the whole population.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rank_error_bound(&self, confidence: f64) -> f64 {
        let n = self.entries.len();
        if n == 0 {
            return 1.0;
        }
        if n as u64 >= self.rows_seen {
            return 0.0;
        }
        let delta = (1.0 - confidence).clamp(f64::MIN_POSITIVE, 1.0);
        ((2.0 / delta).ln() / (2.0 * n as f64)).sqrt()
    }

    /// Union keeping the `capacity` lowest priorities.
    ///
    /// # Panics
    /// When the capacities differ.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        assert_eq!(
            self.capacity, other.capacity,
            "merging samples of different capacity"
        );
        let (left, right) = (&self.entries, &other.entries);
        let mut entries = Vec::with_capacity(self.capacity.min(left.len() + right.len()));
        let (mut i, mut j) = (0, 0);
        while entries.len() < self.capacity {
            let next = match (left.get(i), right.get(j)) {
                (Some(l), Some(r)) if l <= r => {
                    i += 1;
                    l
                }
                (Some(_), Some(r)) | (None, Some(r)) => {
                    j += 1;
                    r
                }
                (Some(l), None) => {
                    i += 1;
                    l
                }
                (None, None) => break,
            };
            entries.push(next.clone());
        }
        Self {
            capacity: self.capacity,
            rows_seen: self.rows_seen + other.rows_seen,
            entries,
        }
    }
}

/// Quantile sample over one table column.
#[derive(Clone, Debug)]
pub struct SampleQuantileSketch {
    column: String,
    capacity: usize,
    seed: u64,
}

impl SampleQuantileSketch {
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `capacity == 0`.
    pub fn new(column: impl Into<String>, capacity: usize, seed: u64) -> Result<Self> {
        SampleList::new(capacity)?;
        Ok(Self {
            column: column.into(),
            capacity,
            seed,
        })
    }
}

impl Monoid for SampleQuantileSketch {
    type Item = SampleList;

    fn zero(&self) -> SampleList {
        SampleList::empty(self.capacity)
    }

    fn add(&self, left: &SampleList, right: &SampleList) -> SampleList {
        left.merge(right)
    }
}

impl Sketch<Table> for SampleQuantileSketch {
    fn create(&self, table: &Table) -> anyhow::Result<SampleList> {
        let col = table.column(&self.column)?;
        // Max-heap holding the `capacity` lowest priorities seen so far.
        let mut heap: BinaryHeap<(u64, Value)> = BinaryHeap::with_capacity(self.capacity + 1);
        let mut rows_seen = 0u64;
        for row in table.members() {
            let Some(value) = col.value(row) else {
                continue;
            };
            rows_seen += 1;
            let priority = seeded_hash(self.seed, &(row, &value));
            if heap.len() < self.capacity {
                heap.push((priority, value));
            } else if heap.peek().is_some_and(|(top, _)| priority < *top) {
                heap.pop();
                heap.push((priority, value));
            }
        }
        Ok(SampleList {
            capacity: self.capacity,
            rows_seen,
            entries: heap.into_sorted_vec(),
        })
    }
}
