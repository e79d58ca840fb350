//! Two-dimensional histograms over a pair of columns.

use crate::buckets::BucketsDescription;
use crate::monoid::Monoid;
use crate::ops::Sketch;
use crate::table::Table;
use serde::{Deserialize, Serialize};

/// Row-major grid of counts: cell `(x, y)` is at `x * y_count + y`.
///
/// A row missing either coordinate counts as missing; otherwise a row with either coordinate
/// outside its buckets counts as out of range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heatmap {
    x_count: usize,
    y_count: usize,
    cells: Vec<u64>,
    missing: u64,
    out_of_range: u64,
}

impl Heatmap {
    #[must_use]
    pub fn zeros(x_count: usize, y_count: usize) -> Self {
        Self {
            x_count,
            y_count,
            cells: vec![0; x_count * y_count],
            missing: 0,
            out_of_range: 0,
        }
    }

    #[must_use]
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.x_count, self.y_count)
    }

    /// Count in cell `(x, y)`; zero outside the grid.
    #[must_use]
    pub fn count(&self, x: usize, y: usize) -> u64 {
        if x >= self.x_count || y >= self.y_count {
            return 0;
        }
        self.cells[x * self.y_count + y]
    }

    #[must_use]
    pub const fn missing(&self) -> u64 {
        self.missing
    }

    #[must_use]
    pub const fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.cells.iter().sum::<u64>() + self.missing + self.out_of_range
    }

    /// Per-x totals: the histogram of the x column restricted to rows inside the grid.
    #[must_use]
    pub fn x_marginal(&self) -> Vec<u64> {
        self.cells
            .chunks(self.y_count.max(1))
            .map(|row| row.iter().sum())
            .collect()
    }

    /// # Panics
    /// When the dimensions differ.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "merging heatmaps with different dimensions"
        );
        Self {
            x_count: self.x_count,
            y_count: self.y_count,
            cells: self
                .cells
                .iter()
                .zip(&other.cells)
                .map(|(a, b)| a + b)
                .collect(),
            missing: self.missing + other.missing,
            out_of_range: self.out_of_range + other.out_of_range,
        }
    }
}

pub struct HeatmapSketch<X, Y> {
    x_column: String,
    y_column: String,
    x_buckets: X,
    y_buckets: Y,
}

impl<X: BucketsDescription, Y: BucketsDescription> HeatmapSketch<X, Y> {
    pub fn new(
        x_column: impl Into<String>,
        x_buckets: X,
        y_column: impl Into<String>,
        y_buckets: Y,
    ) -> Self {
        Self {
            x_column: x_column.into(),
            y_column: y_column.into(),
            x_buckets,
            y_buckets,
        }
    }
}

impl<X: BucketsDescription, Y: BucketsDescription> Monoid for HeatmapSketch<X, Y> {
    type Item = Heatmap;

    fn zero(&self) -> Heatmap {
        Heatmap::zeros(self.x_buckets.bucket_count(), self.y_buckets.bucket_count())
    }

    fn add(&self, left: &Heatmap, right: &Heatmap) -> Heatmap {
        left.merge(right)
    }
}

impl<X, Y> Sketch<Table> for HeatmapSketch<X, Y>
where
    X: BucketsDescription + 'static,
    Y: BucketsDescription + 'static,
{
    fn create(&self, table: &Table) -> anyhow::Result<Heatmap> {
        let xs = table.column(&self.x_column)?;
        let ys = table.column(&self.y_column)?;
        let mut map = self.zero();
        for row in table.members() {
            let (Some(x), Some(y)) = (xs.value(row), ys.value(row)) else {
                map.missing += 1;
                continue;
            };
            match (self.x_buckets.index_of(&x), self.y_buckets.index_of(&y)) {
                (Some(i), Some(j)) => map.cells[i * map.y_count + j] += 1,
                _ => map.out_of_range += 1,
            }
        }
        Ok(map)
    }
}
