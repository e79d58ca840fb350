//! Row-selection and projection maps over [`Table`] shards.
//!
//! None of these copy column data; they return tables with a new membership set or a narrower
//! column list.

use crate::error::{Result, SketchError};
use crate::ops::Map;
use crate::table::Table;

#[derive(Clone, Debug, PartialEq)]
struct RangeFilter {
    column: String,
    min: f64,
    max: f64,
}

/// Keeps rows whose numeric value lies in `[min, max]`; missing cells are dropped.
///
/// A second range on another column can be added with [`and_range`](Self::and_range), for
/// zooming into a heatmap.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterMap {
    ranges: Vec<RangeFilter>,
}

fn range_filter(column: String, min: f64, max: f64) -> Result<RangeFilter> {
    if min.is_nan() || max.is_nan() || min > max {
        return Err(SketchError::invalid(format!(
            "filter range on {column:?} is empty: [{min}, {max}]"
        )));
    }
    Ok(RangeFilter { column, min, max })
}

impl FilterMap {
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `min > max` or either bound is NaN.
    pub fn range(column: impl Into<String>, min: f64, max: f64) -> Result<Self> {
        Ok(Self {
            ranges: vec![range_filter(column.into(), min, max)?],
        })
    }

    /// # Errors
    /// As for [`range`](Self::range).
    pub fn and_range(mut self, column: impl Into<String>, min: f64, max: f64) -> Result<Self> {
        self.ranges.push(range_filter(column.into(), min, max)?);
        Ok(self)
    }
}

impl Map<Table> for FilterMap {
    type Output = Table;

    fn apply(&self, table: &Table) -> anyhow::Result<Table> {
        let columns = self
            .ranges
            .iter()
            .map(|r| table.column(&r.column).map(|c| (c, r)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let members = table.members().filter(|row| {
            columns.iter().all(|(col, r)| {
                col.as_double(row)
                    .is_some_and(|v| (r.min..=r.max).contains(&v))
            })
        });
        Ok(table.with_members(members))
    }
}

/// Keeps only the named columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectMap {
    columns: Vec<String>,
}

impl ProjectMap {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Map<Table> for ProjectMap {
    type Output = Table;

    fn apply(&self, table: &Table) -> anyhow::Result<Table> {
        table.project(&self.columns)
    }
}

/// Bernoulli row sample at a fixed rate.
///
/// Each shard is sampled with `seed` mixed with its first row index, so shards of one table
/// draw independent samples while the whole map stays deterministic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleMap {
    rate: f64,
    seed: u64,
}

impl SampleMap {
    /// # Errors
    /// [`SketchError::InvalidConfig`] unless `0 < rate <= 1`.
    pub fn new(rate: f64, seed: u64) -> Result<Self> {
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(SketchError::invalid(format!(
                "sampling rate must be in (0, 1], got {rate}"
            )));
        }
        Ok(Self { rate, seed })
    }
}

impl Map<Table> for SampleMap {
    type Output = Table;

    fn apply(&self, table: &Table) -> anyhow::Result<Table> {
        let first = table.members().first().unwrap_or(0) as u64;
        Ok(table.with_members(table.members().sample(self.rate, self.seed ^ first)))
    }
}
