//! Minimum, maximum and presence counts of a numeric column; used to pick bucket boundaries.

use crate::monoid::Monoid;
use crate::ops::Sketch;
use crate::table::Table;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRange {
    /// `None` until a present value is seen.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub present: u64,
    pub missing: u64,
}

fn pick(a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(f(x, y)),
        (x, None) => x,
        (None, y) => y,
    }
}

impl DataRange {
    pub fn observe(&mut self, value: Option<f64>) {
        match value {
            Some(v) => {
                self.present += 1;
                self.min = pick(self.min, Some(v), f64::min);
                self.max = pick(self.max, Some(v), f64::max);
            }
            None => self.missing += 1,
        }
    }

    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: pick(self.min, other.min, f64::min),
            max: pick(self.max, other.max, f64::max),
            present: self.present + other.present,
            missing: self.missing + other.missing,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RangeSketch {
    column: String,
}

impl RangeSketch {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Monoid for RangeSketch {
    type Item = DataRange;

    fn zero(&self) -> DataRange {
        DataRange::default()
    }

    fn add(&self, left: &DataRange, right: &DataRange) -> DataRange {
        left.merge(right)
    }
}

impl Sketch<Table> for RangeSketch {
    fn create(&self, table: &Table) -> anyhow::Result<DataRange> {
        let col = table.column(&self.column)?;
        if !col.is_numeric() {
            anyhow::bail!("range of non-numeric column {:?}", self.column);
        }
        let mut range = DataRange::default();
        for row in table.members() {
            range.observe(col.as_double(row));
        }
        Ok(range)
    }
}
