//! HyperLogLog distinct-count estimation.
//!
//! Each value is hashed once with a fixed seed. The low `log2m` bits of the hash select a
//! register; the register keeps the longest run of leading zeros (plus one) seen in the
//! remaining bits. Registers merge by element-wise maximum, so the combined sketch is exactly
//! the sketch of the union.
//!
//! The standard error of the estimate is `1.04 / sqrt(m)`, about 3.25% for `m = 1024`.

use crate::error::{Result, SketchError};
use crate::monoid::Monoid;
use crate::ops::Sketch;
use crate::table::Table;
use crate::utils::seeded_hash;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

pub const MIN_LOG2M: u8 = 4;
pub const MAX_LOG2M: u8 = 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperLogLog {
    log2m: u8,
    seed: u64,
    registers: Vec<u8>,
}

impl HyperLogLog {
    /// Empty sketch with `2^log2m` registers.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] unless `log2m` is within `4..=16`.
    pub fn new(log2m: u8, seed: u64) -> Result<Self> {
        if !(MIN_LOG2M..=MAX_LOG2M).contains(&log2m) {
            return Err(SketchError::invalid(format!(
                "log2m must be in {MIN_LOG2M}..={MAX_LOG2M}, got {log2m}"
            )));
        }
        Ok(Self::empty(log2m, seed))
    }

    fn empty(log2m: u8, seed: u64) -> Self {
        Self {
            log2m,
            seed,
            registers: vec![0; 1 << log2m],
        }
    }

    /// Number of registers `m`.
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    #[must_use]
    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Standard error of [`estimate`](Self::estimate), relative to the true count.
    #[must_use]
    pub fn relative_error(&self) -> f64 {
        1.04 / (self.register_count() as f64).sqrt()
    }

    pub fn insert<T: Hash + ?Sized>(&mut self, value: &T) {
        self.insert_hash(seeded_hash(self.seed, value));
    }

    #[allow(clippy::cast_possible_truncation)]
    fn insert_hash(&mut self, hash: u64) {
        let m = self.registers.len() as u64;
        let slot = (hash & (m - 1)) as usize;
        let rest = hash >> self.log2m;
        // `rest` has at least `log2m` leading zeros by construction.
        let rho = (rest.leading_zeros() - u32::from(self.log2m) + 1) as u8;
        if rho > self.registers[slot] {
            self.registers[slot] = rho;
        }
    }

    /// Bias-corrected harmonic-mean estimate, with linear counting for small cardinalities.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let alpha = match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };
        let sum: f64 = self
            .registers
            .iter()
            .map(|&r| 2f64.powi(-i32::from(r)))
            .sum();
        let raw = alpha * m * m / sum;
        let zeros = self.registers.iter().filter(|&&r| r == 0).count();
        if raw <= 2.5 * m && zeros > 0 {
            m * (m / zeros as f64).ln()
        } else {
            raw
        }
    }

    /// Register-wise maximum.
    ///
    /// # Panics
    /// When register counts or seeds differ.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        assert_eq!(
            self.registers.len(),
            other.registers.len(),
            "merging HyperLogLog sketches with different register counts"
        );
        assert_eq!(
            self.seed, other.seed,
            "merging HyperLogLog sketches with different hash seeds"
        );
        Self {
            log2m: self.log2m,
            seed: self.seed,
            registers: self
                .registers
                .iter()
                .zip(&other.registers)
                .map(|(a, b)| *a.max(b))
                .collect(),
        }
    }
}

/// Distinct-count sketch over one table column; missing cells are ignored.
#[derive(Clone, Debug)]
pub struct HllSketch {
    column: String,
    log2m: u8,
    seed: u64,
}

impl HllSketch {
    /// # Errors
    /// [`SketchError::InvalidConfig`] for an unsupported `log2m`.
    pub fn new(column: impl Into<String>, log2m: u8, seed: u64) -> Result<Self> {
        HyperLogLog::new(log2m, seed)?;
        Ok(Self {
            column: column.into(),
            log2m,
            seed,
        })
    }
}

impl Monoid for HllSketch {
    type Item = HyperLogLog;

    fn zero(&self) -> HyperLogLog {
        HyperLogLog::empty(self.log2m, self.seed)
    }

    fn add(&self, left: &HyperLogLog, right: &HyperLogLog) -> HyperLogLog {
        left.merge(right)
    }
}

impl Sketch<Table> for HllSketch {
    fn create(&self, table: &Table) -> anyhow::Result<HyperLogLog> {
        let col = table.column(&self.column)?;
        let mut hll = self.zero();
        for row in table.members() {
            if let Some(v) = col.value(row) {
                hll.insert(&v);
            }
        }
        Ok(hll)
    }
}
