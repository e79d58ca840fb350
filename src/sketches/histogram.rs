//! One-dimensional fixed-bucket histograms.

use crate::buckets::{BucketsDescription, ColumnQuantization};
use crate::error::{Result, SketchError};
use crate::monoid::Monoid;
use crate::ops::Sketch;
use crate::table::Table;
use serde::{Deserialize, Serialize};

/// Per-bucket counts plus rows that were missing or fell outside every bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    buckets: Vec<u64>,
    missing: u64,
    out_of_range: u64,
}

impl Histogram {
    #[must_use]
    pub fn zeros(bucket_count: usize) -> Self {
        Self {
            buckets: vec![0; bucket_count],
            missing: 0,
            out_of_range: 0,
        }
    }

    #[must_use]
    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub const fn missing(&self) -> u64 {
        self.missing
    }

    #[must_use]
    pub const fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// Every row accounted for: buckets, missing, and out of range.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.buckets.iter().sum::<u64>() + self.missing + self.out_of_range
    }

    /// Running totals over the buckets; the last entry counts every in-range row.
    #[must_use]
    pub fn cdf(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .scan(0u64, |acc, &c| {
                *acc += c;
                Some(*acc)
            })
            .collect()
    }

    /// Element-wise sum.
    ///
    /// # Panics
    /// When the bucket counts differ.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        assert_eq!(
            self.buckets.len(),
            other.buckets.len(),
            "merging histograms with different bucket counts"
        );
        Self {
            buckets: self
                .buckets
                .iter()
                .zip(&other.buckets)
                .map(|(a, b)| a + b)
                .collect(),
            missing: self.missing + other.missing,
            out_of_range: self.out_of_range + other.out_of_range,
        }
    }

    pub(crate) fn record(&mut self, bucket: Option<usize>) {
        match bucket {
            Some(i) => self.buckets[i] += 1,
            None => self.out_of_range += 1,
        }
    }

    pub(crate) fn record_missing(&mut self) {
        self.missing += 1;
    }
}

/// Histogram of one table column over a fixed [`BucketsDescription`].
///
/// Optionally quantizes values before bucketing, and optionally samples rows at a fixed rate.
/// Sampled histograms count only the sampled rows; scale by `1 / rate` to estimate totals.
pub struct HistogramSketch<B> {
    column: String,
    buckets: B,
    quantization: Option<ColumnQuantization>,
    rate: f64,
    seed: u64,
}

impl<B: BucketsDescription> HistogramSketch<B> {
    pub fn new(column: impl Into<String>, buckets: B) -> Self {
        Self {
            column: column.into(),
            buckets,
            quantization: None,
            rate: 1.0,
            seed: 0,
        }
    }

    /// Quantize values before bucketing.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] when a bucket boundary is not a grid point of `q` or the
    /// buckets extend past the range of `q`, since quantizing could then move a value into a
    /// different bucket.
    pub fn with_quantization(mut self, q: ColumnQuantization) -> Result<Self> {
        q.check_aligned(&self.buckets)?;
        self.quantization = Some(q);
        Ok(self)
    }

    /// Count a Bernoulli sample of the rows.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] unless `0 < rate <= 1`.
    pub fn sampled(mut self, rate: f64, seed: u64) -> Result<Self> {
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(SketchError::invalid(format!(
                "sampling rate must be in (0, 1], got {rate}"
            )));
        }
        self.rate = rate;
        self.seed = seed;
        Ok(self)
    }

    pub const fn buckets(&self) -> &B {
        &self.buckets
    }

    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }
}

impl<B: BucketsDescription> Monoid for HistogramSketch<B> {
    type Item = Histogram;

    fn zero(&self) -> Histogram {
        Histogram::zeros(self.buckets.bucket_count())
    }

    fn add(&self, left: &Histogram, right: &Histogram) -> Histogram {
        left.merge(right)
    }
}

impl<B: BucketsDescription + 'static> Sketch<Table> for HistogramSketch<B> {
    fn create(&self, table: &Table) -> anyhow::Result<Histogram> {
        let col = table.column(&self.column)?;
        if self.quantization.is_some() && !col.is_numeric() {
            anyhow::bail!("column {:?} is not numeric and cannot be quantized", self.column);
        }
        let members = table
            .members()
            .sample(self.rate, self.seed ^ table.members().first().unwrap_or(0) as u64);
        let mut hist = self.zero();
        for row in &members {
            let Some(value) = col.value(row) else {
                hist.record_missing();
                continue;
            };
            let bucket = match &self.quantization {
                Some(q) => q
                    .quantize_value(&value)
                    .and_then(|v| self.buckets.index_of(&v)),
                None => self.buckets.index_of(&value),
            };
            hist.record(bucket);
        }
        Ok(hist)
    }
}
