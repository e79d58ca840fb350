//! Bucket descriptions and value quantization for histograms.
//!
//! A [`BucketsDescription`] maps a value to a bucket index, or to "out of range". Every
//! description is stateless and monotone: if `a <= b` and both land in buckets, then
//! `index_of(a) <= index_of(b)`. Buckets are left-closed; the last one also contains the upper
//! bound.

use crate::error::{Result, SketchError};
use crate::table::Value;

pub trait BucketsDescription: Send + Sync {
    fn bucket_count(&self) -> usize;

    /// Bucket holding `value`, or `None` when it is out of range (or of the wrong kind).
    fn index_of(&self, value: &Value) -> Option<usize>;

    /// Numeric bucket boundaries, lowest first; `None` for non-numeric descriptions.
    fn numeric_boundaries(&self) -> Option<Vec<f64>>;
}

fn check_finite(what: &str, v: f64) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(SketchError::invalid(format!("{what} must be finite, got {v}")))
    }
}

/// `count` buckets of equal width covering `[min, max]`; O(1) lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct EqualWidthBuckets {
    min: f64,
    max: f64,
    count: usize,
}

impl EqualWidthBuckets {
    /// # Errors
    /// [`SketchError::InvalidConfig`] unless `min < max` are finite and `count > 0`.
    pub fn new(min: f64, max: f64, count: usize) -> Result<Self> {
        check_finite("bucket minimum", min)?;
        check_finite("bucket maximum", max)?;
        if count == 0 {
            return Err(SketchError::invalid("bucket count must be positive"));
        }
        if min >= max {
            return Err(SketchError::invalid(format!(
                "bucket range is empty: [{min}, {max}]"
            )));
        }
        Ok(Self { min, max, count })
    }

    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.count as f64
    }
}

impl BucketsDescription for EqualWidthBuckets {
    fn bucket_count(&self) -> usize {
        self.count
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn index_of(&self, value: &Value) -> Option<usize> {
        let v = value.as_double()?;
        if !(self.min..=self.max).contains(&v) {
            return None;
        }
        if v == self.max {
            return Some(self.count - 1);
        }
        let idx = ((v - self.min) / (self.max - self.min) * self.count as f64) as usize;
        Some(idx.min(self.count - 1))
    }

    fn numeric_boundaries(&self) -> Option<Vec<f64>> {
        let w = self.width();
        Some(
            (0..=self.count)
                .map(|i| if i == self.count { self.max } else { self.min + w * i as f64 })
                .collect(),
        )
    }
}

/// Buckets between explicit, strictly increasing boundaries; O(log n) lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitBuckets {
    boundaries: Vec<f64>,
}

impl ExplicitBuckets {
    /// `boundaries.len() - 1` buckets.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] for fewer than two boundaries, non-finite ones, or ones
    /// that are not strictly increasing.
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        if boundaries.len() < 2 {
            return Err(SketchError::invalid("need at least two bucket boundaries"));
        }
        for b in &boundaries {
            check_finite("bucket boundary", *b)?;
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SketchError::invalid(
                "bucket boundaries must be strictly increasing",
            ));
        }
        Ok(Self { boundaries })
    }
}

impl BucketsDescription for ExplicitBuckets {
    fn bucket_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    fn index_of(&self, value: &Value) -> Option<usize> {
        let v = value.as_double()?;
        let (first, last) = (self.boundaries[0], self.boundaries[self.boundaries.len() - 1]);
        if !(first..=last).contains(&v) {
            return None;
        }
        let upper = self.boundaries.partition_point(|&b| b <= v);
        Some((upper - 1).min(self.bucket_count() - 1))
    }

    fn numeric_boundaries(&self) -> Option<Vec<f64>> {
        Some(self.boundaries.clone())
    }
}

/// Ordinal buckets over strings: bucket `i` holds `[boundaries[i], boundaries[i + 1])`, and the
/// last bucket holds everything from the last boundary up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringBuckets {
    boundaries: Vec<String>,
}

impl StringBuckets {
    /// # Errors
    /// [`SketchError::InvalidConfig`] when empty or not strictly increasing.
    pub fn new<I, S>(boundaries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let boundaries: Vec<String> = boundaries.into_iter().map(Into::into).collect();
        if boundaries.is_empty() {
            return Err(SketchError::invalid("need at least one string boundary"));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SketchError::invalid(
                "string boundaries must be strictly increasing",
            ));
        }
        Ok(Self { boundaries })
    }
}

impl BucketsDescription for StringBuckets {
    fn bucket_count(&self) -> usize {
        self.boundaries.len()
    }

    fn index_of(&self, value: &Value) -> Option<usize> {
        let s = value.as_str()?;
        let upper = self.boundaries.partition_point(|b| b.as_str() <= s);
        upper.checked_sub(1)
    }

    fn numeric_boundaries(&self) -> Option<Vec<f64>> {
        None
    }
}

/* ===================== quantization ===================== */

/// Rounds numeric values down onto a fixed grid `min + k * granularity` within `[min, max]`.
///
/// Used ahead of bucketing to bound the number of distinct values a histogram can observe.
/// Values outside `[min, max]` have no quantized form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnQuantization {
    granularity: f64,
    min: f64,
    max: f64,
}

const GRID_TOLERANCE: f64 = 1e-9;

impl ColumnQuantization {
    /// # Errors
    /// [`SketchError::InvalidConfig`] unless `granularity > 0`, `min < max`, and `max` lies
    /// on the grid.
    pub fn new(granularity: f64, min: f64, max: f64) -> Result<Self> {
        check_finite("granularity", granularity)?;
        check_finite("quantization minimum", min)?;
        check_finite("quantization maximum", max)?;
        if granularity <= 0.0 {
            return Err(SketchError::invalid("granularity must be positive"));
        }
        if min >= max {
            return Err(SketchError::invalid(format!(
                "quantization range is empty: [{min}, {max}]"
            )));
        }
        let q = Self {
            granularity,
            min,
            max,
        };
        if !q.on_grid(max) {
            return Err(SketchError::invalid(format!(
                "quantization maximum {max} is not a multiple of {granularity} above {min}"
            )));
        }
        Ok(q)
    }

    #[must_use]
    pub const fn granularity(&self) -> f64 {
        self.granularity
    }

    /// True when `v` is a grid point, up to floating-point noise.
    #[must_use]
    pub fn on_grid(&self, v: f64) -> bool {
        let steps = (v - self.min) / self.granularity;
        (steps - steps.round()).abs() < GRID_TOLERANCE
    }

    /// Largest grid point not above `v`, or `None` outside `[min, max]`.
    #[must_use]
    pub fn quantize(&self, v: f64) -> Option<f64> {
        if !(self.min..=self.max).contains(&v) {
            return None;
        }
        let steps = (v - self.min) / self.granularity;
        let nearest = self.min + steps.round() * self.granularity;
        if (v - nearest).abs() <= 4.0 * f64::EPSILON * v.abs().max(nearest.abs()).max(1.0) {
            // Already a grid point, up to rounding in `min + k * granularity`.
            return Some(v);
        }
        // The division may round across a grid point; the result must never exceed `v`.
        let mut point = self.min + steps.floor() * self.granularity;
        if point > v {
            point -= self.granularity;
        } else if point + self.granularity <= v {
            point += self.granularity;
        }
        Some(point.min(self.max))
    }

    /// Quantized form of a cell; strings are rejected.
    #[must_use]
    pub fn quantize_value(&self, value: &Value) -> Option<Value> {
        self.quantize(value.as_double()?).map(Value::from)
    }

    /// Check that bucketing after quantization assigns every value to the bucket of its
    /// unquantized form: the buckets must lie inside `[min, max]` and every boundary must be a
    /// grid point.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] naming the first misaligned boundary.
    pub fn check_aligned(&self, buckets: &dyn BucketsDescription) -> Result<()> {
        let Some(boundaries) = buckets.numeric_boundaries() else {
            return Err(SketchError::invalid(
                "quantization requires numeric bucket boundaries",
            ));
        };
        if let (Some(&first), Some(&last)) = (boundaries.first(), boundaries.last()) {
            if first < self.min || last > self.max {
                return Err(SketchError::invalid(format!(
                    "buckets [{first}, {last}] extend past quantization range [{}, {}]",
                    self.min, self.max
                )));
            }
        }
        match boundaries.iter().find(|&&b| !self.on_grid(b)) {
            Some(b) => Err(SketchError::invalid(format!(
                "bucket boundary {b} is not aligned with quantization granularity {}",
                self.granularity
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_width_upper_bound_is_inclusive() -> Result<()> {
        let b = EqualWidthBuckets::new(0.0, 10.0, 5)?;
        assert_eq!(b.index_of(&Value::from(0.0)), Some(0));
        assert_eq!(b.index_of(&Value::from(1.99)), Some(0));
        assert_eq!(b.index_of(&Value::from(2.0)), Some(1));
        assert_eq!(b.index_of(&Value::from(10.0)), Some(4));
        assert_eq!(b.index_of(&Value::from(10.5)), None);
        assert_eq!(b.index_of(&Value::from("x")), None);
        Ok(())
    }

    #[test]
    fn explicit_buckets_binary_search() -> Result<()> {
        let b = ExplicitBuckets::new(vec![0.0, 1.0, 10.0, 100.0])?;
        assert_eq!(b.index_of(&Value::Integer(0)), Some(0));
        assert_eq!(b.index_of(&Value::Integer(5)), Some(1));
        assert_eq!(b.index_of(&Value::Integer(10)), Some(2));
        assert_eq!(b.index_of(&Value::Integer(100)), Some(2));
        assert_eq!(b.index_of(&Value::Integer(-1)), None);
        assert!(ExplicitBuckets::new(vec![1.0, 1.0]).is_err());
        Ok(())
    }

    #[test]
    fn string_buckets() -> Result<()> {
        let b = StringBuckets::new(["b", "m"])?;
        assert_eq!(b.index_of(&Value::from("a")), None);
        assert_eq!(b.index_of(&Value::from("b")), Some(0));
        assert_eq!(b.index_of(&Value::from("lemon")), Some(0));
        assert_eq!(b.index_of(&Value::from("zebra")), Some(1));
        Ok(())
    }

    #[test]
    fn quantization_alignment() -> Result<()> {
        let q = ColumnQuantization::new(0.5, 0.0, 10.0)?;
        assert!(q.check_aligned(&EqualWidthBuckets::new(0.0, 10.0, 4)?).is_ok());
        assert!(q.check_aligned(&EqualWidthBuckets::new(0.0, 10.0, 3)?).is_err());
        assert_eq!(q.quantize(3.74), Some(3.5));
        assert_eq!(q.quantize(10.0), Some(10.0));
        assert_eq!(q.quantize(-0.1), None);
        assert_eq!(q.quantize(2.5 - 1e-10), Some(2.0));
        Ok(())
    }

    #[test]
    fn buckets_past_the_grid_are_rejected() -> Result<()> {
        let q = ColumnQuantization::new(1.0, 0.0, 5.0)?;
        assert!(q.check_aligned(&EqualWidthBuckets::new(0.0, 10.0, 2)?).is_err());
        assert!(q.check_aligned(&ExplicitBuckets::new(vec![-1.0, 0.0, 5.0])?).is_err());
        assert!(q.check_aligned(&ExplicitBuckets::new(vec![1.0, 2.0, 4.0])?).is_ok());
        Ok(())
    }

    fn assert_same_bucket_near_boundaries(
        q: &ColumnQuantization,
        buckets: &dyn BucketsDescription,
    ) -> Result<()> {
        q.check_aligned(buckets)?;
        let boundaries = buckets.numeric_boundaries().unwrap_or_default();
        for b in boundaries {
            for v in [b - 1e-6, b - 1e-10, b - 1e-14, b, b + 1e-14, b + 1e-10, b + 1e-6] {
                let direct = buckets.index_of(&Value::from(v));
                let quantized = q.quantize(v).and_then(|x| buckets.index_of(&Value::from(x)));
                assert_eq!(quantized, direct, "value {v} near boundary {b}");
                if let Some(x) = q.quantize(v) {
                    assert!(x <= v, "{x} quantized above {v}");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn quantizing_keeps_values_in_their_bucket() -> Result<()> {
        assert_same_bucket_near_boundaries(
            &ColumnQuantization::new(0.5, 0.0, 10.0)?,
            &EqualWidthBuckets::new(0.0, 10.0, 4)?,
        )?;
        assert_same_bucket_near_boundaries(
            &ColumnQuantization::new(0.1, 0.0, 1.0)?,
            &ExplicitBuckets::new(vec![0.0, 0.3, 0.7, 1.0])?,
        )?;
        assert_same_bucket_near_boundaries(
            &ColumnQuantization::new(0.25, -2.0, 2.0)?,
            &ExplicitBuckets::new(vec![-1.5, 0.0, 0.75, 2.0])?,
        )
    }
}
