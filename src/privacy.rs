//! Laplace-noise post-processors for differentially private releases.
//!
//! Noise is added once, to the fully combined result, through the
//! [`PostProcess`](crate::postprocess::PostProcess) extension point. The functions here are pure:
//! the same input, epsilon and seed always give the same noisy output. Tracking how much
//! privacy budget a caller has spent is left to the caller.

use crate::error::{Result, SketchError};
use crate::postprocess::PostProcess;
use crate::sketches::{Histogram, HyperLogLog};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

fn check_epsilon(epsilon: f64) -> Result<()> {
    if epsilon.is_finite() && epsilon > 0.0 {
        Ok(())
    } else {
        Err(SketchError::invalid(format!(
            "epsilon must be positive and finite, got {epsilon}"
        )))
    }
}

/// One draw from Laplace(0, `scale`) by inverse-CDF sampling.
fn laplace<R: Rng>(rng: &mut R, scale: f64) -> f64 {
    // u in (-0.5, 0.5]
    let u: f64 = 0.5 - rng.random::<f64>();
    -scale * u.signum() * (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE).ln()
}

/// Histogram with noisy bucket counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoisyHistogram {
    pub buckets: Vec<f64>,
    /// Laplace scale used for every bucket.
    pub scale: f64,
}

impl NoisyHistogram {
    /// Standard deviation of the noise on each bucket.
    #[must_use]
    pub fn noise_stddev(&self) -> f64 {
        std::f64::consts::SQRT_2 * self.scale
    }
}

fn check_sensitivity(sensitivity: f64) -> Result<()> {
    if sensitivity.is_finite() && sensitivity > 0.0 {
        Ok(())
    } else {
        Err(SketchError::invalid(format!(
            "sensitivity must be positive and finite, got {sensitivity}"
        )))
    }
}

#[allow(clippy::cast_precision_loss)]
fn noisy_buckets(hist: &Histogram, scale: f64, seed: u64) -> NoisyHistogram {
    let mut rng = StdRng::seed_from_u64(seed);
    NoisyHistogram {
        buckets: hist
            .buckets()
            .iter()
            .map(|&c| c as f64 + laplace(&mut rng, scale))
            .collect(),
        scale,
    }
}

/// Add Laplace noise of scale `sensitivity / epsilon` to every bucket.
///
/// # Errors
/// [`SketchError::InvalidConfig`] for a non-positive epsilon or sensitivity.
pub fn laplace_histogram(
    hist: &Histogram,
    epsilon: f64,
    sensitivity: f64,
    seed: u64,
) -> Result<NoisyHistogram> {
    check_epsilon(epsilon)?;
    check_sensitivity(sensitivity)?;
    Ok(noisy_buckets(hist, sensitivity / epsilon, seed))
}

/// A count with Laplace noise of scale `1 / epsilon`.
///
/// # Errors
/// [`SketchError::InvalidConfig`] for a non-positive epsilon.
pub fn laplace_count(count: f64, epsilon: f64, seed: u64) -> Result<f64> {
    check_epsilon(epsilon)?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(count + laplace(&mut rng, 1.0 / epsilon))
}

/// Post-processor releasing a histogram with [`laplace_histogram`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoisyHistogramPost {
    epsilon: f64,
    sensitivity: f64,
    seed: u64,
}

impl NoisyHistogramPost {
    /// # Errors
    /// [`SketchError::InvalidConfig`] for a non-positive epsilon or sensitivity.
    pub fn new(epsilon: f64, sensitivity: f64, seed: u64) -> Result<Self> {
        check_epsilon(epsilon)?;
        check_sensitivity(sensitivity)?;
        Ok(Self {
            epsilon,
            sensitivity,
            seed,
        })
    }
}

impl PostProcess<Histogram> for NoisyHistogramPost {
    type Output = NoisyHistogram;

    fn apply(&self, value: Histogram) -> NoisyHistogram {
        noisy_buckets(&value, self.sensitivity / self.epsilon, self.seed)
    }
}

/// Post-processor releasing a distinct-count estimate with [`laplace_count`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoisyDistinctCount {
    epsilon: f64,
    seed: u64,
}

impl NoisyDistinctCount {
    /// # Errors
    /// [`SketchError::InvalidConfig`] for a non-positive epsilon.
    pub fn new(epsilon: f64, seed: u64) -> Result<Self> {
        check_epsilon(epsilon)?;
        Ok(Self { epsilon, seed })
    }
}

impl PostProcess<HyperLogLog> for NoisyDistinctCount {
    type Output = f64;

    fn apply(&self, value: HyperLogLog) -> f64 {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (value.estimate() + laplace(&mut rng, 1.0 / self.epsilon)).max(0.0)
    }
}
