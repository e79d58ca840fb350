//! Local transforms applied once to a fully combined sketch result.
//!
//! A sketch's value type must stay a monoid so it can be merged through the tree. What the caller
//! wants to see often is not: a quantile read from a sample, a histogram with calibrated noise, a
//! histogram paired with its CDF. [`PostProcessed`] keeps the two apart. The distributed pass
//! combines `T`, and only the final root value goes through [`PostProcess::apply`], exactly once.
//!
//! ```
//! use ironsketch::{PartitionedDataset, Runner};
//! use ironsketch::ops::sketch_fn;
//! use ironsketch::postprocess::{PostProcessed, post_fn};
//! use ironsketch::sketches::CountMonoid;
//!
//! let ds = PartitionedDataset::from_leaves(vec![vec![1, 2, 3], vec![4, 5]], 2)?;
//! let rows = sketch_fn(CountMonoid, |s: &Vec<i32>| Ok(s.len() as u64));
//! let described = PostProcessed::new(rows, post_fn(|n: u64| format!("{n} rows")));
//! assert_eq!(Runner::sequential().run_complete(&ds, described)?, "5 rows");
//! # Ok::<_, ironsketch::SketchError>(())
//! ```

use crate::dataset::PartitionedDataset;
use crate::error::Result;
use crate::monoid::Monoid;
use crate::ops::{ConcurrentSketch, Sketch};
use crate::runner::Runner;
use std::marker::PhantomData;
use tracing::debug;

/// One-shot transform of a combined value.
pub trait PostProcess<T>: Send + Sync {
    type Output;

    fn apply(&self, value: T) -> Self::Output;
}

/// [`PostProcess`] backed by a closure; see [`post_fn`].
pub struct PostFn<T, O, F>(F, PhantomData<fn(T) -> O>);

pub fn post_fn<T, O, F>(f: F) -> PostFn<T, O, F>
where
    F: Fn(T) -> O + Send + Sync,
{
    PostFn(f, PhantomData)
}

impl<T, O, F> PostProcess<T> for PostFn<T, O, F>
where
    F: Fn(T) -> O + Send + Sync,
{
    type Output = O;

    fn apply(&self, value: T) -> O {
        (self.0)(value)
    }
}

/// A sketch that can be run to a final, caller-facing result.
pub trait CompleteSketch<S> {
    type Output;

    /// Run the distributed pass on `runner` and finish locally.
    ///
    /// # Errors
    /// Leaf failures or cancellation from the underlying sketch.
    fn run_complete(self, runner: &Runner, dataset: &PartitionedDataset<S>)
    -> Result<Self::Output>;
}

/// A sketch paired with the transform applied to its root value.
pub struct PostProcessed<K, P> {
    sketch: K,
    post: P,
}

impl<K, P> PostProcessed<K, P> {
    pub const fn new(sketch: K, post: P) -> Self {
        Self { sketch, post }
    }

    pub const fn sketch(&self) -> &K {
        &self.sketch
    }

    /// Apply the transform to a value that was already combined elsewhere, e.g. the last item
    /// of a stream the caller consumed directly.
    pub fn finish(&self, value: K::Item) -> P::Output
    where
        K: Monoid,
        P: PostProcess<K::Item>,
    {
        self.post.apply(value)
    }
}

impl<S, K, P> CompleteSketch<S> for PostProcessed<K, P>
where
    S: Send + Sync + 'static,
    K: Sketch<S>,
    P: PostProcess<K::Item>,
{
    type Output = P::Output;

    fn run_complete(self, runner: &Runner, dataset: &PartitionedDataset<S>) -> Result<P::Output> {
        let Self { sketch, post } = self;
        let value = runner.run_sketch(dataset, sketch)?;
        debug!("post-processing combined result");
        Ok(post.apply(value))
    }
}

/// Two sketches sharing one distributed pass, post-processed jointly.
///
/// ```
/// use ironsketch::{PartitionedDataset, Runner};
/// use ironsketch::ops::{ConcurrentSketch, sketch_fn};
/// use ironsketch::postprocess::{ConcurrentPostProcessed, post_fn};
/// use ironsketch::sketches::{CountMonoid, SumMonoid};
///
/// let ds = PartitionedDataset::from_leaves(vec![vec![1.0, 2.0], vec![6.0]], 2)?;
/// let both = ConcurrentSketch::new(
///     sketch_fn(CountMonoid, |s: &Vec<f64>| Ok(s.len() as u64)),
///     sketch_fn(SumMonoid, |s: &Vec<f64>| Ok(s.iter().sum::<f64>())),
/// );
/// let mean = ConcurrentPostProcessed::new(both, post_fn(|(n, sum): (u64, f64)| sum / n as f64));
/// assert_eq!(Runner::sequential().run_complete(&ds, mean)?, 3.0);
/// # Ok::<_, ironsketch::SketchError>(())
/// ```
pub struct ConcurrentPostProcessed<A, B, P> {
    inner: PostProcessed<ConcurrentSketch<A, B>, P>,
}

impl<A, B, P> ConcurrentPostProcessed<A, B, P> {
    pub const fn new(sketch: ConcurrentSketch<A, B>, post: P) -> Self {
        Self {
            inner: PostProcessed::new(sketch, post),
        }
    }

    pub const fn sketch(&self) -> &ConcurrentSketch<A, B> {
        self.inner.sketch()
    }
}

impl<S, A, B, P> CompleteSketch<S> for ConcurrentPostProcessed<A, B, P>
where
    S: Send + Sync + 'static,
    A: Sketch<S>,
    B: Sketch<S>,
    P: PostProcess<(A::Item, B::Item)>,
{
    type Output = P::Output;

    fn run_complete(self, runner: &Runner, dataset: &PartitionedDataset<S>) -> Result<P::Output> {
        self.inner.run_complete(runner, dataset)
    }
}
