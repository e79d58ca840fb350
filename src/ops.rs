//! Operator traits applied independently at every leaf.
//!
//! - [`Map`] turns one shard into a new shard; the dataset keeps its shape.
//! - [`Sketch`] reduces one shard to a monoid value; values are merged bottom-up.
//!
//! Both receive the shard by shared reference. A shard may be read by any number of concurrent
//! requests, so operators never mutate it.
//!
//! Closure adapters ([`map_fn`], [`sketch_fn`]) lift one-off closures into operators
//! without a named type.

use crate::monoid::{Monoid, PairMonoid};
use std::marker::PhantomData;

/// Per-leaf transform `S -> Output`.
pub trait Map<S>: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn apply(&self, shard: &S) -> anyhow::Result<Self::Output>;
}

/// Per-leaf reduction to a monoid value.
pub trait Sketch<S>: Monoid + 'static {
    fn create(&self, shard: &S) -> anyhow::Result<Self::Item>;
}

impl<S, K: Sketch<S> + ?Sized> Sketch<S> for std::sync::Arc<K> {
    fn create(&self, shard: &S) -> anyhow::Result<Self::Item> {
        (**self).create(shard)
    }
}

/* ===================== closure adapters ===================== */

/// [`Map`] backed by a closure; see [`map_fn`].
pub struct MapFn<S, O, F>(F, PhantomData<fn(&S) -> O>);

/// Build a [`Map`] from a fallible closure.
pub fn map_fn<S, O, F>(f: F) -> MapFn<S, O, F>
where
    S: 'static,
    O: Send + Sync + 'static,
    F: Fn(&S) -> anyhow::Result<O> + Send + Sync + 'static,
{
    MapFn(f, PhantomData)
}

impl<S, O, F> Map<S> for MapFn<S, O, F>
where
    S: 'static,
    O: Send + Sync + 'static,
    F: Fn(&S) -> anyhow::Result<O> + Send + Sync + 'static,
{
    type Output = O;

    fn apply(&self, shard: &S) -> anyhow::Result<O> {
        (self.0)(shard)
    }
}

/// [`Sketch`] made of an existing monoid and a per-shard closure; see [`sketch_fn`].
pub struct FnSketch<S, M, F> {
    monoid: M,
    create: F,
    _s: PhantomData<fn(&S)>,
}

/// Build a [`Sketch`] from a monoid and a fallible `create` closure.
pub fn sketch_fn<S, M, F>(monoid: M, create: F) -> FnSketch<S, M, F>
where
    S: 'static,
    M: Monoid + 'static,
    F: Fn(&S) -> anyhow::Result<M::Item> + Send + Sync + 'static,
{
    FnSketch {
        monoid,
        create,
        _s: PhantomData,
    }
}

impl<S, M: Monoid, F: Send + Sync> Monoid for FnSketch<S, M, F> {
    type Item = M::Item;

    fn zero(&self) -> M::Item {
        self.monoid.zero()
    }

    fn add(&self, left: &M::Item, right: &M::Item) -> M::Item {
        self.monoid.add(left, right)
    }
}

impl<S, M, F> Sketch<S> for FnSketch<S, M, F>
where
    S: 'static,
    M: Monoid + 'static,
    F: Fn(&S) -> anyhow::Result<M::Item> + Send + Sync + 'static,
{
    fn create(&self, shard: &S) -> anyhow::Result<M::Item> {
        (self.create)(shard)
    }
}

/* ===================== IdentityMap ===================== */

/// The identity map: every leaf is cloned unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityMap;

impl<S: Clone + Send + Sync + 'static> Map<S> for IdentityMap {
    type Output = S;

    fn apply(&self, shard: &S) -> anyhow::Result<S> {
        Ok(shard.clone())
    }
}

/* ===================== PrecomputedSketch ===================== */

/// Looks like a sketch but never reads the shard: `create` returns a fixed value, while
/// `zero`/`add` delegate to another monoid.
///
/// Useful for answering a request whose result is already known through the same streaming
/// path as any other sketch.
#[derive(Clone, Debug)]
pub struct PrecomputedSketch<M: Monoid> {
    value: M::Item,
    delegate: M,
}

impl<M: Monoid> PrecomputedSketch<M> {
    pub const fn new(value: M::Item, delegate: M) -> Self {
        Self { value, delegate }
    }
}

impl<M: Monoid> Monoid for PrecomputedSketch<M>
where
    M::Item: Sync,
{
    type Item = M::Item;

    fn zero(&self) -> M::Item {
        self.delegate.zero()
    }

    fn add(&self, left: &M::Item, right: &M::Item) -> M::Item {
        self.delegate.add(left, right)
    }
}

impl<S, M: Monoid + 'static> Sketch<S> for PrecomputedSketch<M>
where
    M::Item: Sync,
{
    fn create(&self, _shard: &S) -> anyhow::Result<M::Item> {
        Ok(self.value.clone())
    }
}

/* ===================== ConcurrentSketch ===================== */

/// Two sketches evaluated in the same distributed pass.
///
/// Each leaf runs both `create`s; the pair is combined component-wise. Use with
/// [`crate::postprocess::ConcurrentPostProcessed`] to post-process both results jointly.
#[derive(Clone, Debug)]
pub struct ConcurrentSketch<A, B> {
    pair: PairMonoid<A, B>,
}

impl<A, B> ConcurrentSketch<A, B> {
    pub const fn new(first: A, second: B) -> Self {
        Self {
            pair: PairMonoid { first, second },
        }
    }

    pub const fn first(&self) -> &A {
        &self.pair.first
    }

    pub const fn second(&self) -> &B {
        &self.pair.second
    }
}

impl<A: Monoid, B: Monoid> Monoid for ConcurrentSketch<A, B> {
    type Item = (A::Item, B::Item);

    fn zero(&self) -> Self::Item {
        self.pair.zero()
    }

    fn add(&self, left: &Self::Item, right: &Self::Item) -> Self::Item {
        self.pair.add(left, right)
    }
}

impl<S, A: Sketch<S>, B: Sketch<S>> Sketch<S> for ConcurrentSketch<A, B> {
    fn create(&self, shard: &S) -> anyhow::Result<Self::Item> {
        Ok((self.pair.first.create(shard)?, self.pair.second.create(shard)?))
    }
}
