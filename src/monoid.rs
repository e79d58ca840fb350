//! The combination algebra shared by every sketch.
//!
//! A [`Monoid`] is an identity value plus an associative `add`. Every summary in
//! [`crate::sketches`] is additionally *commutative*, because sibling partial results arrive in
//! an unspecified order.
//!
//! [`PartialResult`] pairs a progress fraction with a monoid value. It is itself a monoid
//! ([`PartialResultMonoid`]), which lets progress and payload travel through the same tree
//! reduction.
//!
//! `add` borrows both inputs and returns a fresh value: a result that has already been handed
//! to a caller is never mutated by a later merge.

use serde::{Deserialize, Serialize};

/// Identity element plus an associative combine.
///
/// Implementations must satisfy, for every reachable `a`, `b`, `c`:
/// - `add(zero(), a) == a == add(a, zero())`
/// - `add(add(a, b), c) == add(a, add(b, c))`
pub trait Monoid: Send + Sync {
    type Item: Clone + Send + 'static;

    fn zero(&self) -> Self::Item;

    fn add(&self, left: &Self::Item, right: &Self::Item) -> Self::Item;

    /// Left-to-right fold of `items`, starting from `zero()`.
    fn fold<'a, I>(&self, items: I) -> Self::Item
    where
        Self: Sized,
        I: IntoIterator<Item = &'a Self::Item>,
        Self::Item: 'a,
    {
        items
            .into_iter()
            .fold(self.zero(), |acc, item| self.add(&acc, item))
    }
}

impl<M: Monoid + ?Sized> Monoid for std::sync::Arc<M> {
    type Item = M::Item;

    fn zero(&self) -> Self::Item {
        (**self).zero()
    }

    fn add(&self, left: &Self::Item, right: &Self::Item) -> Self::Item {
        (**self).add(left, right)
    }
}

/// Progress fraction plus the value combined so far.
///
/// Leaves emit `PartialResult { done: share, value }` where `share` is that leaf's fraction of
/// the total work. Adding partial results adds both fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartialResult<T> {
    /// Fraction of the total work covered by `value`, in `[0, 1]`.
    pub done: f64,
    pub value: T,
}

impl<T> PartialResult<T> {
    #[must_use]
    pub const fn new(done: f64, value: T) -> Self {
        Self { done, value }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.done >= 1.0
    }

    pub fn map<R>(self, f: impl FnOnce(T) -> R) -> PartialResult<R> {
        PartialResult {
            done: self.done,
            value: f(self.value),
        }
    }
}

/// Lifts a value monoid to a monoid over [`PartialResult`]s.
#[derive(Clone, Debug)]
pub struct PartialResultMonoid<M> {
    inner: M,
}

impl<M: Monoid> PartialResultMonoid<M> {
    pub const fn new(inner: M) -> Self {
        Self { inner }
    }

    pub const fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: Monoid> Monoid for PartialResultMonoid<M> {
    type Item = PartialResult<M::Item>;

    fn zero(&self) -> Self::Item {
        PartialResult::new(0.0, self.inner.zero())
    }

    fn add(&self, left: &Self::Item, right: &Self::Item) -> Self::Item {
        PartialResult::new(
            left.done + right.done,
            self.inner.add(&left.value, &right.value),
        )
    }
}

/// Pairs two monoids component-wise; used to run two sketches in one pass.
#[derive(Clone, Debug)]
pub struct PairMonoid<A, B> {
    pub first: A,
    pub second: B,
}

impl<A: Monoid, B: Monoid> Monoid for PairMonoid<A, B> {
    type Item = (A::Item, B::Item);

    fn zero(&self) -> Self::Item {
        (self.first.zero(), self.second.zero())
    }

    fn add(&self, left: &Self::Item, right: &Self::Item) -> Self::Item {
        (
            self.first.add(&left.0, &right.0),
            self.second.add(&left.1, &right.1),
        )
    }
}
