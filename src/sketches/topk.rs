//! Bounded top-K: the K first distinct keys under a total order, with occurrence counts.

use crate::error::{Result, SketchError};
use crate::monoid::Monoid;
use crate::ops::Sketch;
use crate::table::{Table, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::marker::PhantomData;

/// Total order deciding which keys are "top". Keys that compare `Less` come first.
pub trait KeyOrder<T>: Send + Sync {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Smallest keys first.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ascending;

impl<T: Ord> KeyOrder<T> for Ascending {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Largest keys first.
#[derive(Clone, Copy, Debug, Default)]
pub struct Descending;

impl<T: Ord> KeyOrder<T> for Descending {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        b.cmp(a)
    }
}

/// Order given by a comparator closure.
#[derive(Clone, Copy, Debug)]
pub struct OrderBy<F>(pub F);

impl<T, F> KeyOrder<T> for OrderBy<F>
where
    F: Fn(&T, &T) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.0)(a, b)
    }
}

/// At most `capacity` distinct keys, kept sorted under the order they were built with.
///
/// The last key is the *cutoff*: once the structure is full, a new key that sorts after the
/// cutoff is discarded, and one that sorts before it evicts the cutoff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedTopK<T> {
    capacity: usize,
    entries: Vec<(T, u64)>,
}

impl<T: Clone> BoundedTopK<T> {
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SketchError::invalid("top-K capacity must be positive"));
        }
        Ok(Self::empty(capacity))
    }

    const fn empty(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::new(),
        }
    }

    /// Push every item of `items` in order.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `capacity == 0`.
    pub fn from_items<O: KeyOrder<T>>(
        capacity: usize,
        items: impl IntoIterator<Item = T>,
        order: &O,
    ) -> Result<Self> {
        let mut topk = Self::new(capacity)?;
        for item in items {
            topk.push(item, order);
        }
        Ok(topk)
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(key, count)` pairs in order.
    #[must_use]
    pub fn entries(&self) -> &[(T, u64)] {
        &self.entries
    }

    #[must_use]
    pub fn cutoff(&self) -> Option<&T> {
        self.entries.last().map(|(k, _)| k)
    }

    /// Count of `key`, if it is held.
    pub fn count_of<O: KeyOrder<T>>(&self, key: &T, order: &O) -> Option<u64> {
        self.entries
            .binary_search_by(|(k, _)| order.compare(k, key))
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Record one occurrence of `item`.
    pub fn push<O: KeyOrder<T>>(&mut self, item: T, order: &O) {
        match self.entries.binary_search_by(|(k, _)| order.compare(k, &item)) {
            Ok(i) => self.entries[i].1 += 1,
            Err(pos) if self.entries.len() < self.capacity => {
                self.entries.insert(pos, (item, 1));
            }
            // Past the cutoff of a full structure.
            Err(pos) if pos == self.entries.len() => {}
            Err(pos) => {
                self.entries.insert(pos, (item, 1));
                self.entries.pop();
            }
        }
    }

    /// K-way merge summing counts of shared keys, truncated to the first `capacity` keys.
    ///
    /// # Panics
    /// When the capacities differ.
    #[must_use]
    pub fn merge<O: KeyOrder<T>>(&self, other: &Self, order: &O) -> Self {
        assert_eq!(
            self.capacity, other.capacity,
            "merging top-K results of different capacity"
        );
        let (left, right) = (&self.entries, &other.entries);
        let mut out = Vec::with_capacity(self.capacity.min(left.len() + right.len()));
        let (mut i, mut j) = (0, 0);
        while out.len() < self.capacity && (i < left.len() || j < right.len()) {
            let next = match (left.get(i), right.get(j)) {
                (Some(l), None) => {
                    i += 1;
                    l.clone()
                }
                (None, Some(r)) => {
                    j += 1;
                    r.clone()
                }
                (Some(l), Some(r)) => match order.compare(&l.0, &r.0) {
                    Ordering::Less => {
                        i += 1;
                        l.clone()
                    }
                    Ordering::Greater => {
                        j += 1;
                        r.clone()
                    }
                    Ordering::Equal => {
                        i += 1;
                        j += 1;
                        (l.0.clone(), l.1 + r.1)
                    }
                },
                (None, None) => break,
            };
            out.push(next);
        }
        Self {
            capacity: self.capacity,
            entries: out,
        }
    }
}

/// Monoid over [`BoundedTopK`] for a fixed capacity and order.
pub struct TopKMonoid<T, O> {
    capacity: usize,
    order: O,
    _t: PhantomData<fn() -> T>,
}

impl<T: Clone, O: KeyOrder<T>> TopKMonoid<T, O> {
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `capacity == 0`.
    pub fn new(capacity: usize, order: O) -> Result<Self> {
        BoundedTopK::<T>::new(capacity)?;
        Ok(Self {
            capacity,
            order,
            _t: PhantomData,
        })
    }

    pub const fn order(&self) -> &O {
        &self.order
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Build a result from `items` with this monoid's parameters.
    #[must_use]
    pub fn build(&self, items: impl IntoIterator<Item = T>) -> BoundedTopK<T> {
        let mut topk = BoundedTopK::empty(self.capacity);
        for item in items {
            topk.push(item, &self.order);
        }
        topk
    }
}

impl<T, O> Monoid for TopKMonoid<T, O>
where
    T: Clone + Send + Sync + 'static,
    O: KeyOrder<T>,
{
    type Item = BoundedTopK<T>;

    fn zero(&self) -> BoundedTopK<T> {
        BoundedTopK::empty(self.capacity)
    }

    fn add(&self, left: &BoundedTopK<T>, right: &BoundedTopK<T>) -> BoundedTopK<T> {
        left.merge(right, &self.order)
    }
}

/// Most frequent-by-order values of one table column; missing cells are skipped.
pub struct TopKSketch<O> {
    column: String,
    monoid: TopKMonoid<Value, O>,
}

impl<O: KeyOrder<Value>> TopKSketch<O> {
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `capacity == 0`.
    pub fn new(column: impl Into<String>, capacity: usize, order: O) -> Result<Self> {
        Ok(Self {
            column: column.into(),
            monoid: TopKMonoid::new(capacity, order)?,
        })
    }
}

impl<O: KeyOrder<Value>> Monoid for TopKSketch<O> {
    type Item = BoundedTopK<Value>;

    fn zero(&self) -> Self::Item {
        self.monoid.zero()
    }

    fn add(&self, left: &Self::Item, right: &Self::Item) -> Self::Item {
        self.monoid.add(left, right)
    }
}

impl<O: KeyOrder<Value> + 'static> Sketch<Table> for TopKSketch<O> {
    fn create(&self, table: &Table) -> anyhow::Result<Self::Item> {
        let col = table.column(&self.column)?;
        Ok(self
            .monoid
            .build(table.members().iter().filter_map(|row| col.value(row))))
    }
}
