//! Which rows of a table are active.
//!
//! Filtering and sampling never copy column data: they produce a new [`MembershipSet`] over the
//! same columns.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipSet {
    /// Every row in `start..end`.
    Range(Range<usize>),
    /// An explicit, strictly increasing list of rows.
    Sparse(Arc<Vec<usize>>),
}

impl MembershipSet {
    /// All rows of an `n`-row table.
    #[must_use]
    pub const fn full(n: usize) -> Self {
        Self::Range(0..n)
    }

    /// Rows from an arbitrary list; duplicates are dropped.
    #[must_use]
    pub fn from_rows(mut rows: Vec<usize>) -> Self {
        rows.sort_unstable();
        rows.dedup();
        Self::Sparse(Arc::new(rows))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Range(r) => r.len(),
            Self::Sparse(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, row: usize) -> bool {
        match self {
            Self::Range(r) => r.contains(&row),
            Self::Sparse(rows) => rows.binary_search(&row).is_ok(),
        }
    }

    /// First active row, if any.
    #[must_use]
    pub fn first(&self) -> Option<usize> {
        match self {
            Self::Range(r) => (!r.is_empty()).then_some(r.start),
            Self::Sparse(rows) => rows.first().copied(),
        }
    }

    /// Active rows in increasing order.
    pub fn iter(&self) -> MembershipIter<'_> {
        match self {
            Self::Range(r) => MembershipIter::Range(r.clone()),
            Self::Sparse(rows) => MembershipIter::Sparse(rows.iter()),
        }
    }

    /// The active rows for which `keep` holds.
    #[must_use]
    pub fn filter(&self, mut keep: impl FnMut(usize) -> bool) -> Self {
        Self::Sparse(Arc::new(self.iter().filter(|&r| keep(r)).collect()))
    }

    /// Bernoulli sample keeping each row with probability `rate`.
    ///
    /// Deterministic for a given `seed`; `rate >= 1` returns the set unchanged.
    #[must_use]
    pub fn sample(&self, rate: f64, seed: u64) -> Self {
        if rate >= 1.0 {
            return self.clone();
        }
        let mut rng = StdRng::seed_from_u64(seed);
        self.filter(|_| rng.random::<f64>() < rate)
    }

    /// Split into at most `n` contiguous, non-empty pieces of near-equal size.
    #[must_use]
    pub fn split(&self, n: usize) -> Vec<Self> {
        let len = self.len();
        let n = n.clamp(1, len.max(1));
        let base = len / n;
        let extra = len % n;
        let mut out = Vec::with_capacity(n);
        let mut offset = 0;
        for i in 0..n {
            let size = base + usize::from(i < extra);
            if size == 0 {
                continue;
            }
            out.push(match self {
                Self::Range(r) => Self::Range(r.start + offset..r.start + offset + size),
                Self::Sparse(rows) => Self::Sparse(Arc::new(rows[offset..offset + size].to_vec())),
            });
            offset += size;
        }
        out
    }
}

/// Iterator over active rows; see [`MembershipSet::iter`].
pub enum MembershipIter<'a> {
    Range(Range<usize>),
    Sparse(std::slice::Iter<'a, usize>),
}

impl Iterator for MembershipIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Self::Range(r) => r.next(),
            Self::Sparse(it) => it.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Range(r) => r.size_hint(),
            Self::Sparse(it) => it.size_hint(),
        }
    }
}

impl<'a> IntoIterator for &'a MembershipSet {
    type Item = usize;
    type IntoIter = MembershipIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
