//! Assertion functions for sketch results and result streams.

use crate::monoid::{Monoid, PartialResult};
use std::fmt::Debug;

/// Assert identity, associativity and commutativity of `monoid` over every combination of
/// `samples`.
///
/// Runs `O(n³)` additions; keep `samples` small.
///
/// # Panics
///
/// Panics naming the first law that fails and the values involved.
pub fn assert_monoid_laws<M>(monoid: &M, samples: &[M::Item])
where
    M: Monoid,
    M::Item: PartialEq + Debug,
{
    let zero = monoid.zero();
    for a in samples {
        assert_eq!(&monoid.add(&zero, a), a, "left identity fails for {a:?}");
        assert_eq!(&monoid.add(a, &zero), a, "right identity fails for {a:?}");
    }
    for a in samples {
        for b in samples {
            assert_eq!(
                monoid.add(a, b),
                monoid.add(b, a),
                "add is not commutative for {a:?} and {b:?}"
            );
            for c in samples {
                assert_eq!(
                    monoid.add(&monoid.add(a, b), c),
                    monoid.add(a, &monoid.add(b, c)),
                    "add is not associative for {a:?}, {b:?}, {c:?}"
                );
            }
        }
    }
}

/// Assert that `done` never decreases along `items` and that the last item is complete.
///
/// # Panics
///
/// Panics on an empty stream, a decrease, or a final `done` other than exactly `1.0`.
pub fn assert_progress_monotone<T>(items: &[PartialResult<T>]) {
    let Some(last) = items.last() else {
        panic!("stream produced no results");
    };
    for (i, w) in items.windows(2).enumerate() {
        assert!(
            w[1].done >= w[0].done,
            "progress decreased at item {}: {} -> {}",
            i + 1,
            w[0].done,
            w[1].done
        );
    }
    #[allow(clippy::float_cmp)]
    {
        assert_eq!(last.done, 1.0, "final progress is {}, expected 1.0", last.done);
    }
}

/// Assert `|actual - expected| <= tolerance`.
///
/// # Panics
///
/// Panics with both values and the observed difference.
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "expected {expected} ± {tolerance}, got {actual} (off by {diff})"
    );
}
