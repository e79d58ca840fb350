//! Small shared helpers.

use std::hash::{DefaultHasher, Hash, Hasher};

/// Seeded 64-bit hash.
///
/// `DefaultHasher::new()` uses fixed keys, so the result depends only on `seed` and `value`
/// within one build of the crate. Sketches that must agree across leaves (register choice,
/// sample priorities) all hash through here.
///
/// ```
/// use ironsketch::utils::seeded_hash;
///
/// assert_eq!(seeded_hash(7, "a"), seeded_hash(7, "a"));
/// assert_ne!(seeded_hash(7, "a"), seeded_hash(8, "a"));
/// ```
#[inline]
#[must_use]
pub fn seeded_hash<T: Hash + ?Sized>(seed: u64, value: &T) -> u64 {
    let mut h = DefaultHasher::new();
    seed.hash(&mut h);
    value.hash(&mut h);
    h.finish()
}
