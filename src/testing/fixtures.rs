//! Synthetic tables and datasets for tests.
//!
//! Everything here is deterministic for a given seed.

use crate::dataset::PartitionedDataset;
use crate::error::Result;
use crate::table::{Column, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `rows` rows with columns `id` (0, 1, 2, ...) and `x` (uniform in `[0, 1)`).
///
/// # Errors
/// Never in practice; the columns always have equal length.
#[allow(clippy::cast_possible_wrap)]
pub fn uniform_table(rows: usize, seed: u64) -> Result<Table> {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Vec<f64> = (0..rows).map(|_| rng.random::<f64>()).collect();
    Table::new(vec![
        Column::integers("id", (0..rows as i64).collect()),
        Column::doubles("x", x),
    ])
}

/// `rows` rows with a skewed string column `word` (word `w{i}` is roughly twice as frequent as
/// `w{i+1}`) and a numeric column `score` in `[0, 100)` where every tenth cell is missing.
///
/// # Errors
/// Never in practice; the columns always have equal length.
pub fn skewed_table(rows: usize, seed: u64) -> Result<Table> {
    let mut rng = StdRng::seed_from_u64(seed);
    let words = (0..rows).map(|_| {
        let mut i = 0;
        while i < 15 && rng.random::<bool>() {
            i += 1;
        }
        format!("w{i}")
    });
    let words: Vec<String> = words.collect();
    let scores = (0..rows)
        .map(|r| (r % 10 != 9).then(|| rng.random::<f64>() * 100.0))
        .collect();
    Table::new(vec![
        Column::strings("word", words),
        Column::nullable_doubles("score", scores),
    ])
}

/// Split `table` into `shards` contiguous leaves under a tree of the given fanout.
///
/// # Errors
/// [`SketchError::InvalidConfig`](crate::SketchError::InvalidConfig) when `fanout < 2`.
pub fn split_dataset(
    table: &Table,
    shards: usize,
    fanout: usize,
) -> Result<PartitionedDataset<Table>> {
    PartitionedDataset::from_tables(table.split(shards), fanout)
}

/// Chunk `values` into `shards` vectors of near-equal size under a tree of the given fanout.
///
/// # Errors
/// [`SketchError::InvalidConfig`](crate::SketchError::InvalidConfig) when `fanout < 2`.
pub fn chunked_dataset<T: Clone>(
    values: &[T],
    shards: usize,
    fanout: usize,
) -> Result<PartitionedDataset<Vec<T>>> {
    let size = values.len().div_ceil(shards.max(1)).max(1);
    let chunks = values
        .chunks(size)
        .map(|c| {
            let weight = c.len() as u64;
            (c.to_vec(), weight)
        })
        .collect();
    PartitionedDataset::from_weighted_leaves(chunks, fanout)
}
