use anyhow::Result;
use ironsketch::buckets::{ColumnQuantization, EqualWidthBuckets, ExplicitBuckets, StringBuckets};
use ironsketch::sketches::{
    Ascending, BoundedTopK, Descending, HeatmapSketch, HistogramSketch, HllSketch, OrderBy,
    RangeSketch, SampleQuantileSketch, TopKMonoid, TopKSketch,
};
use ironsketch::table::{Column, Table, Value};
use ironsketch::testing::{assert_close, skewed_table, split_dataset, uniform_table};
use ironsketch::{Monoid, PartitionedDataset, Runner, SketchError};

fn one_column(column: Column) -> Result<PartitionedDataset<Table>> {
    let table = Table::new(vec![column])?;
    Ok(split_dataset(&table, 3, 2)?)
}

/* ---------------- top-K ---------------- */

#[test]
fn top_k_keeps_smallest_keys_with_counts() -> Result<()> {
    let m = TopKMonoid::new(3, Ascending)?;
    let top = m.build([5, 1, 9, 1, 3, 7, 1]);
    assert_eq!(top.entries(), &[(1, 3), (3, 1), (5, 1)]);
    assert_eq!(top.cutoff(), Some(&5));
    assert_eq!(top.count_of(&1, m.order()), Some(3));
    assert_eq!(top.count_of(&9, m.order()), None);
    Ok(())
}

#[test]
fn top_k_merge_of_halves_equals_whole() -> Result<()> {
    let m = TopKMonoid::new(3, Ascending)?;
    let left = m.build([5, 1, 9]);
    let right = m.build([1, 3, 7, 1]);
    assert_eq!(m.add(&left, &right), m.build([5, 1, 9, 1, 3, 7, 1]));
    assert_eq!(m.add(&right, &left), m.build([5, 1, 9, 1, 3, 7, 1]));
    Ok(())
}

#[test]
fn top_k_rejects_zero_capacity() {
    assert!(matches!(
        TopKMonoid::<i32, _>::new(0, Ascending),
        Err(SketchError::InvalidConfig(_))
    ));
    assert!(BoundedTopK::<i32>::new(0).is_err());
    assert!(TopKSketch::new("word", 0, Ascending).is_err());
}

#[test]
fn top_k_custom_order() -> Result<()> {
    // Longest strings first, ties broken alphabetically.
    let order = OrderBy(|a: &&str, b: &&str| b.len().cmp(&a.len()).then(a.cmp(b)));
    let top = BoundedTopK::from_items(2, ["bb", "a", "ccc", "dd", "ccc"], &order)?;
    assert_eq!(top.entries(), &[("ccc", 2), ("bb", 1)]);
    Ok(())
}

#[test]
fn top_k_over_table_column() -> Result<()> {
    let ds = one_column(Column::integers("n", vec![4, 8, 8, 2, 8, 6, 4]))?;
    let top = Runner::sequential().run_sketch(&ds, TopKSketch::new("n", 2, Descending)?)?;
    assert_eq!(
        top.entries(),
        &[(Value::Integer(8), 3), (Value::Integer(6), 1)]
    );
    Ok(())
}

/* ---------------- histograms ---------------- */

#[test]
fn histogram_accounts_for_every_row() -> Result<()> {
    let table = skewed_table(5_000, 11)?;
    let ds = split_dataset(&table, 6, 3)?;
    let runner = Runner::default();

    let hist = runner.run_sketch(
        &ds,
        HistogramSketch::new("score", EqualWidthBuckets::new(0.0, 50.0, 5)?),
    )?;
    assert_eq!(hist.total(), 5_000);
    assert_eq!(hist.missing(), 500);
    assert!(hist.out_of_range() > 0);
    assert_eq!(hist.cdf().last().copied(), Some(5_000 - 500 - hist.out_of_range()));

    let explicit = runner.run_sketch(
        &ds,
        HistogramSketch::new("score", ExplicitBuckets::new(vec![0.0, 10.0, 100.0])?),
    )?;
    assert_eq!(explicit.total(), 5_000);
    assert_eq!(explicit.out_of_range(), 0);

    let words = runner.run_sketch(
        &ds,
        HistogramSketch::new("word", StringBuckets::new(["w0", "w1"])?),
    )?;
    assert_eq!(words.total(), 5_000);
    assert_eq!(words.missing(), 0);
    // Roughly half the words are "w0".
    assert!(words.buckets()[0] > 2_000);
    Ok(())
}

#[test]
fn histogram_cdf_is_cumulative() -> Result<()> {
    let ds = one_column(Column::doubles("v", vec![0.5, 1.5, 1.7, 3.9, 2.0]))?;
    let hist = Runner::sequential().run_sketch(
        &ds,
        HistogramSketch::new("v", EqualWidthBuckets::new(0.0, 4.0, 4)?),
    )?;
    assert_eq!(hist.buckets(), &[1, 2, 1, 1]);
    assert_eq!(hist.cdf(), vec![1, 3, 4, 5]);
    Ok(())
}

#[test]
fn quantized_histogram() -> Result<()> {
    let ds = one_column(Column::doubles("v", vec![2.4, 2.6, 9.99, 10.0, 11.0]))?;
    let q = ColumnQuantization::new(0.5, 0.0, 10.0)?;
    let sketch =
        HistogramSketch::new("v", EqualWidthBuckets::new(0.0, 10.0, 4)?).with_quantization(q)?;
    let hist = Runner::sequential().run_sketch(&ds, sketch)?;
    assert_eq!(hist.buckets(), &[1, 1, 0, 2]);
    assert_eq!(hist.out_of_range(), 1);
    Ok(())
}

#[test]
fn quantized_histogram_matches_direct_bucketing() -> Result<()> {
    let mut values = Vec::new();
    for b in [0.0, 2.5, 5.0, 7.5, 10.0] {
        values.extend([b - 1e-10, b, b + 1e-10]);
    }
    let ds = one_column(Column::doubles("v", values))?;
    let buckets = || EqualWidthBuckets::new(0.0, 10.0, 4);
    let runner = Runner::sequential();

    let direct = runner.run_sketch(&ds, HistogramSketch::new("v", buckets()?))?;
    let quantized = runner.run_sketch(
        &ds,
        HistogramSketch::new("v", buckets()?)
            .with_quantization(ColumnQuantization::new(0.5, 0.0, 10.0)?)?,
    )?;
    assert_eq!(direct.buckets(), &[3, 3, 3, 4]);
    assert_eq!(quantized, direct);
    Ok(())
}

#[test]
fn quantization_narrower_than_buckets_is_rejected() -> Result<()> {
    let narrow = ColumnQuantization::new(1.0, 0.0, 5.0)?;
    let err = HistogramSketch::new("v", EqualWidthBuckets::new(0.0, 10.0, 2)?)
        .with_quantization(narrow)
        .err();
    assert!(matches!(err, Some(SketchError::InvalidConfig(_))));

    // A grid wider than the buckets is fine: 7.0 still lands in its own bucket.
    let ds = one_column(Column::doubles("v", vec![7.0, 12.0]))?;
    let wide = ColumnQuantization::new(1.0, 0.0, 20.0)?;
    let hist = Runner::sequential().run_sketch(
        &ds,
        HistogramSketch::new("v", EqualWidthBuckets::new(0.0, 10.0, 2)?).with_quantization(wide)?,
    )?;
    assert_eq!(hist.buckets(), &[0, 1]);
    assert_eq!(hist.out_of_range(), 1);
    Ok(())
}

#[test]
fn misaligned_quantization_is_rejected() -> Result<()> {
    let q = ColumnQuantization::new(0.5, 0.0, 10.0)?;
    let err = HistogramSketch::new("v", EqualWidthBuckets::new(0.0, 10.0, 3)?)
        .with_quantization(q)
        .err();
    assert!(matches!(err, Some(SketchError::InvalidConfig(_))));

    let strings = HistogramSketch::new("w", StringBuckets::new(["a"])?).with_quantization(q);
    assert!(strings.is_err());
    Ok(())
}

#[test]
fn sampled_histogram_counts_a_fraction() -> Result<()> {
    let table = uniform_table(20_000, 12)?;
    let ds = split_dataset(&table, 4, 2)?;
    let sketch =
        HistogramSketch::new("x", EqualWidthBuckets::new(0.0, 1.0, 4)?).sampled(0.25, 99)?;
    let runner = Runner::sequential();
    let first = runner.run_sketch(&ds, sketch)?;
    assert!((4_000..6_000).contains(&first.total()), "{}", first.total());

    let again =
        HistogramSketch::new("x", EqualWidthBuckets::new(0.0, 1.0, 4)?).sampled(0.25, 99)?;
    assert_eq!(runner.run_sketch(&ds, again)?, first);

    assert!(
        HistogramSketch::new("x", EqualWidthBuckets::new(0.0, 1.0, 4)?)
            .sampled(0.0, 1)
            .is_err()
    );
    Ok(())
}

/* ---------------- heatmap ---------------- */

#[test]
fn heatmap_cells_and_marginal() -> Result<()> {
    let table = Table::new(vec![
        Column::nullable_doubles("x", vec![Some(0.1), Some(0.9), Some(0.6), None, Some(0.2)]),
        Column::strings("y", ["a", "b", "b", "a", "zz"]),
    ])?;
    let ds = split_dataset(&table, 2, 2)?;
    let sketch = HeatmapSketch::new(
        "x",
        EqualWidthBuckets::new(0.0, 1.0, 2)?,
        "y",
        StringBuckets::new(["a", "b", "c"])?,
    );
    let map = Runner::default().run_sketch(&ds, sketch)?;
    assert_eq!(map.dimensions(), (2, 3));
    assert_eq!(map.count(0, 0), 1);
    assert_eq!(map.count(1, 1), 2);
    // "zz" sorts after "c", so it lands in the last bucket.
    assert_eq!(map.count(0, 2), 1);
    assert_eq!(map.missing(), 1);
    assert_eq!(map.out_of_range(), 0);
    assert_eq!(map.total(), 5);
    assert_eq!(map.x_marginal(), vec![2, 2]);
    Ok(())
}

/* ---------------- range ---------------- */

#[test]
fn range_of_numeric_column() -> Result<()> {
    let ds = one_column(Column::nullable_doubles(
        "v",
        vec![Some(3.0), None, Some(-1.0), Some(7.5)],
    ))?;
    let range = Runner::sequential().run_sketch(&ds, RangeSketch::new("v"))?;
    assert_eq!(range.min, Some(-1.0));
    assert_eq!(range.max, Some(7.5));
    assert_eq!(range.present, 3);
    assert_eq!(range.missing, 1);
    Ok(())
}

#[test]
fn range_of_string_column_fails_at_the_leaf() -> Result<()> {
    let ds = one_column(Column::strings("s", ["a", "b", "c"]))?;
    let err = Runner::sequential()
        .run_sketch(&ds, RangeSketch::new("s"))
        .err();
    let failures = err.as_ref().map(SketchError::failures).unwrap_or_default();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].to_string().contains("non-numeric"));
    Ok(())
}

/* ---------------- HyperLogLog ---------------- */

#[mark_flaky_tests::flaky]
#[test]
fn hll_estimate_within_error_bound() {
    let table = uniform_table(10_000, 21).expect("table");
    let ds = split_dataset(&table, 5, 2).expect("dataset");
    let runner = Runner::default();
    let seeds: u32 = 8;
    let mut mean = 0.0;
    let mut relative_error = 0.0;
    for seed in 0..seeds {
        let sketch = HllSketch::new("id", 10, u64::from(seed)).expect("sketch");
        let hll = runner.run_sketch(&ds, sketch).expect("run");
        // Each run alone stays within a few standard errors.
        assert_close(hll.estimate(), 10_000.0, 4.0 * hll.relative_error() * 10_000.0);
        mean += hll.estimate() / f64::from(seeds);
        relative_error = hll.relative_error();
    }
    // Averaging independent seeds shrinks the error by sqrt(seeds).
    let tolerance = 2.0 * relative_error / f64::from(seeds).sqrt() * 10_000.0;
    assert!((relative_error - 0.0325).abs() < 1e-3, "{relative_error}");
    assert_close(mean, 10_000.0, tolerance);
}

#[test]
fn hll_small_cardinalities_use_linear_counting() -> Result<()> {
    let ds = one_column(Column::strings("s", ["a", "b", "a", "c", "b", "a"]))?;
    let hll = Runner::sequential().run_sketch(&ds, HllSketch::new("s", 12, 3)?)?;
    assert!((hll.estimate() - 3.0).abs() < 0.1, "{}", hll.estimate());
    Ok(())
}

#[test]
fn hll_rejects_out_of_range_precision() {
    assert!(HllSketch::new("s", 3, 0).is_err());
    assert!(HllSketch::new("s", 17, 0).is_err());
}

/* ---------------- quantile sample ---------------- */

#[mark_flaky_tests::flaky]
#[test]
fn sampled_median_of_uniform_column() {
    let table = uniform_table(1_000_000, 31).expect("table");
    let ds = split_dataset(&table, 2, 2).expect("dataset");
    let sketch = SampleQuantileSketch::new("x", 1_000, 7).expect("sketch");
    let sample = Runner::default().run_sketch(&ds, sketch).expect("run");
    assert_eq!(sample.len(), 1_000);
    assert_eq!(sample.rows_seen(), 1_000_000);
    let median = sample
        .quantile(0.5)
        .and_then(|v| v.as_double())
        .expect("median");
    assert_close(median, 0.5, 0.05);
    assert!(sample.rank_error_bound(0.99) < 0.06);
}

#[test]
fn complete_sample_is_exact() -> Result<()> {
    let ds = one_column(Column::integers("n", (0..=100).rev().collect()))?;
    let sample =
        Runner::sequential().run_sketch(&ds, SampleQuantileSketch::new("n", 500, 1)?)?;
    assert_eq!(sample.len(), 101);
    assert_eq!(sample.rank_error_bound(0.95), 0.0);
    assert_eq!(sample.quantile(0.0), Some(Value::Integer(0)));
    assert_eq!(sample.quantile(0.5), Some(Value::Integer(50)));
    assert_eq!(sample.quantile(1.0), Some(Value::Integer(100)));
    assert_eq!(sample.value_at_rank(25), Some(Value::Integer(25)));
    Ok(())
}

#[test]
fn empty_sample_has_no_quantiles() -> Result<()> {
    let sketch = SampleQuantileSketch::new("n", 10, 1)?;
    let empty = sketch.zero();
    assert!(empty.is_empty());
    assert_eq!(empty.quantile(0.5), None);
    assert_eq!(empty.value_at_rank(0), None);
    assert!(SampleQuantileSketch::new("n", 0, 1).is_err());
    Ok(())
}
