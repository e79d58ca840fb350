use anyhow::{Result, bail};
use ironsketch::config::ProgressWeighting;
use ironsketch::dataset::NodePath;
use ironsketch::maps::SampleMap;
use ironsketch::ops::{ConcurrentSketch, IdentityMap, PrecomputedSketch, map_fn, sketch_fn};
use ironsketch::postprocess::{PostProcessed, post_fn};
use ironsketch::sketches::CountMonoid;
use ironsketch::testing::{
    assert_progress_monotone, chunked_dataset, init_tracing, split_dataset, uniform_table,
};
use ironsketch::{
    CancellationToken, EngineConfig, PartialResult, PartitionedDataset, Runner, SketchError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

type Shard = Vec<u64>;

fn len_of(s: &Shard) -> anyhow::Result<u64> {
    Ok(s.len() as u64)
}

/// Counts rows, bumping `calls` once per leaf and sleeping `delay` first.
fn counting(
    calls: Arc<AtomicUsize>,
    delay: Duration,
) -> impl ironsketch::Sketch<Shard, Item = u64> {
    sketch_fn(CountMonoid, move |s: &Shard| {
        calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(delay);
        len_of(s)
    })
}

/// Sums values, failing on any leaf that contains 13.
fn unlucky_sum() -> impl ironsketch::Sketch<Shard, Item = u64> {
    sketch_fn(CountMonoid, |s: &Shard| {
        if s.contains(&13) {
            bail!("unlucky shard");
        }
        Ok(s.iter().sum())
    })
}

/// Four leaves under two internal nodes; the third leaf (`/1/0`) holds 13.
fn four_leaves() -> Result<PartitionedDataset<Shard>> {
    Ok(PartitionedDataset::from_leaves(
        vec![vec![1], vec![2], vec![13], vec![4]],
        2,
    )?)
}

/* ---------------- streams ---------------- */

#[test]
fn progress_is_monotone_and_ends_complete() -> Result<()> {
    init_tracing();
    let table = uniform_table(7_000, 1)?;
    let ds = split_dataset(&table, 9, 3)?;
    for runner in [Runner::sequential(), Runner::default()] {
        let sketch = sketch_fn(CountMonoid, |t: &ironsketch::table::Table| {
            Ok(t.row_count() as u64)
        });
        let items: Vec<PartialResult<u64>> =
            runner.sketch(&ds, sketch).collect::<Result<_, _>>()?;
        assert_eq!(items.len(), 9);
        assert_progress_monotone(&items);
        assert!(items.windows(2).all(|w| w[0].value <= w[1].value));
        assert_eq!(items[8].value, 7_000);
    }
    Ok(())
}

#[test]
fn leaf_count_progress_in_sequential_order() -> Result<()> {
    let ds = chunked_dataset(&(0..100).collect::<Vec<u64>>(), 4, 2)?;
    let runner =
        Runner::new(EngineConfig::sequential().with_progress(ProgressWeighting::LeafCount))?;
    let items: Vec<_> = runner
        .sketch(&ds, sketch_fn(CountMonoid, len_of))
        .collect::<Result<Vec<_>, _>>()?;
    let done: Vec<f64> = items.iter().map(|p| p.done).collect();
    let values: Vec<u64> = items.iter().map(|p| p.value).collect();
    assert_eq!(done, vec![0.25, 0.5, 0.75, 1.0]);
    assert_eq!(values, vec![25, 50, 75, 100]);
    Ok(())
}

#[test]
fn shard_size_progress_weights_by_rows() -> Result<()> {
    let ds = PartitionedDataset::from_weighted_leaves(
        vec![(vec![0u64; 3], 3), (vec![0u64; 1], 1)],
        2,
    )?;
    let items: Vec<_> = Runner::sequential()
        .sketch(&ds, sketch_fn(CountMonoid, len_of))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(items[0].done, 0.75);
    assert_eq!(items[1].done, 1.0);
    Ok(())
}

#[test]
fn final_value_only_when_partials_disabled() -> Result<()> {
    let ds = chunked_dataset(&(0..50).collect::<Vec<u64>>(), 5, 2)?;
    for config in [
        EngineConfig::sequential().emit_partials(false),
        EngineConfig::parallel(Some(2)).emit_partials(false),
    ] {
        let runner = Runner::new(config)?;
        let items: Vec<_> = runner
            .sketch(&ds, sketch_fn(CountMonoid, len_of))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_complete());
        assert_eq!(items[0].value, 50);
    }
    Ok(())
}

/* ---------------- cancellation ---------------- */

#[test]
fn sequential_cancel_stops_after_current_leaf() -> Result<()> {
    let ds = chunked_dataset(&(0..10).collect::<Vec<u64>>(), 10, 3)?;
    let calls = Arc::new(AtomicUsize::new(0));
    let runner = Runner::sequential();
    let mut stream = runner.sketch(&ds, counting(Arc::clone(&calls), Duration::ZERO));

    let first = stream.next().transpose()?;
    assert_eq!(first.map(|p| p.value), Some(1));
    stream.cancel();
    assert!(matches!(stream.next(), Some(Err(SketchError::Cancelled))));
    assert!(stream.next().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(runner.metrics().snapshot().requests_cancelled, 1);
    Ok(())
}

#[test]
fn cancelled_before_start_runs_nothing() -> Result<()> {
    let ds = chunked_dataset(&(0..10).collect::<Vec<u64>>(), 5, 2)?;
    let calls = Arc::new(AtomicUsize::new(0));
    let token = CancellationToken::new();
    token.cancel();
    let result = Runner::sequential()
        .sketch_with_cancel(&ds, counting(Arc::clone(&calls), Duration::ZERO), token)
        .complete();
    assert!(result.is_err_and(|e| e.is_cancelled()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn cancelling_one_request_leaves_another_intact() -> Result<()> {
    let runner = Runner::new(EngineConfig::parallel(Some(1)))?;
    let ds = chunked_dataset(&(0..20).collect::<Vec<u64>>(), 20, 4)?;
    let calls_a = Arc::new(AtomicUsize::new(0));
    let calls_b = Arc::new(AtomicUsize::new(0));
    let delay = Duration::from_millis(20);

    let mut a = runner.sketch(&ds, counting(Arc::clone(&calls_a), delay));
    let b = runner.sketch(&ds, counting(Arc::clone(&calls_b), delay));

    assert!(a.next().is_some_and(|r| r.is_ok()));
    a.cancel();
    assert!(matches!(a.next(), Some(Err(SketchError::Cancelled))));
    assert!(a.next().is_none());

    assert_eq!(b.complete()?, 20);
    assert_eq!(calls_b.load(Ordering::SeqCst), 20);
    // The leaf that was running when A was cancelled may still have finished.
    assert!(calls_a.load(Ordering::SeqCst) <= 2);
    Ok(())
}

#[test]
fn dropping_a_stream_cancels_it() -> Result<()> {
    let runner = Runner::new(EngineConfig::parallel(Some(1)))?;
    let ds = chunked_dataset(&(0..8).collect::<Vec<u64>>(), 8, 2)?;
    let calls = Arc::new(AtomicUsize::new(0));
    let mut stream = runner.sketch(&ds, counting(Arc::clone(&calls), Duration::from_millis(20)));
    let token = stream.cancel_token();
    assert!(stream.next().is_some());
    drop(stream);
    assert!(token.is_cancelled());

    // A later request on the same runner still completes.
    assert_eq!(runner.run_sketch(&ds, sketch_fn(CountMonoid, len_of))?, 8);
    assert!(calls.load(Ordering::SeqCst) < 8);
    Ok(())
}

/* ---------------- failures ---------------- */

#[test]
fn failure_names_the_leaf_and_subtree_can_be_retried() -> Result<()> {
    let ds = four_leaves()?;
    let err = Runner::sequential()
        .run_sketch(&ds, unlucky_sum())
        .err()
        .ok_or_else(|| anyhow::anyhow!("expected a leaf failure"))?;
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, NodePath::from(vec![1, 0]));
    assert_eq!(failures[0].path.to_string(), "/1/0");
    assert!(failures[0].source.to_string().contains("unlucky"));

    let retry = ds
        .subtree(&failures[0].path)
        .ok_or_else(|| anyhow::anyhow!("no subtree"))?;
    let fixed = sketch_fn(CountMonoid, |s: &Shard| {
        Ok(s.iter().filter(|&&v| v != 13).sum())
    });
    assert_eq!(Runner::sequential().run_sketch(&retry, fixed)?, 0);
    Ok(())
}

#[test]
fn parallel_failure_is_reported() -> Result<()> {
    let ds = four_leaves()?;
    let err = Runner::default().run_sketch(&ds, unlucky_sum()).err();
    assert!(matches!(err, Some(SketchError::LeafFailures(ref f)) if !f.is_empty()));
    Ok(())
}

#[test]
fn tolerated_failure_contributes_zero() -> Result<()> {
    let ds = four_leaves()?;
    let runner = Runner::new(EngineConfig::sequential().tolerate_failures(true))?;
    let mut stream = runner.sketch(&ds, unlucky_sum());
    let last = stream.by_ref().last().transpose()?;
    let last = last.ok_or_else(|| anyhow::anyhow!("empty stream"))?;
    assert!(last.is_complete());
    assert_eq!(last.value, 1 + 2 + 4);
    assert_eq!(stream.failures().len(), 1);
    assert_eq!(stream.failures()[0].path.to_string(), "/1/0");
    Ok(())
}

#[test]
fn panicking_leaf_becomes_a_failure() -> Result<()> {
    let ds = PartitionedDataset::from_leaves(vec![vec![1u64], vec![2]], 2)?;
    let sketch = sketch_fn(CountMonoid, |s: &Shard| {
        assert!(s[0] != 2, "bad shard");
        Ok(1)
    });
    let err = Runner::sequential().run_sketch(&ds, sketch).err();
    let failures = err.as_ref().map(SketchError::failures).unwrap_or_default();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].source.to_string().contains("panicked"));
    assert_eq!(failures[0].path.to_string(), "/1");
    Ok(())
}

/* ---------------- map ---------------- */

#[test]
fn map_preserves_shape_and_weights() -> Result<()> {
    let table = uniform_table(1_000, 2)?;
    let ds = split_dataset(&table, 7, 3)?;
    for runner in [Runner::sequential(), Runner::default()] {
        let sampled = runner.map(&ds, SampleMap::new(0.5, 3)?)?;
        assert_eq!(sampled.leaf_count(), ds.leaf_count());
        assert_eq!(sampled.depth(), ds.depth());
        assert_eq!(sampled.weight(), ds.weight());

        let same = runner.map(&ds, IdentityMap)?;
        let rows: usize = same
            .leaves()
            .iter()
            .filter_map(|(_, l)| l.shard().map(ironsketch::table::Table::row_count))
            .sum();
        assert_eq!(rows, 1_000);
    }
    Ok(())
}

#[test]
fn map_reports_every_failed_leaf() -> Result<()> {
    let ds = PartitionedDataset::from_leaves(vec![vec![13u64], vec![1], vec![13]], 2)?;
    let op = map_fn(|s: &Shard| {
        if s.contains(&13) {
            bail!("unlucky shard");
        }
        Ok(s.len())
    });
    let err = Runner::default()
        .map(&ds, op)
        .err()
        .ok_or_else(|| anyhow::anyhow!("expected failures"))?;
    let paths: Vec<String> = err.failures().iter().map(|f| f.path.to_string()).collect();
    // The odd leaf out sits alone under its own internal node.
    assert_eq!(paths, vec!["/0/0", "/1/0"]);
    Ok(())
}

#[test]
fn cancelled_map_skips_every_leaf() -> Result<()> {
    let ds = chunked_dataset(&(0..6).collect::<Vec<u64>>(), 6, 2)?;
    let runner = Runner::sequential();
    let token = CancellationToken::new();
    token.cancel();
    let result = runner.map_with_cancel(&ds, IdentityMap, &token);
    assert!(matches!(result, Err(SketchError::Cancelled)));
    assert_eq!(runner.metrics().snapshot().leaves_skipped, 6);
    Ok(())
}

/* ---------------- post-processing and metrics ---------------- */

#[test]
fn post_process_runs_exactly_once() -> Result<()> {
    let ds = chunked_dataset(&(0..64).collect::<Vec<u64>>(), 8, 2)?;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let post = post_fn(move |n: u64| {
        seen.fetch_add(1, Ordering::SeqCst);
        n * 2
    });
    let doubled = PostProcessed::new(sketch_fn(CountMonoid, len_of), post);
    assert_eq!(Runner::default().run_complete(&ds, doubled)?, 128);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn concurrent_requests_share_one_dataset() -> Result<()> {
    let ds = chunked_dataset(&(1..=1_000).collect::<Vec<u64>>(), 16, 4)?;
    let runner = Runner::default();
    thread::scope(|scope| -> Result<()> {
        let count = scope.spawn(|| runner.run_sketch(&ds, sketch_fn(CountMonoid, len_of)));
        let sum = scope.spawn(|| {
            runner.run_sketch(&ds, sketch_fn(CountMonoid, |s: &Shard| Ok(s.iter().sum())))
        });
        let count = count.join().map_err(|_| anyhow::anyhow!("count thread panicked"))??;
        let sum = sum.join().map_err(|_| anyhow::anyhow!("sum thread panicked"))??;
        assert_eq!(count, 1_000);
        assert_eq!(sum, 500_500);
        Ok(())
    })
}

#[test]
fn metrics_count_requests_and_leaves() -> Result<()> {
    let ds = chunked_dataset(&(0..40).collect::<Vec<u64>>(), 4, 2)?;
    let runner = Runner::sequential();
    let before = runner.metrics().snapshot();
    runner.run_sketch(&ds, sketch_fn(CountMonoid, len_of))?;
    let _ = runner.run_sketch(&four_leaves()?, unlucky_sum());

    let delta = runner.metrics().snapshot().since(&before);
    assert_eq!(delta.requests_started, 2);
    assert_eq!(delta.requests_finished, 1);
    assert_eq!(delta.leaves_completed, 4 + 2);
    assert_eq!(delta.leaves_failed, 1);
    assert!(delta.combines > 0);

    let json = runner.metrics().to_json();
    assert_eq!(json["leaves_failed"]["value"], 1);
    Ok(())
}

#[test]
fn precomputed_value_streams_like_any_sketch() -> Result<()> {
    let ds = four_leaves()?;
    let runner = Runner::sequential();
    let items: Vec<_> = runner
        .sketch(&ds, PrecomputedSketch::new(5, CountMonoid))
        .collect::<ironsketch::Result<_>>()?;
    assert_eq!(items.len(), 4);
    assert_progress_monotone(&items);
    assert_eq!(items.last().map(|p| p.value), Some(20));
    Ok(())
}

#[test]
fn concurrent_sketch_runs_both_in_one_pass() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let ds = chunked_dataset(&(1..=100).collect::<Vec<u64>>(), 5, 2)?;
    let both = ConcurrentSketch::new(
        counting(Arc::clone(&calls), Duration::ZERO),
        sketch_fn(CountMonoid, |s: &Shard| Ok(s.iter().sum())),
    );
    let (count, sum) = Runner::default().run_sketch(&ds, both)?;
    assert_eq!((count, sum), (100, 5_050));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    Ok(())
}
