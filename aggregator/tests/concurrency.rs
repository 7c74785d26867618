//! Readers querying tiers while ingestion keeps flushing. Every row a
//! reader sees must be complete, and timestamps must stay strictly ordered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use timestrata_aggregator::config::TierSpec;
use timestrata_aggregator::history::HistoricalQuery;
use timestrata_aggregator::storage::sqlite::{SqliteStore, SyncMode};
use timestrata_aggregator::storage::TierStore;
use timestrata_aggregator::tier_set::TierSet;
use timestrata_shared::{Series, ScalarValue, VariableDescriptor};

const TICKS: u32 = 600;

fn open_tiers(dir: &tempfile::TempDir) -> TierSet {
    let store: Arc<dyn TierStore> = Arc::new(
        SqliteStore::open(&dir.path().join("t.db"), SyncMode::Off).expect("open sqlite"),
    );
    TierSet::open(
        store,
        &[
            TierSpec::new("data1s", 1.0, Some(30.0)),
            TierSpec::new("data5s", 5.0, None),
        ],
        vec![
            VariableDescriptor::real("supply").expect("descriptor"),
            VariableDescriptor::real("doubled").expect("descriptor"),
        ],
        0.0,
    )
    .expect("open tiers")
}

/// Both variables are written in the same row, `doubled = 2 * supply`.
fn assert_rows_complete(supply: &Series, doubled: &Series) {
    assert_eq!(supply.len(), doubled.len(), "partial row observed");
    for (a, b) in supply.points.iter().zip(&doubled.points) {
        assert_eq!(a.timestamp, b.timestamp);
        let a = a.value.as_f64().expect("numeric");
        let b = b.value.as_f64().expect("numeric");
        assert!((b - 2.0 * a).abs() < 1e-9, "row mixes two flushes: {} vs {}", a, b);
    }
}

#[test]
fn test_readers_never_see_partial_flush() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tiers = open_tiers(&dir);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            for t in 1..=TICKS {
                let v = t as f64;
                let snapshot = [Some(ScalarValue::Real(v)), Some(ScalarValue::Real(2.0 * v))];
                tiers.ingest(&snapshot, v, true).expect("ingest");
            }
            done.store(true, Ordering::SeqCst);
        });

        // One reader walks single tiers, the other the stitched history.
        s.spawn(|| loop {
            let finished = done.load(Ordering::SeqCst);
            for tier in tiers.tiers() {
                let page = tier
                    .append_historical_values(50, f64::from(TICKS) + 1.0)
                    .expect("page");
                assert_rows_complete(&page.series[0], &page.series[1]);
                assert!(page.series[0]
                    .points
                    .windows(2)
                    .all(|w| w[0].timestamp > w[1].timestamp));
            }
            if finished {
                break;
            }
        });

        s.spawn(|| loop {
            let finished = done.load(Ordering::SeqCst);
            let result = tiers
                .history(&HistoricalQuery {
                    max_points_per_tier: 100,
                    end_time: f64::from(TICKS) + 1.0,
                })
                .expect("history");
            assert_rows_complete(&result.series[0], &result.series[1]);
            assert!(result.series[0]
                .points
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp));
            if finished {
                break;
            }
        });
    });

    let fine = tiers.tier("data1s").expect("tier").read_all_rows().expect("rows");
    assert_eq!(fine.len(), 31);
    let coarse = tiers.tier("data5s").expect("tier").read_all_rows().expect("rows");
    assert_eq!(coarse.len(), (TICKS / 5) as usize);
}
