//! Property tests for cache and alignment invariants.
//!
//! Uses proptest to verify:
//! 1. Lookup hits iff the stored range contains the requested range
//! 2. Upsert is idempotent
//! 3. Resample is the identity on a series already on its period-end grid
//! 4. Upsampling never produces a value before the first observation
//! 5. Downsampling keeps the last value of every non-empty period

use chrono::{Duration, NaiveDate};
use metaseries_core::data::{resample, RangeStore};
use metaseries_core::domain::{CacheKey, Frequency, Observation, Series};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn key(start: i64, end: i64) -> CacheKey {
    CacheKey {
        source: "bloomberg".into(),
        symbol: "SPX Index".into(),
        field: Some("PX_LAST".into()),
        start: base() + Duration::days(start),
        end: base() + Duration::days(end),
    }
}

/// `(offset, length)` pairs describing a day range inside a 2-year window.
fn arb_range() -> impl Strategy<Value = (i64, i64)> {
    (0..700_i64, 0..60_i64).prop_map(|(start, len)| (start, start + len))
}

fn arb_frequency() -> impl Strategy<Value = Frequency> {
    prop_oneof![
        Just(Frequency::Daily),
        Just(Frequency::Weekly),
        Just(Frequency::Monthly),
        Just(Frequency::Quarterly),
        Just(Frequency::Annual),
    ]
}

/// Sparse series: sorted distinct day offsets with finite values.
fn arb_series() -> impl Strategy<Value = Series> {
    prop::collection::btree_map(0..900_i64, -1.0e6..1.0e6_f64, 1..80).prop_map(|points| {
        points
            .into_iter()
            .map(|(offset, value)| Observation::new(base() + Duration::days(offset), value))
            .collect::<Series>()
    })
}

fn full_range_series(k: &CacheKey) -> Series {
    k.start
        .iter_days()
        .take_while(|day| *day <= k.end)
        .enumerate()
        .map(|(i, day)| Observation::new(day, i as f64))
        .collect()
}

// ── 1. Interval relationships ────────────────────────────────────────

proptest! {
    #[test]
    fn lookup_hits_iff_stored_contains_requested(stored in arb_range(), requested in arb_range()) {
        let store = RangeStore::open_in_memory().unwrap();
        let stored_key = key(stored.0, stored.1);
        store.upsert(&stored_key, &full_range_series(&stored_key)).unwrap();

        let requested_key = key(requested.0, requested.1);
        let hit = store.lookup(&requested_key).unwrap();
        let contains = stored.0 <= requested.0 && requested.1 <= stored.1;

        prop_assert_eq!(hit.is_some(), contains);
        if let Some(hit) = hit {
            prop_assert_eq!(hit.series.first_date(), Some(requested_key.start));
            prop_assert_eq!(hit.series.last_date(), Some(requested_key.end));
        }
    }
}

#[test]
fn interval_relationship_grid() {
    // (stored, requested, expect hit)
    let cases = [
        ((10, 20), (10, 20), true),  // equal
        ((10, 20), (12, 18), true),  // stored is a superset
        ((12, 18), (10, 20), false), // stored is a subset
        ((10, 20), (5, 15), false),  // partial overlap left
        ((10, 20), (15, 25), false), // partial overlap right
        ((10, 20), (30, 40), false), // disjoint
    ];
    for (stored, requested, expected) in cases {
        let store = RangeStore::open_in_memory().unwrap();
        let stored_key = key(stored.0, stored.1);
        store.upsert(&stored_key, &full_range_series(&stored_key)).unwrap();
        let hit = store.lookup(&key(requested.0, requested.1)).unwrap();
        assert_eq!(hit.is_some(), expected, "stored {stored:?} requested {requested:?}");
    }
}

// ── 2. Upsert idempotence ────────────────────────────────────────────

proptest! {
    #[test]
    fn repeated_upsert_gives_same_lookup(range in arb_range(), repeats in 1..4_usize) {
        let store = RangeStore::open_in_memory().unwrap();
        let k = key(range.0, range.1);
        let series = full_range_series(&k);

        store.upsert(&k, &series).unwrap();
        let first = store.lookup(&k).unwrap().unwrap().series;
        for _ in 0..repeats {
            store.upsert(&k, &series).unwrap();
        }
        let again = store.lookup(&k).unwrap().unwrap().series;

        prop_assert_eq!(first, again);
        prop_assert_eq!(store.list_entries().unwrap().len(), 1);
    }
}

// ── 3–5. Resampling ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn resample_is_identity_on_its_own_grid(series in arb_series(), freq in arb_frequency()) {
        let on_grid = resample(&series, freq);
        prop_assert_eq!(resample(&on_grid, freq), on_grid);
    }

    #[test]
    fn upsample_never_precedes_first_observation(series in arb_series(), freq in arb_frequency()) {
        let first = series.first_date().unwrap();
        let out = resample(&series, Frequency::Daily);
        prop_assert_eq!(out.first_date(), Some(first));

        // Coarser targets label the first period by its end, never earlier
        // than the period containing the first observation.
        let coarse = resample(&series, freq);
        prop_assert_eq!(coarse.first_date(), Some(freq.period_end(first)));
    }

    #[test]
    fn downsample_keeps_last_value_of_each_period(series in arb_series(), freq in arb_frequency()) {
        let out = resample(&series, freq);
        for window in series.points().windows(2) {
            let (this, next) = (window[0], window[1]);
            if freq.period_end(this.date) != freq.period_end(next.date) {
                prop_assert_eq!(out.get(freq.period_end(this.date)), Some(this.value));
            }
        }
        let last = series.points()[series.len() - 1];
        prop_assert_eq!(out.get(freq.period_end(last.date)), Some(last.value));
    }

    #[test]
    fn forward_fill_carries_latest_known_value(series in arb_series()) {
        let out = resample(&series, Frequency::Daily);
        for obs in out.points() {
            let latest = series
                .points()
                .iter()
                .rev()
                .find(|p| p.date <= obs.date)
                .map(|p| p.value);
            prop_assert_eq!(Some(obs.value), latest);
        }
    }
}
