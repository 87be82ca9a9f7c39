//! Property tests for series preparation.
//!
//! 1. Idempotence: preparing an already clean series drops nothing
//! 2. Return count: a clean series yields exactly one fewer return
//! 3. Locality: a single bad point removes at most two returns

use chrono::{Duration, NaiveDate};
use navrisk_core::domain::{DatedSeries, FundId, RawObservation};
use navrisk_core::SeriesPreparer;
use proptest::prelude::*;

// ── Strategies ───────────────────────────────────────────────────────

fn arb_values(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..500.0_f64, 2..max_len)
}

fn to_raw(values: &[f64]) -> Vec<RawObservation> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, v)| RawObservation::new(start + Duration::days(i as i64), *v))
        .collect()
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn prepare_twice_is_identity(values in arb_values(60)) {
        let preparer = SeriesPreparer::default();
        let fund = FundId::from("P");
        let first = preparer.prepare(&fund, &to_raw(&values));
        let second = preparer.prepare_clean(&fund, &first.valuations);
        prop_assert_eq!(&second.valuations, &first.valuations);
        prop_assert_eq!(&second.returns, &first.returns);
        prop_assert!(second.issues.is_empty());
    }

    #[test]
    fn clean_series_has_one_fewer_return(values in arb_values(60)) {
        let out = SeriesPreparer::default().prepare(&FundId::from("P"), &to_raw(&values));
        prop_assert_eq!(out.returns.len() + 1, out.valuations.len());
    }

    #[test]
    fn single_bad_point_drops_at_most_two_returns(
        values in arb_values(60),
        pos in any::<prop::sample::Index>(),
    ) {
        let mut raw = to_raw(&values);
        let idx = pos.index(raw.len());
        raw[idx].value = Some(-1.0);
        let out = SeriesPreparer::default().prepare(&FundId::from("P"), &raw);
        let full = values.len() - 1;
        prop_assert_eq!(out.issues.len(), 1);
        prop_assert!(out.returns.len() + 2 >= full);
        prop_assert_eq!(out.valuations.len(), values.len() - 1);
    }
}
