//! Property tests for the universal invariants in spec §8 that are pure
//! functions of in-memory state: forecast determinism (invariant 2),
//! balance identity (invariant 3), and binary-search correctness
//! (invariant 7). Randomized over entry lists, opening balances and buffer
//! floors via `proptest`, the way the pack's property-test dev-dependency
//! set is used for its own pure numeric cores.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use runway::calendar::{Entry, EntryType};
use runway::forecast::{compute_balances, simulate_spend};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn entry_strategy(horizon_days: i64) -> impl Strategy<Value = Entry> {
    (0..horizon_days, -50_000i64..50_000i64, 1i64..1000).prop_map(move |(offset, amount, source_id)| Entry {
        date: base_date() + Duration::days(offset),
        entry_type: EntryType::Commitment,
        name: "synthetic".into(),
        signed_amount_cents: amount,
        source_id,
        shift_applied: false,
        policy: "AS_SCHEDULED".into(),
        ui_marker: "x",
        is_within_lead_window: false,
    })
}

proptest! {
    /// Invariant 2: forecast determinism. Two calls with identical inputs
    /// return byte-identical (here: field-for-field-identical) series.
    #[test]
    fn forecast_determinism(
        opening in -500_000i64..500_000i64,
        entries in prop::collection::vec(entry_strategy(30), 0..20),
    ) {
        let start = base_date();
        let end = start + Duration::days(29);
        let first = compute_balances(opening, &entries, start, end, 0);
        let second = compute_balances(opening, &entries, start, end, 0);
        prop_assert_eq!(first, second);
    }

    /// Invariant 3: balance identity. `balance[end] = opening + sum(deltas
    /// within [start, end])`, regardless of how the deltas are distributed
    /// across dates or how many entries land on the same day.
    #[test]
    fn balance_identity_holds_over_the_horizon(
        opening in -500_000i64..500_000i64,
        entries in prop::collection::vec(entry_strategy(30), 0..20),
    ) {
        let start = base_date();
        let end = start + Duration::days(29);
        let series = compute_balances(opening, &entries, start, end, 0);

        let total: i64 = entries
            .iter()
            .filter(|e| e.date >= start && e.date <= end)
            .map(|e| e.signed_amount_cents)
            .sum();
        prop_assert_eq!(*series.balances.get(&end).unwrap(), opening + total);
    }

    /// Invariant 7: binary-search correctness. `max_safe_today_cents`
    /// satisfies both `simulate(max).safe` and `!simulate(max + 1).safe`,
    /// for arbitrary openings, floors and future entry sets.
    #[test]
    fn binary_search_boundary_is_always_exact(
        opening in 0i64..1_000_000i64,
        buffer_floor in 0i64..200_000i64,
        entries in prop::collection::vec(entry_strategy(14), 0..10),
    ) {
        let start = base_date();
        let end = start + Duration::days(13);
        let result = simulate_spend(opening, &entries, start, 0, start, end, buffer_floor);
        let max_safe = result.max_safe_today_cents;

        let at_max = simulate_spend(opening, &entries, start, max_safe, start, end, buffer_floor);
        let past_max = simulate_spend(opening, &entries, start, max_safe + 1, start, end, buffer_floor);

        prop_assert!(at_max.safe);
        prop_assert!(!past_max.safe);
    }

    /// `max_safe_today_cents` is monotonically non-increasing in the buffer
    /// floor: a stricter floor can never make more spend safe.
    #[test]
    fn max_safe_spend_is_monotonic_in_buffer_floor(
        opening in 0i64..1_000_000i64,
        entries in prop::collection::vec(entry_strategy(14), 0..10),
    ) {
        let start = base_date();
        let end = start + Duration::days(13);
        let loose = simulate_spend(opening, &entries, start, 0, start, end, 0);
        let strict = simulate_spend(opening, &entries, start, 0, start, end, 50_000);

        prop_assert!(strict.max_safe_today_cents <= loose.max_safe_today_cents);
    }
}
