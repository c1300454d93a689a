//! Forecast Engine, what-if Simulator, and Blended Overlay.
//!
//! All math here is over pre-fetched, already-expanded state: no store
//! access, no wall clock. This keeps `compute_balances`/`simulate_spend`
//! pure functions, which is what makes forecast determinism (spec §8,
//! invariant 2) and the binary-search correctness invariant (§8, invariant
//! 7) provable by test rather than assumed.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::Entry;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastSeries {
    pub opening_balance_cents: i64,
    /// Dense: one entry per day in `[start, end]`.
    pub balances: BTreeMap<NaiveDate, i64>,
    pub min_balance_cents: i64,
    pub min_balance_date: NaiveDate,
    pub next_cliff_date: Option<NaiveDate>,
}

/// `balance[t] = balance[t-1] + Σ entries.signed_amount where entries.date = t`.
/// Sparse entries, dense output: every day in `[start, end]` gets a balance.
pub fn compute_balances(
    opening_cents: i64,
    entries: &[Entry],
    start: NaiveDate,
    end: NaiveDate,
    buffer_floor_cents: i64,
) -> ForecastSeries {
    let mut deltas: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for e in entries {
        if e.date >= start && e.date <= end {
            *deltas.entry(e.date).or_insert(0) += e.signed_amount_cents;
        }
    }

    let mut balances = BTreeMap::new();
    let mut running = opening_cents;
    let mut min_balance_cents = opening_cents;
    let mut min_balance_date = start;
    let mut next_cliff_date = None;

    let mut day = start;
    while day <= end {
        running += deltas.get(&day).copied().unwrap_or(0);
        balances.insert(day, running);
        if running < min_balance_cents {
            min_balance_cents = running;
            min_balance_date = day;
        }
        if next_cliff_date.is_none() && running <= buffer_floor_cents {
            next_cliff_date = Some(day);
        }
        day += Duration::days(1);
    }

    ForecastSeries {
        opening_balance_cents: opening_cents,
        balances,
        min_balance_cents,
        min_balance_date,
        next_cliff_date,
    }
}

/// The largest non-negative `x` such that spending `x` today leaves the
/// horizon minimum at or above `buffer_floor_cents`. Implemented with the
/// same integer binary search the simulator uses for `max_safe_today_cents`
/// (spec §4.5/§4.6) so the two code paths can't drift.
pub fn safe_to_spend_today(
    opening_cents: i64,
    entries: &[Entry],
    today: NaiveDate,
    end: NaiveDate,
    buffer_floor_cents: i64,
) -> i64 {
    max_safe_spend(opening_cents, entries, today, today, end, buffer_floor_cents)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    pub safe: bool,
    pub new_min_balance_cents: i64,
    pub new_min_balance_date: NaiveDate,
    pub tight_days: Vec<NaiveDate>,
    pub max_safe_today_cents: i64,
}

/// Tolerance (cents) within which a day counts as "tight" relative to the
/// buffer floor for `tight_days` reporting.
const TIGHT_EPSILON_CENTS: i64 = 2_000;

/// Re-forecasts with a synthetic outflow of `amount_cents` on `date` and
/// reports safety plus `max_safe_today_cents` via binary search.
pub fn simulate_spend(
    opening_cents: i64,
    entries: &[Entry],
    date: NaiveDate,
    amount_cents: i64,
    start: NaiveDate,
    end: NaiveDate,
    buffer_floor_cents: i64,
) -> SimulationResult {
    let series = simulate_with_spend(opening_cents, entries, date, amount_cents, start, end, buffer_floor_cents);
    let safe = series.min_balance_cents >= buffer_floor_cents;
    let tight_days = series
        .balances
        .iter()
        .filter(|(_, bal)| (**bal - buffer_floor_cents).abs() <= TIGHT_EPSILON_CENTS)
        .map(|(date, _)| *date)
        .collect();

    SimulationResult {
        safe,
        new_min_balance_cents: series.min_balance_cents,
        new_min_balance_date: series.min_balance_date,
        tight_days,
        max_safe_today_cents: max_safe_spend(opening_cents, entries, date, start, end, buffer_floor_cents),
    }
}

fn simulate_with_spend(
    opening_cents: i64,
    entries: &[Entry],
    date: NaiveDate,
    amount_cents: i64,
    start: NaiveDate,
    end: NaiveDate,
    buffer_floor_cents: i64,
) -> ForecastSeries {
    let mut with_spend = entries.to_vec();
    with_spend.push(Entry {
        date,
        entry_type: crate::calendar::EntryType::Commitment,
        name: "simulated spend".into(),
        signed_amount_cents: -amount_cents,
        source_id: 0,
        shift_applied: false,
        policy: "AS_SCHEDULED".into(),
        ui_marker: "🧮",
        is_within_lead_window: false,
    });
    compute_balances(opening_cents, &with_spend, start, end, buffer_floor_cents)
}

fn min_balance_with_spend_on(
    opening_cents: i64,
    entries: &[Entry],
    date: NaiveDate,
    amount_cents: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> i64 {
    simulate_with_spend(opening_cents, entries, date, amount_cents, start, end, i64::MIN)
        .min_balance_cents
}

/// Integer binary search over `[0, upper]` for the largest `x` such that
/// `min_balance(x) >= buffer_floor_cents` over the *whole* horizon
/// `[start, end]`. `upper` is `opening + max(0, future inflows)` per spec
/// §4.6.
fn max_safe_spend(
    opening_cents: i64,
    entries: &[Entry],
    date: NaiveDate,
    start: NaiveDate,
    end: NaiveDate,
    buffer_floor_cents: i64,
) -> i64 {
    let future_inflows: i64 = entries
        .iter()
        .filter(|e| e.date >= date && e.date <= end && e.signed_amount_cents > 0)
        .map(|e| e.signed_amount_cents)
        .sum();
    let upper = (opening_cents + future_inflows.max(0)).max(0);

    if min_balance_with_spend_on(opening_cents, entries, date, 0, start, end) < buffer_floor_cents {
        return 0;
    }
    if min_balance_with_spend_on(opening_cents, entries, date, upper, start, end) >= buffer_floor_cents {
        return upper;
    }

    let (mut lo, mut hi) = (0i64, upper);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if min_balance_with_spend_on(opening_cents, entries, date, mid, start, end) >= buffer_floor_cents {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

// --- Blended Overlay (§4.7) ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyStats {
    pub mu_cents: f64,
    pub sigma_cents: f64,
}

/// One observed variable-spend data point: a day and its total outflow
/// magnitude in cents (zero days included so the series stays contiguous).
#[derive(Debug, Clone, Copy)]
pub struct DailyOutflow {
    pub date: NaiveDate,
    pub outflow_cents: i64,
}

/// `μ = mean(abs(daily_outflow))`, `σ = stddev(daily_outflow)` over a
/// contiguous daily series including zero days. Sparse/empty history yields
/// neutral `μ = σ = 0` (spec §4.7).
pub fn compute_daily_stats(daily: &[DailyOutflow]) -> DailyStats {
    if daily.is_empty() {
        return DailyStats { mu_cents: 0.0, sigma_cents: 0.0 };
    }
    let n = daily.len() as f64;
    let mu = daily.iter().map(|d| d.outflow_cents.unsigned_abs() as f64).sum::<f64>() / n;
    let variance = daily
        .iter()
        .map(|d| {
            let x = d.outflow_cents.unsigned_abs() as f64;
            (x - mu) * (x - mu)
        })
        .sum::<f64>()
        / n;
    DailyStats { mu_cents: mu, sigma_cents: variance.sqrt() }
}

/// Daily average outflow by weekday (0=Mon..6=Sun), normalized so
/// `mean(w) = 1.0`. Neutral `[1.0; 7]` when there isn't enough data to
/// compute a meaningful multiplier (spec §4.7).
pub fn compute_weekday_multipliers(daily: &[DailyOutflow]) -> [f64; 7] {
    if daily.is_empty() {
        return [1.0; 7];
    }
    let mut sums = [0.0f64; 7];
    let mut counts = [0u32; 7];
    for d in daily {
        let idx = d.date.weekday().num_days_from_monday() as usize;
        sums[idx] += d.outflow_cents.unsigned_abs() as f64;
        counts[idx] += 1;
    }
    let mut averages = [0.0f64; 7];
    for i in 0..7 {
        averages[i] = if counts[i] > 0 { sums[i] / counts[i] as f64 } else { 0.0 };
    }
    let overall_mean = averages.iter().sum::<f64>() / 7.0;
    if overall_mean <= 0.0 {
        return [1.0; 7];
    }
    let mut multipliers = [1.0f64; 7];
    for i in 0..7 {
        multipliers[i] = averages[i] / overall_mean;
    }
    multipliers
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlendedSeries {
    pub baseline_blended: BTreeMap<NaiveDate, f64>,
    pub band_lower: BTreeMap<NaiveDate, f64>,
    pub band_upper: BTreeMap<NaiveDate, f64>,
}

/// `blended[t] = deterministic[t] - mu * w[weekday(t)]`, `bands = blended +-
/// k * sigma`. Internally `f64` for the statistical terms; callers round to
/// `i64` cents only at the presentation boundary, never mid-computation.
pub fn compute_blended(
    deterministic: &BTreeMap<NaiveDate, i64>,
    stats: DailyStats,
    weekday_multipliers: [f64; 7],
    band_k: f64,
) -> BlendedSeries {
    let mut baseline_blended = BTreeMap::new();
    let mut band_lower = BTreeMap::new();
    let mut band_upper = BTreeMap::new();

    for (date, balance) in deterministic {
        let weekday_idx = date.weekday().num_days_from_monday() as usize;
        let adjustment = stats.mu_cents * weekday_multipliers[weekday_idx];
        let blended = *balance as f64 - adjustment;
        baseline_blended.insert(*date, blended);
        band_lower.insert(*date, blended - band_k * stats.sigma_cents);
        band_upper.insert(*date, blended + band_k * stats.sigma_cents);
    }

    BlendedSeries { baseline_blended, band_lower, band_upper }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::EntryType;

    fn entry(date: NaiveDate, signed_amount_cents: i64) -> Entry {
        Entry {
            date,
            entry_type: EntryType::Commitment,
            name: "x".into(),
            signed_amount_cents,
            source_id: 1,
            shift_applied: false,
            policy: "AS_SCHEDULED".into(),
            ui_marker: "📄",
            is_within_lead_window: false,
        }
    }

    #[test]
    fn scenario_a_balance_identity_holds_over_the_horizon() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let entries = vec![entry(NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(), -120_000)];
        let series = compute_balances(200_000, &entries, start, end, 0);

        assert_eq!(series.min_balance_cents, 80_000);
        assert_eq!(series.min_balance_date, NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
        let sum: i64 = entries.iter().map(|e| e.signed_amount_cents).sum();
        assert_eq!(*series.balances.get(&end).unwrap(), 200_000 + sum);
    }

    #[test]
    fn scenario_c_safe_to_spend_binary_search() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = start;
        let entries: Vec<Entry> = vec![];

        let sim_90k = simulate_spend(100_000, &entries, start, 90_000, start, end, 5_000);
        assert!(sim_90k.safe);
        assert_eq!(sim_90k.new_min_balance_cents, 10_000);
        assert_eq!(sim_90k.max_safe_today_cents, 95_000);

        let sim_96k = simulate_spend(100_000, &entries, start, 96_000, start, end, 5_000);
        assert!(!sim_96k.safe);
    }

    #[test]
    fn binary_search_boundary_is_exact() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = start;
        let entries: Vec<Entry> = vec![];
        let max_safe = max_safe_spend(100_000, &entries, start, start, end, 5_000);

        assert!(simulate_spend(100_000, &entries, start, max_safe, start, end, 5_000).safe);
        assert!(!simulate_spend(100_000, &entries, start, max_safe + 1, start, end, 5_000).safe);
    }

    #[test]
    fn neutral_weekday_multipliers_when_history_is_empty() {
        assert_eq!(compute_weekday_multipliers(&[]), [1.0; 7]);
        let stats = compute_daily_stats(&[]);
        assert_eq!(stats.mu_cents, 0.0);
        assert_eq!(stats.sigma_cents, 0.0);
    }

    #[test]
    fn blended_series_only_differs_from_deterministic_by_mu_and_bands() {
        let mut deterministic = BTreeMap::new();
        let d1 = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(); // Monday
        deterministic.insert(d1, 100_000i64);
        let stats = DailyStats { mu_cents: 1_000.0, sigma_cents: 500.0 };
        let blended = compute_blended(&deterministic, stats, [1.0; 7], 1.0);

        assert_eq!(*blended.baseline_blended.get(&d1).unwrap(), 99_000.0);
        assert_eq!(*blended.band_lower.get(&d1).unwrap(), 98_500.0);
        assert_eq!(*blended.band_upper.get(&d1).unwrap(), 99_500.0);
    }
}
