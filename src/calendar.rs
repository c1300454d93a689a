//! Calendar Expander: turns `Commitment`/`ScheduledInflow`/`KeySpendEvent`
//! recurrence rules into an ordered, deterministic list of dated `Entry`
//! values across `[start, end]`.

use chrono::{Datelike, Duration, NaiveDate, Weekday as ChronoWeekday};
use serde::{Deserialize, Serialize};

use crate::models::{Commitment, DueRule, KeySpendEvent, ScheduledInflow, ShiftPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryType {
    Inflow,
    Commitment,
    KeyEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub date: NaiveDate,
    pub entry_type: EntryType,
    pub name: String,
    /// Inflows positive, commitments negative, key events per spec sign
    /// convention (`planned_amount_cents` positive = expense).
    pub signed_amount_cents: i64,
    pub source_id: i64,
    pub shift_applied: bool,
    pub policy: String,
    pub ui_marker: &'static str,
    pub is_within_lead_window: bool,
}

fn is_business_day(d: NaiveDate) -> bool {
    !matches!(d.weekday(), ChronoWeekday::Sat | ChronoWeekday::Sun)
}

fn prev_business_day(d: NaiveDate) -> NaiveDate {
    let mut cur = d - Duration::days(1);
    while !is_business_day(cur) {
        cur -= Duration::days(1);
    }
    cur
}

fn next_business_day(d: NaiveDate) -> NaiveDate {
    let mut cur = d + Duration::days(1);
    while !is_business_day(cur) {
        cur += Duration::days(1);
    }
    cur
}

/// With no holiday calendar (§4.4), a weekend is the only thing that can
/// push a nominal date off a business day, and the farthest that ever pushes
/// `PREV_BUSINESS_DAY` back is two days (a Sunday due date lands on the
/// preceding Friday). That ordinary weekend shift always applies regardless
/// of `flexible_window_days`; the field only extends the cap beyond this
/// floor for a larger operator-configured window.
const WEEKEND_SHIFT_FLOOR_DAYS: i64 = 2;

/// Applies a shift policy to a nominal date. `flexible_window_days` bounds
/// how far `PREV_BUSINESS_DAY` may move a commitment backward; beyond that,
/// the policy is honored strictly even if it lands on a weekend (the spec's
/// "otherwise honor policy strictly").
fn apply_shift(nominal: NaiveDate, policy: ShiftPolicy, flexible_window_days: i64) -> (NaiveDate, bool) {
    if is_business_day(nominal) {
        return (nominal, false);
    }
    match policy {
        ShiftPolicy::AsScheduled => (nominal, false),
        ShiftPolicy::PrevBusinessDay => {
            let shifted = prev_business_day(nominal);
            let effective_window = flexible_window_days.max(WEEKEND_SHIFT_FLOOR_DAYS);
            if (nominal - shifted).num_days() <= effective_window {
                (shifted, true)
            } else {
                (nominal, false)
            }
        }
        ShiftPolicy::NextBusinessDay => (next_business_day(nominal), true),
    }
}

/// Every occurrence of `rule` with a nominal date in `[start, end]`, before
/// any shift is applied.
fn occurrences(rule: &DueRule, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    match rule {
        DueRule::FixedDate(d) => {
            if *d >= start && *d <= end {
                out.push(*d);
            }
        }
        DueRule::MonthlyOn { day } => {
            let mut year = start.year();
            let mut month = start.month();
            loop {
                if let Some(candidate) = NaiveDate::from_ymd_opt(year, month, 1)
                    .and_then(|first_of_month| last_day_of_month(first_of_month))
                    .map(|last| (*day).min(last.day()))
                    .and_then(|clamped_day| NaiveDate::from_ymd_opt(year, month, clamped_day))
                {
                    if candidate > end {
                        break;
                    }
                    if candidate >= start {
                        out.push(candidate);
                    }
                }
                if month == 12 {
                    month = 1;
                    year += 1;
                } else {
                    month += 1;
                }
                if year > end.year() + 1 {
                    break;
                }
            }
        }
        DueRule::WeeklyOn { weekday } => {
            let target = weekday.to_chrono();
            let mut cur = start;
            while cur.weekday() != target {
                cur += Duration::days(1);
            }
            while cur <= end {
                out.push(cur);
                cur += Duration::days(7);
            }
        }
        DueRule::EveryNDays { n, anchor } => {
            let n = (*n).max(1) as i64;
            let mut cur = *anchor;
            if cur < start {
                let steps = (start - cur).num_days() / n;
                cur += Duration::days(steps * n);
                while cur < start {
                    cur += Duration::days(n);
                }
            }
            while cur <= end {
                if cur >= start {
                    out.push(cur);
                }
                cur += Duration::days(n);
            }
        }
    }
    out
}

fn last_day_of_month(first_of_month: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = (first_of_month.year(), first_of_month.month());
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }?;
    Some(next_month_first - Duration::days(1))
}

fn commitment_marker(commitment_type: &str) -> &'static str {
    match commitment_type.to_ascii_lowercase().as_str() {
        "rent" | "mortgage" => "🏠",
        "loan" => "🏦",
        "subscription" => "🔁",
        _ => "📄",
    }
}

fn key_event_marker(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.contains("birthday") {
        "🎂"
    } else if lower.contains("holiday") || lower.contains("christmas") {
        "🎄"
    } else {
        "🎯"
    }
}

pub fn expand_commitments(commitments: &[Commitment], start: NaiveDate, end: NaiveDate) -> Vec<Entry> {
    let mut entries = Vec::new();
    for c in commitments {
        let Some(rule) = DueRule::parse(&c.due_rule) else {
            continue;
        };
        let policy = ShiftPolicy::parse(&c.shift_policy).unwrap_or(ShiftPolicy::AsScheduled);
        for nominal in occurrences(&rule, start, end) {
            let (date, shifted) = apply_shift(nominal, policy, c.flexible_window_days);
            entries.push(Entry {
                date,
                entry_type: EntryType::Commitment,
                name: c.name.clone(),
                signed_amount_cents: -c.amount_cents.abs(),
                source_id: c.id,
                shift_applied: shifted,
                policy: c.shift_policy.clone(),
                ui_marker: commitment_marker(&c.commitment_type),
                is_within_lead_window: false,
            });
        }
    }
    entries
}

pub fn expand_inflows(inflows: &[ScheduledInflow], start: NaiveDate, end: NaiveDate) -> Vec<Entry> {
    let mut entries = Vec::new();
    for i in inflows {
        let Some(rule) = DueRule::parse(&i.due_rule) else {
            continue;
        };
        for nominal in occurrences(&rule, start, end) {
            entries.push(Entry {
                date: nominal,
                entry_type: EntryType::Inflow,
                name: i.name.clone(),
                signed_amount_cents: i.amount_cents.abs(),
                source_id: i.id,
                shift_applied: false,
                policy: ShiftPolicy::AsScheduled.as_str().to_string(),
                ui_marker: "💰",
                is_within_lead_window: false,
            });
        }
    }
    entries
}

pub fn expand_key_events(
    events: &[KeySpendEvent],
    start: NaiveDate,
    end: NaiveDate,
    horizon_start: NaiveDate,
) -> Vec<Entry> {
    let mut entries = Vec::new();
    for e in events {
        let dates = if let Some(rule_str) = &e.repeat_rule {
            match DueRule::parse(rule_str) {
                Some(rule) => occurrences(&rule, start, end),
                None => Vec::new(),
            }
        } else if e.event_date >= start && e.event_date <= end {
            vec![e.event_date]
        } else {
            Vec::new()
        };

        let policy = ShiftPolicy::parse(&e.shift_policy).unwrap_or(ShiftPolicy::AsScheduled);
        for nominal in dates {
            let (date, shifted) = apply_shift(nominal, policy, 0);
            let is_within_lead_window =
                (date - horizon_start).num_days() <= e.lead_time_days && date >= horizon_start;
            entries.push(Entry {
                date,
                entry_type: EntryType::KeyEvent,
                name: e.name.clone(),
                signed_amount_cents: -e.planned_amount_cents,
                source_id: e.id,
                shift_applied: shifted,
                policy: e.shift_policy.clone(),
                ui_marker: key_event_marker(&e.name),
                is_within_lead_window,
            });
        }
    }
    entries
}

/// Materializes all three sources into one ordered, deterministic list,
/// sorted by `(date, type, source_id)` per the expansion contract.
pub fn expand(
    commitments: &[Commitment],
    inflows: &[ScheduledInflow],
    key_events: &[KeySpendEvent],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Entry> {
    let mut entries = expand_inflows(inflows, start, end);
    entries.extend(expand_commitments(commitments, start, end));
    entries.extend(expand_key_events(key_events, start, end, start));
    entries.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.entry_type.cmp(&b.entry_type))
            .then(a.source_id.cmp(&b.source_id))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commitment(due_rule: &str, shift_policy: &str, flexible_window_days: i64) -> Commitment {
        Commitment {
            id: 1,
            name: "Rent".into(),
            amount_cents: 120_000,
            due_rule: due_rule.into(),
            next_due_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            priority: 1,
            account_id: 1,
            flexible_window_days,
            category_id: None,
            commitment_type: "rent".into(),
            shift_policy: shift_policy.into(),
        }
    }

    #[test]
    fn scenario_a_weekend_shift_moves_rent_to_friday() {
        // 2025-01-04 is a Saturday.
        let c = commitment("monthly:4", "PREV_BUSINESS_DAY", 0);
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let entries = expand_commitments(&[c], start, end);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
        assert_eq!(entries[0].signed_amount_cents, -120_000);
        assert!(entries[0].shift_applied);
    }

    #[test]
    fn scenario_b_flexible_window_allows_a_two_day_shift() {
        // 2025-05-04 is a Sunday; Friday 2025-05-02 is 2 days earlier.
        let c = commitment("monthly:4", "PREV_BUSINESS_DAY", 2);
        let start = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        let entries = expand_commitments(&[c], start, end);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());
    }

    #[test]
    fn entries_sort_by_date_then_type_then_source_id() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let commitments = vec![commitment("fixed:2025-01-05", "AS_SCHEDULED", 0)];
        let inflow = ScheduledInflow {
            id: 2,
            name: "Paycheck".into(),
            amount_cents: 300_000,
            due_rule: "fixed:2025-01-05".into(),
            next_due_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            account_id: 1,
            inflow_type: "salary".into(),
        };
        let entries = expand(&commitments, &[inflow], &[], start, end);
        assert_eq!(entries.len(), 2);
        // Same date: inflow (ordinal 0) sorts before commitment (ordinal 1).
        assert_eq!(entries[0].entry_type, EntryType::Inflow);
        assert_eq!(entries[1].entry_type, EntryType::Commitment);
    }

    #[test]
    fn weekly_rule_expands_every_matching_weekday_in_range() {
        let inflow = ScheduledInflow {
            id: 1,
            name: "Gig income".into(),
            amount_cents: 10_000,
            due_rule: "weekly:4".into(), // Friday
            next_due_date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            account_id: 1,
            inflow_type: "gig".into(),
        };
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let entries = expand_inflows(&[inflow], start, end);
        assert_eq!(entries.len(), 5);
        for e in &entries {
            assert_eq!(e.date.weekday(), ChronoWeekday::Fri);
        }
    }

    #[test]
    fn key_event_lead_window_flag_is_set_relative_to_horizon_start() {
        let event = KeySpendEvent {
            id: 9,
            name: "Birthday".into(),
            event_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            repeat_rule: None,
            planned_amount_cents: 5_000,
            category_id: None,
            lead_time_days: 14,
            shift_policy: "AS_SCHEDULED".into(),
            account_id: None,
        };
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let entries = expand_key_events(&[event], start, end, start);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_within_lead_window);
        assert_eq!(entries[0].signed_amount_cents, -5_000);
    }
}
