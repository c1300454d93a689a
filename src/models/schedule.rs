//! Recurring schedule entities and the closed due-rule/shift-policy variant
//! set they expand through (`calendar::expander`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Day-of-week, independent of `chrono::Weekday` so the wire/string format
/// used in `due_rule` strings is ours to define (`0` = Monday .. `6` = Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weekday(pub u8);

impl Weekday {
    pub fn from_chrono(w: chrono::Weekday) -> Self {
        Weekday(w.num_days_from_monday() as u8)
    }

    pub fn to_chrono(self) -> chrono::Weekday {
        chrono::Weekday::try_from(self.0).expect("weekday out of range")
    }
}

/// A closed variant set of recurrence rules, parsed from `due_rule` /
/// `repeat_rule` strings stored on `Commitment` / `ScheduledInflow` /
/// `KeySpendEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DueRule {
    FixedDate(NaiveDate),
    MonthlyOn { day: u32 },
    WeeklyOn { weekday: Weekday },
    EveryNDays { n: u32, anchor: NaiveDate },
}

impl DueRule {
    /// Parses the closed textual grammar:
    /// `fixed:YYYY-MM-DD`, `monthly:DD`, `weekly:D` (0=Mon..6=Sun),
    /// `every_n_days:N:YYYY-MM-DD`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let kind = parts.next()?;
        match kind {
            "fixed" => {
                let date = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
                Some(DueRule::FixedDate(date))
            }
            "monthly" => {
                let day: u32 = parts.next()?.parse().ok()?;
                Some(DueRule::MonthlyOn { day })
            }
            "weekly" => {
                let weekday: u8 = parts.next()?.parse().ok()?;
                if weekday > 6 {
                    return None;
                }
                Some(DueRule::WeeklyOn {
                    weekday: Weekday(weekday),
                })
            }
            "every_n_days" => {
                let n: u32 = parts.next()?.parse().ok()?;
                let anchor = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
                Some(DueRule::EveryNDays { n, anchor })
            }
            _ => None,
        }
    }

    pub fn to_rule_string(&self) -> String {
        match self {
            DueRule::FixedDate(d) => format!("fixed:{d}"),
            DueRule::MonthlyOn { day } => format!("monthly:{day}"),
            DueRule::WeeklyOn { weekday } => format!("weekly:{}", weekday.0),
            DueRule::EveryNDays { n, anchor } => format!("every_n_days:{n}:{anchor}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftPolicy {
    AsScheduled,
    PrevBusinessDay,
    NextBusinessDay,
}

impl ShiftPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AS_SCHEDULED" => Some(ShiftPolicy::AsScheduled),
            "PREV_BUSINESS_DAY" => Some(ShiftPolicy::PrevBusinessDay),
            "NEXT_BUSINESS_DAY" => Some(ShiftPolicy::NextBusinessDay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftPolicy::AsScheduled => "AS_SCHEDULED",
            ShiftPolicy::PrevBusinessDay => "PREV_BUSINESS_DAY",
            ShiftPolicy::NextBusinessDay => "NEXT_BUSINESS_DAY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commitment {
    pub id: i64,
    pub name: String,
    /// Positive magnitude; semantically an outflow.
    pub amount_cents: i64,
    pub due_rule: String,
    pub next_due_date: NaiveDate,
    pub priority: i32,
    pub account_id: i64,
    pub flexible_window_days: i64,
    pub category_id: Option<i64>,
    pub commitment_type: String,
    pub shift_policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledInflow {
    pub id: i64,
    pub name: String,
    /// Positive magnitude; semantically an inflow.
    pub amount_cents: i64,
    pub due_rule: String,
    pub next_due_date: NaiveDate,
    pub account_id: i64,
    pub inflow_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeySpendEvent {
    pub id: i64,
    pub name: String,
    pub event_date: NaiveDate,
    pub repeat_rule: Option<String>,
    /// Positive = expense, negative = income (spec.md §9 fixes this sign
    /// convention explicitly).
    pub planned_amount_cents: i64,
    pub category_id: Option<i64>,
    pub lead_time_days: i64,
    pub shift_policy: String,
    pub account_id: Option<i64>,
}

/// Operator-declared ground truth for an account's balance at a point in
/// time. Keyed on `account_id` (one anchor per account).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountAnchor {
    pub account_id: i64,
    pub anchor_date: NaiveDate,
    pub anchor_balance_cents: i64,
    pub min_floor_cents: Option<i64>,
}
