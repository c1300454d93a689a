//! The nine primitive questionnaire queries (spec §4.10). Each returns a
//! `QueryResult` carrying the method it used and the transaction ids it
//! relied on, so downstream packs/exports can cite evidence.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{schedule, transactions};
use crate::error::Result;
use crate::models::{Commitment, Transaction};

use super::period::Period;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub value_cents: i64,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub method: String,
    pub evidence_ids: Vec<i64>,
}

fn outflows(txns: &[Transaction]) -> Vec<&Transaction> {
    txns.iter().filter(|t| t.amount_cents < 0).collect()
}

fn inflows(txns: &[Transaction]) -> Vec<&Transaction> {
    txns.iter().filter(|t| t.amount_cents > 0).collect()
}

pub fn monthly_total_by_category(conn: &Connection, category_id: i64, period: Period) -> Result<QueryResult> {
    let txns = transactions::list_by_category_in_range(conn, category_id, period.start, period.end)?;
    let out = outflows(&txns);
    let value_cents: i64 = out.iter().map(|t| t.amount_cents.unsigned_abs() as i64).sum();
    Ok(QueryResult {
        value_cents,
        window_start: period.start,
        window_end: period.end,
        method: "sum of outflow magnitudes for category in window".into(),
        evidence_ids: out.iter().map(|t| t.id).collect(),
    })
}

pub fn monthly_average_by_category(conn: &Connection, category_id: i64, months: u32, today: NaiveDate) -> Result<QueryResult> {
    let period = super::period::last_n_complete_months(today, months);
    let total = monthly_total_by_category(conn, category_id, period)?;
    let divisor = months.max(1) as i64;
    Ok(QueryResult {
        value_cents: total.value_cents / divisor,
        window_start: period.start,
        window_end: period.end,
        method: format!("total over {months} complete months divided by {months}"),
        evidence_ids: total.evidence_ids,
    })
}

/// Loan-type commitments are treated as having a non-zero outstanding
/// balance proxy for as long as they remain configured; "active" here means
/// "still being tracked", not an amortization computation (out of scope).
pub fn active_loans(conn: &Connection) -> Result<Vec<Commitment>> {
    let commitments = schedule::list_commitments(conn)?;
    Ok(commitments.into_iter().filter(|c| c.commitment_type.eq_ignore_ascii_case("loan")).collect())
}

pub fn monthly_commitment_total(conn: &Connection, kind: &str, period: Period) -> Result<QueryResult> {
    let commitments = schedule::list_commitments(conn)?;
    let matching: Vec<&Commitment> = commitments
        .iter()
        .filter(|c| c.commitment_type.eq_ignore_ascii_case(kind))
        .filter(|c| c.next_due_date >= period.start && c.next_due_date <= period.end)
        .collect();
    let value_cents: i64 = matching.iter().map(|c| c.amount_cents).sum();
    Ok(QueryResult {
        value_cents,
        window_start: period.start,
        window_end: period.end,
        method: format!("sum of '{kind}' commitment amounts due in window"),
        evidence_ids: matching.iter().map(|c| c.id).collect(),
    })
}

pub fn income_summary(conn: &Connection, period: Period) -> Result<QueryResult> {
    let txns = transactions::list_in_range(conn, None, period.start, period.end)?;
    let income = inflows(&txns);
    let value_cents: i64 = income.iter().map(|t| t.amount_cents).sum();
    Ok(QueryResult {
        value_cents,
        window_start: period.start,
        window_end: period.end,
        method: "sum of inflow transactions in window".into(),
        evidence_ids: income.iter().map(|t| t.id).collect(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryBreakdownEntry {
    pub category_id: Option<i64>,
    pub value_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryBreakdown {
    pub entries: Vec<CategoryBreakdownEntry>,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub method: String,
}

pub fn category_breakdown(conn: &Connection, period: Period, top_n: usize) -> Result<CategoryBreakdown> {
    let txns = transactions::list_in_range(conn, None, period.start, period.end)?;
    let mut totals: HashMap<Option<i64>, i64> = HashMap::new();
    for t in outflows(&txns) {
        *totals.entry(t.category_id).or_insert(0) += t.amount_cents.unsigned_abs() as i64;
    }
    let mut entries: Vec<CategoryBreakdownEntry> = totals
        .into_iter()
        .map(|(category_id, value_cents)| CategoryBreakdownEntry { category_id, value_cents })
        .collect();
    entries.sort_by(|a, b| b.value_cents.cmp(&a.value_cents).then(a.category_id.cmp(&b.category_id)));
    entries.truncate(top_n);

    Ok(CategoryBreakdown {
        entries,
        window_start: period.start,
        window_end: period.end,
        method: format!("top {top_n} categories by outflow magnitude in window"),
    })
}

pub fn supporting_transactions(
    conn: &Connection,
    category_id: i64,
    period: Period,
    page: usize,
    page_size: usize,
) -> Result<Vec<Transaction>> {
    let mut txns = transactions::list_by_category_in_range(conn, category_id, period.start, period.end)?;
    let start = page.saturating_mul(page_size).min(txns.len());
    let end = (start + page_size).min(txns.len());
    txns.drain(end..);
    txns.drain(..start);
    Ok(txns)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub payee: String,
    pub average_amount_cents: i64,
    pub occurrences: usize,
}

/// Heuristically detects recurring payees: the same payee appearing in at
/// least 3 distinct calendar months with amounts within 10% of their mean,
/// over the trailing year.
pub fn subscription_list(conn: &Connection, today: NaiveDate) -> Result<Vec<Subscription>> {
    let window_start = today - chrono::Duration::days(365);
    let txns = transactions::list_in_range(conn, None, window_start, today)?;

    let mut by_payee: HashMap<String, Vec<&Transaction>> = HashMap::new();
    for t in outflows(&txns) {
        by_payee.entry(t.payee.clone()).or_default().push(t);
    }

    let mut subscriptions = Vec::new();
    for (payee, rows) in by_payee {
        let distinct_months: std::collections::HashSet<(i32, u32)> =
            rows.iter().map(|t| (t.posted_at.year(), t.posted_at.month())).collect();
        if distinct_months.len() < 3 {
            continue;
        }
        let amounts: Vec<i64> = rows.iter().map(|t| t.amount_cents.unsigned_abs() as i64).collect();
        let mean = amounts.iter().sum::<i64>() / amounts.len() as i64;
        let within_tolerance = amounts.iter().all(|a| (*a - mean).abs() <= mean / 10 + 1);
        if within_tolerance {
            subscriptions.push(Subscription { payee, average_amount_cents: mean, occurrences: rows.len() });
        }
    }
    subscriptions.sort_by(|a, b| a.payee.cmp(&b.payee));
    Ok(subscriptions)
}

pub fn household_fixed_costs(conn: &Connection, fixed_category_ids: &[i64], period: Period) -> Result<QueryResult> {
    let txns = transactions::list_in_range(conn, None, period.start, period.end)?;
    let matching: Vec<&Transaction> = outflows(&txns)
        .into_iter()
        .filter(|t| t.category_id.map(|c| fixed_category_ids.contains(&c)).unwrap_or(false))
        .collect();
    let value_cents: i64 = matching.iter().map(|t| t.amount_cents.unsigned_abs() as i64).sum();
    Ok(QueryResult {
        value_cents,
        window_start: period.start,
        window_end: period.end,
        method: "sum of outflows in fixed-cost categories in window".into(),
        evidence_ids: matching.iter().map(|t| t.id).collect(),
    })
}
