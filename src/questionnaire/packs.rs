//! Pre-defined pack compositions (spec §4.10): each item is a named
//! primitive-query result annotated with its own `method`/`evidence_ids`.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

use super::period;
use super::primitives::{self, QueryResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackItem {
    pub label: String,
    pub result: QueryResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pack {
    pub name: String,
    pub period: String,
    pub items: Vec<PackItem>,
}

/// Categories treated as "fixed" for `household_fixed_costs`: configured by
/// name since the internal category taxonomy is small and operator-owned.
const FIXED_COST_CATEGORY_NAMES: &[&str] = &["Housing", "Utilities", "Insurance", "Loan Payments"];

pub(crate) fn fixed_cost_category_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    for name in FIXED_COST_CATEGORY_NAMES {
        if let Some(category) = crate::db::categories::find_internal_by_name_ci(conn, name)? {
            ids.push(category.id);
        }
    }
    Ok(ids)
}

/// `loan_application_basics`: income, active loans, household fixed costs —
/// the minimum a lender-style questionnaire asks for.
pub fn loan_application_basics(conn: &Connection, period_alias: &str, today: NaiveDate) -> Result<Pack> {
    let period = period::resolve(period_alias, today)?;
    let mut items = Vec::new();

    items.push(PackItem { label: "income_summary".into(), result: primitives::income_summary(conn, period)? });

    let fixed_ids = fixed_cost_category_ids(conn)?;
    items.push(PackItem {
        label: "household_fixed_costs".into(),
        result: primitives::household_fixed_costs(conn, &fixed_ids, period)?,
    });

    let loans = primitives::active_loans(conn)?;
    let loan_total: i64 = loans.iter().map(|l| l.amount_cents).sum();
    items.push(PackItem {
        label: "active_loans_monthly_total".into(),
        result: QueryResult {
            value_cents: loan_total,
            window_start: period.start,
            window_end: period.end,
            method: "sum of amount_cents across active loan-type commitments".into(),
            evidence_ids: loans.iter().map(|l| l.id).collect(),
        },
    });

    Ok(Pack { name: "loan_application_basics".into(), period: period_alias.into(), items })
}

/// `affordability_snapshot`: income vs. fixed costs vs. discretionary
/// breakdown, for "can this household take on a new payment" questions.
pub fn affordability_snapshot(conn: &Connection, period_alias: &str, today: NaiveDate) -> Result<Pack> {
    let period = period::resolve(period_alias, today)?;
    let mut items = Vec::new();

    items.push(PackItem { label: "income_summary".into(), result: primitives::income_summary(conn, period)? });

    let fixed_ids = fixed_cost_category_ids(conn)?;
    items.push(PackItem {
        label: "household_fixed_costs".into(),
        result: primitives::household_fixed_costs(conn, &fixed_ids, period)?,
    });

    let breakdown = primitives::category_breakdown(conn, period, 5)?;
    let discretionary_total: i64 = breakdown.entries.iter().map(|e| e.value_cents).sum();
    items.push(PackItem {
        label: "top_discretionary_categories_total".into(),
        result: QueryResult {
            value_cents: discretionary_total,
            window_start: period.start,
            window_end: period.end,
            method: breakdown.method.clone(),
            evidence_ids: Vec::new(),
        },
    });

    Ok(Pack { name: "affordability_snapshot".into(), period: period_alias.into(), items })
}

pub fn assemble(conn: &Connection, pack_name: &str, period_alias: &str, today: NaiveDate) -> Result<Pack> {
    match pack_name {
        "loan_application_basics" => loan_application_basics(conn, period_alias, today),
        "affordability_snapshot" => affordability_snapshot(conn, period_alias, today),
        other => Err(anyhow::anyhow!(CoreError::Validation(format!("unknown pack: {other}")))),
    }
}
