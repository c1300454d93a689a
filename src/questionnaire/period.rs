//! Period resolution: turns a period alias or explicit range into concrete
//! `[window_start, window_end]` calendar days.

use chrono::{Datelike, NaiveDate};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).expect("valid year/month")
}

fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    first_of_month(next_year, next_month).pred_opt().expect("valid previous day")
}

/// `3m_full` = the last 3 complete calendar months relative to `today`
/// (spec §4.10). E.g. on any day in April, resolves to Jan 1 .. Mar 31.
pub fn last_n_complete_months(today: NaiveDate, months: u32) -> Period {
    let (mut year, mut month) = (today.year(), today.month());
    // Step back to the last complete month (the one before the current one).
    if month == 1 {
        year -= 1;
        month = 12;
    } else {
        month -= 1;
    }
    let end = last_of_month(year, month);

    let mut start_year = year;
    let mut start_month = month;
    for _ in 1..months {
        if start_month == 1 {
            start_year -= 1;
            start_month = 12;
        } else {
            start_month -= 1;
        }
    }
    let start = first_of_month(start_year, start_month);

    Period { start, end }
}

/// Parses `period` aliases used across the questionnaire surface:
/// `3m_full`, `6m_full`, `12m_full`, or an explicit `YYYY-MM-DD..YYYY-MM-DD`.
pub fn resolve(period: &str, today: NaiveDate) -> Result<Period> {
    if let Some(months) = period.strip_suffix("m_full") {
        let months: u32 = months
            .parse()
            .map_err(|_| anyhow::anyhow!(CoreError::Validation(format!("unrecognized period alias: {period}"))))?;
        return Ok(last_n_complete_months(today, months));
    }
    if let Some((start, end)) = period.split_once("..") {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!(CoreError::Validation(format!("invalid period start date: {start}"))))?;
        let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!(CoreError::Validation(format!("invalid period end date: {end}"))))?;
        if end < start {
            return Err(anyhow::anyhow!(CoreError::Validation("period end precedes start".to_string())));
        }
        return Ok(Period { start, end });
    }
    Err(anyhow::anyhow!(CoreError::Validation(format!("unrecognized period: {period}"))))
}
