//! CSV import mode: a fixed-schema export from the upstream bookkeeping
//! service (`payee,memo,external_id,posted_at,amount_cents,is_cleared`).

use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CsvTransaction {
    pub posted_at: NaiveDate,
    pub amount_cents: i64,
    pub payee: String,
    pub memo: Option<String>,
    pub external_id: String,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    payee: String,
    memo: Option<String>,
    external_id: String,
    posted_at: NaiveDate,
    amount_cents: i64,
    #[serde(default)]
    #[allow(dead_code)]
    is_cleared: Option<bool>,
}

pub fn import_csv(path: &Path) -> Result<Vec<CsvTransaction>> {
    info!(path = %path.display(), "importing CSV");

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening CSV file {}", path.display()))?;

    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        match result {
            Ok(row) => rows.push(CsvTransaction {
                posted_at: row.posted_at,
                amount_cents: row.amount_cents,
                payee: row.payee,
                memo: row.memo,
                external_id: row.external_id,
            }),
            Err(e) => warn!(row = idx + 2, error = %e, "skipping malformed CSV row"),
        }
    }

    info!(rows = rows.len(), "CSV import parsed");
    Ok(rows)
}
