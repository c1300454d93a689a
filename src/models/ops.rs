//! Operational bookkeeping entities: snapshots, cursors, audits and alerts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForecastSnapshot {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub horizon_start: NaiveDate,
    pub horizon_end: NaiveDate,
    /// Serialized series + entries, as produced by the forecast engine.
    pub payload: String,
    pub min_balance_cents: i64,
    pub min_balance_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCursor {
    pub source: String,
    /// Opaque token or ISO date.
    pub last_cursor: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestStatus {
    Success,
    Partial,
    Failure,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Success => "success",
            IngestStatus::Partial => "partial",
            IngestStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(IngestStatus::Success),
            "partial" => Some(IngestStatus::Partial),
            "failure" => Some(IngestStatus::Failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestAudit {
    pub id: i64,
    pub source: String,
    pub run_started_at: DateTime<Utc>,
    pub run_finished_at: Option<DateTime<Utc>>,
    pub rows_upserted: i64,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub alert_type: String,
    pub dedupe_key: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    pub details: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionCategoryAlias {
    pub alias: String,
    pub category_id: i64,
}
