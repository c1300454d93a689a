//! Persisted entity types, mirroring the tables defined in
//! `db/migrations/0001_init.sql`.

mod ledger;
mod ops;
mod schedule;

pub use ledger::{Account, Category, CategoryMap, Transaction};
pub use ops::{
    Alert, ForecastSnapshot, IngestAudit, IngestStatus, QuestionCategoryAlias, SourceCursor,
};
pub use schedule::{
    AccountAnchor, Commitment, DueRule, KeySpendEvent, ScheduledInflow, ShiftPolicy, Weekday,
};
