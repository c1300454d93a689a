//! Account, Transaction, Category and the frozen CategoryMap.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: String,
    pub currency: String,
    pub is_active: bool,
}

/// A single upstream or manually-entered transaction.
///
/// `idempotency_key` is the unique dedup key: `hash(source, external_id,
/// posted_at, amount_cents)`. Upsert-only; only `category_id` and
/// `is_cleared` (and `import_meta`) may change on a re-ingest of the same
/// key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: i64,
    pub idempotency_key: String,
    pub account_id: i64,
    pub posted_at: NaiveDate,
    /// Signed minor units: debit negative, credit positive.
    pub amount_cents: i64,
    pub payee: String,
    pub memo: Option<String>,
    pub external_id: String,
    pub source: String,
    pub category_id: Option<i64>,
    pub is_cleared: bool,
    pub import_meta: Option<String>,
}

impl Transaction {
    /// `idempotency_key = hash(source, external_id, posted_at, amount_cents)`.
    pub fn compute_idempotency_key(
        source: &str,
        external_id: &str,
        posted_at: NaiveDate,
        amount_cents: i64,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(b"|");
        hasher.update(external_id.as_bytes());
        hasher.update(b"|");
        hasher.update(posted_at.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(amount_cents.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub is_archived: bool,
    /// `"internal"` for the permanent internal taxonomy; an upstream
    /// source name for snapshotted external categories.
    pub source: String,
    pub external_id: Option<String>,
}

impl Category {
    pub const HOLDING_NAME: &'static str = "Holding";
    pub const INTERNAL_SOURCE: &'static str = "internal";
}

/// Frozen mapping from an external category to the permanent internal
/// category id. Unique on `(source, external_id)`; never rewrites an
/// existing internal id once assigned (see `CategoryMapper::sync`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryMap {
    pub source: String,
    pub external_id: String,
    pub internal_category_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_for_identical_inputs() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        let a = Transaction::compute_idempotency_key("chase", "ext-1", date, -12000);
        let b = Transaction::compute_idempotency_key("chase", "ext-1", date, -12000);
        assert_eq!(a, b);
    }

    #[test]
    fn idempotency_key_differs_when_any_component_differs() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        let a = Transaction::compute_idempotency_key("chase", "ext-1", date, -12000);
        let b = Transaction::compute_idempotency_key("chase", "ext-1", date, -12001);
        let c = Transaction::compute_idempotency_key("chase", "ext-2", date, -12000);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
