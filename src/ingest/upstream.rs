//! Client surface over the upstream bookkeeping service. The HTTP
//! implementation lives behind a trait so ingest runs can be tested against
//! a fake without a network dependency (the upstream service is an
//! out-of-scope external collaborator per spec §1).

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use crate::error::Result;

/// One transaction as reported by the upstream service, before account or
/// category resolution.
#[derive(Debug, Clone)]
pub struct UpstreamTransaction {
    pub account_name: String,
    pub account_type: String,
    pub currency: String,
    pub posted_at: NaiveDate,
    pub amount_cents: i64,
    pub payee: String,
    pub memo: Option<String>,
    pub external_id: String,
    pub external_category_id: String,
    pub is_cleared: bool,
    pub import_meta: Option<String>,
}

/// One category as reported by the upstream service's category list.
#[derive(Debug, Clone)]
pub struct UpstreamCategory {
    pub external_id: String,
    pub name: String,
}

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch_delta(&self, since: &str) -> Result<Vec<UpstreamTransaction>>;
    async fn fetch_backfill(&self, months: u32) -> Result<Vec<UpstreamTransaction>>;

    /// Fetches the upstream's current category list, for `sync-categories`
    /// (spec §4.2). Only `delta`/`backfill` ingest requires transaction
    /// fetches; category sync is a separate, occasional operation, so this
    /// has its own method rather than being bundled into a transaction
    /// fetch.
    async fn fetch_categories(&self) -> Result<Vec<UpstreamCategory>>;
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    transactions: Vec<UpstreamTransactionWire>,
}

#[derive(Debug, Deserialize)]
struct UpstreamCategoriesResponse {
    categories: Vec<UpstreamCategoryWire>,
}

#[derive(Debug, Deserialize)]
struct UpstreamCategoryWire {
    id: String,
    name: String,
}

impl From<UpstreamCategoryWire> for UpstreamCategory {
    fn from(w: UpstreamCategoryWire) -> Self {
        UpstreamCategory { external_id: w.id, name: w.name }
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamTransactionWire {
    account_name: String,
    account_type: String,
    currency: String,
    posted_at: NaiveDate,
    amount_cents: i64,
    payee: String,
    memo: Option<String>,
    external_id: String,
    category_id: String,
    is_cleared: bool,
}

impl From<UpstreamTransactionWire> for UpstreamTransaction {
    fn from(w: UpstreamTransactionWire) -> Self {
        UpstreamTransaction {
            account_name: w.account_name,
            account_type: w.account_type,
            currency: w.currency,
            posted_at: w.posted_at,
            amount_cents: w.amount_cents,
            payee: w.payee,
            memo: w.memo,
            external_id: w.external_id,
            external_category_id: w.category_id,
            is_cleared: w.is_cleared,
            import_meta: None,
        }
    }
}

/// Bounded backoff for transient transport errors (spec §4.1 Failure policy,
/// §7 UpstreamError): a 5xx or a dropped connection shouldn't fail the whole
/// run on the first blip. Permanent errors (4xx, bad JSON) exhaust the same
/// number of attempts too, since the client has no reliable way to tell the
/// two apart from a bare `reqwest::Error` — the run still fails afterward,
/// just not after one try.
const MAX_FETCH_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 200;

async fn retry_with_backoff<T, F, Fut>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt_no in 0..MAX_FETCH_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt_no + 1 < MAX_FETCH_ATTEMPTS {
                    let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt_no);
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

pub struct HttpUpstreamClient {
    client: Client,
    base_url: String,
}

impl HttpUpstreamClient {
    pub fn new(base_url: impl Into<String>, api_key: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth_value = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let client = Client::builder()
            .user_agent("runway-ingestor/1.0")
            .default_headers(headers)
            .build()?;
        Ok(Self { client, base_url: base_url.into() })
    }

    async fn fetch(&self, query: &str) -> Result<Vec<UpstreamTransaction>> {
        let url = format!("{}/transactions?{}", self.base_url, query);
        retry_with_backoff(|| async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(anyhow::anyhow!("upstream returned {}", response.status()));
            }
            let parsed: UpstreamResponse = response.json().await?;
            Ok(parsed.transactions.into_iter().map(Into::into).collect())
        })
        .await
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn fetch_delta(&self, since: &str) -> Result<Vec<UpstreamTransaction>> {
        self.fetch(&format!("since={since}")).await
    }

    async fn fetch_backfill(&self, months: u32) -> Result<Vec<UpstreamTransaction>> {
        self.fetch(&format!("months={months}")).await
    }

    async fn fetch_categories(&self) -> Result<Vec<UpstreamCategory>> {
        let url = format!("{}/categories", self.base_url);
        retry_with_backoff(|| async {
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(anyhow::anyhow!("upstream returned {}", response.status()));
            }
            let parsed: UpstreamCategoriesResponse = response.json().await?;
            Ok(parsed.categories.into_iter().map(Into::into).collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_a_transient_failure_and_eventually_succeeds() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32> = retry_with_backoff(|| async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(anyhow::anyhow!("upstream returned 503"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_and_surfaces_the_last_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32> = retry_with_backoff(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("upstream returned 500"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_FETCH_ATTEMPTS);
    }
}
