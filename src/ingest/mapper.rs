//! Category Mapper (spec §4.2): snapshots the upstream category list into
//! `categories(source=<external>)`, then assigns each `(source,
//! external_id)` exactly once to an internal category. The assignment is
//! monotonic — once a `CategoryMap` row exists, `sync_categories` never
//! touches it again, so re-running a sync is always safe.

use rusqlite::Connection;
use tracing::info;

use crate::db::categories;
use crate::error::Result;

use super::upstream::UpstreamClient;

/// Runs one category sync for `source` against `client`. Returns the number
/// of `(source, external_id)` pairs newly mapped (existing mappings are left
/// untouched and not counted).
pub async fn sync_categories(conn: &Connection, source: &str, client: &dyn UpstreamClient) -> Result<i64> {
    let upstream_categories = client.fetch_categories().await?;

    let mut newly_mapped = 0i64;
    for upstream_category in &upstream_categories {
        categories::upsert_external_category(conn, source, &upstream_category.external_id, &upstream_category.name)?;

        if categories::get_category_map(conn, source, &upstream_category.external_id)?.is_some() {
            continue;
        }

        let internal_category_id = match categories::find_internal_by_name_ci(conn, &upstream_category.name)? {
            Some(existing) => existing.id,
            None => categories::holding_category_id(conn)?,
        };

        categories::insert_category_map_if_absent(conn, source, &upstream_category.external_id, internal_category_id)?;
        newly_mapped += 1;
    }

    info!(source, upstream_categories = upstream_categories.len(), newly_mapped, "category sync complete");
    Ok(newly_mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_for_tests;
    use crate::ingest::{UpstreamCategory, UpstreamTransaction};
    use async_trait::async_trait;

    struct FakeUpstream {
        categories: Vec<UpstreamCategory>,
    }

    #[async_trait]
    impl UpstreamClient for FakeUpstream {
        async fn fetch_delta(&self, _since: &str) -> Result<Vec<UpstreamTransaction>> {
            Ok(vec![])
        }

        async fn fetch_backfill(&self, _months: u32) -> Result<Vec<UpstreamTransaction>> {
            Ok(vec![])
        }

        async fn fetch_categories(&self) -> Result<Vec<UpstreamCategory>> {
            Ok(self.categories.clone())
        }
    }

    #[tokio::test]
    async fn unmatched_categories_fall_back_to_holding() {
        let conn = open_memory_for_tests();
        let upstream = FakeUpstream {
            categories: vec![UpstreamCategory { external_id: "cat-1".into(), name: "Mystery Fees".into() }],
        };

        sync_categories(&conn, "chase", &upstream).await.unwrap();

        let mapped = categories::get_category_map(&conn, "chase", "cat-1").unwrap().unwrap();
        let holding_id = categories::holding_category_id(&conn).unwrap();
        assert_eq!(mapped.internal_category_id, holding_id);
    }

    #[tokio::test]
    async fn matching_internal_category_name_is_preferred_over_holding() {
        let conn = open_memory_for_tests();
        let groceries_id = categories::ensure_internal_category(&conn, "Groceries").unwrap();
        let upstream = FakeUpstream {
            categories: vec![UpstreamCategory { external_id: "cat-1".into(), name: "groceries".into() }],
        };

        sync_categories(&conn, "chase", &upstream).await.unwrap();

        let mapped = categories::get_category_map(&conn, "chase", "cat-1").unwrap().unwrap();
        assert_eq!(mapped.internal_category_id, groceries_id);
    }

    #[tokio::test]
    async fn running_sync_twice_never_moves_an_existing_mapping() {
        let conn = open_memory_for_tests();
        categories::ensure_internal_category(&conn, "Groceries").unwrap();
        let upstream = FakeUpstream {
            categories: vec![UpstreamCategory { external_id: "cat-1".into(), name: "Mystery Fees".into() }],
        };

        sync_categories(&conn, "chase", &upstream).await.unwrap();
        let first = categories::get_category_map(&conn, "chase", "cat-1").unwrap().unwrap();

        // A later sync sees "Mystery Fees" renamed to something that would
        // now match an internal category; the existing mapping must not move.
        categories::ensure_internal_category(&conn, "Mystery Fees").unwrap();
        sync_categories(&conn, "chase", &upstream).await.unwrap();
        let second = categories::get_category_map(&conn, "chase", "cat-1").unwrap().unwrap();

        assert_eq!(first.internal_category_id, second.internal_category_id);
    }

    #[tokio::test]
    async fn second_sync_reports_zero_newly_mapped_categories() {
        let conn = open_memory_for_tests();
        let upstream = FakeUpstream {
            categories: vec![UpstreamCategory { external_id: "cat-1".into(), name: "Mystery Fees".into() }],
        };

        let first_count = sync_categories(&conn, "chase", &upstream).await.unwrap();
        let second_count = sync_categories(&conn, "chase", &upstream).await.unwrap();

        assert_eq!(first_count, 1);
        assert_eq!(second_count, 0);
    }
}
