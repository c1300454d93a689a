use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Category, CategoryMap};

pub fn get(conn: &Connection, id: i64) -> Result<Option<Category>> {
    conn.query_row(
        "SELECT id, name, parent_id, is_archived, source, external_id FROM categories WHERE id = ?1",
        params![id],
        row_to_category,
    )
    .optional()
    .context("looking up category")
}

pub fn find_internal_by_name_ci(conn: &Connection, name: &str) -> Result<Option<Category>> {
    conn.query_row(
        "SELECT id, name, parent_id, is_archived, source, external_id FROM categories
         WHERE source = 'internal' AND LOWER(name) = LOWER(?1)",
        params![name],
        row_to_category,
    )
    .optional()
    .context("looking up internal category by name")
}

/// Creates the internal category if it doesn't already exist (case
/// sensitive on name for creation, case-insensitive for lookup), returning
/// its id either way.
pub fn ensure_internal_category(conn: &Connection, name: &str) -> Result<i64> {
    if let Some(existing) = find_internal_by_name_ci(conn, name)? {
        return Ok(existing.id);
    }
    conn.execute(
        "INSERT INTO categories (name, parent_id, is_archived, source, external_id) VALUES (?1, NULL, 0, 'internal', NULL)",
        params![name],
    )
    .context("inserting internal category")?;
    Ok(conn.last_insert_rowid())
}

pub fn holding_category_id(conn: &Connection) -> Result<i64> {
    ensure_internal_category(conn, Category::HOLDING_NAME)
}

/// Upserts an external category snapshot row for `(source, external_id)`.
pub fn upsert_external_category(
    conn: &Connection,
    source: &str,
    external_id: &str,
    name: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO categories (name, parent_id, is_archived, source, external_id)
         VALUES (?1, NULL, 0, ?2, ?3)
         ON CONFLICT(source, external_id) DO UPDATE SET name = excluded.name",
        params![name, source, external_id],
    )
    .context("upserting external category")?;
    conn.query_row(
        "SELECT id FROM categories WHERE source = ?1 AND external_id = ?2",
        params![source, external_id],
        |row| row.get(0),
    )
    .context("reading back upserted category id")
}

pub fn get_category_map(
    conn: &Connection,
    source: &str,
    external_id: &str,
) -> Result<Option<CategoryMap>> {
    conn.query_row(
        "SELECT source, external_id, internal_category_id FROM category_map WHERE source = ?1 AND external_id = ?2",
        params![source, external_id],
        |row| {
            Ok(CategoryMap {
                source: row.get(0)?,
                external_id: row.get(1)?,
                internal_category_id: row.get(2)?,
            })
        },
    )
    .optional()
    .context("looking up category map")
}

/// Monotonic: only inserts when no mapping exists yet for `(source,
/// external_id)`; re-running never rewrites an already-assigned internal id.
pub fn insert_category_map_if_absent(
    conn: &Connection,
    source: &str,
    external_id: &str,
    internal_category_id: i64,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO category_map (source, external_id, internal_category_id) VALUES (?1, ?2, ?3)",
        params![source, external_id, internal_category_id],
    )
    .context("inserting category map")?;
    Ok(())
}

fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        is_archived: row.get(3)?,
        source: row.get(4)?,
        external_id: row.get(5)?,
    })
}
