use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::QuestionCategoryAlias;

pub fn resolve(conn: &Connection, alias: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT category_id FROM question_category_aliases WHERE alias = ?1",
        params![alias],
        |row| row.get(0),
    )
    .optional()
    .context("resolving question category alias")
}

pub fn upsert(conn: &Connection, alias: &str, category_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO question_category_aliases (alias, category_id) VALUES (?1, ?2)
         ON CONFLICT(alias) DO UPDATE SET category_id = excluded.category_id",
        params![alias, category_id],
    )
    .context("upserting question category alias")?;
    Ok(())
}

pub fn list_all(conn: &Connection) -> Result<Vec<QuestionCategoryAlias>> {
    let mut stmt = conn.prepare("SELECT alias, category_id FROM question_category_aliases ORDER BY alias")?;
    let rows = stmt.query_map([], |row| {
        Ok(QuestionCategoryAlias { alias: row.get(0)?, category_id: row.get(1)? })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("listing question category aliases")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{categories, open_memory_for_tests};

    #[test]
    fn alias_resolves_to_the_mapped_category() {
        let conn = open_memory_for_tests();
        let cat = categories::ensure_internal_category(&conn, "Groceries").unwrap();
        upsert(&conn, "food", cat).unwrap();
        assert_eq!(resolve(&conn, "food").unwrap(), Some(cat));
        assert_eq!(resolve(&conn, "unknown").unwrap(), None);
    }
}
