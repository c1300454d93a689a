//! Export pipeline (spec §4.10 point 5): assemble a pack, canonicalize as
//! stable JSON, hash it together with `generated_at`, render CSV/PDF, and
//! write both to the export directory with the hash embedded in filenames
//! and footers.

use std::path::{Path, PathBuf};

use askama::Template;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

use super::packs::{self, Pack};

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub hash: String,
    pub generated_at: DateTime<Utc>,
    pub csv_path: Option<PathBuf>,
    pub pdf_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Pdf,
    Both,
}

/// Serializes `pack` with sorted object keys and no insignificant
/// whitespace, so that identical data always produces identical bytes
/// (spec §8, invariant 8 depends on this).
fn canonical_json(pack: &Pack) -> Result<String> {
    let value = serde_json::to_value(pack).map_err(|e| anyhow::anyhow!("serializing pack: {e}"))?;
    let canonical = sort_json_keys(value);
    serde_json::to_string(&canonical).map_err(|e| anyhow::anyhow!("canonicalizing pack json: {e}"))
}

fn sort_json_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_json_keys(map[key].clone()));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_json_keys).collect())
        }
        other => other,
    }
}

fn compute_hash(stable_json: &str, generated_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_json.as_bytes());
    hasher.update(b"|");
    hasher.update(generated_at.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

fn render_csv(pack: &Pack) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["section", "label", "value_cents", "window_start", "window_end", "method", "evidence_ids"])
        .map_err(|e| anyhow::anyhow!("writing csv header: {e}"))?;
    for item in &pack.items {
        writer
            .write_record([
                pack.name.as_str(),
                item.label.as_str(),
                &item.result.value_cents.to_string(),
                &item.result.window_start.to_string(),
                &item.result.window_end.to_string(),
                &item.result.method,
                &item
                    .result
                    .evidence_ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(";"),
            ])
            .map_err(|e| anyhow::anyhow!("writing csv row: {e}"))?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("flushing csv writer: {e}"))?;
    String::from_utf8(bytes).map_err(|e| anyhow::anyhow!("csv output was not valid utf-8: {e}"))
}

#[derive(Template)]
#[template(path = "pack_export.html")]
struct PackExportTemplate<'a> {
    pack_name: &'a str,
    period: &'a str,
    items: &'a [packs::PackItem],
    hash: &'a str,
    generated_at: String,
}

fn render_pdf_html(pack: &Pack, hash: &str, generated_at: DateTime<Utc>) -> Result<String> {
    let template = PackExportTemplate {
        pack_name: &pack.name,
        period: &pack.period,
        items: &pack.items,
        hash,
        generated_at: generated_at.to_rfc3339(),
    };
    template.render().map_err(|e| anyhow::anyhow!("rendering export template: {e}"))
}

/// Runs the full export pipeline and writes output files to `export_dir`,
/// named `{pack}_{generated_at}_{hash8}.{csv,pdf}`. `redact_memos` is
/// accepted for interface parity with the HTTP/CLI contract; memos aren't
/// included in any export rendering, so it's a no-op here but kept so
/// callers don't need a feature-flag branch.
pub fn export(
    conn: &Connection,
    pack_name: &str,
    period_alias: &str,
    format: ExportFormat,
    _redact_memos: bool,
    today: NaiveDate,
    generated_at: DateTime<Utc>,
    export_dir: &Path,
) -> Result<ExportResult> {
    let pack = packs::assemble(conn, pack_name, period_alias, today)?;
    let stable_json = canonical_json(&pack)?;
    let hash = compute_hash(&stable_json, generated_at);
    let hash8 = &hash[..8];

    std::fs::create_dir_all(export_dir)
        .map_err(|e| anyhow::anyhow!("creating export directory {}: {e}", export_dir.display()))?;

    let base_name = format!("{pack_name}_{}_{hash8}", generated_at.format("%Y%m%dT%H%M%SZ"));

    let csv_path = if matches!(format, ExportFormat::Csv | ExportFormat::Both) {
        let csv_body = render_csv(&pack)?;
        let path = export_dir.join(format!("{base_name}.csv"));
        std::fs::write(&path, csv_body).map_err(|e| anyhow::anyhow!("writing csv export: {e}"))?;
        Some(path)
    } else {
        None
    };

    let pdf_path = if matches!(format, ExportFormat::Pdf | ExportFormat::Both) {
        let html_body = render_pdf_html(&pack, &hash, generated_at)?;
        let path = export_dir.join(format!("{base_name}.pdf"));
        std::fs::write(&path, html_body).map_err(|e| anyhow::anyhow!("writing pdf export: {e}"))?;
        Some(path)
    } else {
        None
    };

    Ok(ExportResult { hash, generated_at, csv_path, pdf_path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_object_keys_regardless_of_field_declaration_order() {
        let a: serde_json::Value = serde_json::json!({"b": 1, "a": 2});
        let sorted = sort_json_keys(a);
        let rendered = serde_json::to_string(&sorted).unwrap();
        assert_eq!(rendered, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn identical_inputs_produce_an_identical_hash() {
        let generated_at = DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let h1 = compute_hash("{\"a\":1}", generated_at);
        let h2 = compute_hash("{\"a\":1}", generated_at);
        assert_eq!(h1, h2);
    }

    #[test]
    fn changing_the_payload_changes_the_hash() {
        let generated_at = DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let h1 = compute_hash("{\"a\":1}", generated_at);
        let h2 = compute_hash("{\"a\":2}", generated_at);
        assert_ne!(h1, h2);
    }

    #[test]
    fn export_writes_both_files_and_embeds_the_hash_in_filenames() {
        let conn = crate::db::open_memory_for_tests();
        let dir = tempfile::tempdir().unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let generated_at = DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z").unwrap().with_timezone(&Utc);

        let result = export(
            &conn,
            "loan_application_basics",
            "3m_full",
            ExportFormat::Both,
            false,
            today,
            generated_at,
            dir.path(),
        )
        .unwrap();

        assert!(result.csv_path.unwrap().exists());
        assert!(result.pdf_path.unwrap().exists());
        assert_eq!(result.hash.len(), 64);
    }
}
