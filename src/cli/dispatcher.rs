//! Executes a validated internal `Command` against the store, printing
//! human-readable or (`--json`) machine-readable output to stdout. Mirrors
//! the teacher's `dispatcher::dispatch_command` shape: one `match` routing
//! to a handler function per command.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::db::{accounts, anchors};
use crate::error::{CoreError, Result};
use crate::ingest::{self, HttpUpstreamClient, Mode, UpstreamClient};

use super::commands::{Command, IngestSource};

#[derive(Serialize)]
struct JsonResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn print_json<T: Serialize>(data: T) {
    let body = serde_json::to_string_pretty(&JsonResponse { success: true, data: Some(data), error: None })
        .unwrap_or_else(|e| format!(r#"{{"success":false,"error":"serializing response: {e}"}}"#));
    println!("{body}");
}

/// Builds an `HttpUpstreamClient` for `source` from `{SOURCE}_BASE_URL` and
/// `{SOURCE}_API_KEY` (uppercased, non-alphanumeric replaced with `_`).
/// Credentials never appear in logs or output.
fn client_for_source(source: &str) -> Result<HttpUpstreamClient> {
    let env_key = source
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect::<String>();
    let base_url = std::env::var(format!("{env_key}_BASE_URL"))
        .map_err(|_| anyhow::anyhow!(CoreError::Validation(format!("{env_key}_BASE_URL is not set"))))?;
    let api_key = std::env::var(format!("{env_key}_API_KEY"))
        .map_err(|_| anyhow::anyhow!(CoreError::Validation(format!("{env_key}_API_KEY is not set"))))?;
    HttpUpstreamClient::new(base_url, &api_key)
}

pub async fn dispatch(command: Command, config: &Config, json: bool) -> Result<()> {
    match command {
        Command::Ingest { source, mode } => dispatch_ingest(&source, mode, config, json).await,
        Command::SyncCategories { source } => dispatch_sync_categories(&source, config, json).await,
        Command::Reconcile => dispatch_reconcile(config, json).await,
        Command::DbMigrate => dispatch_db_migrate(config, json),
        Command::DbReset { force, populate } => dispatch_db_reset(force, populate, config, json).await,
    }
}

async fn dispatch_ingest(source: &str, mode: IngestSource, config: &Config, json: bool) -> Result<()> {
    let mut conn = crate::db::open_db(&config.db_path)?;
    let rows_upserted = run_ingest(&mut conn, source, &mode).await?;
    if json {
        print_json(serde_json::json!({ "source": source, "rows_upserted": rows_upserted }));
    } else {
        println!("ingested {rows_upserted} row(s) from {source}");
    }
    Ok(())
}

/// Runs one ingest against an already-open connection; shared by `ctl
/// ingest` and `db reset`'s post-reset populate step.
async fn run_ingest(conn: &mut Connection, source: &str, mode: &IngestSource) -> Result<i64> {
    match mode {
        IngestSource::Upstream { delta, months } => {
            let client = client_for_source(source)?;
            let ingest_mode = if *delta { Mode::Delta } else { Mode::Backfill { months: months.unwrap_or(3) } };
            ingest::run_delta_or_backfill(conn, source, &client, ingest_mode).await
        }
        IngestSource::Csv { path, account } => {
            ingest::run_csv_import(conn, source, path, account, "checking", "USD")
        }
    }
}

async fn dispatch_sync_categories(source: &str, config: &Config, json: bool) -> Result<()> {
    let conn = crate::db::open_db(&config.db_path)?;
    let client = client_for_source(source)?;
    let newly_mapped = ingest::sync_categories(&conn, source, &client).await?;
    if json {
        print_json(serde_json::json!({ "source": source, "newly_mapped": newly_mapped }));
    } else {
        println!("category sync for {source} complete, {newly_mapped} newly mapped");
    }
    Ok(())
}

async fn dispatch_reconcile(config: &Config, json: bool) -> Result<()> {
    let conn = crate::db::open_db(&config.db_path)?;
    let clock = crate::clock::SystemClock;

    crate::snapshot_job::run(&conn, &clock, config.buffer_floor_cents)?;

    let all_anchors = anchors::list_all(&conn)?;
    let accounts_by_id: HashMap<i64, crate::models::Account> =
        accounts::list_all(&conn)?.into_iter().map(|a| (a.id, a)).collect();
    let alerts_created =
        crate::alerts::evaluate(&conn, &all_anchors, &config.overdraft_alert_thresholds, &accounts_by_id, &config.tunables)?;

    let digest = crate::snapshot_job::digest(&conn, &clock, config.buffer_floor_cents)?;

    info!(alerts_created, "reconcile complete");
    if json {
        print_json(serde_json::json!({ "alerts_created": alerts_created, "digest": digest }));
    } else {
        println!("reconcile complete: {alerts_created} alert(s) created");
        if let Some(d) = digest {
            println!(
                "safe to spend today: {} cents, min balance {} on {}",
                d.safe_to_spend_today_cents, d.min_balance_cents, d.min_balance_date
            );
        }
    }
    Ok(())
}

fn dispatch_db_migrate(config: &Config, json: bool) -> Result<()> {
    // `open_db` runs migrations as part of opening; a dedicated call here
    // just makes the effect observable without opening the full store.
    let mut conn = Connection::open(&config.db_path)
        .map_err(|e| anyhow::anyhow!(CoreError::Db(e)))?;
    crate::db::migrations::run_migrations(&mut conn)?;
    if json {
        print_json(serde_json::json!({ "migrated": true }));
    } else {
        println!("migrations applied");
    }
    Ok(())
}

async fn dispatch_db_reset(force: bool, populate: Option<IngestSource>, config: &Config, json: bool) -> Result<()> {
    if !force {
        return Err(anyhow::anyhow!(CoreError::Validation(
            "db reset is destructive; pass --force to confirm".to_string()
        )));
    }

    if config.db_path.exists() {
        std::fs::remove_file(&config.db_path)?;
    }
    let mut conn = crate::db::open_db(&config.db_path)?;

    let mut total_rows = 0i64;
    if let Some(mode) = populate {
        for source in &config.ingest_sources {
            total_rows += run_ingest(&mut conn, source, &mode).await?;
        }
    }

    if json {
        print_json(serde_json::json!({ "reset": true, "rows_populated": total_rows }));
    } else {
        println!("database reset; {total_rows} row(s) re-populated across {} source(s)", config.ingest_sources.len());
    }
    Ok(())
}
