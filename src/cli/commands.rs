//! Converts parsed `clap` commands into a validated internal `Command`.
//! Validation failures here are usage errors (exit code 1); everything past
//! this point is an operational failure (exit code 2).

use std::path::PathBuf;

use crate::error::Result;

use super::{CategoriesCommands, Commands, DbCommands};

#[derive(Debug, Clone)]
pub enum IngestSource {
    Upstream { delta: bool, months: Option<u32> },
    Csv { path: PathBuf, account: String },
}

#[derive(Debug, Clone)]
pub enum Command {
    Ingest { source: String, mode: IngestSource },
    SyncCategories { source: String },
    Reconcile,
    DbMigrate,
    DbReset { force: bool, populate: Option<IngestSource> },
}

/// Converts a parsed `Commands` value into the internal `Command`, rejecting
/// flag combinations `clap`'s `conflicts_with`/`requires` can't express
/// (e.g. no mode flag given at all).
pub fn to_internal_command(c: Commands) -> Result<Command> {
    match c {
        Commands::Ingest { source, delta, backfill, months, from_csv, account } => {
            let mode = ingest_mode(delta, backfill, months, from_csv, account)?;
            Ok(Command::Ingest { source, mode })
        }

        Commands::Categories { action } => match action {
            CategoriesCommands::Sync { source } => Ok(Command::SyncCategories { source }),
        },

        Commands::Reconcile => Ok(Command::Reconcile),

        Commands::Db { action } => match action {
            DbCommands::Migrate => Ok(Command::DbMigrate),
            DbCommands::Reset { force, no_populate, delta, backfill, months } => {
                let populate = if no_populate {
                    None
                } else {
                    Some(IngestSource::Upstream { delta: delta || !backfill, months })
                };
                Ok(Command::DbReset { force, populate })
            }
        },
    }
}

fn ingest_mode(
    delta: bool,
    backfill: bool,
    months: Option<u32>,
    from_csv: Option<PathBuf>,
    account: Option<String>,
) -> Result<IngestSource> {
    match (delta, backfill, from_csv) {
        (true, false, None) => Ok(IngestSource::Upstream { delta: true, months: None }),
        (false, true, None) => Ok(IngestSource::Upstream { delta: false, months }),
        (false, false, Some(path)) => {
            let account = account.ok_or_else(|| {
                anyhow::anyhow!(crate::error::CoreError::Validation(
                    "--from-csv requires --account".to_string()
                ))
            })?;
            Ok(IngestSource::Csv { path, account })
        }
        (false, false, None) => Err(anyhow::anyhow!(crate::error::CoreError::Validation(
            "ingest requires one of --delta, --backfill, or --from-csv".to_string()
        ))),
        _ => Err(anyhow::anyhow!(crate::error::CoreError::Validation(
            "ingest accepts exactly one of --delta, --backfill, or --from-csv".to_string()
        ))),
    }
}
