//! `ctl` command-line surface (spec §6): ingest, category sync, reconcile,
//! and database administration. Mirrors the teacher's three-layer split —
//! `clap` parses into `Commands` here, `commands` validates and converts
//! into an internal `Command`, `dispatcher` executes it.

mod commands;
mod dispatcher;

use clap::{Parser, Subcommand};

pub use commands::{to_internal_command, Command};
pub use dispatcher::dispatch;

#[derive(Parser)]
#[command(name = "ctl")]
#[command(version, about = "Cash-flow simulator for low-buffer households")]
pub struct Cli {
    /// Emit machine-readable JSON on stdout instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output even on a TTY.
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Admin subcommand to run. Omit to launch the HTTP server and the
    /// internal scheduler (the service's normal running mode).
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull transactions from an upstream source or a CSV export.
    Ingest {
        /// Upstream source name (e.g. "chase", "plaid-checking").
        source: String,

        /// Fetch everything new since the last cursor.
        #[arg(long, conflicts_with_all = ["backfill", "from_csv"])]
        delta: bool,

        /// Re-fetch the trailing N months regardless of cursor.
        #[arg(long, conflicts_with = "from_csv", requires = "months")]
        backfill: bool,

        /// Month count for `--backfill`.
        #[arg(long)]
        months: Option<u32>,

        /// Import a CSV export instead of calling the upstream service.
        #[arg(long = "from-csv")]
        from_csv: Option<std::path::PathBuf>,

        /// Account name to attribute CSV rows to (required with `--from-csv`).
        #[arg(long)]
        account: Option<String>,
    },

    /// Category snapshot and mapping maintenance.
    Categories {
        #[command(subcommand)]
        action: CategoriesCommands,
    },

    /// Recompute the forecast snapshot and re-evaluate alerts against
    /// current stored state, without ingesting.
    Reconcile,

    /// Database administration.
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Fetch the upstream category list and assign unmapped categories.
    Sync {
        /// Upstream source name.
        source: String,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Apply any unapplied migrations.
    Migrate,

    /// Delete the database file and recreate it from migrations.
    Reset {
        /// Required to actually perform the reset.
        #[arg(long)]
        force: bool,

        /// Skip the post-reset ingest (default is to re-populate).
        #[arg(long = "no-populate")]
        no_populate: bool,

        /// Re-populate via delta ingest (default mode when populating).
        #[arg(long, conflicts_with = "backfill")]
        delta: bool,

        /// Re-populate via backfill ingest.
        #[arg(long, requires = "months")]
        backfill: bool,

        /// Month count for `--backfill`.
        #[arg(long)]
        months: Option<u32>,
    },
}
