use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use runway::cli::{dispatch, Cli};
use runway::config::Config;
use runway::error::CoreError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let stdout_is_tty = std::io::stdout().is_terminal();
    let disable_color = cli.no_color || !stdout_is_tty || cli.json;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_ansi(!disable_color).with_writer(std::io::stderr).with_env_filter(env_filter).init();
    if disable_color {
        colored::control::set_override(false);
    }

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: loading configuration: {e}");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Some(command) => run_cli_command(command, &config, cli.json).await,
        None => run_server(config).await,
    }
}

async fn run_cli_command(command: runway::cli::Commands, config: &Config, json: bool) -> ExitCode {
    let internal = match runway::cli::to_internal_command(command) {
        Ok(c) => c,
        Err(e) => return report_error(&e, json),
    };
    match dispatch(internal, config, json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e, json),
    }
}

fn report_error(e: &anyhow::Error, json: bool) -> ExitCode {
    let exit_code = e.downcast_ref::<CoreError>().map(CoreError::exit_code).unwrap_or(2);
    if json {
        let body = serde_json::json!({ "success": false, "error": e.to_string() });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("error: {e:#}");
    }
    ExitCode::from(exit_code as u8)
}

/// No-subcommand launch: the HTTP surface plus the internal scheduler,
/// which is the service's normal running mode (spec §5).
#[cfg(feature = "server")]
async fn run_server(config: Config) -> ExitCode {
    let conn = match runway::db::open_db(&config.db_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: opening database: {e}");
            return ExitCode::from(2);
        }
    };

    if config.scheduler_enabled {
        let sources = scheduled_sources(&config);
        runway::scheduler::spawn(config.clone(), sources);
    }

    if let Err(e) = runway::http::serve(conn, config).await {
        eprintln!("error: HTTP server exited: {e:#}");
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}

#[cfg(feature = "server")]
fn scheduled_sources(config: &Config) -> Vec<runway::scheduler::ScheduledSource> {
    use std::sync::Arc;

    config
        .ingest_sources
        .iter()
        .filter_map(|source| {
            let env_key = source
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect::<String>();
            let base_url = std::env::var(format!("{env_key}_BASE_URL")).ok()?;
            let api_key = std::env::var(format!("{env_key}_API_KEY")).ok()?;
            let client = runway::ingest::HttpUpstreamClient::new(base_url, &api_key).ok()?;
            Some(runway::scheduler::ScheduledSource { name: source.clone(), client: Arc::new(client) })
        })
        .collect()
}

/// Without the `server` feature, the process only understands `ctl`
/// subcommands; running it bare has nothing to launch.
#[cfg(not(feature = "server"))]
async fn run_server(_config: Config) -> ExitCode {
    eprintln!("error: this build has no HTTP server (compiled without the \"server\" feature); pass a subcommand instead");
    ExitCode::from(1)
}
