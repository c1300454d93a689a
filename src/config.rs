//! Runtime configuration: environment variables for deployment-specific
//! secrets/paths, an optional `runway.toml` for operator-tunable parameters.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_buffer_floor_cents() -> i64 {
    0
}

fn default_scheduler_hour() -> u32 {
    3
}

fn default_scheduler_minute() -> u32 {
    0
}

fn default_scheduler_tz() -> String {
    "UTC".to_string()
}

fn default_commitment_drift_cycles() -> u32 {
    3
}

fn default_commitment_drift_amount_tolerance_cents() -> i64 {
    500
}

fn default_commitment_drift_date_tolerance_days() -> i64 {
    2
}

fn default_blended_band_k() -> f64 {
    1.0
}

/// Operator-tunable parameters that are not deployment secrets, loadable
/// from a `runway.toml` file alongside the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Consecutive cycles a commitment must drift before `suggest_update` fires.
    #[serde(default = "default_commitment_drift_cycles")]
    pub commitment_drift_cycles: u32,

    /// Amount tolerance (cents) before a cycle counts as "drifted".
    #[serde(default = "default_commitment_drift_amount_tolerance_cents")]
    pub commitment_drift_amount_tolerance_cents: i64,

    /// Date tolerance (days) before a cycle counts as "drifted".
    #[serde(default = "default_commitment_drift_date_tolerance_days")]
    pub commitment_drift_date_tolerance_days: i64,

    /// Default `k` in the blended overlay's `± k * sigma` band.
    #[serde(default = "default_blended_band_k")]
    pub blended_band_k: f64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            commitment_drift_cycles: default_commitment_drift_cycles(),
            commitment_drift_amount_tolerance_cents:
                default_commitment_drift_amount_tolerance_cents(),
            commitment_drift_date_tolerance_days: default_commitment_drift_date_tolerance_days(),
            blended_band_k: default_blended_band_k(),
        }
    }
}

impl Tunables {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading tunables file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing tunables file {}", path.display()))
    }
}

/// Deployment configuration, read from the environment per the `ctl`/HTTP
/// surface contract. Credentials are held behind `Option<String>` and are
/// never logged.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub export_dir: PathBuf,
    pub base_path: String,
    /// TCP port the HTTP surface listens on when running as a server
    /// (`PORT`, default 8080). Not part of spec.md's documented environment
    /// variable list, which omits a server bind address; kept here because
    /// the process has to listen on *something*.
    pub port: u16,
    pub admin_token: Option<String>,
    pub csrf_token: Option<String>,
    pub buffer_floor_cents: i64,
    pub overdraft_alert_thresholds: HashMap<String, i64>,
    pub scheduler_enabled: bool,
    pub scheduler_hour: u32,
    pub scheduler_minute: u32,
    pub scheduler_tz: String,
    pub tunables: Tunables,
    /// Sources `db reset`'s post-reset populate step re-ingests, read from
    /// `INGEST_SOURCES` (comma-separated). Ingest against a single named
    /// source is always available through `ctl ingest <source>` regardless
    /// of this list; this only scopes the bulk re-populate convenience step.
    pub ingest_sources: Vec<String>,
}

impl Config {
    /// Load configuration from the process environment, falling back to the
    /// documented defaults. `runway.toml` next to `db_path`'s parent
    /// directory is consulted for `Tunables`, if present.
    pub fn from_env() -> Result<Self> {
        let db_path = std::env::var("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());
        let export_dir = std::env::var("EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_export_dir());
        let base_path = std::env::var("BASE_PATH").unwrap_or_default();
        let port = std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080);

        let tunables_path = db_path
            .parent()
            .map(|p| p.join("runway.toml"))
            .unwrap_or_else(|| PathBuf::from("runway.toml"));

        Ok(Self {
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            csrf_token: std::env::var("CSRF_TOKEN").ok(),
            buffer_floor_cents: std::env::var("BUFFER_FLOOR_CENTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_buffer_floor_cents),
            overdraft_alert_thresholds: std::env::var("OVERDRAFT_ALERT_THRESHOLDS")
                .ok()
                .map(|s| parse_overdraft_thresholds(&s))
                .unwrap_or_default(),
            scheduler_enabled: std::env::var("SCHEDULER_ENABLED")
                .ok()
                .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            scheduler_hour: std::env::var("SCHEDULER_HOUR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_scheduler_hour),
            scheduler_minute: std::env::var("SCHEDULER_MINUTE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_scheduler_minute),
            scheduler_tz: std::env::var("SCHEDULER_TZ").unwrap_or_else(|_| default_scheduler_tz()),
            tunables: Tunables::load(&tunables_path)?,
            ingest_sources: std::env::var("INGEST_SOURCES")
                .ok()
                .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
                .unwrap_or_default(),
            db_path,
            export_dir,
            base_path,
            port,
        })
    }
}

/// Falls back to `.` when even `dir_spec` can't place a home directory
/// (e.g. a minimal container with no `$HOME`), since `DB_PATH`/`EXPORT_DIR`
/// are always overridable via the environment anyway.
fn default_data_home() -> PathBuf {
    dir_spec::data_home().unwrap_or_else(|| PathBuf::from("."))
}

fn default_db_path() -> PathBuf {
    default_data_home().join("runway").join("data.db")
}

fn default_export_dir() -> PathBuf {
    default_data_home().join("runway").join("exports")
}

/// Parses `"acct:cents,acct2:cents2"` into a lookup by account id string.
fn parse_overdraft_thresholds(raw: &str) -> HashMap<String, i64> {
    raw.split(',')
        .filter_map(|part| {
            let (account, cents) = part.split_once(':')?;
            let cents: i64 = cents.trim().parse().ok()?;
            Some((account.trim().to_string(), cents))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overdraft_thresholds_list() {
        let parsed = parse_overdraft_thresholds("acct-1:5000,acct-2:-2000");
        assert_eq!(parsed.get("acct-1"), Some(&5000));
        assert_eq!(parsed.get("acct-2"), Some(&-2000));
    }

    #[test]
    fn tunables_default_matches_documented_values() {
        let t = Tunables::default();
        assert_eq!(t.commitment_drift_cycles, 3);
        assert_eq!(t.blended_band_k, 1.0);
    }

    #[test]
    fn tunables_load_missing_file_falls_back_to_default() {
        let t = Tunables::load(std::path::Path::new("/nonexistent/runway.toml")).unwrap();
        assert_eq!(t.commitment_drift_cycles, Tunables::default().commitment_drift_cycles);
    }
}
