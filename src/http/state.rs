use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::config::Config;

/// Shared application state. `rusqlite::Connection` isn't `Sync`, so
/// concurrent handlers serialize through a `tokio::sync::Mutex` — the same
/// shape the pack's `VaultDb` uses for its embedded-store handle.
#[derive(Clone)]
pub struct AppState {
    pub conn: Arc<Mutex<Connection>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(conn: Connection, config: Config) -> Self {
        Self { conn: Arc::new(Mutex::new(conn)), config: Arc::new(config) }
    }
}
