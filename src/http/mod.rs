//! HTTP/JSON surface (spec §6). Read routes are mounted with no auth gate;
//! write routes run behind `auth::require_admin_and_csrf` via
//! `route_layer`, so a read-only consumer can never reach a write handler
//! regardless of what headers it sends — mirrors the protected/public route
//! split the pack's axum backend uses.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use state::AppState;

fn build_router(state: AppState) -> Router {
    let read_routes = Router::new()
        .route("/forecast/calendar", get(handlers::forecast::calendar))
        .route("/forecast/blended", get(handlers::forecast::blended))
        .route("/calendar", get(handlers::calendar::calendar))
        .route("/key-events", get(handlers::calendar::key_events))
        .route("/overview", get(handlers::overview::overview))
        .route("/q/packs/:pack", get(handlers::questionnaire::pack))
        .route("/q/:query", get(handlers::questionnaire::query))
        .route("/accounts", get(handlers::accounts::list))
        .route("/accounts/anchors", get(handlers::accounts::anchors_list))
        .route("/accounts/floors", get(handlers::accounts::floors));

    let write_routes = Router::new()
        .route("/forecast/simulate-spend", post(handlers::forecast::simulate_spend))
        .route("/key-events", post(handlers::key_events::upsert))
        .route("/key-events/:id", delete(handlers::key_events::delete))
        .route("/accounts/:id/anchor", put(handlers::accounts::upsert_anchor))
        .route("/ingest/:source/delta", post(handlers::ingest::delta))
        .route("/ingest/:source/backfill", post(handlers::ingest::backfill))
        .route("/ingest/:source/from-csv", post(handlers::ingest::from_csv))
        .route("/q/export", post(handlers::questionnaire::export_pack))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_admin_and_csrf));

    Router::new().merge(read_routes).merge(write_routes).layer(CorsLayer::permissive()).with_state(state)
}

/// Binds `config.port` and serves the router until the process is killed.
/// The scheduler (if enabled) runs as a separate background task; this
/// function only owns the HTTP listener.
pub async fn serve(conn: rusqlite::Connection, config: Config) -> Result<()> {
    let port = config.port;
    let state = AppState::new(conn, config);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!(crate::error::CoreError::Io(e)))?;
    info!(%addr, "HTTP surface listening");

    axum::serve(listener, app).await.map_err(|e| anyhow::anyhow!(crate::error::CoreError::Io(e)))
}
