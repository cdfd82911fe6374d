//! Panel endpoint handlers.
//!
//! `PanelState` carries `Arc` references to the prober, the sweeper and
//! the resolver, so cloning it per request is cheap.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use stratum_core::{DiagnosticReport, SyncStatus};
use tracing::info;

use crate::error::MigrationError;
use crate::migration::{MigrationReport, MigrationSweeper};
use crate::prober::StatusProber;
use crate::resolver::Resolver;

/// Shared state for all panel handlers.
#[derive(Clone)]
pub struct PanelState {
    pub prober: Arc<StatusProber>,
    pub sweeper: Arc<MigrationSweeper>,
    pub resolver: Arc<Resolver>,
    /// Panel start time, for uptime.
    pub start_time: Instant,
}

/// Liveness and a one-line sync summary. Always 200.
pub async fn health_handler(State(state): State<PanelState>) -> Json<serde_json::Value> {
    let status = state.resolver.tracker().status();
    Json(json!({
        "syncState": status.state.as_str(),
        "policy": state.resolver.policy().as_str(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Runs a probe round and returns the report as JSON.
pub async fn diagnostics_handler(State(state): State<PanelState>) -> Json<DiagnosticReport> {
    Json(state.prober.probe().await)
}

/// Runs a probe round and returns the human-readable rendering.
pub async fn diagnostics_text_handler(State(state): State<PanelState>) -> impl IntoResponse {
    let report = state.prober.probe().await;
    (
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        report.render_text(),
    )
}

pub async fn sync_status_handler(State(state): State<PanelState>) -> Json<SyncStatus> {
    Json(state.resolver.tracker().status())
}

/// "Force sync": sweeps the current user's local entries into remote tiers.
///
/// Returns 409 when nobody is signed in and 503 when the resolver has no
/// remote tier to migrate into.
pub async fn force_sync_handler(
    State(state): State<PanelState>,
) -> Result<Json<MigrationReport>, (StatusCode, Json<serde_json::Value>)> {
    match state.sweeper.migrate_current_user().await {
        Ok(report) => {
            info!(
                migrated = report.migrated_count,
                failed = report.failed_keys.len(),
                "force sync requested from panel"
            );
            Ok(Json(report))
        }
        Err(err) => {
            let status = match err {
                MigrationError::Unauthenticated => StatusCode::CONFLICT,
                MigrationError::InvalidScope(_) => StatusCode::UNPROCESSABLE_ENTITY,
                MigrationError::NoRemoteTier { .. } => StatusCode::SERVICE_UNAVAILABLE,
            };
            Err((status, Json(json!({ "error": err.to_string() }))))
        }
    }
}
