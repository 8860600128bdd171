use axum::{extract::State, http::StatusCode, Json};

use super::error_response;
use crate::api::{state::AppState, types::*};

/// GET /health -- liveness probe; reports whether a policy is loaded
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_loaded = state.trader.policy().is_loaded().await;
    Json(HealthResponse {
        status: if model_loaded { "ok" } else { "degraded" }.to_string(),
        model_loaded,
        uptime_secs: state.uptime_seconds(),
    })
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let ledger = state.trader.ledger();
    Json(StatusResponse {
        trader: state.trader.status().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger_dir: ledger.local_dir().display().to_string(),
        replica: ledger.replica_kind().to_string(),
    })
}

/// POST /reload_model
pub async fn reload_model(
    State(state): State<AppState>,
) -> std::result::Result<Json<ReloadResponse>, (StatusCode, String)> {
    let loaded = state.trader.reload_model().await.map_err(|e| {
        // A failed reload leaves the previous policy serving.
        let (_, msg) = error_response(e);
        (StatusCode::SERVICE_UNAVAILABLE, msg)
    })?;

    Ok(Json(ReloadResponse {
        ok: true,
        model: loaded.policy.name().to_string(),
        reference: loaded.reference,
        loaded_at: loaded.loaded_at,
    }))
}
