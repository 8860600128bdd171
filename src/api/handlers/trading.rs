use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use super::error_response;
use crate::api::{state::AppState, types::*};
use crate::services::{TickRequest, TickResponse};

/// POST /tick -- make one live decision
///
/// The engine advances before the response is built; the ledger write runs in
/// a detached task and is not awaited.
pub async fn tick(
    State(state): State<AppState>,
    body: Option<Json<TickRequest>>,
) -> std::result::Result<Json<TickResponse>, (StatusCode, String)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let (response, record) = state
        .trader
        .decide(&request)
        .await
        .map_err(error_response)?;

    state.trader.spawn_record(record);
    Ok(Json(response))
}

/// GET /recent?limit=N
pub async fn get_recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> std::result::Result<Json<RecentResponse>, (StatusCode, String)> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .min(MAX_RECENT_LIMIT);
    let records = state
        .trader
        .ledger()
        .recent(limit)
        .await
        .map_err(error_response)?;

    Ok(Json(RecentResponse {
        count: records.len(),
        records,
    }))
}
