use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // System endpoints
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::get_status))
        .route("/reload_model", post(handlers::reload_model))
        // Trading endpoints
        .route("/tick", post(handlers::tick))
        .route("/recent", get(handlers::get_recent))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
