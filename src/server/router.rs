use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::state::AppState;

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/getgeo", post(handlers::get_geo))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
