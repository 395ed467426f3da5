use axum::{extract::State, response::IntoResponse, Json};
use tracing::info;

use super::models::{GetGeoRequest, WarningsResponse};
use super::state::AppState;

pub async fn get_geo(
    State(state): State<AppState>,
    Json(request): Json<GetGeoRequest>,
) -> impl IntoResponse {
    let query = request.to_query();

    let missing = query.missing_fields();
    if !missing.is_empty() {
        info!(?missing, "rejecting incomplete query");
        return Json(serde_json::json!(WarningsResponse::missing_fields(&missing)));
    }

    let outcome = state.pipeline.resolve(query).await;

    if request.show == "coords" {
        Json(serde_json::json!(outcome.coords))
    } else {
        Json(serde_json::json!(outcome))
    }
}

pub async fn health() -> &'static str {
    "ok"
}
