use crate::state::AppState;
use apidesk::catalog::{EndpointDescriptor, EndpointSummary};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

async fn list_endpoints(State(state): State<AppState>) -> Json<Vec<EndpointSummary>> {
    Json(state.catalog.summaries())
}

async fn get_endpoint(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EndpointDescriptor>, (StatusCode, Json<ErrorResponse>)> {
    match state.catalog.find(&name) {
        Some(endpoint) => Ok(Json(endpoint.clone())),
        None => {
            tracing::debug!(name = %name, "unknown endpoint requested");
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("API with name \"{}\" not found.", name),
                }),
            ))
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/endpoints", get(list_endpoints))
        .route("/api/endpoints/:name", get(get_endpoint))
        .with_state(state)
}
