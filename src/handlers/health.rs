use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Completion time of the latest batch scan (epoch ms)
    pub last_scan_ms: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let last_scan_ms = state
        .scan_state
        .latest
        .read()
        .await
        .as_ref()
        .map(|snapshot| snapshot.as_of_ms);

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        last_scan_ms,
    }))
}
