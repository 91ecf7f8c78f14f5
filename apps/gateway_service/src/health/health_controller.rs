use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Liveness of the gateway itself; backends are not probed.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthStatus { status: "UP" }))
}
