//! Health check handlers.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub registered_users: usize,
    pub access_rules: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "pcbook".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        registered_users: state.users.count().await,
        access_rules: state.interceptor.policy().len(),
        timestamp: Some(chrono::Utc::now().to_rfc3339()),
    })
}

pub async fn health_check_simple() -> &'static str {
    "OK"
}
