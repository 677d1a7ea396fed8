//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::{infrastructure::dto::ServerStateMessage, ui::state::AppState};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Connected users grouped by room, same document as the `GET_SERVER_STATE` reply
pub async fn get_server_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ServerStateMessage>, StatusCode> {
    match state.get_server_state_usecase.execute().await {
        Ok(snapshot) => Ok(Json(ServerStateMessage::from(&snapshot))),
        Err(e) => {
            tracing::error!("Failed to get server state: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
