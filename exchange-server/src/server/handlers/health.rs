use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::server::{error::AppError, AppState};

/// GET /health
///
/// Liveness plus the number of pending requests and live sessions.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let activity = state.verifier.activity().await?;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "active_requests": activity.active_requests,
        "active_sessions": activity.active_sessions,
    })))
}
