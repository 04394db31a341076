use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

// Liveness probe - public, reports the operating mode
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "mode": state.config.server.mode.as_str(),
    }))
}
