use super::AppState;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "service": "cartsmart-composer"}))
}

/// Readiness plus the number of open composition sessions.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let open_sessions = state.composer.session_count().await;
    Json(serde_json::json!({"status": "ready", "openSessions": open_sessions}))
}
