use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Health check endpoint, also reports when the last screen finished.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let last_screen = state.screener.latest().await.map(|r| r.finished_at);
    Json(json!({
        "status": "ok",
        "data_source": state.data_source.to_string(),
        "universe": state.universe.len(),
        "last_screen": last_screen,
    }))
}
