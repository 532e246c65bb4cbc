//! Live pH probe status for the operator dashboard.
//!
//! Reports whether a probe is configured and its current reading. An offline
//! or misbehaving probe yields `null`, never an error status.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

// ---

#[derive(Serialize)]
struct LivePhResponse {
    configured: bool,
    ph: Option<f64>,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/ph/live", get(live_ph))
}

/// Handle `GET /ph/live`: current probe value, `null` when offline.
async fn live_ph(State(state): State<AppState>) -> Json<LivePhResponse> {
    // ---
    Json(LivePhResponse {
        configured: state.ph_source.is_configured(),
        ph: state.ph_source.live_ph().await,
    })
}
