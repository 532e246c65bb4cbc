// src/routes/health.rs
//! Liveness endpoint for the Smart STP backend.
//!
//! Used by container orchestrators and the plant's uptime check. Follows the
//! Explicit Module Boundary Pattern (EMBP): the handler stays private and the
//! gateway (`mod.rs`) only sees the subrouter.

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Handle `GET /health`.
///
/// Static answer; does not touch the database, the model or the pH probe.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Subrouter with the `/health` route, generic over the gateway state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
