//! `POST /evaluate`: run one operator submission through prediction, the
//! decision engine, the treatment log and alerting.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{error_response, AppState};
use crate::{
    engine, notify, store, ChlorinationPlan, LogRecord, MotorCapacity, MotorSchedule, PhOrigin,
    QualityVerdict, Reading, TreatedValues,
};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/evaluate", post(handler))
}

/// Operator submission. `ph` may be omitted when the live probe is online.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    // ---
    bod: f64,
    cod: f64,
    tss: f64,
    oil_grease: f64,
    ph: Option<f64>,
    ammonical_n: f64,
    total_n: f64,
    flow_rate: f64,
    motor_capacity: Option<MotorCapacity>,
}

#[derive(Debug, Serialize)]
struct EvaluateResponse {
    // ---
    log_id: Uuid,
    timestamp: DateTime<Utc>,
    reading: Reading,
    ph_origin: PhOrigin,
    treated: TreatedValues,
    verdict: QualityVerdict,
    verdict_description: &'static str,
    alert: bool,
    motor_capacity: MotorCapacity,
    motor_schedule: MotorSchedule,
    chlorination: ChlorinationPlan,
    chlorine_batch_litres: f64,
    chlorine_solution_ml: f64,
}

async fn handler(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> impl IntoResponse {
    // ---
    info!("POST /evaluate - Starting evaluation");

    // Step 1: Resolve pH, live probe first
    let Some((ph, ph_origin)) = state.ph_source.resolve(req.ph).await else {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "pH is required: live sensor offline and no manual value given",
        );
    };
    debug!("POST /evaluate - pH {:.2} from {:?}", ph, ph_origin);

    let reading = Reading {
        bod: req.bod,
        cod: req.cod,
        tss: req.tss,
        oil_grease: req.oil_grease,
        ph,
        ammonical_n: req.ammonical_n,
        total_n: req.total_n,
        flow_rate: req.flow_rate,
    };
    if let Err(e) = reading.validate() {
        debug!("POST /evaluate - Rejected reading: {}", e);
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
    }

    // Step 2: Predict treated values; abandon the submission on failure
    let treated = match state.predictor.predict(&reading) {
        Ok(treated) => treated,
        Err(e) => {
            error!("Prediction failed: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed");
        }
    };

    // Step 3: Decision rules
    let motor_capacity = req
        .motor_capacity
        .unwrap_or(state.config.default_motor_capacity);
    let decision = engine::evaluate(&reading, &treated, motor_capacity);
    debug!(
        "POST /evaluate - verdict={:?} alert={} load={:?} dose={:?}",
        decision.verdict,
        decision.alert,
        decision.motor_schedule.load_level,
        decision.chlorination.dose_level
    );

    // Step 4: Alert, fire-and-forget
    if decision.alert {
        state
            .notifier
            .dispatch(notify::alert_message(&reading, &treated));
    }

    // Step 5: Audit log; a failed append fails the submission
    let record = LogRecord::new(&reading, &treated, Utc::now());
    if let Err(e) = store::append_record(&state.pool, &record).await {
        error!("Failed to store treatment log record: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to write treatment log",
        );
    }

    info!(
        "Evaluation {} complete: {}",
        record.id,
        decision.verdict.description()
    );

    let batch_litres = state.config.chlorine_batch_litres;
    let response = EvaluateResponse {
        log_id: record.id,
        timestamp: record.timestamp,
        reading,
        ph_origin,
        treated,
        verdict: decision.verdict,
        verdict_description: decision.verdict.description(),
        alert: decision.alert,
        motor_capacity,
        motor_schedule: decision.motor_schedule,
        chlorination: decision.chlorination,
        chlorine_batch_litres: batch_litres,
        chlorine_solution_ml: decision.chlorination.solution_ml_for_batch(batch_litres),
    };

    (StatusCode::OK, Json(response)).into_response()
}
