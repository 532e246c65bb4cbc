//! Application entry point for the `smart-stp` backend service.
//!
//! Decision support for a small sewage treatment plant: operator readings are
//! run through a regression model and the rule-based decision engine, which
//! recommends a discharge verdict, pump schedule and chlorine dose. Startup:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Loading the regression model
//! - Establishing a PostgreSQL connection pool for the treatment log
//! - Creating the database schema if it does not exist
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `MODEL_PATH` (**required**) – regression model JSON export
//! - `STP_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `STP_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the remaining options.
use std::{env, net::SocketAddr, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod config;
mod engine;
mod history;
mod models;
mod notify;
mod predictor;
mod routes;
mod schema;
mod sensor;
mod store;

pub use config::Config;

// Re-exported for routes/*.rs so handlers only depend on their parent module
// (main.rs), not on where each type lives.
pub use engine::{ChlorinationPlan, MotorCapacity, MotorSchedule, QualityVerdict};
pub use models::{LogRecord, PhOrigin, Reading, TreatedValues};
pub use notify::Notifier;
pub use predictor::{LinearModel, Predictor};
pub use sensor::PhSource;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let model = LinearModel::from_file(&cfg.model_path)?;
    tracing::info!("Loaded regression model from {}", cfg.model_path);

    let ph_source = PhSource::new(cfg.ph_sensor_url.clone())?;
    let notifier = Notifier::new(cfg.sms.clone());
    if !notifier.has_sms() {
        tracing::warn!("No SMS channel configured; alerts will only be logged");
    }

    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(routes::AppState {
        pool,
        config: cfg,
        predictor: Arc::new(model),
        ph_source,
        notifier,
    });

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Install the global tracing subscriber. Call once, before anything logs.
///
/// `RUST_LOG` wins over `STP_LOG_LEVEL`; `STP_SPAN_EVENTS` takes `full` or
/// `enter_exit`; `FORCE_COLOR` overrides TTY detection.
fn init_tracing() {
    // ---
    let span_events = match env::var("STP_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("STP_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
