//! Database schema management for `smart-stp`.
//!
//! Ensures the treatment log table and its index exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// `treatment_log` is the append-only audit trail of every evaluated
/// submission. Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS treatment_log (
            id                  UUID PRIMARY KEY,
            timestamp           TIMESTAMPTZ      NOT NULL,
            bod                 DOUBLE PRECISION NOT NULL,
            cod                 DOUBLE PRECISION NOT NULL,
            tss                 DOUBLE PRECISION NOT NULL,
            oil_grease          DOUBLE PRECISION NOT NULL,
            ph                  DOUBLE PRECISION NOT NULL,
            ammonical_n         DOUBLE PRECISION NOT NULL,
            total_n             DOUBLE PRECISION NOT NULL,
            flow_rate           DOUBLE PRECISION NOT NULL,
            bod_treated         DOUBLE PRECISION NOT NULL,
            cod_treated         DOUBLE PRECISION NOT NULL,
            tss_treated         DOUBLE PRECISION NOT NULL,
            oil_grease_treated  DOUBLE PRECISION NOT NULL,
            ph_treated          DOUBLE PRECISION NOT NULL,
            ammonical_n_treated DOUBLE PRECISION NOT NULL,
            total_n_treated     DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Date-range queries and "latest record" both walk this index
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_treatment_log_timestamp
            ON treatment_log (timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
