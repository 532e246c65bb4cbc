//! Treatment log persistence.
//!
//! The log is append-only; rows are never updated or deleted by the service.

use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::LogRecord;

// ---

const SELECT_COLUMNS: &str = r#"
    id, timestamp,
    bod, cod, tss, oil_grease, ph, ammonical_n, total_n, flow_rate,
    bod_treated, cod_treated, tss_treated, oil_grease_treated,
    ph_treated, ammonical_n_treated, total_n_treated
"#;

/// Append one evaluated submission to the log.
pub async fn append_record(pool: &PgPool, record: &LogRecord) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO treatment_log (
            id, timestamp,
            bod, cod, tss, oil_grease, ph, ammonical_n, total_n, flow_rate,
            bod_treated, cod_treated, tss_treated, oil_grease_treated,
            ph_treated, ammonical_n_treated, total_n_treated
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(record.id)
    .bind(record.timestamp)
    .bind(record.bod)
    .bind(record.cod)
    .bind(record.tss)
    .bind(record.oil_grease)
    .bind(record.ph)
    .bind(record.ammonical_n)
    .bind(record.total_n)
    .bind(record.flow_rate)
    .bind(record.bod_treated)
    .bind(record.cod_treated)
    .bind(record.tss_treated)
    .bind(record.oil_grease_treated)
    .bind(record.ph_treated)
    .bind(record.ammonical_n_treated)
    .bind(record.total_n_treated)
    .execute(pool)
    .await?;

    Ok(())
}

/// Records whose UTC calendar date lies in `[from, to]`, oldest first.
pub async fn fetch_records(
    pool: &PgPool,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: u32,
) -> Result<Vec<LogRecord>, sqlx::Error> {
    // ---
    let sql = format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM treatment_log
        WHERE ($1::date IS NULL OR (timestamp AT TIME ZONE 'UTC')::date >= $1)
          AND ($2::date IS NULL OR (timestamp AT TIME ZONE 'UTC')::date <= $2)
        ORDER BY timestamp
        LIMIT $3
        "#
    );

    sqlx::query_as::<_, LogRecord>(&sql)
        .bind(from)
        .bind(to)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
}

/// Most recently logged record, if any.
pub async fn latest_record(pool: &PgPool) -> Result<Option<LogRecord>, sqlx::Error> {
    // ---
    let sql = format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM treatment_log
        ORDER BY timestamp DESC
        LIMIT 1
        "#
    );

    sqlx::query_as::<_, LogRecord>(&sql)
        .fetch_optional(pool)
        .await
}
