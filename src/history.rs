//! Historical log analysis: CSV import/export, date filtering, summary
//! statistics and per-parameter trend series.
//!
//! Works the same on rows loaded from `treatment_log` and on CSV files
//! uploaded by the operator, which may come from other plants and only need a
//! `timestamp` column.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::LogRecord;

// ---

/// Column layout of exported treatment logs.
pub const LOG_COLUMNS: [&str; 16] = [
    "timestamp",
    "BOD",
    "COD",
    "TSS",
    "Oil",
    "pH",
    "Ammonical_N",
    "Total_N",
    "Flow",
    "BOD_treated",
    "COD_treated",
    "TSS_treated",
    "Oil_and_Grease_treated",
    "pH_treated",
    "Ammonical_Nitrogen_treated",
    "Total_Nitrogen_treated",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Raw parameters offered for summaries and trend graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parameter {
    #[serde(rename = "BOD")]
    Bod,
    #[serde(rename = "COD")]
    Cod,
    #[serde(rename = "pH")]
    Ph,
    #[serde(rename = "TSS")]
    Tss,
    #[serde(rename = "Ammonical_N")]
    AmmonicalN,
    #[serde(rename = "Total_N")]
    TotalN,
}

impl Parameter {
    // ---
    pub const ALL: [Parameter; 6] = [
        Parameter::Bod,
        Parameter::Cod,
        Parameter::Ph,
        Parameter::Tss,
        Parameter::AmmonicalN,
        Parameter::TotalN,
    ];

    /// CSV header for this parameter.
    pub fn column(self) -> &'static str {
        match self {
            Parameter::Bod => "BOD",
            Parameter::Cod => "COD",
            Parameter::Ph => "pH",
            Parameter::Tss => "TSS",
            Parameter::AmmonicalN => "Ammonical_N",
            Parameter::TotalN => "Total_N",
        }
    }

    fn index(self) -> usize {
        match self {
            Parameter::Bod => 0,
            Parameter::Cod => 1,
            Parameter::Ph => 2,
            Parameter::Tss => 3,
            Parameter::AmmonicalN => 4,
            Parameter::TotalN => 5,
        }
    }
}

/// One timestamped row of analysable values; missing cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub timestamp: DateTime<Utc>,
    values: [Option<f64>; 6],
}

impl HistoryRow {
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        self.values[parameter.index()]
    }
}

impl From<&LogRecord> for HistoryRow {
    fn from(record: &LogRecord) -> Self {
        // ---
        HistoryRow {
            timestamp: record.timestamp,
            values: [
                Some(record.bod),
                Some(record.cod),
                Some(record.ph),
                Some(record.tss),
                Some(record.ammonical_n),
                Some(record.total_n),
            ],
        }
    }
}

/// pandas-style `describe()` row for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSummary {
    pub parameter: Parameter,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

// ---

/// Parse a log timestamp. RFC 3339 keeps its offset; naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    // ---
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
        .ok_or_else(|| anyhow!("unrecognised timestamp '{}'", raw))
}

/// An uploaded log with every row's original cells kept for re-export.
struct Upload {
    headers: csv::StringRecord,
    rows: Vec<(HistoryRow, csv::StringRecord)>,
}

fn read_upload(text: &str) -> Result<Upload> {
    // ---
    // Short rows are allowed; their trailing cells count as missing.
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let ts_idx = headers
        .iter()
        .position(|h| h == "timestamp")
        .ok_or_else(|| anyhow!("CSV has no 'timestamp' column"))?;
    let columns = Parameter::ALL.map(|p| headers.iter().position(|h| h == p.column()));

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        // Header is line 1
        let line = i + 2;
        let record = record.with_context(|| format!("Malformed CSV at line {}", line))?;

        let timestamp = parse_timestamp(record.get(ts_idx).unwrap_or_default())
            .with_context(|| format!("Bad timestamp at line {}", line))?;

        let mut values = [None; 6];
        for (slot, (col, parameter)) in values
            .iter_mut()
            .zip(columns.iter().zip(Parameter::ALL))
        {
            let Some(cell) = col.and_then(|c| record.get(c)) else {
                continue;
            };
            if cell.is_empty() {
                continue;
            }
            let value: f64 = cell.parse().with_context(|| {
                format!(
                    "Non-numeric {} value '{}' at line {}",
                    parameter.column(),
                    cell,
                    line
                )
            })?;
            // NaN/inf cells are missing, like empty ones
            *slot = value.is_finite().then_some(value);
        }

        rows.push((HistoryRow { timestamp, values }, record));
    }

    Ok(Upload { headers, rows })
}

/// Read an uploaded log. Requires a `timestamp` column; parameter columns are optional.
pub fn parse_csv(text: &str) -> Result<Vec<HistoryRow>> {
    Ok(read_upload(text)?.rows.into_iter().map(|(row, _)| row).collect())
}

/// Re-emit the rows of an uploaded log dated within `[from, to]`, all columns kept.
pub fn filter_upload(
    text: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<String> {
    // ---
    let upload = read_upload(text)?;

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(&upload.headers)?;

    for (row, record) in &upload.rows {
        if within_dates(&row.timestamp, from, to) {
            writer.write_record(record)?;
        }
    }

    finish_csv(writer)
}

/// Whether `timestamp` falls on a calendar day within `[from, to]`, both inclusive.
pub fn within_dates(
    timestamp: &DateTime<Utc>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> bool {
    // ---
    let day = timestamp.date_naive();
    from.map_or(true, |f| day >= f) && to.map_or(true, |t| day <= t)
}

pub fn filter_by_date(
    rows: Vec<HistoryRow>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Vec<HistoryRow> {
    rows.into_iter()
        .filter(|r| within_dates(&r.timestamp, from, to))
        .collect()
}

/// Summary statistics per parameter, in [`Parameter::ALL`] order.
pub fn summarize(rows: &[HistoryRow]) -> Vec<ParameterSummary> {
    // ---
    Parameter::ALL
        .iter()
        .map(|&parameter| {
            let mut values: Vec<f64> = rows.iter().filter_map(|r| r.value(parameter)).collect();
            values.sort_by(f64::total_cmp);
            describe(parameter, &values)
        })
        .collect()
}

fn describe(parameter: Parameter, sorted: &[f64]) -> ParameterSummary {
    // ---
    let count = sorted.len();
    let mean = (count > 0).then(|| sorted.iter().sum::<f64>() / count as f64);
    let std = mean.filter(|_| count > 1).map(|m| {
        let ss: f64 = sorted.iter().map(|v| (v - m).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    });

    ParameterSummary {
        parameter,
        count,
        mean,
        std,
        min: sorted.first().copied(),
        q25: quantile(sorted, 0.25),
        median: quantile(sorted, 0.5),
        q75: quantile(sorted, 0.75),
        max: sorted.last().copied(),
    }
}

/// Linear-interpolated quantile of sorted data.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    // ---
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Points for one parameter's trend graph, skipping rows without a value.
pub fn trend(rows: &[HistoryRow], parameter: Parameter) -> Vec<TrendPoint> {
    rows.iter()
        .filter_map(|r| {
            r.value(parameter).map(|value| TrendPoint {
                timestamp: r.timestamp,
                value,
            })
        })
        .collect()
}

/// Export treatment log records in the [`LOG_COLUMNS`] layout.
pub fn to_csv(records: &[LogRecord]) -> Result<String> {
    // ---
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(LOG_COLUMNS)?;

    for r in records {
        writer.write_record([
            r.timestamp.to_rfc3339(),
            r.bod.to_string(),
            r.cod.to_string(),
            r.tss.to_string(),
            r.oil_grease.to_string(),
            r.ph.to_string(),
            r.ammonical_n.to_string(),
            r.total_n.to_string(),
            r.flow_rate.to_string(),
            r.bod_treated.to_string(),
            r.cod_treated.to_string(),
            r.tss_treated.to_string(),
            r.oil_grease_treated.to_string(),
            r.ph_treated.to_string(),
            r.ammonical_n_treated.to_string(),
            r.total_n_treated.to_string(),
        ])?;
    }

    finish_csv(writer)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    // ---
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV export: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV export is not valid UTF-8")
}

/// Reject a date range whose start is after its end.
pub fn check_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
    // ---
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            bail!("'from' date {} is after 'to' date {}", f, t);
        }
    }
    Ok(())
}
