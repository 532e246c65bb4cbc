//! Data models for plant readings, predicted treated values and log records.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Raw inflow measurements for one operator submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub bod: f64,
    pub cod: f64,
    pub tss: f64,
    pub oil_grease: f64,
    pub ph: f64,
    pub ammonical_n: f64,
    pub total_n: f64,
    /// Litres per minute, assumed constant over the day.
    pub flow_rate: f64,
}

/// Model-predicted values after treatment, in the same parameter order as
/// [`Reading::features`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreatedValues {
    // ---
    pub bod_treated: f64,
    pub cod_treated: f64,
    pub tss_treated: f64,
    pub oil_grease_treated: f64,
    pub ph_treated: f64,
    pub ammonical_n_treated: f64,
    pub total_n_treated: f64,
}

/// Where the pH used for a submission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhOrigin {
    LiveSensor,
    Manual,
}

/// One row of the treatment log: the reading, its prediction and when it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LogRecord {
    // ---
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub bod: f64,
    pub cod: f64,
    pub tss: f64,
    pub oil_grease: f64,
    pub ph: f64,
    pub ammonical_n: f64,
    pub total_n: f64,
    pub flow_rate: f64,
    pub bod_treated: f64,
    pub cod_treated: f64,
    pub tss_treated: f64,
    pub oil_grease_treated: f64,
    pub ph_treated: f64,
    pub ammonical_n_treated: f64,
    pub total_n_treated: f64,
}

impl Reading {
    // ---
    /// Predictor input vector: every measurement except the flow rate.
    pub fn features(&self) -> [f64; 7] {
        [
            self.bod,
            self.cod,
            self.tss,
            self.oil_grease,
            self.ph,
            self.ammonical_n,
            self.total_n,
        ]
    }

    /// Reject readings outside the physical domain before they reach the engine.
    pub fn validate(&self) -> Result<()> {
        // ---
        let fields = [
            ("bod", self.bod),
            ("cod", self.cod),
            ("tss", self.tss),
            ("oil_grease", self.oil_grease),
            ("ph", self.ph),
            ("ammonical_n", self.ammonical_n),
            ("total_n", self.total_n),
            ("flow_rate", self.flow_rate),
        ];

        for (name, value) in fields {
            if !value.is_finite() {
                bail!("{name} must be a finite number");
            }
            if value < 0.0 {
                bail!("{name} must not be negative, got {value}");
            }
        }

        if self.ph > 14.0 {
            bail!("ph must be within 0-14, got {}", self.ph);
        }

        Ok(())
    }
}

impl TreatedValues {
    // ---
    pub fn from_array(values: [f64; 7]) -> Self {
        let [bod_treated, cod_treated, tss_treated, oil_grease_treated, ph_treated, ammonical_n_treated, total_n_treated] =
            values;

        TreatedValues {
            bod_treated,
            cod_treated,
            tss_treated,
            oil_grease_treated,
            ph_treated,
            ammonical_n_treated,
            total_n_treated,
        }
    }
}

impl LogRecord {
    // ---
    pub fn new(reading: &Reading, treated: &TreatedValues, timestamp: DateTime<Utc>) -> Self {
        // ---
        LogRecord {
            id: Uuid::new_v4(),
            timestamp,
            bod: reading.bod,
            cod: reading.cod,
            tss: reading.tss,
            oil_grease: reading.oil_grease,
            ph: reading.ph,
            ammonical_n: reading.ammonical_n,
            total_n: reading.total_n,
            flow_rate: reading.flow_rate,
            bod_treated: treated.bod_treated,
            cod_treated: treated.cod_treated,
            tss_treated: treated.tss_treated,
            oil_grease_treated: treated.oil_grease_treated,
            ph_treated: treated.ph_treated,
            ammonical_n_treated: treated.ammonical_n_treated,
            total_n_treated: treated.total_n_treated,
        }
    }

    /// Plain-text report with one `key: value` line per field.
    pub fn to_report(&self) -> String {
        // ---
        let lines = [
            ("timestamp", self.timestamp.to_rfc3339()),
            ("BOD", self.bod.to_string()),
            ("COD", self.cod.to_string()),
            ("TSS", self.tss.to_string()),
            ("Oil", self.oil_grease.to_string()),
            ("pH", self.ph.to_string()),
            ("Ammonical_N", self.ammonical_n.to_string()),
            ("Total_N", self.total_n.to_string()),
            ("Flow", self.flow_rate.to_string()),
            ("BOD_treated", self.bod_treated.to_string()),
            ("COD_treated", self.cod_treated.to_string()),
            ("TSS_treated", self.tss_treated.to_string()),
            ("Oil_and_Grease_treated", self.oil_grease_treated.to_string()),
            ("pH_treated", self.ph_treated.to_string()),
            ("Ammonical_Nitrogen_treated", self.ammonical_n_treated.to_string()),
            ("Total_Nitrogen_treated", self.total_n_treated.to_string()),
        ];

        lines
            .iter()
            .map(|(key, value)| format!("{key}: {value}\n"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn create_test_reading() -> Reading {
        // ---
        Reading {
            bod: 220.0,
            cod: 410.0,
            tss: 160.0,
            oil_grease: 12.0,
            ph: 7.1,
            ammonical_n: 28.0,
            total_n: 45.0,
            flow_rate: 15.0,
        }
    }

    fn create_test_treated() -> TreatedValues {
        TreatedValues::from_array([8.5, 42.0, 11.0, 1.5, 7.3, 3.2, 9.8])
    }

    #[test]
    fn test_feature_order_excludes_flow() {
        // ---
        let reading = create_test_reading();
        assert_eq!(
            reading.features(),
            [220.0, 410.0, 160.0, 12.0, 7.1, 28.0, 45.0]
        );
    }

    #[test]
    fn test_treated_from_array_order() {
        // ---
        let treated = create_test_treated();
        assert_eq!(treated.bod_treated, 8.5);
        assert_eq!(treated.cod_treated, 42.0);
        assert_eq!(treated.tss_treated, 11.0);
        assert_eq!(treated.oil_grease_treated, 1.5);
        assert_eq!(treated.ph_treated, 7.3);
        assert_eq!(treated.ammonical_n_treated, 3.2);
        assert_eq!(treated.total_n_treated, 9.8);
    }

    #[test]
    fn test_validation_accepts_domain_edges() {
        // ---
        let mut reading = create_test_reading();
        assert!(reading.validate().is_ok());

        reading.ph = 0.0;
        assert!(reading.validate().is_ok());
        reading.ph = 14.0;
        assert!(reading.validate().is_ok());
        reading.flow_rate = 0.0;
        assert!(reading.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_out_of_domain() {
        // ---
        let base = create_test_reading();

        let err = Reading { ph: 14.1, ..base }.validate().unwrap_err();
        assert!(err.to_string().contains("ph"));

        let err = Reading { bod: -1.0, ..base }.validate().unwrap_err();
        assert!(err.to_string().contains("bod"));

        let err = Reading { flow_rate: f64::NAN, ..base }.validate().unwrap_err();
        assert!(err.to_string().contains("flow_rate"));

        assert!(Reading { tss: f64::INFINITY, ..base }.validate().is_err());
    }

    #[test]
    fn test_log_record_flattens_both_sides() {
        // ---
        let at = Utc.with_ymd_and_hms(2025, 6, 3, 9, 15, 0).unwrap();
        let record = LogRecord::new(&create_test_reading(), &create_test_treated(), at);

        assert_eq!(record.timestamp, at);
        assert_eq!(record.bod, 220.0);
        assert_eq!(record.flow_rate, 15.0);
        assert_eq!(record.bod_treated, 8.5);
        assert_eq!(record.total_n_treated, 9.8);

        let other = LogRecord::new(&create_test_reading(), &create_test_treated(), at);
        assert_ne!(record.id, other.id);
    }

    #[test]
    fn test_report_lines() {
        // ---
        let at = Utc.with_ymd_and_hms(2025, 6, 3, 9, 15, 0).unwrap();
        let report = LogRecord::new(&create_test_reading(), &create_test_treated(), at).to_report();

        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[0], "timestamp: 2025-06-03T09:15:00+00:00");
        assert_eq!(lines[1], "BOD: 220");
        assert_eq!(lines[8], "Flow: 15");
        assert_eq!(lines[13], "pH_treated: 7.3");
        assert!(report.ends_with('\n'));
    }
}
