//! Treated-value prediction.
//!
//! The decision engine only needs something that maps the seven raw features
//! to seven treated values; any implementation of [`Predictor`] can be plugged
//! into the service. The bundled [`LinearModel`] reads a multi-output linear
//! regression exported to JSON.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::models::{Reading, TreatedValues};

// ---

/// Maps raw features to predicted treated values.
pub trait Predictor: Send + Sync {
    fn predict(&self, reading: &Reading) -> Result<TreatedValues>;
}

/// Multi-output linear regression: `treated[i] = intercepts[i] + coefficients[i] · features`.
///
/// Expected JSON layout:
///
/// ```json
/// { "intercepts": [7 numbers], "coefficients": [[7 numbers], ... 7 rows] }
/// ```
///
/// Row `i` of `coefficients` produces output `i` in [`TreatedValues`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    // ---
    intercepts: [f64; 7],
    coefficients: [[f64; 7]; 7],
}

/// On-disk layout of the exported model.
#[derive(Debug, Deserialize)]
struct ModelFile {
    intercepts: [f64; 7],
    coefficients: [[f64; 7]; 7],
}

impl LinearModel {
    // ---
    pub fn new(intercepts: [f64; 7], coefficients: [[f64; 7]; 7]) -> Self {
        LinearModel {
            intercepts,
            coefficients,
        }
    }

    /// Load a model from its JSON export.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        // ---
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file '{}'", path.display()))?;

        Self::from_json(&raw).with_context(|| format!("Invalid model file '{}'", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        // ---
        let file: ModelFile = serde_json::from_str(raw)?;

        let all_finite = file.intercepts.iter().all(|v| v.is_finite())
            && file.coefficients.iter().flatten().all(|v| v.is_finite());
        if !all_finite {
            bail!("model parameters must be finite numbers");
        }

        Ok(LinearModel::new(file.intercepts, file.coefficients))
    }
}

impl Predictor for LinearModel {
    fn predict(&self, reading: &Reading) -> Result<TreatedValues> {
        // ---
        let features = reading.features();
        let mut out = self.intercepts;

        for (value, row) in out.iter_mut().zip(self.coefficients.iter()) {
            *value += row
                .iter()
                .zip(features.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>();
        }

        if let Some(pos) = out.iter().position(|v| !v.is_finite()) {
            return Err(anyhow!("model produced a non-finite value for output {pos}"));
        }

        Ok(TreatedValues::from_array(out))
    }
}
