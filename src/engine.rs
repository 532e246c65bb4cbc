//! Post-prediction decision engine for the treatment plant.
//!
//! Converts a raw [`Reading`] and its predicted [`TreatedValues`] into the
//! operator recommendations: discharge quality verdict, alert decision, pump
//! schedule and chlorination dose. Every function here is pure and total over
//! its inputs; validation of input domains happens before the engine is called.

use serde::{Deserialize, Serialize};

use crate::models::{Reading, TreatedValues};

// ---

/// Raw BOD above which the inflow counts as high load, mg/L.
pub const HIGH_LOAD_BOD: f64 = 300.0;

/// Raw COD above which the inflow counts as high load, mg/L.
pub const HIGH_LOAD_COD: f64 = 500.0;

/// Treated pH below which the operator is alerted.
pub const MIN_TREATED_PH: f64 = 6.5;

/// Pump slots used when the inflow load is high, in run order.
pub const HIGH_LOAD_SLOTS: [&str; 2] = ["7:00 AM – 8:00 AM", "5:00 PM – 6:00 PM"];

/// Pump slot used under normal load.
pub const NORMAL_LOAD_SLOTS: [&str; 1] = ["8:00 AM – 9:00 AM"];

/// Chlorine dose for heavily loaded inflow, mg/L.
pub const HEAVY_DOSE_MG_PER_L: f64 = 5.0;

/// Chlorine dose for lightly loaded inflow, mg/L.
pub const LIGHT_DOSE_MG_PER_L: f64 = 2.5;

/// Reference batch the plant doses against, litres.
pub const REFERENCE_BATCH_LITRES: f64 = 1000.0;

/// Discharge quality of the treated water, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityVerdict {
    Excellent,
    Moderate,
    Poor,
}

impl QualityVerdict {
    /// Operator-facing description of the verdict.
    pub fn description(self) -> &'static str {
        match self {
            QualityVerdict::Excellent => "Excellent - reusable water",
            QualityVerdict::Moderate => "Moderate - needs additional polishing",
            QualityVerdict::Poor => "Poor quality - unsafe for discharge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadLevel {
    Normal,
    High,
}

/// Selectable pump speeds, litres per minute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum MotorCapacity {
    Lpm10,
    #[default]
    Lpm20,
    Lpm30,
}

impl MotorCapacity {
    pub fn litres_per_minute(self) -> u32 {
        match self {
            MotorCapacity::Lpm10 => 10,
            MotorCapacity::Lpm20 => 20,
            MotorCapacity::Lpm30 => 30,
        }
    }
}

impl TryFrom<u32> for MotorCapacity {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(MotorCapacity::Lpm10),
            20 => Ok(MotorCapacity::Lpm20),
            30 => Ok(MotorCapacity::Lpm30),
            other => Err(format!(
                "motor capacity must be 10, 20 or 30 L/min, got {other}"
            )),
        }
    }
}

impl From<MotorCapacity> for u32 {
    fn from(capacity: MotorCapacity) -> Self {
        capacity.litres_per_minute()
    }
}

/// Daily pump plan for the inflow volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotorSchedule {
    pub load_level: LoadLevel,
    pub batches_per_day: u32,
    pub runtime_minutes_per_batch: u64,
    pub time_slots: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoseLevel {
    None,
    Light,
    Heavy,
}

/// Chlorine dosing for the current inflow, assuming a 1% (10,000 mg/L) solution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChlorinationPlan {
    pub dose_level: DoseLevel,
    pub dose_mg_per_l: f64,
    pub volume_ml_per_1000l: f64,
}

impl ChlorinationPlan {
    /// Millilitres of 1% solution needed to dose `batch_litres` of water.
    pub fn solution_ml_for_batch(&self, batch_litres: f64) -> f64 {
        solution_ml(self.dose_mg_per_l, batch_litres)
    }
}

/// All recommendations derived from one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub verdict: QualityVerdict,
    pub alert: bool,
    pub motor_schedule: MotorSchedule,
    pub chlorination: ChlorinationPlan,
}

// ---

/// Classify the treated water from its predicted BOD and COD.
///
/// Strict comparisons: `bod_treated == 10` is already Moderate and
/// `bod_treated == 30` is Poor.
pub fn classify_quality(treated: &TreatedValues) -> QualityVerdict {
    // ---
    if treated.bod_treated < 10.0 && treated.cod_treated < 50.0 {
        QualityVerdict::Excellent
    } else if treated.bod_treated < 30.0 {
        QualityVerdict::Moderate
    } else {
        QualityVerdict::Poor
    }
}

/// Whether the out-of-range notification should fire.
///
/// Uses the raw (untreated) BOD/COD load but the treated pH.
pub fn should_alert(bod: f64, cod: f64, ph_treated: f64) -> bool {
    is_high_load(bod, cod) || ph_treated < MIN_TREATED_PH
}

fn is_high_load(bod: f64, cod: f64) -> bool {
    bod > HIGH_LOAD_BOD || cod > HIGH_LOAD_COD
}

/// Plan the pump batches needed to move one day of inflow.
///
/// Runtime is truncated to whole minutes, not rounded.
pub fn plan_motor_schedule(
    bod: f64,
    cod: f64,
    flow_rate: f64,
    motor_capacity: MotorCapacity,
) -> MotorSchedule {
    // ---
    let total_daily_volume = flow_rate * 60.0 * 24.0;

    let (load_level, batches_per_day, slots): (_, u32, &[&'static str]) =
        if is_high_load(bod, cod) {
            (LoadLevel::High, 2, &HIGH_LOAD_SLOTS[..])
        } else {
            (LoadLevel::Normal, 1, &NORMAL_LOAD_SLOTS[..])
        };

    let runtime = (total_daily_volume / f64::from(batches_per_day))
        / f64::from(motor_capacity.litres_per_minute());

    MotorSchedule {
        load_level,
        batches_per_day,
        // `as` saturates and maps NaN to 0; inputs are validated non-negative.
        runtime_minutes_per_batch: runtime.trunc() as u64,
        time_slots: slots
            .iter()
            .take(batches_per_day as usize)
            .copied()
            .collect(),
    }
}

/// Pick the chlorine dose from the raw inflow load.
pub fn plan_chlorination(bod: f64, cod: f64, tss: f64) -> ChlorinationPlan {
    // ---
    let (dose_level, dose_mg_per_l) = if bod > 100.0 || cod > 300.0 || tss > 150.0 {
        (DoseLevel::Heavy, HEAVY_DOSE_MG_PER_L)
    } else if bod > 30.0 || cod > 150.0 {
        (DoseLevel::Light, LIGHT_DOSE_MG_PER_L)
    } else {
        (DoseLevel::None, 0.0)
    };

    ChlorinationPlan {
        dose_level,
        dose_mg_per_l,
        volume_ml_per_1000l: solution_ml(dose_mg_per_l, REFERENCE_BATCH_LITRES),
    }
}

/// Run every rule for one submission.
pub fn evaluate(
    reading: &Reading,
    treated: &TreatedValues,
    motor_capacity: MotorCapacity,
) -> Decision {
    // ---
    Decision {
        verdict: classify_quality(treated),
        alert: should_alert(reading.bod, reading.cod, treated.ph_treated),
        motor_schedule: plan_motor_schedule(
            reading.bod,
            reading.cod,
            reading.flow_rate,
            motor_capacity,
        ),
        chlorination: plan_chlorination(reading.bod, reading.cod, reading.tss),
    }
}

/// mg/L * L gives mg of chlorine; at 10,000 mg/L that is `dose * litres / 10` mL.
fn solution_ml(dose_mg_per_l: f64, batch_litres: f64) -> f64 {
    // ---
    if dose_mg_per_l > 0.0 {
        round2(dose_mg_per_l * batch_litres / 10.0)
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
