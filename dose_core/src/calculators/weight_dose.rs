//! # Weight-Based Dosing
//!
//! mg/kg dosing with an optional absolute maximum. Common for antibiotics
//! and antipyretics where the label caps the adult dose.

use serde::{Deserialize, Serialize};

use crate::errors::{DoseError, DoseResult};

/// Input parameters for weight-based dosing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightDoseInput {
    /// Patient weight in kilograms
    pub weight_kg: f64,
    /// Prescribed dose per kilogram (mg/kg)
    pub dose_per_kg: f64,
    /// Optional absolute cap in mg
    pub max_dose_mg: Option<f64>,
}

/// Results of a weight-based dosing calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightDoseResult {
    /// Absolute dose in mg, after applying the cap
    pub dose_mg: f64,
    /// Whether the cap reduced the computed dose
    pub capped: bool,
}

/// Calculate the absolute dose, applying the cap when present.
pub fn calculate_weight_dose(input: &WeightDoseInput) -> DoseResult<WeightDoseResult> {
    if input.weight_kg <= 0.0 {
        return Err(DoseError::invalid_input(
            "weight_kg",
            input.weight_kg.to_string(),
            "Weight must be positive",
        ));
    }
    if input.dose_per_kg <= 0.0 {
        return Err(DoseError::invalid_input(
            "dose_per_kg",
            input.dose_per_kg.to_string(),
            "Dose per kg must be positive",
        ));
    }
    if let Some(cap) = input.max_dose_mg {
        if cap <= 0.0 {
            return Err(DoseError::invalid_input(
                "max_dose_mg",
                cap.to_string(),
                "Maximum dose must be positive",
            ));
        }
    }

    let raw_mg = input.weight_kg * input.dose_per_kg;
    let (dose_mg, capped) = match input.max_dose_mg {
        Some(cap) if raw_mg > cap => (cap, true),
        _ => (raw_mg, false),
    };

    Ok(WeightDoseResult { dose_mg, capped })
}
