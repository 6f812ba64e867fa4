//! # Dose Calculators
//!
//! Domain formulas. Each calculation follows the pattern:
//!
//! - `*Input` - Input parameters (JSON-serializable), already normalized to
//!   metric units
//! - `*Result` - Calculation results (JSON-serializable)
//! - `calculate(input) -> Result<*Result, DoseError>` - Pure calculation
//!   function
//!
//! The session never calls a formula directly; it dispatches through
//! [`CalculatorKind::compute`] with the validated, metric-normalized field
//! values.
//!
//! ## Available Calculations
//!
//! - [`bsa_dose`] - Body-surface-area dosing (Mosteller)
//! - [`weight_dose`] - Weight-based (mg/kg) dosing with optional cap

pub mod bsa_dose;
pub mod weight_dose;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{DoseError, DoseResult};

pub use bsa_dose::{calculate_bsa_dose, BsaDoseInput, BsaDoseResult};
pub use weight_dose::{calculate_weight_dose, WeightDoseInput, WeightDoseResult};

/// Validated, metric-normalized numeric field values keyed by field id.
#[derive(Debug, Clone, Default)]
pub struct NormalizedInputs(BTreeMap<String, f64>);

impl NormalizedInputs {
    pub fn new() -> Self {
        NormalizedInputs::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: f64) {
        self.0.insert(field.into(), value);
    }

    /// Fetch a required field; absence is a missing-input error.
    pub fn require(&self, field: &str) -> DoseResult<f64> {
        self.0
            .get(field)
            .copied()
            .ok_or_else(|| DoseError::missing_input(field))
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.0.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

/// What the session receives back from a formula: the headline result, a
/// one-line clinical interpretation, and the raw number the history buffer
/// records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedResult {
    pub main_result: String,
    pub interpretation: String,
    pub computed_value: f64,
}

/// Enum wrapper for all calculator types.
///
/// Allows a [`crate::config::CalculatorConfig`] to name its formula while
/// keeping the formulas themselves pure free functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculatorKind {
    /// Body-surface-area dosing (Mosteller)
    BsaDose,
    /// Weight-based mg/kg dosing
    WeightDose,
}

impl CalculatorKind {
    /// Get the calculation type as a string (audit records, reports)
    pub fn calc_type(&self) -> &'static str {
        match self {
            CalculatorKind::BsaDose => "BSA Dose",
            CalculatorKind::WeightDose => "Weight Dose",
        }
    }

    /// Run the formula over validated, metric-normalized inputs.
    pub fn compute(&self, inputs: &NormalizedInputs) -> DoseResult<ComputedResult> {
        match self {
            CalculatorKind::BsaDose => {
                let input = BsaDoseInput {
                    weight_kg: inputs.require("weight_kg")?,
                    height_cm: inputs.require("height_cm")?,
                    dose_per_m2: inputs.require("dose_per_m2")?,
                };
                let result = calculate_bsa_dose(&input)?;
                Ok(ComputedResult {
                    main_result: format!("{:.1} mg", result.dose_mg),
                    interpretation: format!(
                        "BSA {:.2} m² (Mosteller) at {:.1} mg/m²",
                        result.bsa_m2, input.dose_per_m2
                    ),
                    computed_value: result.dose_mg,
                })
            }
            CalculatorKind::WeightDose => {
                let input = WeightDoseInput {
                    weight_kg: inputs.require("weight_kg")?,
                    dose_per_kg: inputs.require("dose_per_kg")?,
                    max_dose_mg: inputs.get("max_dose_mg"),
                };
                let result = calculate_weight_dose(&input)?;
                let interpretation = if result.capped {
                    format!(
                        "{:.1} mg/kg, capped at the {:.0} mg maximum",
                        input.dose_per_kg,
                        input.max_dose_mg.unwrap_or(result.dose_mg)
                    )
                } else {
                    format!("{:.1} mg/kg of body weight", input.dose_per_kg)
                };
                Ok(ComputedResult {
                    main_result: format!("{:.1} mg", result.dose_mg),
                    interpretation,
                    computed_value: result.dose_mg,
                })
            }
        }
    }
}
