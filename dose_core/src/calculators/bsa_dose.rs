//! # Body-Surface-Area Dosing
//!
//! Computes body surface area with the Mosteller formula and scales a
//! prescribed dose density (mg/m²) to an absolute dose:
//!
//! ```text
//! BSA  = sqrt(weight_kg * height_cm / 3600)   [m²]
//! dose = BSA * dose_per_m2                    [mg]
//! ```
//!
//! Inputs arrive metric-normalized; the safety validator has already gated
//! the ranges, so only structural checks (positivity) remain here.
//!
//! ## Example
//!
//! ```rust
//! use dose_core::calculators::bsa_dose::{calculate_bsa_dose, BsaDoseInput};
//!
//! let input = BsaDoseInput {
//!     weight_kg: 70.0,
//!     height_cm: 170.0,
//!     dose_per_m2: 100.0,
//! };
//!
//! let result = calculate_bsa_dose(&input).unwrap();
//! assert!((result.bsa_m2 - 1.8181).abs() < 0.001);
//! assert!((result.dose_mg - 181.81).abs() < 0.1);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{DoseError, DoseResult};

/// Input parameters for BSA-based dosing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BsaDoseInput {
    /// Patient weight in kilograms
    pub weight_kg: f64,
    /// Patient height in centimeters
    pub height_cm: f64,
    /// Prescribed dose density in mg per m² of body surface
    pub dose_per_m2: f64,
}

/// Results of a BSA dosing calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BsaDoseResult {
    /// Body surface area in m² (Mosteller)
    pub bsa_m2: f64,
    /// Absolute dose in mg
    pub dose_mg: f64,
}

/// Calculate body surface area and the resulting absolute dose.
pub fn calculate_bsa_dose(input: &BsaDoseInput) -> DoseResult<BsaDoseResult> {
    if input.weight_kg <= 0.0 {
        return Err(DoseError::invalid_input(
            "weight_kg",
            input.weight_kg.to_string(),
            "Weight must be positive",
        ));
    }
    if input.height_cm <= 0.0 {
        return Err(DoseError::invalid_input(
            "height_cm",
            input.height_cm.to_string(),
            "Height must be positive",
        ));
    }
    if input.dose_per_m2 <= 0.0 {
        return Err(DoseError::invalid_input(
            "dose_per_m2",
            input.dose_per_m2.to_string(),
            "Dose density must be positive",
        ));
    }

    let bsa_m2 = (input.weight_kg * input.height_cm / 3600.0).sqrt();
    let dose_mg = bsa_m2 * input.dose_per_m2;

    Ok(BsaDoseResult { bsa_m2, dose_mg })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_scenario() {
        // 70 kg / 170 cm -> sqrt(11900/3600) = sqrt(3.3055..) ~ 1.8181 m²
        let input = BsaDoseInput {
            weight_kg: 70.0,
            height_cm: 170.0,
            dose_per_m2: 100.0,
        };
        let result = calculate_bsa_dose(&input).unwrap();
        assert!((result.bsa_m2 - 1.8181).abs() < 0.001);
        assert!((result.dose_mg - 181.81).abs() < 0.1);
    }

    #[test]
    fn test_dose_scales_linearly_with_density() {
        let base = BsaDoseInput {
            weight_kg: 70.0,
            height_cm: 170.0,
            dose_per_m2: 100.0,
        };
        let double = BsaDoseInput {
            dose_per_m2: 200.0,
            ..base.clone()
        };
        let a = calculate_bsa_dose(&base).unwrap();
        let b = calculate_bsa_dose(&double).unwrap();
        assert!((b.dose_mg - 2.0 * a.dose_mg).abs() < 1e-9);
        assert_eq!(a.bsa_m2, b.bsa_m2);
    }

    #[test]
    fn test_nonpositive_inputs_rejected() {
        let input = BsaDoseInput {
            weight_kg: 0.0,
            height_cm: 170.0,
            dose_per_m2: 100.0,
        };
        assert!(calculate_bsa_dose(&input).is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let input = BsaDoseInput {
            weight_kg: 62.5,
            height_cm: 158.0,
            dose_per_m2: 75.0,
        };
        let json = serde_json::to_string(&input).unwrap();
        let roundtrip: BsaDoseInput = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.weight_kg, 62.5);
        assert_eq!(roundtrip.dose_per_m2, 75.0);
    }
}
