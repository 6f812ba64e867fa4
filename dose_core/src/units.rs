//! # Unit Conversion
//!
//! Bidirectional conversion between the metric units clinical formulas use
//! and the regional (imperial/US customary) units a user may prefer to type.
//!
//! ## Design Philosophy
//!
//! Each supported quantity has exactly two units - a metric one and a
//! regional one - and a fixed conversion: a linear factor for weight, height
//! and volume, an affine transform for temperature. Conversion is a pure
//! table lookup with no hidden state.
//!
//! Displayed values are rounded to a fixed precision (1 decimal place), so a
//! round-trip A→B→A reproduces the original within 0.1 of the display
//! rounding rather than exactly. This is a known, accepted lossy step.
//!
//! ## Example
//!
//! ```rust
//! use dose_core::units::{convert, round_display, UnitKind};
//!
//! let lb = convert(70.0, UnitKind::Kilograms, UnitKind::Pounds).unwrap();
//! assert_eq!(round_display(lb, 1), 154.3);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{DoseError, DoseResult};

/// Physical quantity a calculator field measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Weight,
    Height,
    Temperature,
    Volume,
}

impl Quantity {
    /// The unit clinical formulas expect
    pub fn metric_unit(self) -> UnitKind {
        match self {
            Quantity::Weight => UnitKind::Kilograms,
            Quantity::Height => UnitKind::Centimeters,
            Quantity::Temperature => UnitKind::Celsius,
            Quantity::Volume => UnitKind::Milliliters,
        }
    }

    /// The regional alternative offered by the unit toggle
    pub fn regional_unit(self) -> UnitKind {
        match self {
            Quantity::Weight => UnitKind::Pounds,
            Quantity::Height => UnitKind::Inches,
            Quantity::Temperature => UnitKind::Fahrenheit,
            Quantity::Volume => UnitKind::FluidOunces,
        }
    }

    /// Unit a toggle state selects for this quantity
    pub fn unit_for(self, toggle: UnitToggle) -> UnitKind {
        match toggle {
            UnitToggle::Metric => self.metric_unit(),
            UnitToggle::Regional => self.regional_unit(),
        }
    }
}

/// A concrete unit. Every unit belongs to exactly one [`Quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Kilograms,
    Pounds,
    Centimeters,
    Inches,
    Celsius,
    Fahrenheit,
    Milliliters,
    FluidOunces,
}

impl UnitKind {
    pub fn quantity(self) -> Quantity {
        match self {
            UnitKind::Kilograms | UnitKind::Pounds => Quantity::Weight,
            UnitKind::Centimeters | UnitKind::Inches => Quantity::Height,
            UnitKind::Celsius | UnitKind::Fahrenheit => Quantity::Temperature,
            UnitKind::Milliliters | UnitKind::FluidOunces => Quantity::Volume,
        }
    }

    /// Display symbol (report and annotation text)
    pub fn symbol(self) -> &'static str {
        match self {
            UnitKind::Kilograms => "kg",
            UnitKind::Pounds => "lb",
            UnitKind::Centimeters => "cm",
            UnitKind::Inches => "in",
            UnitKind::Celsius => "°C",
            UnitKind::Fahrenheit => "°F",
            UnitKind::Milliliters => "mL",
            UnitKind::FluidOunces => "fl oz",
        }
    }
}

/// Per-field unit system toggle. Two-valued; tracked by the session
/// independently of the numeric value. Toggling rewrites the displayed value
/// through [`convert`], never relabels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitToggle {
    #[default]
    Metric,
    Regional,
}

impl UnitToggle {
    pub fn flipped(self) -> UnitToggle {
        match self {
            UnitToggle::Metric => UnitToggle::Regional,
            UnitToggle::Regional => UnitToggle::Metric,
        }
    }
}

/// Conversion factors, metric → regional.
const KG_PER_LB: f64 = 2.20462;
const CM_PER_IN: f64 = 2.54;
const ML_PER_FLOZ: f64 = 29.5735;

/// Convert a value between two units of the same quantity.
///
/// Pure function over a fixed conversion table. Converting across
/// quantities (e.g. kilograms to centimeters) is an error, not a number.
pub fn convert(value: f64, from: UnitKind, to: UnitKind) -> DoseResult<f64> {
    if from.quantity() != to.quantity() {
        return Err(DoseError::UnitMismatch {
            from: from.symbol().to_string(),
            to: to.symbol().to_string(),
        });
    }
    if from == to {
        return Ok(value);
    }

    let converted = match (from, to) {
        (UnitKind::Kilograms, UnitKind::Pounds) => value * KG_PER_LB,
        (UnitKind::Pounds, UnitKind::Kilograms) => value / KG_PER_LB,
        (UnitKind::Centimeters, UnitKind::Inches) => value / CM_PER_IN,
        (UnitKind::Inches, UnitKind::Centimeters) => value * CM_PER_IN,
        (UnitKind::Milliliters, UnitKind::FluidOunces) => value / ML_PER_FLOZ,
        (UnitKind::FluidOunces, UnitKind::Milliliters) => value * ML_PER_FLOZ,
        (UnitKind::Celsius, UnitKind::Fahrenheit) => value * 9.0 / 5.0 + 32.0,
        (UnitKind::Fahrenheit, UnitKind::Celsius) => (value - 32.0) * 5.0 / 9.0,
        // Same-quantity pairs are exhausted above
        _ => unreachable!("same-unit and cross-quantity cases handled earlier"),
    };

    Ok(converted)
}

/// Round a value to the fixed display precision.
pub fn round_display(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Convert a displayed value to the metric unit of its quantity, given the
/// field's current toggle state.
pub fn to_metric(value: f64, quantity: Quantity, toggle: UnitToggle) -> DoseResult<f64> {
    convert(value, quantity.unit_for(toggle), quantity.metric_unit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_conversion() {
        let lb = convert(70.0, UnitKind::Kilograms, UnitKind::Pounds).unwrap();
        assert!((lb - 154.3234).abs() < 0.001);
    }

    #[test]
    fn test_temperature_affine() {
        let f = convert(37.0, UnitKind::Celsius, UnitKind::Fahrenheit).unwrap();
        assert!((f - 98.6).abs() < 0.001);

        let c = convert(98.6, UnitKind::Fahrenheit, UnitKind::Celsius).unwrap();
        assert!((c - 37.0).abs() < 0.001);
    }

    #[test]
    fn test_cross_quantity_is_error() {
        let err = convert(70.0, UnitKind::Kilograms, UnitKind::Centimeters).unwrap_err();
        assert_eq!(err.error_code(), "UNIT_MISMATCH");
    }

    #[test]
    fn test_same_unit_is_identity() {
        assert_eq!(
            convert(42.0, UnitKind::Milliliters, UnitKind::Milliliters).unwrap(),
            42.0
        );
    }

    #[test]
    fn test_round_trip_within_display_tolerance() {
        // Round-trip through display rounding loses at most 0.1
        let cases = [
            (70.0, UnitKind::Kilograms, UnitKind::Pounds),
            (170.0, UnitKind::Centimeters, UnitKind::Inches),
            (38.5, UnitKind::Celsius, UnitKind::Fahrenheit),
            (250.0, UnitKind::Milliliters, UnitKind::FluidOunces),
        ];
        for (v, a, b) in cases {
            let there = round_display(convert(v, a, b).unwrap(), 1);
            let back = round_display(convert(there, b, a).unwrap(), 1);
            assert!(
                (back - v).abs() <= 0.1,
                "{v} {:?}→{:?}→ back gave {back}",
                a,
                b
            );
        }
    }

    #[test]
    fn test_toggle_default_and_flip() {
        assert_eq!(UnitToggle::default(), UnitToggle::Metric);
        assert_eq!(UnitToggle::Metric.flipped(), UnitToggle::Regional);
        assert_eq!(UnitToggle::Regional.flipped(), UnitToggle::Metric);
    }

    #[test]
    fn test_to_metric_respects_toggle() {
        let kg = to_metric(154.3, Quantity::Weight, UnitToggle::Regional).unwrap();
        assert!((kg - 69.989).abs() < 0.01);

        // Already metric: identity
        let same = to_metric(70.0, Quantity::Weight, UnitToggle::Metric).unwrap();
        assert_eq!(same, 70.0);
    }
}
