//! # Safety Range Validation
//!
//! Tiered range checks that catch implausible clinical entries before they
//! reach a formula. Each validated quantity carries a hard limit
//! (`min..=max`, blocking) and a soft warning band (`warn_min..=warn_max`,
//! confirmable):
//!
//! ```text
//!   min        warn_min          warn_max        max
//!    |----warn----|------ok---------|----warn-----|
//!  error                                         error
//! ```
//!
//! A value outside the hard limit blocks the computation outright. A value
//! inside the hard limit but outside the warning band proceeds only after
//! explicit user confirmation. Outcomes are produced fresh on every call and
//! never cached.
//!
//! ## Example
//!
//! ```rust
//! use dose_core::safety::{validate, SafetyLimits, ValidationLevel};
//!
//! let limits = SafetyLimits::new(0.5, 1.0, 300.0, 500.0).unwrap();
//! assert_eq!(validate(70.0, &limits).level, ValidationLevel::Ok);
//! assert_eq!(validate(0.7, &limits).level, ValidationLevel::Warning);
//! assert_eq!(validate(0.1, &limits).level, ValidationLevel::Error);
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::{DoseError, DoseResult};

/// Tiered numeric bounds for one clinical quantity.
///
/// Invariant (enforced at construction): `min ≤ warn_min ≤ warn_max ≤ max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyLimits {
    pub min: f64,
    pub warn_min: f64,
    pub warn_max: f64,
    pub max: f64,
}

impl SafetyLimits {
    /// Build a limit table, rejecting orderings that would make the tiers
    /// overlap or invert.
    pub fn new(min: f64, warn_min: f64, warn_max: f64, max: f64) -> DoseResult<Self> {
        if !(min <= warn_min && warn_min <= warn_max && warn_max <= max) {
            return Err(DoseError::invalid_input(
                "safety_limits",
                format!("{min}/{warn_min}/{warn_max}/{max}"),
                "limits must satisfy min <= warn_min <= warn_max <= max",
            ));
        }
        Ok(SafetyLimits {
            min,
            warn_min,
            warn_max,
            max,
        })
    }
}

/// Classification tier of a validated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    Ok,
    Warning,
    Error,
}

/// Outcome of a single validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        ValidationOutcome {
            level: ValidationLevel::Ok,
            message: String::new(),
        }
    }

    /// Blocking outcomes must not reach the formula.
    pub fn is_blocking(&self) -> bool {
        self.level == ValidationLevel::Error
    }

    /// Warnings proceed only after explicit confirmation.
    pub fn needs_confirmation(&self) -> bool {
        self.level == ValidationLevel::Warning
    }
}

/// Classify a numeric value against a limit table.
pub fn validate(value: f64, limits: &SafetyLimits) -> ValidationOutcome {
    if !value.is_finite() || value < limits.min || value > limits.max {
        return ValidationOutcome {
            level: ValidationLevel::Error,
            message: format!(
                "value {value} is outside the safe range {}..{}",
                limits.min, limits.max
            ),
        };
    }
    if value < limits.warn_min || value > limits.warn_max {
        return ValidationOutcome {
            level: ValidationLevel::Warning,
            message: format!(
                "value {value} is unusual (expected {}..{}); please confirm",
                limits.warn_min, limits.warn_max
            ),
        };
    }
    ValidationOutcome::ok()
}

/// Parse a raw field string and classify it.
///
/// Empty or non-numeric input is a distinct missing-value error, never
/// silently coerced to 0. Returns the parsed value alongside the outcome so
/// the caller validates and extracts in one step.
pub fn parse_and_validate(
    raw: &str,
    field: &str,
    limits: &SafetyLimits,
) -> DoseResult<(f64, ValidationOutcome)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DoseError::missing_input(field));
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| DoseError::missing_input(field))?;
    Ok((value, validate(value, limits)))
}

/// Built-in limit tables for the standard clinical quantities. Per-config
/// overrides take precedence over these.
pub static BUILTIN_LIMITS: Lazy<HashMap<&'static str, SafetyLimits>> = Lazy::new(|| {
    let mut m = HashMap::new();
    // Hard limits catch transcription errors; warning bands catch values that
    // are possible but rare enough to deserve a second look.
    m.insert(
        "weight_kg",
        SafetyLimits {
            min: 0.5,
            warn_min: 1.0,
            warn_max: 300.0,
            max: 500.0,
        },
    );
    m.insert(
        "height_cm",
        SafetyLimits {
            min: 30.0,
            warn_min: 50.0,
            warn_max: 220.0,
            max: 250.0,
        },
    );
    m.insert(
        "temperature_c",
        SafetyLimits {
            min: 30.0,
            warn_min: 35.0,
            warn_max: 42.0,
            max: 45.0,
        },
    );
    m.insert(
        "dose_per_m2",
        SafetyLimits {
            min: 1.0,
            warn_min: 5.0,
            warn_max: 5000.0,
            max: 10000.0,
        },
    );
    m.insert(
        "dose_per_kg",
        SafetyLimits {
            min: 0.01,
            warn_min: 0.1,
            warn_max: 100.0,
            max: 1000.0,
        },
    );
    m
});

/// Look up a built-in limit table by field id.
pub fn builtin_limits(field: &str) -> Option<SafetyLimits> {
    BUILTIN_LIMITS.get(field).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_limits() -> SafetyLimits {
        SafetyLimits::new(0.5, 1.0, 300.0, 500.0).unwrap()
    }

    #[test]
    fn test_trichotomy() {
        let limits = weight_limits();
        // Exactly one of ok/warning/error for a sweep of values
        for v in [-10.0, 0.1, 0.5, 0.7, 1.0, 70.0, 300.0, 350.0, 500.0, 501.0] {
            let outcome = validate(v, &limits);
            let tiers = [
                ValidationLevel::Ok,
                ValidationLevel::Warning,
                ValidationLevel::Error,
            ];
            assert_eq!(tiers.iter().filter(|t| **t == outcome.level).count(), 1);
        }
    }

    #[test]
    fn test_boundaries_inclusive() {
        let limits = weight_limits();
        assert_eq!(validate(0.5, &limits).level, ValidationLevel::Warning);
        assert_eq!(validate(1.0, &limits).level, ValidationLevel::Ok);
        assert_eq!(validate(300.0, &limits).level, ValidationLevel::Ok);
        assert_eq!(validate(500.0, &limits).level, ValidationLevel::Warning);
        assert_eq!(validate(500.01, &limits).level, ValidationLevel::Error);
    }

    #[test]
    fn test_below_hard_minimum_blocks() {
        let outcome = validate(0.1, &weight_limits());
        assert_eq!(outcome.level, ValidationLevel::Error);
        assert!(outcome.is_blocking());
    }

    #[test]
    fn test_height_below_warn_min_warns() {
        let limits = SafetyLimits::new(30.0, 50.0, 220.0, 250.0).unwrap();
        let outcome = validate(45.0, &limits);
        assert_eq!(outcome.level, ValidationLevel::Warning);
        assert!(outcome.needs_confirmation());
    }

    #[test]
    fn test_nan_blocks() {
        assert!(validate(f64::NAN, &weight_limits()).is_blocking());
    }

    #[test]
    fn test_invalid_ordering_rejected() {
        assert!(SafetyLimits::new(1.0, 0.5, 300.0, 500.0).is_err());
        assert!(SafetyLimits::new(0.5, 1.0, 600.0, 500.0).is_err());
        assert!(SafetyLimits::new(0.5, 301.0, 300.0, 500.0).is_err());
    }

    #[test]
    fn test_missing_input_not_coerced() {
        let limits = weight_limits();
        assert_eq!(
            parse_and_validate("", "weight", &limits).unwrap_err(),
            DoseError::missing_input("weight")
        );
        assert_eq!(
            parse_and_validate("abc", "weight", &limits).unwrap_err(),
            DoseError::missing_input("weight")
        );
    }

    #[test]
    fn test_parse_and_validate_ok() {
        let (value, outcome) = parse_and_validate(" 70.0 ", "weight", &weight_limits()).unwrap();
        assert_eq!(value, 70.0);
        assert_eq!(outcome.level, ValidationLevel::Ok);
    }

    #[test]
    fn test_builtin_table() {
        let weight = builtin_limits("weight_kg").unwrap();
        assert_eq!(weight.min, 0.5);
        assert!(builtin_limits("unknown").is_none());
    }
}
