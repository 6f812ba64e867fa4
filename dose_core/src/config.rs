//! # Calculator Configuration
//!
//! The declarative description of one calculator page: identity, layout
//! flags, breadcrumb trail, tabs content, related tools, and the form fields
//! the orchestrator lays out and validates. Created once per session and
//! never mutated.
//!
//! ## Example
//!
//! ```rust
//! use dose_core::config::CalculatorConfig;
//!
//! let config = CalculatorConfig::bsa_dose();
//! assert_eq!(config.name, "bsa-dose");
//! assert!(config.fields.iter().any(|f| f.id == "weight_kg"));
//! ```

use serde::{Deserialize, Serialize};

use crate::calculators::CalculatorKind;
use crate::safety::{builtin_limits, SafetyLimits};
use crate::units::Quantity;

/// Immutable per-page calculator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatorConfig {
    /// Logical path / storage partition key (e.g. "bsa-dose")
    pub name: String,

    /// Page title
    pub title: String,

    /// Base file name for exported reports (without extension)
    pub export_file_name: String,

    /// Which optional page sections the orchestrator lays out
    pub layout: LayoutFlags,

    /// Breadcrumb trail, outermost first
    pub breadcrumbs: Vec<String>,

    /// Tabs content shown alongside the form
    pub tabs: TabsContent,

    /// Related calculators, rendered after a successful computation
    pub related_tools: Vec<RelatedTool>,

    /// Form fields, in layout order
    pub fields: Vec<FieldSpec>,

    /// The formula this page drives
    pub calculator: CalculatorKind,
}

/// Optional page sections. These gate layout, not behavior: a disabled
/// section's component is simply never wired up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutFlags {
    pub show_history: bool,
    pub show_audit: bool,
    pub show_related_tools: bool,
    pub show_safety_checklists: bool,
}

impl Default for LayoutFlags {
    fn default() -> Self {
        LayoutFlags {
            show_history: true,
            show_audit: true,
            show_related_tools: true,
            show_safety_checklists: true,
        }
    }
}

/// Static tab content (description, formula, references).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabsContent {
    pub description: String,
    pub formula: String,
    pub references: Vec<String>,
}

/// A related calculator link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedTool {
    pub title: String,
    pub href: String,
}

/// One form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Stable field id; numeric ids double as formula input names
    pub id: String,
    /// Human label for form and reports
    pub label: String,
    pub kind: FieldKind,
    /// Optional fields may be left empty without a missing-value error
    pub required: bool,
}

/// Field data type. Text fields feed the patient block; numeric fields feed
/// the formula after validation and metric normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Numeric {
        /// Present when the field offers a metric/regional unit toggle
        quantity: Option<Quantity>,
        /// Safety range; None skips range validation (e.g. an optional cap)
        limits: Option<SafetyLimits>,
        /// Display precision
        decimals: u32,
    },
}

impl FieldSpec {
    pub fn text(id: impl Into<String>, label: impl Into<String>) -> Self {
        FieldSpec {
            id: id.into(),
            label: label.into(),
            kind: FieldKind::Text,
            required: false,
        }
    }

    pub fn numeric(
        id: impl Into<String>,
        label: impl Into<String>,
        quantity: Option<Quantity>,
        limits: Option<SafetyLimits>,
    ) -> Self {
        FieldSpec {
            id: id.into(),
            label: label.into(),
            kind: FieldKind::Numeric {
                quantity,
                limits,
                decimals: 1,
            },
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// The unit toggle quantity, if this field has one
    pub fn quantity(&self) -> Option<Quantity> {
        match &self.kind {
            FieldKind::Numeric { quantity, .. } => *quantity,
            FieldKind::Text => None,
        }
    }

    /// The safety limits for this field, if any
    pub fn limits(&self) -> Option<SafetyLimits> {
        match &self.kind {
            FieldKind::Numeric { limits, .. } => *limits,
            FieldKind::Text => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, FieldKind::Numeric { .. })
    }
}

impl CalculatorConfig {
    /// Body-surface-area dosing page.
    pub fn bsa_dose() -> Self {
        CalculatorConfig {
            name: "bsa-dose".to_string(),
            title: "Body Surface Area Dose Calculator".to_string(),
            export_file_name: "bsa-dose-report".to_string(),
            layout: LayoutFlags::default(),
            breadcrumbs: vec![
                "Calculators".to_string(),
                "Oncology".to_string(),
                "BSA Dose".to_string(),
            ],
            tabs: TabsContent {
                description: "Scales a prescribed dose density (mg/m²) to an absolute \
                              dose using the patient's body surface area."
                    .to_string(),
                formula: "BSA = sqrt(weight × height / 3600); dose = BSA × density".to_string(),
                references: vec![
                    "Mosteller RD. Simplified calculation of body-surface area. \
                     N Engl J Med 1987;317:1098."
                        .to_string(),
                ],
            },
            related_tools: vec![RelatedTool {
                title: "Weight-Based Dose Calculator".to_string(),
                href: "/calculators/weight-dose".to_string(),
            }],
            fields: vec![
                FieldSpec::text("patient_name", "Patient name"),
                FieldSpec::numeric(
                    "weight_kg",
                    "Weight",
                    Some(Quantity::Weight),
                    builtin_limits("weight_kg"),
                ),
                FieldSpec::numeric(
                    "height_cm",
                    "Height",
                    Some(Quantity::Height),
                    builtin_limits("height_cm"),
                ),
                FieldSpec::numeric(
                    "dose_per_m2",
                    "Prescribed dose (mg/m²)",
                    None,
                    builtin_limits("dose_per_m2"),
                ),
            ],
            calculator: CalculatorKind::BsaDose,
        }
    }

    /// Weight-based (mg/kg) dosing page.
    pub fn weight_dose() -> Self {
        CalculatorConfig {
            name: "weight-dose".to_string(),
            title: "Weight-Based Dose Calculator".to_string(),
            export_file_name: "weight-dose-report".to_string(),
            layout: LayoutFlags::default(),
            breadcrumbs: vec![
                "Calculators".to_string(),
                "General".to_string(),
                "Weight Dose".to_string(),
            ],
            tabs: TabsContent {
                description: "Computes an absolute dose from a mg/kg prescription, \
                              with an optional absolute maximum."
                    .to_string(),
                formula: "dose = weight × mg/kg, capped at the maximum when given".to_string(),
                references: vec![],
            },
            related_tools: vec![RelatedTool {
                title: "Body Surface Area Dose Calculator".to_string(),
                href: "/calculators/bsa-dose".to_string(),
            }],
            fields: vec![
                FieldSpec::text("patient_name", "Patient name"),
                FieldSpec::numeric(
                    "weight_kg",
                    "Weight",
                    Some(Quantity::Weight),
                    builtin_limits("weight_kg"),
                ),
                FieldSpec::numeric(
                    "dose_per_kg",
                    "Prescribed dose (mg/kg)",
                    None,
                    builtin_limits("dose_per_kg"),
                ),
                FieldSpec::numeric("max_dose_mg", "Maximum dose (mg)", None, None).optional(),
            ],
            calculator: CalculatorKind::WeightDose,
        }
    }

    /// Look up a field spec by id
    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bsa_config_shape() {
        let config = CalculatorConfig::bsa_dose();
        assert_eq!(config.calculator, CalculatorKind::BsaDose);
        assert_eq!(config.breadcrumbs.len(), 3);

        let weight = config.field("weight_kg").unwrap();
        assert_eq!(weight.quantity(), Some(Quantity::Weight));
        assert!(weight.limits().is_some());
        assert!(weight.required);

        let name = config.field("patient_name").unwrap();
        assert!(!name.is_numeric());
        assert!(!name.required);
    }

    #[test]
    fn test_optional_field() {
        let config = CalculatorConfig::weight_dose();
        let cap = config.field("max_dose_mg").unwrap();
        assert!(!cap.required);
        assert!(cap.limits().is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = CalculatorConfig::bsa_dose();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("bsa-dose"));

        let roundtrip: CalculatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.name, "bsa-dose");
        assert_eq!(roundtrip.fields.len(), 4);
    }
}
