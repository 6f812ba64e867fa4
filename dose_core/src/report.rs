//! # Report Composer
//!
//! Turns the current [`ResultBundle`] into a clipboard-ready text summary or
//! an ordered stream of typed drawing commands for the document exporter.
//! Both outputs are pure functions of `(bundle, preferences, config)` and
//! never re-trigger computation.
//!
//! ## Section order
//!
//! The section order is fixed and not reorderable by preferences:
//!
//! 1. professional identity
//! 2. patient data
//! 3. parameters
//! 4. **main result** (mandatory)
//! 5. interpretation
//! 6. safety-goals checklist
//! 7. medication-safety checklist
//! 8. audit block
//! 9. free-text notes area
//! 10. **legal disclaimer & acknowledgement** (mandatory)
//! 11. QR placeholder
//! 12. **footer timestamp** (mandatory)
//!
//! Optional sections appear iff their preference toggle is set; the three
//! mandatory sections always appear.
//!
//! ## Pagination
//!
//! The document composer tracks a running vertical cursor against a fixed
//! page height and bottom margin. A block that would cross the bottom margin
//! is moved to a fresh page, and the disclaimer block in particular starts
//! on a new page whenever it would not fit whole.

use crate::config::CalculatorConfig;
use crate::prefs::UserPreferences;
use crate::result_store::ResultBundle;

// US Letter at 72 pt/in, 1 in margins top and bottom.
const PAGE_BODY_HEIGHT_PT: f64 = 792.0 - 2.0 * 72.0;
const RULE_HEIGHT_PT: f64 = 12.0;

/// Text weight/size classes the exporter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Body,
    Small,
}

impl TextStyle {
    /// Vertical space one line of this style consumes.
    pub fn line_height_pt(self) -> f64 {
        match self {
            TextStyle::Title => 28.0,
            TextStyle::Heading => 20.0,
            TextStyle::Body => 14.0,
            TextStyle::Small => 11.0,
        }
    }
}

/// Typed drawing command consumed by a document exporter.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Text { body: String, style: TextStyle },
    Rule,
    PageBreak,
}

/// A composed section: optional heading plus styled lines.
struct Section {
    heading: Option<String>,
    lines: Vec<(TextStyle, String)>,
    is_disclaimer: bool,
}

impl Section {
    fn new(heading: impl Into<String>) -> Self {
        Section {
            heading: Some(heading.into()),
            lines: Vec::new(),
            is_disclaimer: false,
        }
    }

    fn bare() -> Self {
        Section {
            heading: None,
            lines: Vec::new(),
            is_disclaimer: false,
        }
    }

    fn line(mut self, style: TextStyle, body: impl Into<String>) -> Self {
        self.lines.push((style, body.into()));
        self
    }

    fn height_pt(&self) -> f64 {
        let heading = self
            .heading
            .as_ref()
            .map(|_| TextStyle::Heading.line_height_pt() + RULE_HEIGHT_PT)
            .unwrap_or(0.0);
        heading
            + self
                .lines
                .iter()
                .map(|(style, _)| style.line_height_pt())
                .sum::<f64>()
    }
}

/// Assemble the sections in their fixed order, honoring preference toggles.
/// Mandatory sections are emitted unconditionally.
fn build_sections(
    bundle: &ResultBundle,
    prefs: &UserPreferences,
    config: &CalculatorConfig,
) -> Vec<Section> {
    let toggles = &prefs.sections;
    let mut sections = Vec::new();

    // Report header (part of the mandatory frame, not toggleable)
    sections.push(
        Section::bare()
            .line(TextStyle::Title, config.title.clone())
            .line(TextStyle::Small, config.breadcrumbs.join(" / ")),
    );

    if toggles.professional_identity
        && !(prefs.professional_name.is_empty() && prefs.license_number.is_empty())
    {
        sections.push(
            Section::new("Prepared by")
                .line(TextStyle::Body, prefs.professional_name.clone())
                .line(
                    TextStyle::Body,
                    format!("License no.: {}", prefs.license_number),
                ),
        );
    }

    if toggles.patient_data && !bundle.patient_fields.is_empty() {
        let mut section = Section::new("Patient");
        for (label, value) in &bundle.patient_fields {
            section = section.line(TextStyle::Body, format!("{label}: {value}"));
        }
        sections.push(section);
    }

    if toggles.parameters && !bundle.input_fields.is_empty() {
        let mut section = Section::new("Parameters");
        for (label, value) in &bundle.input_fields {
            section = section.line(TextStyle::Body, format!("{label}: {value}"));
        }
        sections.push(section);
    }

    // Main result: mandatory
    sections.push(
        Section::new("Result").line(TextStyle::Title, bundle.main_result.clone()),
    );

    if toggles.interpretation && !bundle.interpretation.is_empty() {
        sections.push(
            Section::new("Interpretation").line(TextStyle::Body, bundle.interpretation.clone()),
        );
    }

    if toggles.safety_goals_checklist {
        let mut section = Section::new("Safety goals");
        for item in SAFETY_GOALS {
            section = section.line(TextStyle::Body, format!("[ ] {item}"));
        }
        sections.push(section);
    }

    if toggles.medication_safety_checklist {
        let mut section = Section::new("Medication safety");
        for item in MEDICATION_SAFETY {
            section = section.line(TextStyle::Body, format!("[ ] {item}"));
        }
        sections.push(section);
    }

    if toggles.audit_block {
        sections.push(
            Section::new("Audit")
                .line(
                    TextStyle::Body,
                    format!("Calculation type: {}", config.calculator.calc_type()),
                )
                .line(
                    TextStyle::Body,
                    format!(
                        "Recorded: {}",
                        bundle.computed_at.format("%Y-%m-%d %H:%M:%S")
                    ),
                ),
        );
    }

    if toggles.notes_area {
        let mut section = Section::new("Notes");
        for _ in 0..4 {
            section = section.line(TextStyle::Body, "_".repeat(60));
        }
        sections.push(section);
    }

    // Legal disclaimer & acknowledgement: mandatory
    let mut disclaimer = Section::new("Disclaimer & acknowledgement");
    for line in DISCLAIMER_LINES {
        disclaimer = disclaimer.line(TextStyle::Small, *line);
    }
    disclaimer = disclaimer
        .line(TextStyle::Body, "")
        .line(TextStyle::Body, "Acknowledged: ______________________  Date: ____________");
    disclaimer.is_disclaimer = true;
    sections.push(disclaimer);

    if toggles.qr_placeholder {
        sections.push(
            Section::new("Verification")
                .line(TextStyle::Body, "[ QR placeholder ]")
                .line(TextStyle::Small, format!("Document: {}", config.export_file_name)),
        );
    }

    // Footer timestamp: mandatory
    sections.push(Section::bare().line(
        TextStyle::Small,
        format!(
            "Generated {} UTC",
            bundle.computed_at.format("%Y-%m-%d %H:%M:%S")
        ),
    ));

    sections
}

const SAFETY_GOALS: &[&str] = &[
    "Patient identity verified (two identifiers)",
    "Weight and height re-checked against the chart",
    "Calculated dose compared with an independent second calculation",
    "Prescription units match the calculator units",
    "Result reviewed before transcription",
];

const MEDICATION_SAFETY: &[&str] = &[
    "Allergies and contraindications reviewed",
    "Renal and hepatic function considered",
    "Interactions with current medication checked",
    "Cumulative / maximum dose limits respected",
    "High-alert medication double-check performed",
];

const DISCLAIMER_LINES: &[&str] = &[
    "This document was produced by a calculation aid. It does not replace",
    "clinical judgement, the prescribing information, or institutional",
    "protocols. The treating professional remains solely responsible for",
    "verifying every value before use.",
];

/// Compose the plain-text summary for clipboard export.
pub fn compose_text(
    bundle: &ResultBundle,
    prefs: &UserPreferences,
    config: &CalculatorConfig,
) -> String {
    let mut out = String::new();
    for section in build_sections(bundle, prefs, config) {
        if let Some(heading) = &section.heading {
            out.push_str(heading);
            out.push('\n');
            out.push_str(&"-".repeat(heading.len().max(4)));
            out.push('\n');
        }
        for (_, line) in &section.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    // Single trailing newline
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// Compose the paginated drawing-command stream for PDF export.
pub fn compose_document(
    bundle: &ResultBundle,
    prefs: &UserPreferences,
    config: &CalculatorConfig,
) -> Vec<DrawCommand> {
    let mut commands = Vec::new();
    let mut cursor = 0.0_f64;

    for section in build_sections(bundle, prefs, config) {
        // The disclaimer starts on a fresh page when it would not fit whole;
        // other sections break lazily, line by line.
        if section.is_disclaimer
            && cursor > 0.0
            && cursor + section.height_pt() > PAGE_BODY_HEIGHT_PT
        {
            commands.push(DrawCommand::PageBreak);
            cursor = 0.0;
        }

        if let Some(heading) = &section.heading {
            let height = TextStyle::Heading.line_height_pt() + RULE_HEIGHT_PT;
            if cursor + height > PAGE_BODY_HEIGHT_PT {
                commands.push(DrawCommand::PageBreak);
                cursor = 0.0;
            }
            commands.push(DrawCommand::Rule);
            commands.push(DrawCommand::Text {
                body: heading.clone(),
                style: TextStyle::Heading,
            });
            cursor += height;
        }

        for (style, line) in &section.lines {
            let height = style.line_height_pt();
            if cursor + height > PAGE_BODY_HEIGHT_PT {
                commands.push(DrawCommand::PageBreak);
                cursor = 0.0;
            }
            commands.push(DrawCommand::Text {
                body: line.clone(),
                style: *style,
            });
            cursor += height;
        }
    }

    commands
}
