//! # Rendering Boundary
//!
//! The engine never builds markup. It hands data - bundles, validation
//! outcomes, history entries - to a [`Renderer`], and asks a
//! [`ConfirmationPrompt`] before destructive or unusual actions. Hosts
//! implement both; tests use recording fakes.

use crate::config::CalculatorConfig;
use crate::history::HistoryEntry;
use crate::result_store::ResultBundle;
use crate::safety::ValidationOutcome;

/// Named injection points into the host's rendering layer.
///
/// At most one annotation is visible per field: the session calls
/// `clear_annotation` before re-annotating, so implementations may simply
/// replace whatever is shown.
pub trait Renderer {
    /// Lay out the form skeleton from the static configuration
    fn render_form(&mut self, config: &CalculatorConfig);

    /// Show the computed result in the results panel
    fn render_result(&mut self, bundle: &ResultBundle);

    /// Annotate a field with a warning or error
    fn render_annotation(&mut self, field: &str, outcome: &ValidationOutcome);

    /// Remove a field's annotation, if any
    fn clear_annotation(&mut self, field: &str);

    /// Re-render the history list after a push or clear
    fn render_history(&mut self, entries: &[HistoryEntry]);

    /// Transient, non-blocking feedback (toasts)
    fn notify(&mut self, message: &str);
}

/// Confirmation collaborator for warning-range values and destructive
/// actions (ledger/history clears).
pub trait ConfirmationPrompt {
    fn confirm(&mut self, message: &str) -> bool;
}

/// Renderer that does nothing; for headless use.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render_form(&mut self, _config: &CalculatorConfig) {}
    fn render_result(&mut self, _bundle: &ResultBundle) {}
    fn render_annotation(&mut self, _field: &str, _outcome: &ValidationOutcome) {}
    fn clear_annotation(&mut self, _field: &str) {}
    fn render_history(&mut self, _entries: &[HistoryEntry]) {}
    fn notify(&mut self, _message: &str) {}
}

/// Prompt that accepts everything; for headless use.
#[derive(Debug, Default)]
pub struct AlwaysConfirm;

impl ConfirmationPrompt for AlwaysConfirm {
    fn confirm(&mut self, _message: &str) -> bool {
        true
    }
}
