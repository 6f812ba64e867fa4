//! # Calculator Session
//!
//! The orchestrator. One `CalculatorSession` owns the state of one
//! calculator page: the immutable configuration, the raw form values, the
//! per-field unit toggles, the results-panel state machine, and handles to
//! the durable components (ledger, history, preferences) and collaborators.
//!
//! All interaction flows through [`CalculatorSession::dispatch`] with a
//! typed [`Command`] - there is no stringly-typed wiring between the host
//! and the engine.
//!
//! ## Results-panel state machine
//!
//! ```text
//! Hidden --(validated computation succeeds)--> Visible
//! Visible --(explicit reset)-----------------> Hidden
//! ```
//!
//! The `Visible` transition fires only after the Result Store is populated;
//! reset also clears the store, all field annotations, and the unit toggles.
//!
//! ## Compute flow
//!
//! parse + validate every configured field (stale annotations cleared
//! first) → blocking errors abort → warnings need confirmation, declining
//! aborts with no side effects → inputs normalize to metric → the formula
//! runs → Result Store, ledger and history update synchronously → the panel
//! becomes visible. Exports always operate on a snapshot taken afterwards.

use std::collections::{BTreeMap, BTreeSet};

use crate::calculators::NormalizedInputs;
use crate::capability::CapabilityRegistry;
use crate::config::{CalculatorConfig, FieldKind, FieldSpec};
use crate::errors::{DoseError, DoseResult};
use crate::history::{HistoryBuffer, HistoryEntry};
use crate::ledger::{AuditDraft, AuditLedger};
use crate::prefs::UserPreferences;
use crate::render::{ConfirmationPrompt, Renderer};
use crate::report::{compose_document, compose_text};
use crate::result_store::{ResultBundle, ResultStore};
use crate::safety::{parse_and_validate, validate, ValidationLevel, ValidationOutcome};
use crate::storage::KeyValueStore;
use crate::units::{convert, round_display, to_metric, UnitToggle};

/// Visibility of the results panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Hidden,
    Visible,
}

/// Typed commands a host dispatches into the session.
#[derive(Debug, Clone)]
pub enum Command {
    /// Store a raw field value as typed by the user
    SetField { field: String, value: String },
    /// Flip a field's unit system, rewriting the displayed value
    ToggleUnit { field: String },
    /// Validate, compute, record, reveal
    Compute,
    /// Explicit form reset
    Reset,
    /// Copy a history entry's raw values back into the form (no recompute)
    LoadHistoryEntry { index: usize },
    /// Export the current result as clipboard text
    ExportClipboard,
    /// Export the current result as a PDF document
    ExportPdf,
    /// Export one audit record as JSON
    ExportAuditRecord { id: String },
    /// Export the whole audit ledger as JSON
    ExportAuditLedger,
    /// Discard all audit records (asks for confirmation)
    ClearLedger,
    /// Discard all history entries (asks for confirmation)
    ClearHistory,
    /// Replace and persist the user preferences
    SavePreferences(UserPreferences),
}

/// What a dispatched command produced for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// State may have changed; nothing to hand over
    None,
    /// A binary document to offer as a download
    Pdf { file_name: String, bytes: Vec<u8> },
    /// A text document to offer as a download
    Download { file_name: String, content: String },
}

/// One calculator page's orchestrator.
pub struct CalculatorSession {
    config: CalculatorConfig,

    /// Raw form values as typed, field id → string
    fields: BTreeMap<String, String>,

    /// Unit toggle per quantity-bearing field
    toggles: BTreeMap<String, UnitToggle>,

    /// Fields with a currently rendered annotation
    annotated: BTreeSet<String>,

    panel: PanelState,
    results: ResultStore,
    ledger: AuditLedger,
    history: HistoryBuffer,
    prefs: UserPreferences,

    store: Box<dyn KeyValueStore>,
    renderer: Box<dyn Renderer>,
    prompt: Box<dyn ConfirmationPrompt>,
    capabilities: CapabilityRegistry,
}

impl CalculatorSession {
    /// Wire a session: load the durable components, lay out the form, and
    /// show any persisted history.
    pub fn new(
        config: CalculatorConfig,
        store: Box<dyn KeyValueStore>,
        mut renderer: Box<dyn Renderer>,
        prompt: Box<dyn ConfirmationPrompt>,
        capabilities: CapabilityRegistry,
    ) -> Self {
        let ledger = AuditLedger::load(store.as_ref(), &config.name);
        let history = HistoryBuffer::load(store.as_ref(), &config.name);
        let prefs = UserPreferences::load(store.as_ref());

        renderer.render_form(&config);
        if config.layout.show_history {
            renderer.render_history(history.entries());
        }

        CalculatorSession {
            config,
            fields: BTreeMap::new(),
            toggles: BTreeMap::new(),
            annotated: BTreeSet::new(),
            panel: PanelState::Hidden,
            results: ResultStore::new(),
            ledger,
            history,
            prefs,
            store,
            renderer,
            prompt,
            capabilities,
        }
    }

    /// Single entry point for all host interaction.
    pub fn dispatch(&mut self, command: Command) -> DoseResult<Dispatched> {
        match command {
            Command::SetField { field, value } => {
                self.fields.insert(field, value);
                Ok(Dispatched::None)
            }
            Command::ToggleUnit { field } => {
                self.toggle_unit(&field)?;
                Ok(Dispatched::None)
            }
            Command::Compute => {
                self.compute()?;
                Ok(Dispatched::None)
            }
            Command::Reset => {
                self.reset();
                Ok(Dispatched::None)
            }
            Command::LoadHistoryEntry { index } => {
                self.load_history_entry(index)?;
                Ok(Dispatched::None)
            }
            Command::ExportClipboard => {
                self.export_clipboard()?;
                Ok(Dispatched::None)
            }
            Command::ExportPdf => self.export_pdf(),
            Command::ExportAuditRecord { id } => {
                let content = self.ledger.export_one(&id)?;
                Ok(Dispatched::Download {
                    file_name: format!("audit-{id}.json"),
                    content,
                })
            }
            Command::ExportAuditLedger => {
                let content = self.ledger.export_all()?;
                Ok(Dispatched::Download {
                    file_name: format!("{}-audit-ledger.json", self.config.name),
                    content,
                })
            }
            Command::ClearLedger => {
                self.clear_ledger();
                Ok(Dispatched::None)
            }
            Command::ClearHistory => {
                self.clear_history();
                Ok(Dispatched::None)
            }
            Command::SavePreferences(prefs) => {
                self.save_preferences(prefs);
                Ok(Dispatched::None)
            }
        }
    }

    // ========================================================================
    // Compute flow
    // ========================================================================

    fn compute(&mut self) -> DoseResult<()> {
        self.clear_all_annotations();

        let mut inputs = NormalizedInputs::new();
        let mut first_blocking: Option<DoseError> = None;
        let mut warnings: Vec<(String, ValidationOutcome)> = Vec::new();

        for spec in self.config.fields.clone() {
            if !spec.is_numeric() {
                continue;
            }
            match self.validate_field(&spec) {
                Ok(None) => {} // optional field left empty
                Ok(Some((metric_value, outcome))) => {
                    match outcome.level {
                        ValidationLevel::Ok => {}
                        ValidationLevel::Warning => {
                            self.annotate(&spec.id, &outcome);
                            warnings.push((spec.id.clone(), outcome));
                        }
                        ValidationLevel::Error => {
                            self.annotate(&spec.id, &outcome);
                            if first_blocking.is_none() {
                                first_blocking = Some(self.range_error(&spec, &outcome));
                            }
                            continue;
                        }
                    }
                    inputs.insert(spec.id.clone(), metric_value);
                }
                Err(e) => {
                    let outcome = ValidationOutcome {
                        level: ValidationLevel::Error,
                        message: e.to_string(),
                    };
                    self.annotate(&spec.id, &outcome);
                    if first_blocking.is_none() {
                        first_blocking = Some(e);
                    }
                }
            }
        }

        // Blocking errors abort before any confirmation dialog appears
        if let Some(error) = first_blocking {
            return Err(error);
        }

        // Unusual values proceed only after explicit confirmation; declining
        // aborts with no side effects
        for (field, outcome) in &warnings {
            let label = self
                .config
                .field(field)
                .map(|f| f.label.clone())
                .unwrap_or_else(|| field.clone());
            let message = format!("{label}: {}", outcome.message);
            if !self.prompt.confirm(&message) {
                return Err(DoseError::UnusualDeclined {
                    field: field.clone(),
                });
            }
        }

        let computed = self.config.calculator.compute(&inputs)?;

        // Build the new bundle: a complete replacement, never a merge
        let mut bundle = ResultBundle::new(&computed.main_result, &computed.interpretation);
        for spec in &self.config.fields {
            let Some(raw) = self.fields.get(&spec.id) else {
                continue;
            };
            if raw.trim().is_empty() {
                continue;
            }
            match &spec.kind {
                FieldKind::Text => {
                    bundle
                        .patient_fields
                        .insert(spec.label.clone(), raw.trim().to_string());
                }
                FieldKind::Numeric { decimals, .. } => {
                    if let Some(metric) = inputs.get(&spec.id) {
                        bundle
                            .input_fields
                            .insert(spec.label.clone(), self.format_metric(spec, metric, *decimals));
                    }
                }
            }
        }

        let bundle = self.results.set_result(bundle).clone();

        self.record_audit(&bundle);
        self.record_history(&bundle, computed.computed_value, &inputs);

        // Hidden -> Visible fires only now, after the store is populated
        self.panel = PanelState::Visible;
        tracing::debug!(calculator = %self.config.name, "results panel visible");
        self.renderer.render_result(&bundle);

        Ok(())
    }

    /// Parse and classify one numeric field. Returns the metric-normalized
    /// value with its outcome, or `None` for an optional field left empty.
    fn validate_field(
        &mut self,
        spec: &FieldSpec,
    ) -> DoseResult<Option<(f64, ValidationOutcome)>> {
        let raw = self.fields.get(&spec.id).cloned().unwrap_or_default();
        if raw.trim().is_empty() {
            if spec.required {
                return Err(DoseError::missing_input(&spec.id));
            }
            return Ok(None);
        }

        // Displayed values live in the toggle's unit system; safety limits
        // are metric, so normalize before classifying.
        let toggle = self.toggle_for(&spec.id);
        match (spec.quantity(), spec.limits()) {
            (Some(quantity), Some(limits)) => {
                let displayed: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| DoseError::missing_input(&spec.id))?;
                let metric = to_metric(displayed, quantity, toggle)?;
                Ok(Some((metric, validate(metric, &limits))))
            }
            (Some(quantity), None) => {
                let displayed: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| DoseError::missing_input(&spec.id))?;
                let metric = to_metric(displayed, quantity, toggle)?;
                Ok(Some((metric, ValidationOutcome::ok())))
            }
            (None, Some(limits)) => {
                let (value, outcome) = parse_and_validate(&raw, &spec.id, &limits)?;
                Ok(Some((value, outcome)))
            }
            (None, None) => {
                let value: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| DoseError::missing_input(&spec.id))?;
                Ok(Some((value, ValidationOutcome::ok())))
            }
        }
    }

    fn range_error(&self, spec: &FieldSpec, outcome: &ValidationOutcome) -> DoseError {
        match spec.limits() {
            Some(limits) => DoseError::OutOfRange {
                field: spec.id.clone(),
                value: self
                    .fields
                    .get(&spec.id)
                    .and_then(|raw| raw.trim().parse().ok())
                    .unwrap_or(f64::NAN),
                min: limits.min,
                max: limits.max,
            },
            None => DoseError::invalid_input(&spec.id, "", outcome.message.clone()),
        }
    }

    fn record_audit(&mut self, bundle: &ResultBundle) {
        self.ledger.append(AuditDraft {
            calculation_type: self.config.calculator.calc_type().to_string(),
            patient: bundle.patient_fields.clone(),
            inputs: bundle.input_fields.clone(),
            result_summary: bundle.main_result.clone(),
        });
        if let Err(e) = self.ledger.persist(self.store.as_mut()) {
            tracing::warn!(error = %e, "audit ledger not persisted");
            self.renderer
                .notify("Calculation recorded, but the audit log could not be saved");
        }
    }

    fn record_history(
        &mut self,
        bundle: &ResultBundle,
        computed_value: f64,
        inputs: &NormalizedInputs,
    ) {
        if !self.config.layout.show_history {
            return;
        }
        // Raw values recall in metric so a later load needs no toggle state
        let mut raw_inputs = BTreeMap::new();
        for spec in &self.config.fields {
            match &spec.kind {
                FieldKind::Text => {
                    if let Some(raw) = self.fields.get(&spec.id) {
                        raw_inputs.insert(spec.id.clone(), raw.clone());
                    }
                }
                FieldKind::Numeric { decimals, .. } => {
                    if let Some(metric) = inputs.get(&spec.id) {
                        raw_inputs.insert(
                            spec.id.clone(),
                            format!("{:.*}", *decimals as usize, metric),
                        );
                    }
                }
            }
        }

        self.history.push(HistoryEntry {
            patient_name: self
                .fields
                .get("patient_name")
                .cloned()
                .unwrap_or_default(),
            raw_inputs,
            formatted_inputs: bundle.input_fields.clone(),
            computed_value,
            date_label: bundle.computed_at.format("%Y-%m-%d").to_string(),
        });
        if let Err(e) = self.history.persist(self.store.as_mut()) {
            tracing::warn!(error = %e, "history not persisted");
            self.renderer.notify("History could not be saved");
        }
        self.renderer.render_history(self.history.entries());
    }

    // ========================================================================
    // Reset and field handling
    // ========================================================================

    fn reset(&mut self) {
        self.clear_all_annotations();
        self.fields.clear();
        self.toggles.clear();
        self.results.clear();
        self.panel = PanelState::Hidden;
        tracing::debug!(calculator = %self.config.name, "session reset");
    }

    fn toggle_unit(&mut self, field: &str) -> DoseResult<()> {
        let spec = self
            .config
            .field(field)
            .ok_or_else(|| DoseError::invalid_input(field, "", "unknown field"))?
            .clone();
        let quantity = spec.quantity().ok_or_else(|| {
            DoseError::invalid_input(field, "", "field has no unit toggle")
        })?;

        let old = self.toggle_for(field);
        let new = old.flipped();
        self.toggles.insert(field.to_string(), new);

        // Rewrite the displayed value through conversion; a blank or
        // unparseable field has nothing to rewrite
        if let Some(raw) = self.fields.get(field) {
            if let Ok(displayed) = raw.trim().parse::<f64>() {
                let converted = convert(
                    displayed,
                    quantity.unit_for(old),
                    quantity.unit_for(new),
                )?;
                let decimals = match spec.kind {
                    FieldKind::Numeric { decimals, .. } => decimals,
                    FieldKind::Text => 1,
                };
                self.fields.insert(
                    field.to_string(),
                    format!("{:.*}", decimals as usize, round_display(converted, decimals)),
                );
            }
        }
        Ok(())
    }

    fn load_history_entry(&mut self, index: usize) -> DoseResult<()> {
        let entry = self
            .history
            .entry(index)
            .ok_or_else(|| {
                DoseError::invalid_input("history_index", index.to_string(), "no such entry")
            })?
            .clone();

        self.clear_all_annotations();
        // History stores metric values; make the toggles agree
        self.toggles.clear();
        for (field, raw) in entry.raw_inputs {
            self.fields.insert(field, raw);
        }
        // No recompute: the user re-triggers Compute explicitly
        Ok(())
    }

    // ========================================================================
    // Exports (snapshots, after all synchronous mutation)
    // ========================================================================

    fn export_clipboard(&mut self) -> DoseResult<()> {
        let bundle = self.snapshot()?;
        let text = compose_text(&bundle, &self.prefs, &self.config);
        let result = self
            .capabilities
            .clipboard()
            .and_then(|clipboard| clipboard.write_text(&text));
        if let Err(e) = &result {
            tracing::warn!(error = %e, "clipboard export failed");
            self.renderer.notify("Could not copy the report to the clipboard");
        }
        result
    }

    fn export_pdf(&mut self) -> DoseResult<Dispatched> {
        let bundle = self.snapshot()?;
        let commands = compose_document(&bundle, &self.prefs, &self.config);
        let rendered = self
            .capabilities
            .document_exporter()
            .and_then(|exporter| exporter.render(&commands));
        match rendered {
            Ok(bytes) => Ok(Dispatched::Pdf {
                file_name: format!("{}.pdf", self.config.export_file_name),
                bytes,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "pdf export failed");
                self.renderer.notify("Could not generate the PDF report");
                Err(e)
            }
        }
    }

    /// Exports capture the bundle at invocation time; a later recompute does
    /// not affect an already-produced document.
    fn snapshot(&self) -> DoseResult<ResultBundle> {
        self.results
            .result()
            .cloned()
            .ok_or_else(|| DoseError::Internal {
                message: "no result to export".to_string(),
            })
    }

    // ========================================================================
    // Destructive actions (confirmation-gated)
    // ========================================================================

    fn clear_ledger(&mut self) {
        if !self
            .prompt
            .confirm("Delete all audit records for this calculator?")
        {
            return;
        }
        self.ledger.clear();
        if let Err(e) = self.ledger.persist(self.store.as_mut()) {
            tracing::warn!(error = %e, "cleared ledger not persisted");
            self.renderer.notify("Audit log cleared in memory only");
        }
    }

    fn clear_history(&mut self) {
        if !self.prompt.confirm("Delete the calculation history?") {
            return;
        }
        self.history.clear();
        if let Err(e) = self.history.persist(self.store.as_mut()) {
            tracing::warn!(error = %e, "cleared history not persisted");
            self.renderer.notify("History cleared in memory only");
        }
        self.renderer.render_history(self.history.entries());
    }

    fn save_preferences(&mut self, prefs: UserPreferences) {
        self.prefs = prefs;
        if let Err(e) = self.prefs.save(self.store.as_mut()) {
            tracing::warn!(error = %e, "preferences not persisted");
            self.renderer.notify("Preferences could not be saved");
        }
    }

    // ========================================================================
    // Annotation discipline: at most one per field
    // ========================================================================

    fn annotate(&mut self, field: &str, outcome: &ValidationOutcome) {
        if self.annotated.contains(field) {
            self.renderer.clear_annotation(field);
        }
        self.renderer.render_annotation(field, outcome);
        self.annotated.insert(field.to_string());
    }

    fn clear_all_annotations(&mut self) {
        for field in std::mem::take(&mut self.annotated) {
            self.renderer.clear_annotation(&field);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    fn toggle_for(&self, field: &str) -> UnitToggle {
        self.toggles.get(field).copied().unwrap_or_default()
    }

    fn format_metric(&self, spec: &FieldSpec, value: f64, decimals: u32) -> String {
        match spec.quantity() {
            Some(quantity) => format!(
                "{:.*} {}",
                decimals as usize,
                value,
                quantity.metric_unit().symbol()
            ),
            None => format!("{:.*}", decimals as usize, value),
        }
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    pub fn panel(&self) -> PanelState {
        self.panel
    }

    pub fn result(&self) -> Option<&ResultBundle> {
        self.results.result()
    }

    pub fn field(&self, id: &str) -> Option<&str> {
        self.fields.get(id).map(String::as_str)
    }

    pub fn unit_toggle(&self, field: &str) -> UnitToggle {
        self.toggle_for(field)
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.prefs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::capability::Clipboard;
    use crate::storage::{MemoryStore, StorageKey};

    // ------------------------------------------------------------------
    // Test collaborators
    // ------------------------------------------------------------------

    struct RecordingRenderer {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl Renderer for RecordingRenderer {
        fn render_form(&mut self, config: &CalculatorConfig) {
            self.events.borrow_mut().push(format!("form:{}", config.name));
        }
        fn render_result(&mut self, bundle: &ResultBundle) {
            self.events
                .borrow_mut()
                .push(format!("result:{}", bundle.main_result));
        }
        fn render_annotation(&mut self, field: &str, outcome: &ValidationOutcome) {
            self.events
                .borrow_mut()
                .push(format!("annotate:{field}:{:?}", outcome.level));
        }
        fn clear_annotation(&mut self, field: &str) {
            self.events.borrow_mut().push(format!("clear:{field}"));
        }
        fn render_history(&mut self, entries: &[HistoryEntry]) {
            self.events
                .borrow_mut()
                .push(format!("history:{}", entries.len()));
        }
        fn notify(&mut self, message: &str) {
            self.events.borrow_mut().push(format!("notify:{message}"));
        }
    }

    struct ScriptedPrompt {
        answers: Rc<RefCell<Vec<bool>>>,
        asked: Rc<RefCell<Vec<String>>>,
    }

    impl ConfirmationPrompt for ScriptedPrompt {
        fn confirm(&mut self, message: &str) -> bool {
            self.asked.borrow_mut().push(message.to_string());
            let mut answers = self.answers.borrow_mut();
            if answers.is_empty() {
                true
            } else {
                answers.remove(0)
            }
        }
    }

    #[derive(Debug)]
    struct FakeClipboard {
        written: Rc<RefCell<Vec<String>>>,
    }

    impl Clipboard for FakeClipboard {
        fn write_text(&mut self, text: &str) -> DoseResult<()> {
            self.written.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    /// Store whose writes always fail, to exercise the persistence boundary.
    struct QuotaExceededStore;

    impl KeyValueStore for QuotaExceededStore {
        fn get(&self, _key: &StorageKey) -> Option<String> {
            None
        }
        fn set(&mut self, key: &StorageKey, _value: String) -> DoseResult<()> {
            Err(DoseError::persistence(key.to_string(), "quota exceeded"))
        }
        fn remove(&mut self, _key: &StorageKey) {}
    }

    struct Harness {
        session: CalculatorSession,
        events: Rc<RefCell<Vec<String>>>,
        asked: Rc<RefCell<Vec<String>>>,
        written: Rc<RefCell<Vec<String>>>,
    }

    fn harness_with(
        store: Box<dyn KeyValueStore>,
        answers: Vec<bool>,
    ) -> Harness {
        let events: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let asked = Rc::new(RefCell::new(Vec::new()));
        let answers = Rc::new(RefCell::new(answers));
        let written = Rc::new(RefCell::new(Vec::new()));

        let capabilities = CapabilityRegistry::new().with_clipboard(Box::new(FakeClipboard {
            written: written.clone(),
        }));

        let session = CalculatorSession::new(
            CalculatorConfig::bsa_dose(),
            store,
            Box::new(RecordingRenderer {
                events: events.clone(),
            }),
            Box::new(ScriptedPrompt {
                answers,
                asked: asked.clone(),
            }),
            capabilities,
        );

        Harness {
            session,
            events,
            asked,
            written,
        }
    }

    fn harness() -> Harness {
        harness_with(Box::new(MemoryStore::new()), vec![])
    }

    fn set(session: &mut CalculatorSession, field: &str, value: &str) {
        session
            .dispatch(Command::SetField {
                field: field.to_string(),
                value: value.to_string(),
            })
            .unwrap();
    }

    fn fill_valid(session: &mut CalculatorSession) {
        set(session, "patient_name", "Doe, J.");
        set(session, "weight_kg", "70");
        set(session, "height_cm", "170");
        set(session, "dose_per_m2", "100");
    }

    // ------------------------------------------------------------------
    // Compute flow
    // ------------------------------------------------------------------

    #[test]
    fn test_compute_reveals_panel_and_records() {
        let mut h = harness();
        fill_valid(&mut h.session);
        assert_eq!(h.session.panel(), PanelState::Hidden);

        h.session.dispatch(Command::Compute).unwrap();

        assert_eq!(h.session.panel(), PanelState::Visible);
        let bundle = h.session.result().unwrap();
        assert_eq!(bundle.main_result, "181.8 mg");
        assert_eq!(bundle.patient_fields["Patient name"], "Doe, J.");
        assert_eq!(bundle.input_fields["Weight"], "70.0 kg");

        assert_eq!(h.session.ledger().len(), 1);
        assert_eq!(h.session.history().len(), 1);
        assert!(h
            .events
            .borrow()
            .iter()
            .any(|e| e == "result:181.8 mg"));
    }

    #[test]
    fn test_out_of_range_blocks_without_side_effects() {
        let mut h = harness();
        fill_valid(&mut h.session);
        set(&mut h.session, "weight_kg", "0.1");

        let err = h.session.dispatch(Command::Compute).unwrap_err();
        assert_eq!(err.error_code(), "OUT_OF_RANGE");

        assert_eq!(h.session.panel(), PanelState::Hidden);
        assert!(h.session.result().is_none());
        assert_eq!(h.session.ledger().len(), 0);
        assert_eq!(h.session.history().len(), 0);
        assert!(h
            .events
            .borrow()
            .iter()
            .any(|e| e.starts_with("annotate:weight_kg:Error")));
    }

    #[test]
    fn test_missing_input_never_coerced_to_zero() {
        let mut h = harness();
        fill_valid(&mut h.session);
        set(&mut h.session, "height_cm", "");

        let err = h.session.dispatch(Command::Compute).unwrap_err();
        assert_eq!(err, DoseError::missing_input("height_cm"));
        assert!(h.session.result().is_none());
    }

    #[test]
    fn test_warning_declined_aborts_cleanly() {
        let mut h = harness_with(Box::new(MemoryStore::new()), vec![false]);
        fill_valid(&mut h.session);
        set(&mut h.session, "height_cm", "45"); // warn band: 30 <= 45 < 50

        let err = h.session.dispatch(Command::Compute).unwrap_err();
        assert_eq!(err.error_code(), "UNUSUAL_DECLINED");

        assert_eq!(h.asked.borrow().len(), 1);
        assert!(h.session.result().is_none());
        assert_eq!(h.session.ledger().len(), 0);
        assert_eq!(h.session.panel(), PanelState::Hidden);
    }

    #[test]
    fn test_warning_confirmed_proceeds() {
        let mut h = harness_with(Box::new(MemoryStore::new()), vec![true]);
        fill_valid(&mut h.session);
        set(&mut h.session, "height_cm", "45");

        h.session.dispatch(Command::Compute).unwrap();

        assert_eq!(h.asked.borrow().len(), 1);
        assert_eq!(h.session.panel(), PanelState::Visible);
        assert_eq!(h.session.ledger().len(), 1);
    }

    #[test]
    fn test_stale_annotation_cleared_before_rerender() {
        let mut h = harness();
        fill_valid(&mut h.session);
        set(&mut h.session, "weight_kg", "0.1");
        let _ = h.session.dispatch(Command::Compute);
        let _ = h.session.dispatch(Command::Compute);

        let events = h.events.borrow();
        let annotations: Vec<&String> = events
            .iter()
            .filter(|e| e.contains(":weight_kg"))
            .collect();
        // annotate, then clear before the second annotate
        assert_eq!(annotations[0], "annotate:weight_kg:Error");
        assert_eq!(annotations[1], "clear:weight_kg");
        assert_eq!(annotations[2], "annotate:weight_kg:Error");
    }

    // ------------------------------------------------------------------
    // Reset and unit toggles
    // ------------------------------------------------------------------

    #[test]
    fn test_reset_restores_hidden_empty_metric() {
        let mut h = harness();
        fill_valid(&mut h.session);
        h.session
            .dispatch(Command::ToggleUnit {
                field: "weight_kg".to_string(),
            })
            .unwrap();
        h.session.dispatch(Command::Compute).unwrap();
        assert_eq!(h.session.panel(), PanelState::Visible);

        h.session.dispatch(Command::Reset).unwrap();

        assert_eq!(h.session.panel(), PanelState::Hidden);
        assert!(h.session.result().is_none());
        assert_eq!(h.session.unit_toggle("weight_kg"), UnitToggle::Metric);
        assert!(h.session.field("weight_kg").is_none());
    }

    #[test]
    fn test_toggle_rewrites_displayed_value() {
        let mut h = harness();
        set(&mut h.session, "weight_kg", "70");

        h.session
            .dispatch(Command::ToggleUnit {
                field: "weight_kg".to_string(),
            })
            .unwrap();
        assert_eq!(h.session.unit_toggle("weight_kg"), UnitToggle::Regional);
        assert_eq!(h.session.field("weight_kg"), Some("154.3"));

        h.session
            .dispatch(Command::ToggleUnit {
                field: "weight_kg".to_string(),
            })
            .unwrap();
        assert_eq!(h.session.field("weight_kg"), Some("70.0"));
    }

    #[test]
    fn test_regional_input_validates_against_metric_limits() {
        let mut h = harness();
        fill_valid(&mut h.session);
        // 154.3 lb with the toggle on Regional is ~70 kg: fine
        h.session
            .dispatch(Command::ToggleUnit {
                field: "weight_kg".to_string(),
            })
            .unwrap();
        set(&mut h.session, "weight_kg", "154.3");

        h.session.dispatch(Command::Compute).unwrap();
        let bundle = h.session.result().unwrap();
        assert_eq!(bundle.input_fields["Weight"], "70.0 kg");
    }

    #[test]
    fn test_toggle_without_value_flips_only() {
        let mut h = harness();
        h.session
            .dispatch(Command::ToggleUnit {
                field: "height_cm".to_string(),
            })
            .unwrap();
        assert_eq!(h.session.unit_toggle("height_cm"), UnitToggle::Regional);
        assert!(h.session.field("height_cm").is_none());
    }

    // ------------------------------------------------------------------
    // History recall
    // ------------------------------------------------------------------

    #[test]
    fn test_history_recall_restores_fields_without_recompute() {
        let mut h = harness();
        fill_valid(&mut h.session);
        h.session.dispatch(Command::Compute).unwrap();

        // Change the form, then recall
        set(&mut h.session, "weight_kg", "99");
        h.session.dispatch(Command::Reset).unwrap();
        h.session
            .dispatch(Command::LoadHistoryEntry { index: 0 })
            .unwrap();

        assert_eq!(h.session.field("weight_kg"), Some("70.0"));
        assert_eq!(h.session.field("patient_name"), Some("Doe, J."));
        // No recompute happened
        assert!(h.session.result().is_none());
        assert_eq!(h.session.panel(), PanelState::Hidden);
    }

    #[test]
    fn test_history_eviction_after_four_computes() {
        let mut h = harness();
        for n in 0..4 {
            fill_valid(&mut h.session);
            set(&mut h.session, "patient_name", &format!("Patient {n}"));
            h.session.dispatch(Command::Compute).unwrap();
        }
        assert_eq!(h.session.history().len(), 3);
        assert_eq!(h.session.history().entries()[0].patient_name, "Patient 3");
        // ...while the audit ledger kept everything
        assert_eq!(h.session.ledger().len(), 4);
    }

    // ------------------------------------------------------------------
    // Persistence boundary
    // ------------------------------------------------------------------

    #[test]
    fn test_persistence_failure_keeps_memory_authoritative() {
        let mut h = harness_with(Box::new(QuotaExceededStore), vec![]);
        fill_valid(&mut h.session);

        h.session.dispatch(Command::Compute).unwrap();

        assert_eq!(h.session.ledger().len(), 1);
        assert_eq!(h.session.history().len(), 1);
        assert_eq!(h.session.panel(), PanelState::Visible);
        assert!(h
            .events
            .borrow()
            .iter()
            .any(|e| e.starts_with("notify:") && e.contains("audit log")));
    }

    // ------------------------------------------------------------------
    // Exports
    // ------------------------------------------------------------------

    #[test]
    fn test_clipboard_export_snapshots_current_result() {
        let mut h = harness();
        fill_valid(&mut h.session);
        h.session.dispatch(Command::Compute).unwrap();
        h.session.dispatch(Command::ExportClipboard).unwrap();

        // Recompute with different inputs; the exported text is unchanged
        set(&mut h.session, "dose_per_m2", "200");
        h.session.dispatch(Command::Compute).unwrap();

        let written = h.written.borrow();
        assert_eq!(written.len(), 1);
        assert!(written[0].contains("181.8 mg"));
        assert!(written[0].contains("Disclaimer"));
    }

    #[test]
    fn test_export_without_result_fails() {
        let mut h = harness();
        let err = h.session.dispatch(Command::ExportClipboard).unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_pdf_export_without_capability_is_typed_absence() {
        let mut h = harness(); // no document exporter registered
        fill_valid(&mut h.session);
        h.session.dispatch(Command::Compute).unwrap();

        let err = h.session.dispatch(Command::ExportPdf).unwrap_err();
        assert_eq!(err, DoseError::unavailable("document-exporter"));
        // Result store untouched
        assert!(h.session.result().is_some());
        assert!(h
            .events
            .borrow()
            .iter()
            .any(|e| e.starts_with("notify:") && e.contains("PDF")));
    }

    #[test]
    fn test_audit_export_roundtrip() {
        let mut h = harness();
        fill_valid(&mut h.session);
        h.session.dispatch(Command::Compute).unwrap();

        let id = h.session.ledger().records()[0].id.clone();
        let one = h
            .session
            .dispatch(Command::ExportAuditRecord { id: id.clone() })
            .unwrap();
        match one {
            Dispatched::Download { file_name, content } => {
                assert!(file_name.contains(&id));
                assert!(content.contains("\"calculationType\""));
            }
            other => panic!("unexpected dispatch result: {other:?}"),
        }

        let all = h.session.dispatch(Command::ExportAuditLedger).unwrap();
        assert!(matches!(all, Dispatched::Download { .. }));
    }

    // ------------------------------------------------------------------
    // Destructive actions
    // ------------------------------------------------------------------

    #[test]
    fn test_clear_ledger_requires_confirmation() {
        let mut h = harness_with(Box::new(MemoryStore::new()), vec![false, true]);
        fill_valid(&mut h.session);
        h.session.dispatch(Command::Compute).unwrap();

        // Declined: records stay
        h.session.dispatch(Command::ClearLedger).unwrap();
        assert_eq!(h.session.ledger().len(), 1);

        // Confirmed: records gone
        h.session.dispatch(Command::ClearLedger).unwrap();
        assert_eq!(h.session.ledger().len(), 0);
    }

    #[test]
    fn test_clear_history_requires_confirmation() {
        let mut h = harness_with(Box::new(MemoryStore::new()), vec![false, true]);
        fill_valid(&mut h.session);
        h.session.dispatch(Command::Compute).unwrap();

        h.session.dispatch(Command::ClearHistory).unwrap();
        assert_eq!(h.session.history().len(), 1);

        h.session.dispatch(Command::ClearHistory).unwrap();
        assert_eq!(h.session.history().len(), 0);
    }

    #[test]
    fn test_preferences_save_roundtrip_across_sessions() {
        let store = Rc::new(RefCell::new(MemoryStore::new()));

        // Shared handle so a second session sees the first one's writes
        struct SharedStore(Rc<RefCell<MemoryStore>>);
        impl KeyValueStore for SharedStore {
            fn get(&self, key: &StorageKey) -> Option<String> {
                self.0.borrow().get(key)
            }
            fn set(&mut self, key: &StorageKey, value: String) -> DoseResult<()> {
                self.0.borrow_mut().set(key, value)
            }
            fn remove(&mut self, key: &StorageKey) {
                self.0.borrow_mut().remove(key)
            }
        }

        let mut h = harness_with(Box::new(SharedStore(store.clone())), vec![]);
        let mut prefs = h.session.preferences().clone();
        prefs.professional_name = "Dr. Example".to_string();
        h.session
            .dispatch(Command::SavePreferences(prefs))
            .unwrap();

        let h2 = harness_with(Box::new(SharedStore(store)), vec![]);
        assert_eq!(h2.session.preferences().professional_name, "Dr. Example");
    }
}
