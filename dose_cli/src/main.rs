//! # Clindose CLI Host
//!
//! Terminal host for the dosage calculator engine. Wires the session to
//! console collaborators: a stdout renderer, a stdin confirmation prompt,
//! a file-backed store in `.clindose/`, and the Typst PDF exporter.
//!
//! The engine itself never prints; everything visible here comes through
//! the renderer injection points.

use std::io::{self, BufRead, Write};

use dose_core::capability::CapabilityRegistry;
use dose_core::config::CalculatorConfig;
use dose_core::history::HistoryEntry;
use dose_core::pdf::TypstExporter;
use dose_core::render::{ConfirmationPrompt, Renderer};
use dose_core::result_store::ResultBundle;
use dose_core::safety::ValidationOutcome;
use dose_core::session::{CalculatorSession, Command, Dispatched};
use dose_core::storage::FileStore;

/// Renderer that maps every injection point to stdout.
struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn render_form(&mut self, config: &CalculatorConfig) {
        println!("{}", config.title);
        println!("{}", "=".repeat(config.title.len()));
        println!("{}", config.breadcrumbs.join(" > "));
        println!();
    }

    fn render_result(&mut self, bundle: &ResultBundle) {
        println!();
        println!("═══════════════════════════════════════");
        println!("  RESULT: {}", bundle.main_result);
        println!("═══════════════════════════════════════");
        for (label, value) in &bundle.patient_fields {
            println!("  {label}: {value}");
        }
        for (label, value) in &bundle.input_fields {
            println!("  {label}: {value}");
        }
        println!();
        println!("  {}", bundle.interpretation);
        println!("═══════════════════════════════════════");
    }

    fn render_annotation(&mut self, field: &str, outcome: &ValidationOutcome) {
        println!("  [{field}] {}", outcome.message);
    }

    fn clear_annotation(&mut self, _field: &str) {
        // A scrolling terminal has nothing to clear
    }

    fn render_history(&mut self, entries: &[HistoryEntry]) {
        if entries.is_empty() {
            return;
        }
        println!("Recent calculations:");
        for (i, entry) in entries.iter().enumerate() {
            println!(
                "  {}. {} - {} ({})",
                i + 1,
                entry.date_label,
                entry.computed_value,
                if entry.patient_name.is_empty() {
                    "unnamed"
                } else {
                    &entry.patient_name
                }
            );
        }
        println!();
    }

    fn notify(&mut self, message: &str) {
        println!("  ! {message}");
    }
}

/// y/N prompt on stdin.
struct StdinPrompt;

impl ConfirmationPrompt for StdinPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        print!("{message} [y/N]: ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut input = String::new();
        if io::stdin().lock().read_line(&mut input).is_err() {
            return false;
        }
        matches!(input.trim(), "y" | "Y" | "yes")
    }
}

fn prompt_value(prompt: &str, default: &str) -> String {
    print!("{prompt} [{default}]: ");
    if io::stdout().flush().is_err() {
        return default.to_string();
    }

    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input).is_err() {
        return default.to_string();
    }

    let trimmed = input.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let store = match FileStore::open(".clindose") {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: could not open data directory: {e}");
            std::process::exit(1);
        }
    };

    let capabilities =
        CapabilityRegistry::new().with_document_exporter(Box::new(TypstExporter::new()));

    let mut session = CalculatorSession::new(
        CalculatorConfig::bsa_dose(),
        Box::new(store),
        Box::new(ConsoleRenderer),
        Box::new(StdinPrompt),
        capabilities,
    );

    let patient = prompt_value("Patient name", "");
    let weight = prompt_value("Weight (kg)", "70");
    let height = prompt_value("Height (cm)", "170");
    let dose = prompt_value("Prescribed dose (mg/m²)", "100");

    for (field, value) in [
        ("patient_name", patient),
        ("weight_kg", weight),
        ("height_cm", height),
        ("dose_per_m2", dose),
    ] {
        if let Err(e) = session.dispatch(Command::SetField {
            field: field.to_string(),
            value,
        }) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    if let Err(e) = session.dispatch(Command::Compute) {
        eprintln!();
        eprintln!("Calculation aborted: {e}");
        std::process::exit(1);
    }

    println!();
    if StdinPrompt.confirm("Save PDF report?") {
        match session.dispatch(Command::ExportPdf) {
            Ok(Dispatched::Pdf { file_name, bytes }) => {
                match std::fs::write(&file_name, &bytes) {
                    Ok(()) => println!("Saved {file_name} ({} bytes)", bytes.len()),
                    Err(e) => eprintln!("Error: could not write {file_name}: {e}"),
                }
            }
            Ok(_) => {}
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}
