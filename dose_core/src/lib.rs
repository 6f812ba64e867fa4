//! # dose_core - Clinical Dosage Calculator Engine
//!
//! `dose_core` is the computational heart of Clindose: it assembles a
//! calculator session from a declarative configuration, validates clinical
//! inputs against tiered safety ranges, converts between unit systems,
//! keeps an auditable record of every completed calculation, and composes
//! multi-section reports for clipboard and PDF export.
//!
//! ## Design Philosophy
//!
//! - **No hidden state**: everything lives in an explicit
//!   [`session::CalculatorSession`] built from collaborator handles
//! - **Typed boundaries**: hosts interact through the [`session::Command`]
//!   enum and the collaborator traits in [`render`], [`storage`] and
//!   [`capability`] - no stringly-typed wiring
//! - **JSON-First**: persisted records are versioned, serde-serializable
//!   envelopes with explicit migration
//! - **Fail at the boundary**: persistence and export failures surface as
//!   notifications and never corrupt in-memory state
//!
//! ## Quick Start
//!
//! ```rust
//! use dose_core::capability::CapabilityRegistry;
//! use dose_core::config::CalculatorConfig;
//! use dose_core::render::{AlwaysConfirm, NullRenderer};
//! use dose_core::session::{CalculatorSession, Command};
//! use dose_core::storage::MemoryStore;
//!
//! let mut session = CalculatorSession::new(
//!     CalculatorConfig::bsa_dose(),
//!     Box::new(MemoryStore::new()),
//!     Box::new(NullRenderer),
//!     Box::new(AlwaysConfirm),
//!     CapabilityRegistry::new(),
//! );
//!
//! for (field, value) in [("weight_kg", "70"), ("height_cm", "170"), ("dose_per_m2", "100")] {
//!     session.dispatch(Command::SetField {
//!         field: field.to_string(),
//!         value: value.to_string(),
//!     }).unwrap();
//! }
//! session.dispatch(Command::Compute).unwrap();
//!
//! assert_eq!(session.result().unwrap().main_result, "181.8 mg");
//! ```
//!
//! ## Modules
//!
//! - [`session`] - The orchestrator: command dispatch and the results-panel
//!   state machine
//! - [`config`] - Declarative calculator configuration
//! - [`safety`] - Tiered safety-range validation
//! - [`units`] - Metric/regional unit conversion
//! - [`calculators`] - Dose formulas
//! - [`result_store`] - The current result bundle
//! - [`ledger`] - Append-only audit ledger
//! - [`history`] - Recent-calculation ring buffer
//! - [`prefs`] - Report preferences and professional identity
//! - [`report`] - Section-based report composition
//! - [`pdf`] - Typst-backed PDF export backend
//! - [`storage`] - Key-value persistence layer
//! - [`capability`] - Optional-collaborator registry
//! - [`render`] - Rendering and confirmation boundaries
//! - [`errors`] - Structured error types

pub mod calculators;
pub mod capability;
pub mod config;
pub mod errors;
pub mod history;
pub mod ledger;
pub mod pdf;
pub mod prefs;
pub mod render;
pub mod report;
pub mod result_store;
pub mod safety;
pub mod session;
pub mod storage;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use config::CalculatorConfig;
pub use errors::{DoseError, DoseResult};
pub use session::{CalculatorSession, Command, Dispatched, PanelState};
