//! # History Ring Buffer
//!
//! Small per-calculator cache of the last three calculations, used for quick
//! recall into the form. Independent of the audit ledger: the ledger is
//! unbounded and append-only, the history keeps only recent entries and
//! evicts the oldest.
//!
//! Insertion order reflects recency (most-recent-first); pushing a fourth
//! entry drops the oldest. Loading an entry copies its raw values back into
//! the form without recomputation - the user re-triggers compute explicitly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{DoseError, DoseResult};
use crate::storage::{KeyValueStore, RecordKind, StorageKey};

/// Ring buffer capacity. Deliberately small; the audit ledger is the durable
/// record.
pub const HISTORY_CAPACITY: usize = 3;

/// Current schema version for persisted history
pub const HISTORY_SCHEMA_VERSION: u32 = 1;

/// One recallable calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Patient name at computation time (may be empty)
    pub patient_name: String,

    /// Raw form values, field id → raw string, for re-population
    pub raw_inputs: BTreeMap<String, String>,

    /// Formatted values with units, for list display
    pub formatted_inputs: BTreeMap<String, String>,

    /// The computed number
    pub computed_value: f64,

    /// Short date label for list display
    pub date_label: String,
}

/// Versioned persistence envelope.
#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    entries: Vec<HistoryEntry>,
}

/// Capacity-bounded, most-recent-first history for one calculator.
#[derive(Debug)]
pub struct HistoryBuffer {
    key: StorageKey,
    entries: Vec<HistoryEntry>,
}

impl HistoryBuffer {
    /// Load the persisted history for a calculator. Corrupt or missing data
    /// yields an empty buffer.
    pub fn load(store: &dyn KeyValueStore, calculator: &str) -> Self {
        let key = StorageKey::scoped(calculator, RecordKind::History);
        let entries = match store.get(&key) {
            Some(blob) => match migrate(&blob) {
                Ok(mut entries) => {
                    entries.truncate(HISTORY_CAPACITY);
                    entries
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding unreadable history");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        HistoryBuffer { key, entries }
    }

    /// Insert at the front and truncate to capacity.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    /// Persist the buffer; failures leave the in-memory buffer authoritative.
    pub fn persist(&self, store: &mut dyn KeyValueStore) -> DoseResult<()> {
        let file = HistoryFile {
            version: HISTORY_SCHEMA_VERSION,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string(&file).map_err(|e| DoseError::SerializationError {
            reason: e.to_string(),
        })?;
        store.set(&self.key, json)
    }

    /// Entry at `index` (0 = most recent), for form re-population.
    pub fn entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Discard all entries. Gated behind user confirmation by the session.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn migrate(blob: &str) -> DoseResult<Vec<HistoryEntry>> {
    match serde_json::from_str::<HistoryFile>(blob) {
        Ok(file) => {
            if file.version > HISTORY_SCHEMA_VERSION {
                return Err(DoseError::VersionMismatch {
                    found: file.version,
                    expected: HISTORY_SCHEMA_VERSION,
                });
            }
            Ok(file.entries)
        }
        // v0: bare entry array
        Err(_) => serde_json::from_str::<Vec<HistoryEntry>>(blob).map_err(|e| {
            DoseError::SerializationError {
                reason: e.to_string(),
            }
        }),
    }
}
