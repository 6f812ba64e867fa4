//! # Audit Ledger
//!
//! Durable, append-only record of every completed calculation, distinct from
//! the short-lived history ring buffer. Records are immutable once written
//! and persist until the user explicitly clears the ledger.
//!
//! ## Keying
//!
//! Each calculator persists its ledger under its own storage key, so two
//! calculators never intermix records.
//!
//! ## On-disk schema
//!
//! Records are wrapped in a versioned envelope:
//!
//! ```json
//! { "version": 1, "records": [ { "id": "...", ... } ] }
//! ```
//!
//! Early builds persisted a bare record array; [`AuditLedger::load`]
//! migrates those forward transparently. The serialized record shape
//! (camelCase keys) is the interchange format for record export and must
//! stay stable for round-trip re-import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::{DoseError, DoseResult};
use crate::storage::{KeyValueStore, RecordKind, StorageKey};

/// Current schema version for persisted ledgers
pub const LEDGER_SCHEMA_VERSION: u32 = 1;

/// One completed calculation, as persisted and exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Globally unique, time+random derived (`<unix-millis>-<uuid fragment>`)
    pub id: String,

    /// Machine timestamp (RFC 3339 on the wire)
    pub timestamp: DateTime<Utc>,

    /// Human-formatted timestamp for reports
    pub timestamp_formatted: String,

    /// Calculation type label (e.g. "BSA Dose")
    pub calculation_type: String,

    /// Patient identity fields at computation time
    pub patient: BTreeMap<String, String>,

    /// Formula inputs as displayed
    pub inputs: BTreeMap<String, String>,

    /// Headline result
    pub result_summary: String,
}

/// The fields a caller supplies; id and timestamps are assigned on append.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub calculation_type: String,
    pub patient: BTreeMap<String, String>,
    pub inputs: BTreeMap<String, String>,
    pub result_summary: String,
}

/// Versioned persistence envelope.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    records: Vec<AuditRecord>,
}

/// Append-only audit ledger for one calculator.
#[derive(Debug)]
pub struct AuditLedger {
    key: StorageKey,
    records: Vec<AuditRecord>,
}

impl AuditLedger {
    /// Load the persisted ledger for a calculator, migrating old schemas.
    ///
    /// A corrupt or missing blob yields an empty ledger rather than an
    /// error: audit data must never block a calculation session from
    /// starting.
    pub fn load(store: &dyn KeyValueStore, calculator: &str) -> Self {
        let key = StorageKey::scoped(calculator, RecordKind::Ledger);
        let records = match store.get(&key) {
            Some(blob) => match migrate(&blob) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding unreadable ledger");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        AuditLedger { key, records }
    }

    /// Append a record. Assigns the unique id and both timestamp forms and
    /// returns the stored record. This is the only mutation; no
    /// update-in-place exists.
    pub fn append(&mut self, draft: AuditDraft) -> AuditRecord {
        let now = Utc::now();
        let record = AuditRecord {
            id: new_record_id(now),
            timestamp: now,
            timestamp_formatted: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            calculation_type: draft.calculation_type,
            patient: draft.patient,
            inputs: draft.inputs,
            result_summary: draft.result_summary,
        };
        self.records.push(record.clone());
        record
    }

    /// Persist the full list as a versioned envelope.
    ///
    /// On failure the in-memory list remains authoritative for the session;
    /// the caller surfaces the error as a notification.
    pub fn persist(&self, store: &mut dyn KeyValueStore) -> DoseResult<()> {
        let file = LedgerFile {
            version: LEDGER_SCHEMA_VERSION,
            records: self.records.clone(),
        };
        let json = serde_json::to_string(&file).map_err(|e| DoseError::SerializationError {
            reason: e.to_string(),
        })?;
        store.set(&self.key, json)
    }

    /// Serialize one record for download.
    pub fn export_one(&self, id: &str) -> DoseResult<String> {
        let record = self
            .records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| DoseError::invalid_input("record_id", id, "no such audit record"))?;
        serde_json::to_string_pretty(record).map_err(|e| DoseError::SerializationError {
            reason: e.to_string(),
        })
    }

    /// Serialize every record for download.
    pub fn export_all(&self) -> DoseResult<String> {
        serde_json::to_string_pretty(&self.records).map_err(|e| DoseError::SerializationError {
            reason: e.to_string(),
        })
    }

    /// Discard all records. The session gates this behind explicit user
    /// confirmation before calling.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Time+random id: sortable by creation, unique across sessions.
fn new_record_id(now: DateTime<Utc>) -> String {
    let fragment = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.timestamp_millis(), &fragment[..8])
}

/// Parse a persisted blob, bringing old schemas forward.
fn migrate(blob: &str) -> DoseResult<Vec<AuditRecord>> {
    match serde_json::from_str::<LedgerFile>(blob) {
        Ok(file) => {
            if file.version > LEDGER_SCHEMA_VERSION {
                return Err(DoseError::VersionMismatch {
                    found: file.version,
                    expected: LEDGER_SCHEMA_VERSION,
                });
            }
            Ok(file.records)
        }
        // v0: bare record array with no envelope
        Err(_) => {
            serde_json::from_str::<Vec<AuditRecord>>(blob).map_err(|e| {
                DoseError::SerializationError {
                    reason: e.to_string(),
                }
            })
        }
    }
}
