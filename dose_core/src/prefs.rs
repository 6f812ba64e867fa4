//! # User Preferences
//!
//! Persisted report-section toggles and professional identity (name, license
//! number). Shared across calculators under a fixed storage key, created with
//! defaults on first use, and saved read-modify-write - independent of any
//! single calculation.
//!
//! Three report sections are *not* represented here because they are
//! mandatory and cannot be toggled: the main result, the legal disclaimer,
//! and the footer timestamp.

use serde::{Deserialize, Serialize};

use crate::errors::{DoseError, DoseResult};
use crate::storage::{KeyValueStore, RecordKind, StorageKey};

/// Current schema version for persisted preferences
pub const PREFS_SCHEMA_VERSION: u32 = 1;

/// Which optional report sections to include.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionToggles {
    pub professional_identity: bool,
    pub patient_data: bool,
    pub parameters: bool,
    pub interpretation: bool,
    pub safety_goals_checklist: bool,
    pub medication_safety_checklist: bool,
    pub audit_block: bool,
    pub notes_area: bool,
    pub qr_placeholder: bool,
}

impl Default for SectionToggles {
    fn default() -> Self {
        // First-use defaults: the clinically useful sections on, the
        // checklist/annex blocks off until the user opts in.
        SectionToggles {
            professional_identity: true,
            patient_data: true,
            parameters: true,
            interpretation: true,
            safety_goals_checklist: false,
            medication_safety_checklist: false,
            audit_block: false,
            notes_area: false,
            qr_placeholder: false,
        }
    }
}

/// Persisted user preferences.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub sections: SectionToggles,

    /// Professional name printed in the identity block
    pub professional_name: String,

    /// License/registration number printed in the identity block
    pub license_number: String,
}

/// Versioned persistence envelope.
#[derive(Debug, Serialize, Deserialize)]
struct PrefsFile {
    version: u32,
    prefs: UserPreferences,
}

impl UserPreferences {
    /// Load the shared preferences, falling back to defaults when absent or
    /// unreadable.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let key = StorageKey::shared(RecordKind::Preferences);
        match store.get(&key) {
            Some(blob) => match migrate(&blob) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding unreadable preferences");
                    UserPreferences::default()
                }
            },
            None => UserPreferences::default(),
        }
    }

    /// Save read-modify-write under the shared key.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> DoseResult<()> {
        let key = StorageKey::shared(RecordKind::Preferences);
        let file = PrefsFile {
            version: PREFS_SCHEMA_VERSION,
            prefs: self.clone(),
        };
        let json = serde_json::to_string(&file).map_err(|e| DoseError::SerializationError {
            reason: e.to_string(),
        })?;
        store.set(&key, json)
    }
}

fn migrate(blob: &str) -> DoseResult<UserPreferences> {
    match serde_json::from_str::<PrefsFile>(blob) {
        Ok(file) => {
            if file.version > PREFS_SCHEMA_VERSION {
                return Err(DoseError::VersionMismatch {
                    found: file.version,
                    expected: PREFS_SCHEMA_VERSION,
                });
            }
            Ok(file.prefs)
        }
        // v0: bare preferences object; unknown/missing fields fall back to
        // defaults via serde(default)
        Err(_) => serde_json::from_str::<UserPreferences>(blob).map_err(|e| {
            DoseError::SerializationError {
                reason: e.to_string(),
            }
        }),
    }
}
