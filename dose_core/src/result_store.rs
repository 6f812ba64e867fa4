//! # Result Store
//!
//! Holds the most recently computed [`ResultBundle`] for the active
//! calculator session. The store is the single source of truth for report
//! generation: exports snapshot the bundle at invocation time and are never
//! live views.
//!
//! Every recompute replaces the bundle whole; there are no partial-field
//! updates. `clear()` returns to the empty state, and the session
//! coordinates hiding the results panel alongside it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single in-memory snapshot representing "the current answer".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    /// Patient identity fields (name etc.), label → value
    pub patient_fields: BTreeMap<String, String>,

    /// Formula inputs as displayed, label → formatted value with unit
    pub input_fields: BTreeMap<String, String>,

    /// Headline result (e.g. "181.8 mg")
    pub main_result: String,

    /// One-line clinical interpretation
    pub interpretation: String,

    /// Wall-clock stamp assigned by the store on `set_result`
    pub computed_at: DateTime<Utc>,
}

/// Owner of the current bundle. Empty until the first validated computation.
#[derive(Debug, Default)]
pub struct ResultStore {
    current: Option<ResultBundle>,
}

impl ResultStore {
    pub fn new() -> Self {
        ResultStore::default()
    }

    /// Replace the entire bundle and stamp it with the current time.
    /// Returns the stored bundle.
    pub fn set_result(&mut self, mut bundle: ResultBundle) -> &ResultBundle {
        bundle.computed_at = Utc::now();
        self.current.insert(bundle)
    }

    /// The last stored bundle, or `None` when empty.
    pub fn result(&self) -> Option<&ResultBundle> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Reset to empty. The session hides the results panel in the same step.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

impl ResultBundle {
    /// Bundle skeleton; the store assigns the real timestamp on set.
    pub fn new(main_result: impl Into<String>, interpretation: impl Into<String>) -> Self {
        ResultBundle {
            patient_fields: BTreeMap::new(),
            input_fields: BTreeMap::new(),
            main_result: main_result.into(),
            interpretation: interpretation.into(),
            computed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bundle() -> ResultBundle {
        let mut bundle = ResultBundle::new("181.8 mg", "BSA 1.82 m² at 100 mg/m²");
        bundle
            .patient_fields
            .insert("Patient name".to_string(), "Doe, J.".to_string());
        bundle
            .input_fields
            .insert("Weight".to_string(), "70.0 kg".to_string());
        bundle
            .input_fields
            .insert("Height".to_string(), "170.0 cm".to_string());
        bundle
    }

    #[test]
    fn test_identity_round_trip() {
        let mut store = ResultStore::new();
        assert!(store.is_empty());

        store.set_result(sample_bundle());
        let stored = store.result().unwrap();
        assert_eq!(stored.main_result, "181.8 mg");
        assert_eq!(stored.input_fields["Weight"], "70.0 kg");
    }

    #[test]
    fn test_recompute_overwrites_not_merges() {
        let mut store = ResultStore::new();
        store.set_result(sample_bundle());

        // A second bundle without patient fields fully replaces the first
        let second = ResultBundle::new("300.0 mg", "15 mg/kg of body weight");
        store.set_result(second);

        let stored = store.result().unwrap();
        assert_eq!(stored.main_result, "300.0 mg");
        assert!(stored.patient_fields.is_empty());
        assert!(stored.input_fields.is_empty());
    }

    #[test]
    fn test_clear_resets_to_empty() {
        let mut store = ResultStore::new();
        store.set_result(sample_bundle());
        assert!(!store.is_empty());

        store.clear();
        assert!(store.is_empty());
        assert!(store.result().is_none());
    }

    #[test]
    fn test_set_result_stamps_time() {
        let mut store = ResultStore::new();
        let mut bundle = sample_bundle();
        bundle.computed_at = DateTime::<Utc>::MIN_UTC;

        store.set_result(bundle);
        assert!(store.result().unwrap().computed_at > DateTime::<Utc>::MIN_UTC);
    }
}
