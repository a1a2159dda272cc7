//! Filter Builder
//!
//! Translates declarative filter descriptors into typed predicates and
//! applies them to a model's records.
//!
//! # Batch semantics
//!
//! [`apply_filters`] keeps the historical skip-on-error policy: a descriptor
//! that fails to compile is logged and dropped while the rest of the batch
//! still applies, and the outcome reports how many were skipped so callers
//! can surface the partial failure. [`apply_filters_strict`] rejects the
//! whole batch on the first bad descriptor instead.

pub mod descriptor;
pub mod predicate;

pub use descriptor::{FilterDescriptor, FilterType};
pub use predicate::Predicate;

use crate::error::FilterError;
use crate::store::ModelStore;
use crate::types::Record;
use tracing::warn;

/// Result of applying a descriptor batch with skip semantics
#[derive(Debug)]
pub struct FilterOutcome {
    /// Records surviving every applied predicate
    pub records: Vec<Record>,
    /// Number of descriptors that failed to compile and were skipped
    pub skipped: usize,
}

/// Compile a batch, skipping descriptors that fail
fn compile_lenient(descriptors: &[FilterDescriptor], store: &ModelStore) -> (Vec<Predicate>, usize) {
    let mut predicates = Vec::with_capacity(descriptors.len());
    let mut skipped = 0;
    for desc in descriptors {
        match Predicate::compile(desc, store) {
            Ok(p) => predicates.push(p),
            Err(e) => {
                warn!(field = %desc.field, filter_type = %desc.kind, error = %e,
                      "Skipping invalid filter descriptor");
                skipped += 1;
            }
        }
    }
    (predicates, skipped)
}

/// Apply a descriptor batch to records, skipping invalid descriptors
pub fn apply_filters(
    records: Vec<Record>,
    descriptors: &[FilterDescriptor],
    store: &ModelStore,
) -> FilterOutcome {
    let (predicates, skipped) = compile_lenient(descriptors, store);
    let records = records
        .into_iter()
        .filter(|r| predicates.iter().all(|p| p.matches(r, store)))
        .collect();
    FilterOutcome { records, skipped }
}

/// Apply a descriptor batch, failing on the first invalid descriptor
pub fn apply_filters_strict(
    records: Vec<Record>,
    descriptors: &[FilterDescriptor],
    store: &ModelStore,
) -> Result<Vec<Record>, FilterError> {
    let mut predicates = Vec::with_capacity(descriptors.len());
    for desc in descriptors {
        predicates.push(Predicate::compile(desc, store)?);
    }
    Ok(records
        .into_iter()
        .filter(|r| predicates.iter().all(|p| p.matches(r, store)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;
    use serde_json::json;

    fn store_with_rows() -> ModelStore {
        let store = ModelStore::new();
        store.register_model("enrollments", &["id"]);
        for (id, sede, status) in [(1, 1, "active"), (2, 1, "cancelled"), (3, 2, "active")] {
            store
                .insert(
                    "enrollments",
                    Record::new()
                        .with("id", FieldValue::Int(id))
                        .with("sede_id", FieldValue::Int(sede))
                        .with("status", FieldValue::Text(status.to_string())),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_bogus_descriptor_skipped_rest_applied() {
        let store = store_with_rows();
        let rows = store.scan("enrollments").unwrap();

        let batch = vec![
            FilterDescriptor::new("id", "bogus", json!(1)),
            FilterDescriptor::new("status", "exact", json!("active")),
        ];

        let outcome = apply_filters(rows, &batch, &store);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.records.len(), 2);
        for r in &outcome.records {
            assert_eq!(r.get("status"), &FieldValue::Text("active".to_string()));
        }
    }

    #[test]
    fn test_malformed_value_skipped() {
        let store = store_with_rows();
        let rows = store.scan("enrollments").unwrap();

        // `in` with a non-array value is invalid and must be skipped
        let batch = vec![FilterDescriptor::new("sede_id", "in", json!(1))];
        let outcome = apply_filters(rows, &batch, &store);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.records.len(), 3);
    }

    #[test]
    fn test_strict_rejects_batch() {
        let store = store_with_rows();
        let rows = store.scan("enrollments").unwrap();

        let batch = vec![
            FilterDescriptor::new("status", "exact", json!("active")),
            FilterDescriptor::new("id", "bogus", json!(1)),
        ];
        let err = apply_filters_strict(rows, &batch, &store).unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedType(_)));
    }

    #[test]
    fn test_empty_batch_is_identity() {
        let store = store_with_rows();
        let rows = store.scan("enrollments").unwrap();
        let outcome = apply_filters(rows, &[], &store);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.skipped, 0);
    }
}
