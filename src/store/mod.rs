//! In-memory record store
//!
//! Holds the academic and financial models the aggregation layer queries.
//! Each model is a registered name plus a list of required fields; rows are
//! loosely-typed [`Record`]s. Reads hand out per-request snapshots, so query
//! evaluation never holds the store lock.
//!
//! Writes are synchronous and page-level simple: the one transactional
//! behavior is `insert_many`, which validates every row before committing
//! any of them (atomic multi-row insert, e.g. a price list plus its
//! population associations).

pub mod seed;

use crate::error::{Error, Result, ValidationError};
use crate::types::Record;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Schema of one registered model
#[derive(Debug, Clone)]
pub struct ModelSchema {
    /// Fields every row must carry with a non-null value
    pub required: Vec<String>,
}

/// Thread-safe registry of models and their rows
#[derive(Default)]
pub struct ModelStore {
    schemas: RwLock<HashMap<String, ModelSchema>>,
    rows: RwLock<HashMap<String, Vec<Record>>>,
}

impl ModelStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model with its required fields
    ///
    /// Re-registering an existing model replaces its schema and keeps its
    /// rows.
    pub fn register_model(&self, name: &str, required: &[&str]) {
        self.schemas.write().insert(
            name.to_string(),
            ModelSchema {
                required: required.iter().map(|s| s.to_string()).collect(),
            },
        );
        self.rows.write().entry(name.to_string()).or_default();
    }

    /// Whether a model is registered
    pub fn contains_model(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    /// Names of all registered models, sorted
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of rows in a model
    pub fn count(&self, model: &str) -> Result<usize> {
        self.rows
            .read()
            .get(model)
            .map(|r| r.len())
            .ok_or_else(|| Error::NotFound(format!("model '{}'", model)))
    }

    /// Snapshot of all rows of a model
    pub fn scan(&self, model: &str) -> Result<Vec<Record>> {
        self.rows
            .read()
            .get(model)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("model '{}'", model)))
    }

    /// Insert a single row
    pub fn insert(&self, model: &str, record: Record) -> Result<()> {
        self.insert_many(model, vec![record]).map(|_| ())
    }

    /// Atomic multi-row insert
    ///
    /// Every row is validated against the model schema before any row is
    /// committed; one bad row rejects the whole batch. Returns the number of
    /// rows written.
    pub fn insert_many(&self, model: &str, records: Vec<Record>) -> Result<usize> {
        let schema = self
            .schemas
            .read()
            .get(model)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("model '{}'", model)))?;

        for record in &records {
            validate_record(&schema, record)?;
        }

        let written = records.len();
        let mut rows = self.rows.write();
        // Model existence was checked above; the entry is always present.
        rows.entry(model.to_string()).or_default().extend(records);
        Ok(written)
    }
}

/// Check a single row against a model schema
fn validate_record(schema: &ModelSchema, record: &Record) -> Result<()> {
    for field in &schema.required {
        if !record.has(field) || record.get(field).is_null() {
            return Err(ValidationError::MissingField(field.clone()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;

    fn store_with_payments() -> ModelStore {
        let store = ModelStore::new();
        store.register_model("payments", &["id", "amount"]);
        store
    }

    fn payment(id: i64, amount: f64) -> Record {
        Record::new()
            .with("id", FieldValue::Int(id))
            .with("amount", FieldValue::Float(amount))
    }

    #[test]
    fn test_insert_and_scan() {
        let store = store_with_payments();
        store.insert("payments", payment(1, 100.0)).unwrap();
        store.insert("payments", payment(2, 250.0)).unwrap();

        let rows = store.scan("payments").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(store.count("payments").unwrap(), 2);
    }

    #[test]
    fn test_unknown_model() {
        let store = store_with_payments();
        assert!(matches!(store.scan("ghosts"), Err(Error::NotFound(_))));
        assert!(matches!(
            store.insert("ghosts", payment(1, 1.0)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_insert_many_is_atomic() {
        let store = store_with_payments();
        let bad_batch = vec![
            payment(1, 100.0),
            Record::new().with("id", FieldValue::Int(2)), // missing amount
            payment(3, 300.0),
        ];

        let err = store.insert_many("payments", bad_batch).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Nothing from the failed batch was committed
        assert_eq!(store.count("payments").unwrap(), 0);
    }

    #[test]
    fn test_required_field_null_rejected() {
        let store = store_with_payments();
        let row = Record::new()
            .with("id", FieldValue::Int(1))
            .with("amount", FieldValue::Null);
        assert!(store.insert("payments", row).is_err());
    }
}
