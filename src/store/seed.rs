//! Deterministic seed data
//!
//! Factories for the demo dataset the server boots with and the fixtures the
//! tests aggregate over. Values are fixed, never random, so every aggregate
//! in the test suite has a hand-checkable expectation.

use crate::store::ModelStore;
use crate::types::{FieldValue, Record};
use chrono::{TimeZone, Utc};

/// Register the standard model set on a store
pub fn register_models(store: &ModelStore) {
    store.register_model("enrollments", &["id", "sede_id", "enrolled_at"]);
    store.register_model("payments", &["id", "sede_id", "amount", "paid_at"]);
    store.register_model("receipts", &["id", "payment_id", "folio"]);
    store.register_model("attendance", &["id", "group_id", "present", "date"]);
    store.register_model("grades", &["id", "student_id", "score"]);
    store.register_model("products", &["id", "name", "price"]);
    store.register_model("price_lists", &["id", "name", "cycle_id"]);
}

/// Enrollment row factory
pub fn enrollment(id: i64, sede_id: i64, year: i32, month: u32, day: u32, status: &str) -> Record {
    Record::new()
        .with("id", FieldValue::Int(id))
        .with("sede_id", FieldValue::Int(sede_id))
        .with(
            "enrolled_at",
            FieldValue::Date(Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()),
        )
        .with("status", FieldValue::Text(status.to_string()))
}

/// Payment row factory
pub fn payment(id: i64, sede_id: i64, amount: f64, year: i32, month: u32, day: u32) -> Record {
    Record::new()
        .with("id", FieldValue::Int(id))
        .with("sede_id", FieldValue::Int(sede_id))
        .with("amount", FieldValue::Float(amount))
        .with(
            "paid_at",
            FieldValue::Date(Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap()),
        )
        .with("status", FieldValue::Text("paid".to_string()))
}

/// Receipt row factory
pub fn receipt(id: i64, payment_id: i64, folio: &str) -> Record {
    Record::new()
        .with("id", FieldValue::Int(id))
        .with("payment_id", FieldValue::Int(payment_id))
        .with("folio", FieldValue::Text(folio.to_string()))
}

/// Populate a store with the demo dataset
///
/// January 2024 activity across two campuses: 5 enrollments at sede 1,
/// 3 at sede 2, 1 at sede 3, and matching payments.
pub fn seed_demo(store: &ModelStore) {
    register_models(store);

    let enrollments = vec![
        enrollment(1, 1, 2024, 1, 5, "active"),
        enrollment(2, 1, 2024, 1, 8, "active"),
        enrollment(3, 1, 2024, 1, 12, "active"),
        enrollment(4, 1, 2024, 1, 20, "cancelled"),
        enrollment(5, 1, 2024, 1, 28, "active"),
        enrollment(6, 2, 2024, 1, 6, "active"),
        enrollment(7, 2, 2024, 1, 15, "active"),
        enrollment(8, 2, 2024, 1, 25, "active"),
        enrollment(9, 3, 2024, 1, 10, "active"),
        // Outside January
        enrollment(10, 1, 2024, 2, 2, "active"),
    ];
    store
        .insert_many("enrollments", enrollments)
        .expect("seed enrollments");

    let payments = vec![
        payment(1, 1, 1500.0, 2024, 1, 5),
        payment(2, 1, 1500.0, 2024, 1, 8),
        payment(3, 2, 1200.0, 2024, 1, 6),
        payment(4, 2, 1200.0, 2024, 1, 15),
        payment(5, 3, 900.0, 2024, 1, 10),
        payment(6, 1, 1500.0, 2024, 2, 2),
    ];
    store.insert_many("payments", payments).expect("seed payments");

    let receipts = vec![
        receipt(1, 1, "A-0001"),
        receipt(2, 2, "A-0002"),
        receipt(3, 3, "B-0001"),
    ];
    store.insert_many("receipts", receipts).expect("seed receipts");
}
