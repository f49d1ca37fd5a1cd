use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw row as read from the tabular input, before any cleaning.
/// Column names are kept exactly as the source spelled them.
pub type RawRecord = BTreeMap<String, String>;

/// A prescription row that has passed every normalization invariant and is
/// eligible for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub patient_id: String,
    /// Title-cased, inner whitespace collapsed.
    pub doctor_name: String,
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub date: NaiveDate,
    pub diagnosis: String,
    pub notes: String,
    /// Always finite and non-negative.
    pub price: f64,
}

/// The cleaning rule that excluded a row from the canonical batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Exact duplicate of an earlier row; the first occurrence was kept.
    DuplicateRow,
    /// A required column had no value.
    MissingField(String),
    /// The date column held a value no accepted format could parse.
    UnparseableDate(String),
}

/// A dropped row together with its position in the input batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub row: usize,
    pub reason: RejectionReason,
}

/// User-facing outcome of one ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub run_id: Uuid,
    pub rows_read: usize,
    pub duplicate_rows: usize,
    pub missing_field_rows: usize,
    pub bad_date_rows: usize,
    pub rows_persisted: usize,
    pub insert_failures: usize,
}
