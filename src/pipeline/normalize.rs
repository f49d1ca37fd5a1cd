use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::warn;

use crate::constants::{COL_DATE, COL_DIAGNOSIS, COL_DOCTOR_NAME, COL_DOSAGE, COL_FREQUENCY, COL_MEDICINE_NAME, COL_NOTES, COL_PATIENT_ID, COL_PRICE, DATE_FORMATS, REQUIRED_COLUMNS};
use crate::domain::{Prescription, RawRecord, RejectedRecord, RejectionReason};

/// Result of normalizing one raw batch: the canonical records plus a tagged
/// rejection for every row that was excluded.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub records: Vec<Prescription>,
    pub rejections: Vec<RejectedRecord>,
}

impl NormalizeOutcome {
    pub fn rejected_for(&self, reason_matches: impl Fn(&RejectionReason) -> bool) -> usize {
        self.rejections
            .iter()
            .filter(|r| reason_matches(&r.reason))
            .count()
    }
}

/// A row that has cleared the required-field check but whose date is still
/// the raw input string. Dates are parsed in the final stage.
#[derive(Debug)]
struct DraftRecord {
    row: usize,
    patient_id: String,
    doctor_name: String,
    medicine_name: String,
    dosage: String,
    frequency: String,
    date_raw: String,
    diagnosis: String,
    notes: String,
    price: f64,
}

/// Transforms a raw batch into canonical prescriptions.
///
/// Pure function of its input; stages run in a fixed order, each over the
/// whole batch before the next begins:
/// column cleanup, duplicate removal, required-field check, text defaults,
/// price coercion, doctor-name casing, date parsing.
pub fn normalize(batch: &[RawRecord]) -> NormalizeOutcome {
    let mut rejections = Vec::new();

    // Stage 1: trim + lowercase every column identifier. Unknown columns
    // survive here (they participate in duplicate comparison) but are never
    // referenced by the field stages.
    let cleaned: Vec<(usize, RawRecord)> = batch
        .iter()
        .enumerate()
        .map(|(row, raw)| (row, normalize_columns(raw)))
        .collect();

    // Stage 2: exact duplicates across the full normalized column set,
    // first occurrence wins.
    let mut seen: HashSet<RawRecord> = HashSet::new();
    let mut unique = Vec::new();
    for (row, record) in cleaned {
        if seen.insert(record.clone()) {
            unique.push((row, record));
        } else {
            rejections.push(RejectedRecord {
                row,
                reason: RejectionReason::DuplicateRow,
            });
        }
    }

    // Stage 3: required-field presence, checked before any defaulting so a
    // missing value is never papered over.
    let mut present = Vec::new();
    for (row, record) in unique {
        match REQUIRED_COLUMNS
            .iter()
            .copied()
            .find(|&column| field(&record, column).is_none())
        {
            Some(column) => rejections.push(RejectedRecord {
                row,
                reason: RejectionReason::MissingField(column.to_string()),
            }),
            None => present.push((row, record)),
        }
    }

    // Stages 4-6: text defaults, price coercion, doctor-name casing.
    let drafts: Vec<DraftRecord> = present
        .into_iter()
        .map(|(row, record)| {
            let text = |column: &str| field(&record, column).unwrap_or_default().to_string();
            DraftRecord {
                row,
                patient_id: text(COL_PATIENT_ID),
                doctor_name: title_case(&text(COL_DOCTOR_NAME)),
                medicine_name: text(COL_MEDICINE_NAME),
                dosage: text(COL_DOSAGE),
                frequency: text(COL_FREQUENCY),
                date_raw: text(COL_DATE),
                diagnosis: text(COL_DIAGNOSIS),
                notes: text(COL_NOTES),
                price: coerce_price(field(&record, COL_PRICE)),
            }
        })
        .collect();

    // Stage 7: date parsing, last, so a row can be rejected solely for its
    // date even when every other field is already canonical.
    let mut records = Vec::new();
    for draft in drafts {
        match parse_date(&draft.date_raw) {
            Some(date) => records.push(Prescription {
                patient_id: draft.patient_id,
                doctor_name: draft.doctor_name,
                medicine_name: draft.medicine_name,
                dosage: draft.dosage,
                frequency: draft.frequency,
                date,
                diagnosis: draft.diagnosis,
                notes: draft.notes,
                price: draft.price,
            }),
            None => rejections.push(RejectedRecord {
                row: draft.row,
                reason: RejectionReason::UnparseableDate(draft.date_raw),
            }),
        }
    }

    rejections.sort_by_key(|r| r.row);
    NormalizeOutcome { records, rejections }
}

fn normalize_columns(raw: &RawRecord) -> RawRecord {
    raw.iter()
        .map(|(column, value)| (column.trim().to_lowercase(), value.clone()))
        .collect()
}

/// A column value, treating the empty string the same as an absent column.
fn field<'a>(record: &'a RawRecord, column: &str) -> Option<&'a str> {
    record
        .get(column)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Title-cases a name: first letter of each word upper-cased, the rest
/// lower-cased, words joined by single spaces.
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Coerces a raw price to a finite non-negative number. Unparseable or
/// absent values become 0.0; negative values clamp to 0.0.
fn coerce_price(raw: Option<&str>) -> f64 {
    let parsed = raw.and_then(|value| value.trim().parse::<f64>().ok());
    match parsed {
        Some(price) if price.is_finite() && price > 0.0 => price,
        Some(price) => {
            if price < 0.0 {
                warn!(price, "negative price clamped to 0.0");
            }
            0.0
        }
        None => 0.0,
    }
}

/// Parses a date against the accepted formats, in order.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|&format| NaiveDate::parse_from_str(value.trim(), format).ok())
}
