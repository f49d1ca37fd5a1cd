use std::path::Path;

use csv::Writer;
use tracing::info;

use crate::constants::CANONICAL_COLUMNS;
use crate::domain::{Prescription, RejectedRecord};
use crate::error::Result;

/// Writes the canonical batch as a CSV artifact with normalized headers,
/// mirroring the persisted column order.
pub fn write_canonical<P: AsRef<Path>>(path: P, records: &[Prescription]) -> Result<()> {
    let mut writer = Writer::from_path(path.as_ref())?;
    writer.write_record(CANONICAL_COLUMNS)?;
    for record in records {
        let date_text = record.date.format("%Y-%m-%d").to_string();
        let price_text = record.price.to_string();
        writer.write_record([
            record.patient_id.as_str(),
            record.doctor_name.as_str(),
            record.medicine_name.as_str(),
            record.dosage.as_str(),
            record.frequency.as_str(),
            date_text.as_str(),
            record.diagnosis.as_str(),
            record.notes.as_str(),
            price_text.as_str(),
        ])?;
    }
    writer.flush()?;
    info!(path = %path.as_ref().display(), rows = records.len(), "cleaned artifact written");
    Ok(())
}

/// Writes the per-row rejection report as JSON, so every dropped row can
/// be audited after the run.
pub fn write_rejections<P: AsRef<Path>>(path: P, rejections: &[RejectedRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(rejections)?;
    std::fs::write(path.as_ref(), json)?;
    info!(path = %path.as_ref().display(), rows = rejections.len(), "rejection report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn writes_normalized_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        let records = vec![Prescription {
            patient_id: "P1".to_string(),
            doctor_name: "Dr. Lisa Ray".to_string(),
            medicine_name: "Paracetamol".to_string(),
            dosage: "500mg".to_string(),
            frequency: "daily".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            diagnosis: "Flu".to_string(),
            notes: String::new(),
            price: 12.5,
        }];

        write_canonical(&path, &records).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "patientid,doctorname,medicinename,dosage,frequency,date,diagnosis,notes,price"
        );
        assert_eq!(
            lines.next().unwrap(),
            "P1,Dr. Lisa Ray,Paracetamol,500mg,daily,2024-03-14,Flu,,12.5"
        );
    }

    #[test]
    fn rejection_report_round_trips_as_json() {
        use crate::domain::{RejectedRecord, RejectionReason};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejected.json");
        let rejections = vec![RejectedRecord {
            row: 3,
            reason: RejectionReason::MissingField("patientid".to_string()),
        }];

        write_rejections(&path, &rejections).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<RejectedRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rejections);
    }
}
