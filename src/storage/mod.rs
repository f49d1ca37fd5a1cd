use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{debug, warn};

use crate::domain::Prescription;
use crate::error::Result;

/// A single row that failed to insert; the batch continues without it.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertFailure {
    /// Zero-based position of the record in the batch.
    pub index: usize,
    pub reason: String,
}

/// Outcome of persisting one canonical batch.
#[derive(Debug, Clone, Default)]
pub struct StoreOutcome {
    pub inserted: usize,
    pub failures: Vec<InsertFailure>,
}

/// SQLite-backed prescription store. Owns its connection and is passed
/// explicitly wherever persistence or queries are needed; dropping it
/// closes the connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS prescriptions (
                patient_id    TEXT NOT NULL CHECK (length(patient_id) > 0),
                doctor_name   TEXT NOT NULL CHECK (length(doctor_name) > 0),
                medicine_name TEXT NOT NULL CHECK (length(medicine_name) > 0),
                dosage        TEXT NOT NULL DEFAULT '',
                frequency     TEXT NOT NULL DEFAULT '',
                date          TEXT NOT NULL,
                diagnosis     TEXT NOT NULL DEFAULT '',
                notes         TEXT NOT NULL DEFAULT '',
                price         REAL NOT NULL CHECK (price >= 0.0)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Inserts the batch one record at a time inside a single transaction.
    /// A failing row is logged and skipped; everything that inserted is
    /// committed together at the end. No retries.
    pub fn store_batch(&mut self, batch: &[Prescription]) -> Result<StoreOutcome> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        let mut failures = Vec::new();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO prescriptions \
                 (patient_id, doctor_name, medicine_name, dosage, frequency, date, diagnosis, notes, price) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (index, record) in batch.iter().enumerate() {
                let outcome = stmt.execute(params![
                    record.patient_id,
                    record.doctor_name,
                    record.medicine_name,
                    record.dosage,
                    record.frequency,
                    record.date,
                    record.diagnosis,
                    record.notes,
                    record.price,
                ]);
                match outcome {
                    Ok(_) => inserted += 1,
                    Err(err) => {
                        warn!(
                            index,
                            patient = %record.patient_id,
                            medicine = %record.medicine_name,
                            error = %err,
                            "insert failed, skipping record"
                        );
                        failures.push(InsertFailure {
                            index,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }
        tx.commit()?;
        debug!(inserted, failed = failures.len(), "batch committed");
        Ok(StoreOutcome { inserted, failures })
    }

    /// Number of persisted prescription rows.
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM prescriptions", [], |row| row.get(0))?;
        Ok(count)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}
