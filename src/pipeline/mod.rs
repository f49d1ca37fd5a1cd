pub mod normalize;
pub mod reader;
pub mod writer;

use std::path::Path;

use tracing::info;
use uuid::Uuid;

use crate::domain::{IngestSummary, RejectionReason};
use crate::error::Result;
use crate::storage::SqliteStore;

/// Artifacts an ingest run writes besides the database rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestArtifacts<'a> {
    /// Cleaned CSV with normalized headers.
    pub cleaned: Option<&'a Path>,
    /// JSON report of every rejected row.
    pub rejects: Option<&'a Path>,
}

/// Runs the full ingestion flow: read the raw export, normalize it, write
/// the artifacts, persist the canonical batch.
///
/// Reports are served from the store only, so this runs to completion
/// before any report can be asked for.
pub fn run_ingest(
    input: &Path,
    artifacts: IngestArtifacts<'_>,
    store: &mut SqliteStore,
) -> Result<IngestSummary> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("ingest", run = %run_id);
    let _enter = span.enter();

    let batch = reader::read_batch(input)?;
    let rows_read = batch.len();
    info!(rows = rows_read, input = %input.display(), "raw batch loaded");

    let outcome = normalize::normalize(&batch);
    for rejection in &outcome.rejections {
        info!(row = rejection.row, reason = ?rejection.reason, "row rejected");
    }

    if let Some(path) = artifacts.cleaned {
        writer::write_canonical(path, &outcome.records)?;
    }
    if let Some(path) = artifacts.rejects {
        writer::write_rejections(path, &outcome.rejections)?;
    }

    let stored = store.store_batch(&outcome.records)?;

    let summary = IngestSummary {
        run_id,
        rows_read,
        duplicate_rows: outcome
            .rejected_for(|reason| matches!(reason, RejectionReason::DuplicateRow)),
        missing_field_rows: outcome
            .rejected_for(|reason| matches!(reason, RejectionReason::MissingField(_))),
        bad_date_rows: outcome
            .rejected_for(|reason| matches!(reason, RejectionReason::UnparseableDate(_))),
        rows_persisted: stored.inserted,
        insert_failures: stored.failures.len(),
    };
    info!(
        read = summary.rows_read,
        persisted = summary.rows_persisted,
        rejected = outcome.rejections.len(),
        insert_failures = summary.insert_failures,
        "ingest finished"
    );
    Ok(summary)
}
