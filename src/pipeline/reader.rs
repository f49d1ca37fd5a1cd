use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use crate::domain::RawRecord;
use crate::error::Result;

/// Reads the raw tabular input into one column → value map per line.
/// Header names are passed through untouched; cleaning them is the
/// normalizer's first stage.
pub fn read_batch<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path.as_ref())?;
    let headers = reader.headers()?.clone();

    let mut batch = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();
        batch.push(record);
    }
    debug!(path = %path.as_ref().display(), rows = batch.len(), "raw batch loaded");
    Ok(batch)
}
