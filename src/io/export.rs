//! Export tables to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts:
//! first column is process time in hours, missing cells are left empty.

use std::fs::File;
use std::path::Path;

use crate::domain::Table;
use crate::error::AppError;

/// Write a table to a CSV file.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::runtime(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push("t");
    header.extend(table.columns.iter().map(String::as_str));
    writer
        .write_record(&header)
        .map_err(|e| AppError::runtime(format!("Failed to write export CSV header: {e}")))?;

    for (t, row) in table.index.iter().zip(&table.data) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(format!("{t:.6}"));
        record.extend(row.iter().map(|v| v.map(|v| format!("{v:.10}")).unwrap_or_default()));
        writer
            .write_record(&record)
            .map_err(|e| AppError::runtime(format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::runtime(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}
