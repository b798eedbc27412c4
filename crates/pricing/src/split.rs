//! Temporal train/validation split

use tracing::{info, warn};

use crate::errors::{PipelineError, Result};
use crate::table::Table;

/// Training and validation partitions of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalSplit {
    pub train: Table,
    pub valid: Table,
}

/// Rows whose `year_column` equals `cutoff` go to validation, the rest to
/// training. Row order is preserved on both sides; either side may be empty.
pub fn split_by_year(table: &Table, year_column: &str, cutoff: i64) -> Result<TemporalSplit> {
    let years = &table.column(year_column)?.data;

    let mut train_rows = Vec::new();
    let mut valid_rows = Vec::new();
    for row in 0..table.n_rows() {
        let year = years.as_f64(row).ok_or_else(|| {
            PipelineError::InvalidTable(format!(
                "'{year_column}' row {row} is missing or not numeric"
            ))
        })?;
        if year == cutoff as f64 {
            valid_rows.push(row);
        } else {
            train_rows.push(row);
        }
    }

    if valid_rows.is_empty() {
        warn!(cutoff, "no rows match the cutoff year, validation split is empty");
    }
    if train_rows.is_empty() {
        warn!(cutoff, "every row matches the cutoff year, training split is empty");
    }
    info!(
        "Split at {}: {} training rows, {} validation rows",
        cutoff,
        train_rows.len(),
        valid_rows.len()
    );

    Ok(TemporalSplit {
        train: table.take_rows(&train_rows),
        valid: table.take_rows(&valid_rows),
    })
}
