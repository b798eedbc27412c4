//! CSV ingestion
//!
//! Reads a headered CSV into a typed [`Table`]. The configured date column
//! and any forced-numeric columns are validated here, so later stages never
//! see unparseable values. Other columns are numeric when every present value
//! parses as a finite `f64`, and text otherwise. A column with no values at
//! all is text, so it is encoded as a category rather than imputed.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::{PipelineError, Result};
use crate::table::{Column, ColumnData, Table};

/// Cell values read as missing: empty cells plus the usual spreadsheet and
/// database null markers
pub const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "NULL", "null", "#N/A"];

const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Typing hints applied while reading a CSV
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvSchema {
    /// Column parsed as calendar dates; must be present and complete
    pub date_column: Option<String>,
    /// Columns that must parse as numbers when present
    pub numeric_columns: BTreeSet<String>,
    /// Columns kept as text even when every value looks numeric
    pub text_columns: BTreeSet<String>,
}

impl CsvSchema {
    pub fn with_date_column(mut self, name: impl Into<String>) -> Self {
        self.date_column = Some(name.into());
        self
    }

    pub fn with_numeric<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numeric_columns.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_text<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_columns.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Parse a sale date in the Bluebook (`11/16/2006 0:00`) or ISO layout
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        })
}

fn is_missing(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw)
}

/// Load a table from a CSV file
pub fn read_csv_path<P: AsRef<Path>>(path: P, schema: &CsvSchema) -> Result<Table> {
    let path = path.as_ref();
    info!("Loading CSV from: {}", path.display());
    let file = File::open(path)?;
    read_csv(file, schema)
}

/// Load a table from any CSV reader
pub fn read_csv<R: Read>(reader: R, schema: &CsvSchema) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(PipelineError::InvalidTable("CSV has no header row".into()));
    }

    if let Some(date_column) = &schema.date_column {
        if !headers.contains(date_column) {
            return Err(PipelineError::MissingColumn(date_column.clone()));
        }
    }

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (col, field) in record.iter().enumerate() {
            cells[col].push((!is_missing(field)).then(|| field.to_string()));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| {
            let data = type_column(&name, values, schema)?;
            Ok(Column::new(name, data))
        })
        .collect::<Result<Vec<_>>>()?;

    let table = Table::from_columns(columns)?;
    info!(
        "Loaded {} rows with {} columns",
        table.n_rows(),
        table.n_cols()
    );
    Ok(table)
}

/// First data row is line 2 of the file
fn line_of(row: usize) -> usize {
    row + 2
}

fn type_column(name: &str, values: Vec<Option<String>>, schema: &CsvSchema) -> Result<ColumnData> {
    if schema.date_column.as_deref() == Some(name) {
        let dates = values
            .iter()
            .enumerate()
            .map(|(row, value)| {
                let raw = value.as_deref().ok_or_else(|| PipelineError::Ingestion {
                    line: line_of(row),
                    column: name.to_string(),
                    reason: "missing date".into(),
                })?;
                parse_date(raw).ok_or_else(|| PipelineError::Ingestion {
                    line: line_of(row),
                    column: name.to_string(),
                    reason: format!("unparseable date '{raw}'"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(ColumnData::Date(dates));
    }

    if schema.text_columns.contains(name) {
        return Ok(ColumnData::Text(values));
    }

    if schema.numeric_columns.contains(name) {
        let numbers = values
            .iter()
            .enumerate()
            .map(|(row, value)| match value {
                None => Ok(None),
                Some(raw) => match raw.parse::<f64>() {
                    Ok(x) if x.is_finite() => Ok(Some(x)),
                    _ => Err(PipelineError::Ingestion {
                        line: line_of(row),
                        column: name.to_string(),
                        reason: format!("unparseable number '{raw}'"),
                    }),
                },
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(ColumnData::Numeric(numbers));
    }

    if values.iter().all(Option::is_none) {
        debug!(column = name, "column has no values, treating as categorical");
        return Ok(ColumnData::Text(values));
    }

    let parsed: Option<Vec<Option<f64>>> = values
        .iter()
        .map(|value| match value {
            None => Some(None),
            Some(raw) => raw.parse::<f64>().ok().filter(|x| x.is_finite()).map(Some),
        })
        .collect();

    match parsed {
        Some(numbers) => Ok(ColumnData::Numeric(numbers)),
        None => {
            debug!(column = name, "treating column as categorical");
            Ok(ColumnData::Text(values))
        }
    }
}
