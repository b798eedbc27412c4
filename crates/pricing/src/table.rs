//! Column-oriented record table
//!
//! Every column is homogeneous and has exactly `n_rows` entries. Numeric and
//! text columns carry `None` for missing cells; date, integer and boolean
//! columns are always complete.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::errors::{PipelineError, Result};

/// Storage for a single column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Integer(Vec<i64>),
    Text(Vec<Option<String>>),
    Date(Vec<NaiveDate>),
    Bool(Vec<bool>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Integer,
    Text,
    Date,
    Bool,
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Integer(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Integer(_) => ColumnKind::Integer,
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Date(_) => ColumnKind::Date,
            ColumnData::Bool(_) => ColumnKind::Bool,
        }
    }

    pub fn missing_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            _ => 0,
        }
    }

    /// Gather the given rows into a new column
    pub fn take(&self, rows: &[usize]) -> ColumnData {
        fn pick<T: Clone>(values: &[T], rows: &[usize]) -> Vec<T> {
            rows.iter().map(|&r| values[r].clone()).collect()
        }

        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(pick(v, rows)),
            ColumnData::Integer(v) => ColumnData::Integer(pick(v, rows)),
            ColumnData::Text(v) => ColumnData::Text(pick(v, rows)),
            ColumnData::Date(v) => ColumnData::Date(pick(v, rows)),
            ColumnData::Bool(v) => ColumnData::Bool(pick(v, rows)),
        }
    }

    /// Numeric view of a cell; `None` for missing, text and date cells
    pub fn as_f64(&self, row: usize) -> Option<f64> {
        match self {
            ColumnData::Numeric(v) => v[row],
            ColumnData::Integer(v) => Some(v[row] as f64),
            ColumnData::Bool(v) => Some(if v[row] { 1.0 } else { 0.0 }),
            ColumnData::Text(_) | ColumnData::Date(_) => None,
        }
    }

    /// Render a cell the way it would appear in a CSV file
    pub fn display(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) => match v[row] {
                Some(x) if x.fract() == 0.0 && x.abs() < 1e15 => format!("{}", x as i64),
                Some(x) => x.to_string(),
                None => String::new(),
            },
            ColumnData::Integer(v) => v[row].to_string(),
            ColumnData::Text(v) => v[row].clone().unwrap_or_default(),
            ColumnData::Date(v) => v[row].format("%Y-%m-%d").to_string(),
            ColumnData::Bool(v) => v[row].to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// An ordered set of equally long, uniquely named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |c| c.data.len());
        let mut seen = HashSet::new();

        for column in &columns {
            if column.data.len() != n_rows {
                return Err(PipelineError::InvalidTable(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.data.len(),
                    n_rows
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(PipelineError::InvalidTable(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }

        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Append a column; an empty table adopts the column's length
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if self.columns.is_empty() {
            self.n_rows = column.data.len();
        } else if column.data.len() != self.n_rows {
            return Err(PipelineError::InvalidTable(format!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.data.len(),
                self.n_rows
            )));
        }

        if self.contains(&column.name) {
            return Err(PipelineError::InvalidTable(format!(
                "column '{}' already exists",
                column.name
            )));
        }

        self.columns.push(column);
        Ok(())
    }

    /// Swap a column's data in place, keeping its position
    pub fn replace_data(&mut self, name: &str, data: ColumnData) -> Result<ColumnData> {
        if data.len() != self.n_rows {
            return Err(PipelineError::InvalidTable(format!(
                "replacement for '{}' has {} rows, table has {}",
                name,
                data.len(),
                self.n_rows
            )));
        }

        let idx = self
            .position(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        Ok(std::mem::replace(&mut self.columns[idx].data, data))
    }

    pub fn remove_column(&mut self, name: &str) -> Result<Column> {
        let idx = self
            .position(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        let column = self.columns.remove(idx);
        if self.columns.is_empty() {
            self.n_rows = 0;
        }
        Ok(column)
    }

    /// Reorder columns to exactly `order`; every name must exist
    pub fn reorder(&mut self, order: &[String]) -> Result<()> {
        if order.len() != self.columns.len() {
            return Err(PipelineError::InvalidTable(format!(
                "reorder lists {} columns, table has {}",
                order.len(),
                self.columns.len()
            )));
        }

        let mut remaining = std::mem::take(&mut self.columns);
        let mut reordered = Vec::with_capacity(order.len());
        for name in order {
            let idx = remaining
                .iter()
                .position(|c| &c.name == name)
                .ok_or_else(|| PipelineError::MissingColumn(name.clone()))?;
            reordered.push(remaining.swap_remove(idx));
        }

        self.columns = reordered;
        Ok(())
    }

    /// New table with the given rows, in the given order
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), c.data.take(rows)))
            .collect();

        Table {
            columns,
            n_rows: rows.len(),
        }
    }

    /// Stable ascending sort of all rows by a date column
    pub fn sort_by_date(&mut self, name: &str) -> Result<()> {
        let dates = match &self.column(name)?.data {
            ColumnData::Date(dates) => dates.clone(),
            other => {
                return Err(PipelineError::InvalidTable(format!(
                    "cannot sort by '{}': expected a date column, found {:?}",
                    name,
                    other.kind()
                )))
            }
        };

        let mut order: Vec<usize> = (0..self.n_rows).collect();
        order.sort_by_key(|&row| dates[row]);
        *self = self.take_rows(&order);
        Ok(())
    }

    /// Numeric values of a complete column
    pub fn numeric_values(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name)?;
        (0..self.n_rows)
            .map(|row| {
                column.data.as_f64(row).ok_or_else(|| {
                    PipelineError::InvalidTable(format!(
                        "column '{}' row {} is missing or not numeric",
                        name, row
                    ))
                })
            })
            .collect()
    }

    /// Row-major feature matrix over the named columns
    pub fn feature_rows(&self, names: &[String]) -> Result<Vec<Vec<f64>>> {
        let columns = names
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>>>()?;

        for column in &columns {
            if matches!(column.data.kind(), ColumnKind::Text | ColumnKind::Date) {
                return Err(PipelineError::InvalidTable(format!(
                    "feature column '{}' is {:?}, expected numeric",
                    column.name,
                    column.data.kind()
                )));
            }
        }

        let mut rows = Vec::with_capacity(self.n_rows);
        for row in 0..self.n_rows {
            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                let value = column.data.as_f64(row).ok_or_else(|| {
                    PipelineError::InvalidTable(format!(
                        "feature column '{}' has a missing value at row {}",
                        column.name, row
                    ))
                })?;
                values.push(value);
            }
            rows.push(values);
        }

        Ok(rows)
    }
}
