//! Calendar feature expansion for the sale date

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{PipelineError, Result};
use crate::table::{Column, ColumnData, Table};

/// Calendar parts derived from a date, in output column order
pub const DATE_PARTS: [&str; 5] = ["Year", "Month", "Day", "DayOfWeek", "DayOfYear"];

/// Replaces one date column with integer calendar columns
///
/// Derived names are `prefix + part`, so the defaults produce `saleYear`,
/// `saleMonth`, `saleDay`, `saleDayOfWeek` (Monday = 0) and `saleDayOfYear`
/// (January 1st = 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateExpander {
    pub source: String,
    pub prefix: String,
}

impl Default for DateExpander {
    fn default() -> Self {
        Self {
            source: "saledate".to_string(),
            prefix: "sale".to_string(),
        }
    }
}

impl DateExpander {
    pub fn new(source: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            prefix: prefix.into(),
        }
    }

    pub fn derived_name(&self, part: &str) -> String {
        format!("{}{}", self.prefix, part)
    }

    /// Name of the derived year column
    pub fn year_column(&self) -> String {
        self.derived_name("Year")
    }

    pub fn derived_names(&self) -> Vec<String> {
        DATE_PARTS.iter().map(|part| self.derived_name(part)).collect()
    }

    /// Append the five calendar columns and drop the source column
    pub fn expand(&self, table: &mut Table) -> Result<()> {
        let dates = match &table.column(&self.source)?.data {
            ColumnData::Date(dates) => dates.clone(),
            other => {
                return Err(PipelineError::InvalidTable(format!(
                    "'{}' must be a date column, found {:?}",
                    self.source,
                    other.kind()
                )))
            }
        };

        let mut parts: [Vec<i64>; 5] = Default::default();
        for date in &dates {
            parts[0].push(i64::from(date.year()));
            parts[1].push(i64::from(date.month()));
            parts[2].push(i64::from(date.day()));
            parts[3].push(i64::from(date.weekday().num_days_from_monday()));
            parts[4].push(i64::from(date.ordinal()));
        }

        for (part, values) in DATE_PARTS.iter().zip(parts) {
            table.push_column(Column::new(
                self.derived_name(part),
                ColumnData::Integer(values),
            ))?;
        }
        table.remove_column(&self.source)?;

        debug!(
            source = %self.source,
            rows = table.n_rows(),
            "expanded date into calendar features"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table() -> Table {
        let dates = ["2010-01-01", "2012-06-01", "2011-03-01"]
            .iter()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap())
            .collect();
        Table::from_columns(vec![
            Column::new("SalesID", ColumnData::Integer(vec![1, 2, 3])),
            Column::new("saledate", ColumnData::Date(dates)),
        ])
        .unwrap()
    }

    #[test]
    fn test_expand_replaces_source_column() {
        let mut table = table();
        DateExpander::default().expand(&mut table).unwrap();

        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.n_cols(), 2 - 1 + 5);
        assert!(!table.contains("saledate"));
        assert_eq!(
            table.column_names(),
            vec![
                "SalesID",
                "saleYear",
                "saleMonth",
                "saleDay",
                "saleDayOfWeek",
                "saleDayOfYear"
            ]
        );
    }

    #[test]
    fn test_calendar_values() {
        let mut table = table();
        DateExpander::default().expand(&mut table).unwrap();

        let get = |name: &str| table.column(name).unwrap().data.clone();
        assert_eq!(get("saleYear"), ColumnData::Integer(vec![2010, 2012, 2011]));
        assert_eq!(get("saleMonth"), ColumnData::Integer(vec![1, 6, 3]));
        assert_eq!(get("saleDay"), ColumnData::Integer(vec![1, 1, 1]));
        // 2010-01-01 was a Friday, 2012-06-01 a Friday, 2011-03-01 a Tuesday
        assert_eq!(get("saleDayOfWeek"), ColumnData::Integer(vec![4, 4, 1]));
        // 2012 is a leap year
        assert_eq!(get("saleDayOfYear"), ColumnData::Integer(vec![1, 153, 60]));
    }

    #[test]
    fn test_non_date_source_rejected() {
        let mut table = table();
        let expander = DateExpander::new("SalesID", "sale");
        assert!(matches!(
            expander.expand(&mut table),
            Err(PipelineError::InvalidTable(_))
        ));
    }
}
