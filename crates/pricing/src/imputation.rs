//! Median imputation for numeric columns
//!
//! Medians are learned for every numeric feature column at fit time so that
//! inference never recomputes them from the table it is filling.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::encoding::indicator_name;
use crate::errors::{PipelineError, Result};
use crate::table::{Column, ColumnData, Table};

/// Learned fill value for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMedian {
    pub column: String,
    pub median: f64,
    /// Whether an `_is_missing` column is emitted for this column
    pub indicator: bool,
}

/// Median of the present values; `None` when nothing is present
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }

    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    Some(if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericImputer {
    medians: Vec<ColumnMedian>,
}

impl NumericImputer {
    /// Learn medians for every numeric column not listed in `exclude`
    pub fn fit(table: &Table, exclude: &[&str]) -> Self {
        let medians = table
            .columns()
            .iter()
            .filter(|c| !exclude.contains(&c.name.as_str()))
            .filter_map(|c| match &c.data {
                ColumnData::Numeric(values) => {
                    let fill = median(values).unwrap_or_else(|| {
                        warn!(column = %c.name, "column has no values at fit time, filling with 0");
                        0.0
                    });
                    Some(ColumnMedian {
                        column: c.name.clone(),
                        median: fill,
                        indicator: values.iter().any(Option::is_none),
                    })
                }
                _ => None,
            })
            .collect();

        Self { medians }
    }

    pub fn medians(&self) -> &[ColumnMedian] {
        &self.medians
    }

    /// Fill nulls with the learned medians and append indicators
    ///
    /// Returns the number of cells filled.
    pub fn transform(&self, table: &mut Table) -> Result<usize> {
        let mut filled_total = 0;

        for entry in &self.medians {
            if !table.contains(&entry.column) {
                continue;
            }

            let values = match &table.column(&entry.column)?.data {
                ColumnData::Numeric(values) => values.clone(),
                ColumnData::Integer(_) => continue,
                other => {
                    return Err(PipelineError::InvalidTable(format!(
                        "numeric column '{}' arrived as {:?}",
                        entry.column,
                        other.kind()
                    )))
                }
            };

            let missing: Vec<bool> = values.iter().map(Option::is_none).collect();
            let filled = missing.iter().filter(|&&m| m).count();
            filled_total += filled;

            if entry.indicator {
                table.push_column(Column::new(
                    indicator_name(&entry.column),
                    ColumnData::Bool(missing),
                ))?;
            } else if filled > 0 {
                warn!(
                    column = %entry.column,
                    filled,
                    "imputing a column that was complete at fit time (no indicator emitted)"
                );
            }

            let complete = values
                .into_iter()
                .map(|v| Some(v.unwrap_or(entry.median)))
                .collect();
            table.replace_data(&entry.column, ColumnData::Numeric(complete))?;
        }

        debug!(filled = filled_total, "numeric imputation complete");
        Ok(filled_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(values: Vec<Option<f64>>) -> Table {
        Table::from_columns(vec![Column::new("auctioneerID", ColumnData::Numeric(values))]).unwrap()
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[Some(10.0), None, Some(30.0)]), Some(20.0));
        assert_eq!(median(&[Some(3.0), Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_fill_with_median_and_indicator() {
        let mut table = table(vec![Some(10.0), None, Some(30.0)]);
        let imputer = NumericImputer::fit(&table, &[]);
        let filled = imputer.transform(&mut table).unwrap();

        assert_eq!(filled, 1);
        assert_eq!(
            table.column("auctioneerID").unwrap().data,
            ColumnData::Numeric(vec![Some(10.0), Some(20.0), Some(30.0)])
        );
        assert_eq!(
            table.column("auctioneerID_is_missing").unwrap().data,
            ColumnData::Bool(vec![false, true, false])
        );
    }

    #[test]
    fn test_complete_column_gets_no_indicator() {
        let mut table = table(vec![Some(1.0), Some(2.0)]);
        let imputer = NumericImputer::fit(&table, &[]);
        imputer.transform(&mut table).unwrap();

        assert_eq!(table.column_names(), vec!["auctioneerID"]);
    }

    #[test]
    fn test_inference_uses_training_median() {
        let train = table(vec![Some(10.0), None, Some(30.0)]);
        let imputer = NumericImputer::fit(&train, &[]);

        let mut test = table(vec![None, Some(1000.0), Some(2000.0)]);
        imputer.transform(&mut test).unwrap();

        assert_eq!(
            test.column("auctioneerID").unwrap().data,
            ColumnData::Numeric(vec![Some(20.0), Some(1000.0), Some(2000.0)])
        );
    }

    #[test]
    fn test_all_missing_column_fills_zero() {
        let mut table = table(vec![None, None]);
        let imputer = NumericImputer::fit(&table, &[]);
        imputer.transform(&mut table).unwrap();

        assert_eq!(
            table.column("auctioneerID").unwrap().data,
            ColumnData::Numeric(vec![Some(0.0), Some(0.0)])
        );
    }

    #[test]
    fn test_target_can_be_excluded() {
        let table = table(vec![Some(1.0), None]);
        let imputer = NumericImputer::fit(&table, &["auctioneerID"]);
        assert!(imputer.medians().is_empty());
    }
}
