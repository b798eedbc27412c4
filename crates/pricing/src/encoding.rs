//! Categorical encoding with a learned, reusable mapping
//!
//! Codes are 1..=K over the distinct training values in lexical order, with
//! 0 reserved for missing. The ordering depends only on the set of values
//! seen at fit time, never on row order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::errors::{PipelineError, Result};
use crate::table::{Column, ColumnData, Table};

/// Suffix of the companion "was missing" column
pub const MISSING_SUFFIX: &str = "_is_missing";

pub fn indicator_name(column: &str) -> String {
    format!("{column}{MISSING_SUFFIX}")
}

/// Category-to-code mapping for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub column: String,
    /// Distinct training values, sorted; value at index i has code i + 1
    pub categories: Vec<String>,
    /// Whether an `_is_missing` column is emitted for this column
    pub indicator: bool,
}

/// Result of encoding one column
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedColumn {
    pub codes: Vec<i64>,
    pub missing: Vec<bool>,
    /// Present values absent from the mapping (encoded as 0)
    pub unseen: usize,
}

impl CategoryMapping {
    pub fn fit(column: &str, values: &[Option<String>]) -> Self {
        let categories: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();

        Self {
            column: column.to_string(),
            categories: categories.into_iter().map(str::to_string).collect(),
            indicator: values.iter().any(Option::is_none),
        }
    }

    /// Code for a single value; `None` when the value was never seen
    pub fn code(&self, value: &str) -> Option<i64> {
        self.categories
            .binary_search_by(|category| category.as_str().cmp(value))
            .ok()
            .map(|idx| idx as i64 + 1)
    }

    pub fn encode(&self, values: &[Option<String>]) -> EncodedColumn {
        let mut codes = Vec::with_capacity(values.len());
        let mut missing = Vec::with_capacity(values.len());
        let mut unseen = 0;

        for value in values {
            match value {
                None => {
                    codes.push(0);
                    missing.push(true);
                }
                Some(value) => {
                    let code = self.code(value).unwrap_or_else(|| {
                        unseen += 1;
                        0
                    });
                    codes.push(code);
                    missing.push(false);
                }
            }
        }

        EncodedColumn {
            codes,
            missing,
            unseen,
        }
    }
}

/// Encodes every text column of a table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    mappings: Vec<CategoryMapping>,
}

impl CategoricalEncoder {
    /// Learn a mapping for every text column not listed in `exclude`
    pub fn fit(table: &Table, exclude: &[&str]) -> Self {
        let mappings = table
            .columns()
            .iter()
            .filter(|c| !exclude.contains(&c.name.as_str()))
            .filter_map(|c| match &c.data {
                ColumnData::Text(values) => Some(CategoryMapping::fit(&c.name, values)),
                _ => None,
            })
            .collect();

        Self { mappings }
    }

    pub fn mappings(&self) -> &[CategoryMapping] {
        &self.mappings
    }

    pub fn mapping(&self, column: &str) -> Option<&CategoryMapping> {
        self.mappings.iter().find(|m| m.column == column)
    }

    /// Replace each mapped column with its codes and append indicators
    ///
    /// Mapped columns absent from `table` are skipped here and filled in by
    /// schema alignment.
    pub fn transform(&self, table: &mut Table) -> Result<()> {
        for mapping in &self.mappings {
            if !table.contains(&mapping.column) {
                continue;
            }

            let encoded = match &table.column(&mapping.column)?.data {
                ColumnData::Text(values) => mapping.encode(values),
                other => {
                    return Err(PipelineError::InvalidTable(format!(
                        "categorical column '{}' arrived as {:?}",
                        mapping.column,
                        other.kind()
                    )))
                }
            };

            if encoded.unseen > 0 {
                warn!(
                    column = %mapping.column,
                    count = encoded.unseen,
                    "values not seen during fit encoded as 0"
                );
            }

            let missing_count = encoded.missing.iter().filter(|&&m| m).count();
            if mapping.indicator {
                table.push_column(Column::new(
                    indicator_name(&mapping.column),
                    ColumnData::Bool(encoded.missing),
                ))?;
            } else if missing_count > 0 {
                debug!(
                    column = %mapping.column,
                    missing = missing_count,
                    "missing values in a column that was complete at fit time"
                );
            }

            table.replace_data(&mapping.column, ColumnData::Integer(encoded.codes))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(raw: &[Option<&str>]) -> Vec<Option<String>> {
        raw.iter().map(|v| v.map(str::to_string)).collect()
    }

    fn table(raw: &[Option<&str>]) -> Table {
        Table::from_columns(vec![Column::new("UsageBand", ColumnData::Text(values(raw)))]).unwrap()
    }

    #[test]
    fn test_codes_and_indicator() {
        let mut table = table(&[Some("A"), None, Some("B"), Some("A")]);
        let encoder = CategoricalEncoder::fit(&table, &[]);
        encoder.transform(&mut table).unwrap();

        assert_eq!(
            table.column("UsageBand").unwrap().data,
            ColumnData::Integer(vec![1, 0, 2, 1])
        );
        assert_eq!(
            table.column("UsageBand_is_missing").unwrap().data,
            ColumnData::Bool(vec![false, true, false, false])
        );
    }

    #[test]
    fn test_lexical_order_ignores_row_order() {
        let forward = CategoryMapping::fit("c", &values(&[Some("Medium"), Some("High"), Some("Low")]));
        let backward = CategoryMapping::fit("c", &values(&[Some("Low"), Some("High"), Some("Medium")]));

        assert_eq!(forward, backward);
        assert_eq!(forward.code("High"), Some(1));
        assert_eq!(forward.code("Low"), Some(2));
        assert_eq!(forward.code("Medium"), Some(3));
    }

    #[test]
    fn test_no_indicator_without_missing_values() {
        let mut table = table(&[Some("A"), Some("B")]);
        let encoder = CategoricalEncoder::fit(&table, &[]);
        encoder.transform(&mut table).unwrap();

        assert!(!table.contains("UsageBand_is_missing"));
        assert_eq!(table.n_cols(), 1);
    }

    #[test]
    fn test_inference_reuses_training_mapping() {
        let train = table(&[Some("A"), None, Some("B"), Some("C")]);
        let encoder = CategoricalEncoder::fit(&train, &[]);

        // Same semantic values, different observed set and order
        let mut test = table(&[Some("C"), Some("Z"), Some("A")]);
        encoder.transform(&mut test).unwrap();

        assert_eq!(
            test.column("UsageBand").unwrap().data,
            ColumnData::Integer(vec![3, 0, 1])
        );
        // Indicator follows the fit-time decision even with no nulls here
        assert_eq!(
            test.column("UsageBand_is_missing").unwrap().data,
            ColumnData::Bool(vec![false, false, false])
        );
    }

    #[test]
    fn test_excluded_and_absent_columns_untouched() {
        let table = table(&[Some("A")]);
        let encoder = CategoricalEncoder::fit(&table, &["UsageBand"]);
        assert!(encoder.mappings().is_empty());

        let encoder = CategoricalEncoder::fit(&table, &[]);
        let mut other = Table::from_columns(vec![Column::new(
            "SalesID",
            ColumnData::Integer(vec![1]),
        )])
        .unwrap();
        encoder.transform(&mut other).unwrap();
        assert_eq!(other.column_names(), vec!["SalesID"]);
    }
}
