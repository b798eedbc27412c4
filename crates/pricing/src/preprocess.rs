//! Preprocessing pipeline: dates → categories → medians → schema alignment
//!
//! `Preprocessor::fit_transform` learns every mapping from the training
//! table and returns a [`FittedPreprocessor`] that replays them verbatim on
//! any other table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

use crate::dates::DateExpander;
use crate::encoding::{CategoricalEncoder, MISSING_SUFFIX};
use crate::errors::{PipelineError, Result};
use crate::imputation::NumericImputer;
use crate::ingest::CsvSchema;
use crate::table::{Column, ColumnData, ColumnKind, Table};

/// Column roles shared by fit and transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessSettings {
    pub dates: DateExpander,
    pub target_column: String,
    /// Sort the training table by date before expanding it
    pub sort_by_date: bool,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            dates: DateExpander::default(),
            target_column: "SalePrice".to_string(),
            sort_by_date: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    settings: PreprocessSettings,
}

impl Preprocessor {
    pub fn new(settings: PreprocessSettings) -> Self {
        Self { settings }
    }

    /// Learn mappings from `table` and return it processed
    ///
    /// The output holds the feature columns in their final order followed by
    /// the target column.
    #[instrument(skip_all, fields(rows = table.n_rows(), cols = table.n_cols()))]
    pub fn fit_transform(&self, mut table: Table) -> Result<(FittedPreprocessor, Table)> {
        let target = self.settings.target_column.as_str();
        let target_column = table.column(target)?;
        if !matches!(target_column.data.kind(), ColumnKind::Numeric | ColumnKind::Integer) {
            return Err(PipelineError::InvalidTable(format!(
                "target column '{target}' must be numeric"
            )));
        }
        let missing_targets = target_column.data.missing_count();
        if missing_targets > 0 {
            return Err(PipelineError::InvalidTable(format!(
                "target column '{target}' has {missing_targets} missing values"
            )));
        }

        if self.settings.sort_by_date {
            table.sort_by_date(&self.settings.dates.source)?;
        }
        self.settings.dates.expand(&mut table)?;

        let encoder = CategoricalEncoder::fit(&table, &[target]);
        encoder.transform(&mut table)?;

        let imputer = NumericImputer::fit(&table, &[target]);
        imputer.transform(&mut table)?;

        let feature_names: Vec<String> = table
            .column_names()
            .into_iter()
            .filter(|name| name != target)
            .collect();

        let mut order = feature_names.clone();
        order.push(target.to_string());
        table.reorder(&order)?;

        let indicators = feature_names
            .iter()
            .filter(|n| n.ends_with(MISSING_SUFFIX))
            .count();
        info!(
            "Preprocessed {} rows: {} features ({} categorical, {} imputed, {} missing indicators)",
            table.n_rows(),
            feature_names.len(),
            encoder.mappings().len(),
            imputer.medians().iter().filter(|m| m.indicator).count(),
            indicators
        );

        let fitted = FittedPreprocessor {
            settings: self.settings.clone(),
            encoder,
            imputer,
            feature_names,
        };
        Ok((fitted, table))
    }
}

/// Mappings, medians and the feature schema learned from training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    settings: PreprocessSettings,
    encoder: CategoricalEncoder,
    imputer: NumericImputer,
    feature_names: Vec<String>,
}

impl FittedPreprocessor {
    pub fn settings(&self) -> &PreprocessSettings {
        &self.settings
    }

    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    pub fn imputer(&self) -> &NumericImputer {
        &self.imputer
    }

    /// Training feature columns, in model input order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn target_column(&self) -> &str {
        &self.settings.target_column
    }

    /// Typing hints that make an inference CSV parse like the training one
    pub fn csv_schema(&self) -> CsvSchema {
        CsvSchema::default()
            .with_date_column(self.settings.dates.source.clone())
            .with_numeric(self.imputer.medians().iter().map(|m| m.column.clone()))
            .with_numeric([self.settings.target_column.clone()])
            .with_text(self.encoder.mappings().iter().map(|m| m.column.clone()))
    }

    /// Apply the learned steps to a new table, preserving row order
    #[instrument(skip_all, fields(rows = table.n_rows(), cols = table.n_cols()))]
    pub fn transform(&self, mut table: Table) -> Result<Table> {
        self.settings.dates.expand(&mut table)?;
        self.encoder.transform(&mut table)?;
        self.imputer.transform(&mut table)?;
        self.align(table)
    }

    /// Conform a processed table to the training feature schema
    ///
    /// Feature columns missing from `table` are added with a default of 0
    /// (`false` for missing indicators) and logged; columns the training
    /// schema does not know are rejected. The target column, if present, is
    /// kept as the last column.
    pub fn align(&self, mut table: Table) -> Result<Table> {
        let target = self.settings.target_column.as_str();
        let known: BTreeSet<&str> = self.feature_names.iter().map(String::as_str).collect();

        let unexpected: Vec<String> = table
            .column_names()
            .into_iter()
            .filter(|name| name != target && !known.contains(name.as_str()))
            .collect();
        if !unexpected.is_empty() {
            return Err(PipelineError::SchemaMismatch {
                missing: Vec::new(),
                unexpected,
            });
        }

        let n_rows = table.n_rows();
        for name in &self.feature_names {
            if table.contains(name) {
                continue;
            }

            let data = if name.ends_with(MISSING_SUFFIX) {
                ColumnData::Bool(vec![false; n_rows])
            } else {
                ColumnData::Numeric(vec![Some(0.0); n_rows])
            };
            warn!(column = %name, rows = n_rows, "feature column absent, filled with default");
            table.push_column(Column::new(name.clone(), data))?;
        }

        let mut order = self.feature_names.clone();
        if table.contains(target) {
            order.push(target.to_string());
        }
        table.reorder(&order)?;

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::read_csv;

    const TRAIN: &str = "SalesID,SalePrice,saledate,auctioneerID,UsageBand\n\
                         1,100,2010-01-01,3,Low\n\
                         2,200,2012-06-01,,\n\
                         3,150,2011-03-01,5,High\n";

    fn train_table() -> Table {
        let schema = CsvSchema::default()
            .with_date_column("saledate")
            .with_numeric(["SalePrice"]);
        read_csv(TRAIN.as_bytes(), &schema).unwrap()
    }

    #[test]
    fn test_fit_transform_produces_numeric_sorted_table() {
        let (fitted, table) = Preprocessor::default().fit_transform(train_table()).unwrap();

        assert_eq!(
            table.column("saleYear").unwrap().data,
            ColumnData::Integer(vec![2010, 2011, 2012])
        );
        assert_eq!(table.column_names().last().unwrap(), "SalePrice");
        assert!(table
            .feature_rows(fitted.feature_names())
            .unwrap()
            .iter()
            .all(|row| row.iter().all(|v| v.is_finite())));
        assert!(fitted.feature_names().contains(&"auctioneerID_is_missing".to_string()));
        assert!(fitted.feature_names().contains(&"UsageBand_is_missing".to_string()));
        assert!(!fitted.feature_names().contains(&"SalePrice".to_string()));
    }

    #[test]
    fn test_transform_aligns_inference_schema() {
        let (fitted, train) = Preprocessor::default().fit_transform(train_table()).unwrap();

        // No nulls and no target in the inference file
        let csv = "SalesID,saledate,auctioneerID,UsageBand\n9,2012-07-01,4,Medium\n";
        let test = read_csv(csv.as_bytes(), &fitted.csv_schema()).unwrap();
        let processed = fitted.transform(test).unwrap();

        let mut train_features = train.column_names();
        train_features.pop();
        assert_eq!(processed.column_names(), train_features);
    }

    #[test]
    fn test_absent_feature_filled_with_default() {
        let (fitted, _) = Preprocessor::default().fit_transform(train_table()).unwrap();

        let csv = "SalesID,saledate,UsageBand\n9,2012-07-01,Low\n";
        let test = read_csv(csv.as_bytes(), &fitted.csv_schema()).unwrap();
        let processed = fitted.transform(test).unwrap();

        assert_eq!(
            processed.column("auctioneerID").unwrap().data,
            ColumnData::Numeric(vec![Some(0.0)])
        );
        assert_eq!(
            processed.column("auctioneerID_is_missing").unwrap().data,
            ColumnData::Bool(vec![false])
        );
    }

    #[test]
    fn test_unexpected_column_rejected() {
        let (fitted, _) = Preprocessor::default().fit_transform(train_table()).unwrap();

        let csv = "SalesID,saledate,auctioneerID,UsageBand,Blade_Width\n9,2012-07-01,4,Low,14'\n";
        let test = read_csv(csv.as_bytes(), &fitted.csv_schema()).unwrap();

        match fitted.transform(test).unwrap_err() {
            PipelineError::SchemaMismatch { unexpected, .. } => {
                assert_eq!(unexpected, vec!["Blade_Width".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_column_empty_in_training_encodes_unseen_text() {
        let schema = CsvSchema::default()
            .with_date_column("saledate")
            .with_numeric(["SalePrice"]);
        let csv = "SalePrice,saledate,Blade\n100,2010-01-01,\n200,2011-01-01,\n";
        let train = read_csv(csv.as_bytes(), &schema).unwrap();
        let (fitted, _) = Preprocessor::default().fit_transform(train).unwrap();

        let test = read_csv(
            "saledate,Blade\n2012-01-01,14'\n".as_bytes(),
            &fitted.csv_schema(),
        )
        .unwrap();
        let processed = fitted.transform(test).unwrap();

        assert_eq!(processed.column("Blade").unwrap().data, ColumnData::Integer(vec![0]));
        assert_eq!(
            processed.column("Blade_is_missing").unwrap().data,
            ColumnData::Bool(vec![false])
        );
    }

    #[test]
    fn test_missing_target_values_rejected() {
        let csv = "SalePrice,saledate\n,2010-01-01\n";
        let schema = CsvSchema::default().with_date_column("saledate");
        let table = read_csv(csv.as_bytes(), &schema).unwrap();

        assert!(matches!(
            Preprocessor::default().fit_transform(table),
            Err(PipelineError::InvalidTable(_))
        ));
    }

    #[test]
    fn test_fitted_preprocessor_serde_round_trip() {
        let (fitted, _) = Preprocessor::default().fit_transform(train_table()).unwrap();
        let json = serde_json::to_string(&fitted).unwrap();
        let restored: FittedPreprocessor = serde_json::from_str(&json).unwrap();
        assert_eq!(fitted, restored);
    }
}
