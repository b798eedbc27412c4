//! Inference: raw table in, `(id, prediction)` pairs out

use bluebook_forest::{RandomForest, Regressor};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{info, instrument};

use crate::errors::{PipelineError, Result};
use crate::preprocess::FittedPreprocessor;
use crate::table::Table;

/// One prediction per input row, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    pub id_column: String,
    pub target_column: String,
    pub ids: Vec<String>,
    pub values: Vec<f64>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write a two-column CSV with a header row
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([self.id_column.as_str(), self.target_column.as_str()])?;
        for (id, value) in self.ids.iter().zip(&self.values) {
            csv.write_record([id.clone(), value.to_string()])?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.to_writer(File::create(path)?)?;
        info!("Wrote {} predictions to {}", self.len(), path.display());
        Ok(())
    }
}

/// Couples the fitted preprocessor with its forest
pub struct Predictor<'a> {
    preprocessor: &'a FittedPreprocessor,
    model: &'a RandomForest,
    id_column: String,
}

impl<'a> Predictor<'a> {
    pub fn new(
        preprocessor: &'a FittedPreprocessor,
        model: &'a RandomForest,
        id_column: impl Into<String>,
    ) -> Result<Self> {
        if preprocessor.feature_names() != model.feature_names() {
            return Err(PipelineError::schema_mismatch(
                model.feature_names(),
                preprocessor.feature_names(),
            ));
        }

        Ok(Self {
            preprocessor,
            model,
            id_column: id_column.into(),
        })
    }

    /// Preprocess `raw` with the training mappings and predict every row
    #[instrument(skip_all, fields(rows = raw.n_rows()))]
    pub fn predict(&self, raw: Table) -> Result<Predictions> {
        let id_data = raw.column(&self.id_column)?.data.clone();
        let ids: Vec<String> = (0..raw.n_rows()).map(|row| id_data.display(row)).collect();

        let processed = self.preprocessor.transform(raw)?;
        let features = processed.feature_rows(self.preprocessor.feature_names())?;
        let values = self.model.predict(&features)?;

        info!("Predicted {} rows", values.len());
        Ok(Predictions {
            id_column: self.id_column.clone(),
            target_column: self.preprocessor.target_column().to_string(),
            ids,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{read_csv, CsvSchema};
    use crate::preprocess::Preprocessor;
    use bluebook_forest::ForestParams;

    fn fitted_preprocessor() -> FittedPreprocessor {
        let csv = "SalesID,SalePrice,saledate,UsageBand\n\
                   1,100,2010-01-01,Low\n\
                   2,200,2011-06-01,High\n";
        let schema = CsvSchema::default()
            .with_date_column("saledate")
            .with_numeric(["SalePrice"]);
        let table = read_csv(csv.as_bytes(), &schema).unwrap();
        Preprocessor::default().fit_transform(table).unwrap().0
    }

    #[test]
    fn test_forest_over_other_features_rejected() {
        let preprocessor = fitted_preprocessor();
        let params = ForestParams {
            n_estimators: 2,
            ..Default::default()
        };
        let model = RandomForest::fit(
            params,
            vec!["fiBaseModel".into()],
            &[vec![1.0], vec![2.0]],
            &[100.0, 200.0],
        )
        .unwrap();

        match Predictor::new(&preprocessor, &model, "SalesID") {
            Err(PipelineError::SchemaMismatch { missing, unexpected }) => {
                assert_eq!(missing, vec!["fiBaseModel".to_string()]);
                assert!(unexpected.contains(&"UsageBand".to_string()));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("mismatched forest accepted"),
        }
    }

    #[test]
    fn test_csv_has_two_columns_in_order() {
        let predictions = Predictions {
            id_column: "SalesID".into(),
            target_column: "SalePrice".into(),
            ids: vec!["1227829".into(), "1227844".into()],
            values: vec![18500.0, 12250.5],
        };

        let mut buffer = Vec::new();
        predictions.to_writer(&mut buffer).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "SalesID,SalePrice\n1227829,18500\n1227844,12250.5\n"
        );
    }
}
