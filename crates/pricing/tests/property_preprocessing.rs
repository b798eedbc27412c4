//! Property tests for preprocessing, splitting and metrics

use bluebook_pricing::encoding::CategoricalEncoder;
use bluebook_pricing::imputation::NumericImputer;
use bluebook_pricing::metrics::root_mean_squared_log_error;
use bluebook_pricing::{split_by_year, Column, ColumnData, PreprocessSettings, Preprocessor, Table};
use chrono::NaiveDate;
use proptest::prelude::*;

fn category() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[A-E]{1,2}")
}

fn dates(n: usize) -> Vec<NaiveDate> {
    (0..n)
        .map(|i| NaiveDate::from_ymd_opt(2008 + (i % 5) as i32, 1 + (i % 12) as u32, 1).unwrap())
        .collect()
}

fn auction_table(bands: Vec<Option<String>>, hours: Vec<Option<f64>>) -> Table {
    let n = bands.len();
    Table::from_columns(vec![
        Column::new(
            "SalePrice",
            ColumnData::Numeric((0..n).map(|i| Some(1_000.0 + i as f64)).collect()),
        ),
        Column::new("saledate", ColumnData::Date(dates(n))),
        Column::new("UsageBand", ColumnData::Text(bands)),
        Column::new("MachineHours", ColumnData::Numeric(hours)),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn prop_split_is_a_partition(
        years in prop::collection::vec(2000i64..2015, 0..60),
        cutoff in 1995i64..2020,
    ) {
        let table = Table::from_columns(vec![
            Column::new("saleYear", ColumnData::Integer(years.clone())),
            Column::new("row", ColumnData::Integer((0..years.len() as i64).collect())),
        ]).unwrap();

        let split = split_by_year(&table, "saleYear", cutoff).unwrap();
        prop_assert_eq!(split.train.n_rows() + split.valid.n_rows(), years.len());

        let rows = |t: &Table| match &t.column("row").unwrap().data {
            ColumnData::Integer(v) => v.clone(),
            _ => unreachable!(),
        };
        let train_rows = rows(&split.train);
        let valid_rows = rows(&split.valid);
        prop_assert!(train_rows.iter().all(|r| !valid_rows.contains(r)));
        prop_assert!(valid_rows.iter().all(|&r| years[r as usize] == cutoff));
        prop_assert!(train_rows.iter().all(|&r| years[r as usize] != cutoff));
    }

    #[test]
    fn prop_indicator_count_equals_imputed_nulls(
        values in prop::collection::vec(prop::option::of(-1e6f64..1e6), 1..80),
    ) {
        let nulls = values.iter().filter(|v| v.is_none()).count();
        let mut table = Table::from_columns(vec![
            Column::new("MachineHours", ColumnData::Numeric(values)),
        ]).unwrap();

        let imputer = NumericImputer::fit(&table, &[]);
        let filled = imputer.transform(&mut table).unwrap();
        prop_assert_eq!(filled, nulls);
        prop_assert_eq!(table.column("MachineHours").unwrap().data.missing_count(), 0);

        if nulls > 0 {
            match &table.column("MachineHours_is_missing").unwrap().data {
                ColumnData::Bool(flags) => {
                    prop_assert_eq!(flags.iter().filter(|f| **f).count(), nulls);
                }
                other => prop_assert!(false, "indicator has kind {:?}", other.kind()),
            }
        } else {
            prop_assert!(!table.contains("MachineHours_is_missing"));
        }
    }

    #[test]
    fn prop_encoding_is_deterministic(
        values in prop::collection::vec(category(), 1..60),
    ) {
        let table = Table::from_columns(vec![
            Column::new("UsageBand", ColumnData::Text(values)),
        ]).unwrap();
        let encoder = CategoricalEncoder::fit(&table, &[]);

        let mut first = table.clone();
        let mut second = table.clone();
        encoder.transform(&mut first).unwrap();
        encoder.transform(&mut second).unwrap();
        prop_assert_eq!(&first, &second);

        // Refitting on shuffled rows gives the same mapping
        let order: Vec<usize> = (0..table.n_rows()).rev().collect();
        let reversed = table.take_rows(&order);
        prop_assert_eq!(CategoricalEncoder::fit(&reversed, &[]), encoder);
    }

    #[test]
    fn prop_schema_is_stable(
        train in prop::collection::vec((category(), prop::option::of(0.0f64..5000.0)), 1..40),
        test in prop::collection::vec((category(), prop::option::of(0.0f64..5000.0)), 1..40),
    ) {
        let (train_bands, train_hours): (Vec<_>, Vec<_>) = train.into_iter().unzip();
        let (test_bands, test_hours): (Vec<_>, Vec<_>) = test.into_iter().unzip();

        let preprocessor = Preprocessor::new(PreprocessSettings::default());
        let (fitted, processed) = preprocessor
            .fit_transform(auction_table(train_bands, train_hours))
            .unwrap();

        let mut test_table = auction_table(test_bands, test_hours);
        test_table.remove_column("SalePrice").unwrap();
        let test_processed = fitted.transform(test_table).unwrap();

        let mut train_features = processed.column_names();
        train_features.retain(|name| name != "SalePrice");
        prop_assert_eq!(test_processed.column_names(), train_features);
        prop_assert!(test_processed
            .feature_rows(fitted.feature_names())
            .unwrap()
            .iter()
            .flatten()
            .all(|v| v.is_finite()));
    }

    #[test]
    fn prop_rmsle_of_exact_predictions_is_zero(
        values in prop::collection::vec(0.0f64..1e7, 1..100),
    ) {
        prop_assert_eq!(root_mean_squared_log_error(&values, &values).unwrap(), 0.0);
    }
}
