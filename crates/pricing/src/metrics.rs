//! Regression metrics

use crate::errors::{PipelineError, Result};

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.is_empty() {
        return Err(PipelineError::Metric("no values to score".into()));
    }
    if actual.len() != predicted.len() {
        return Err(PipelineError::Metric(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(total / actual.len() as f64)
}

/// `sqrt(mean((ln(1 + p) - ln(1 + a))^2))`
///
/// Negative inputs are rejected rather than clamped.
pub fn root_mean_squared_log_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    for (series, values) in [("actual", actual), ("predicted", predicted)] {
        if let Some(index) = values.iter().position(|v| *v < 0.0) {
            return Err(PipelineError::NegativeValue {
                series,
                index,
                value: values[index],
            });
        }
    }

    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (p.ln_1p() - a.ln_1p()).powi(2))
        .sum();
    Ok((total / actual.len() as f64).sqrt())
}

/// Coefficient of determination
///
/// With constant actuals the score is 1.0 for a perfect fit and 0.0
/// otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}
