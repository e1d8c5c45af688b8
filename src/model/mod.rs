pub mod binning;
pub mod boosting;
pub mod tree;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use boosting::GradientBoostedTrees;
pub use tree::RegressionTree;

#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    pub rows: &'a [Vec<f64>],
    pub targets: &'a [f64],
}

impl<'a> Dataset<'a> {
    pub fn new(rows: &'a [Vec<f64>], targets: &'a [f64]) -> Self {
        Self { rows, targets }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
    /// Stop when validation MAE has not improved for this many rounds.
    pub early_stopping_rounds: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 1000,
            learning_rate: 0.05,
            max_depth: 5,
            min_samples_leaf: 20,
            max_bins: 255,
            early_stopping_rounds: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationScore {
    pub iteration: usize,
    pub train_mae: f64,
    pub valid_mae: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub best_iteration: usize,
    pub best_valid_mae: Option<f64>,
    pub history: Vec<IterationScore>,
}

pub trait Regressor {
    fn fit(&mut self, train: Dataset<'_>, valid: Option<Dataset<'_>>) -> Result<FitReport>;

    fn predict_row(&self, row: &[f64]) -> f64;

    fn n_features(&self) -> usize;

    fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

pub fn mean_absolute_error(targets: &[f64], predictions: &[f64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let total: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(y, p)| (y - p).abs())
        .sum();
    total / targets.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn mae_is_mean_of_absolute_residuals() {
        assert!((mean_absolute_error(&[1.0, 2.0, 3.0], &[2.0, 2.0, 1.0]) - 1.0).abs() < 1e-12);
    }
}
