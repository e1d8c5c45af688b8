use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::binning::BinnedMatrix;
use super::tree::{RegressionTree, TreeBuilder};
use super::{BoostingParams, Dataset, FitReport, IterationScore, Regressor, mean_absolute_error, median};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    params: BoostingParams,
    base_score: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl Regressor for GradientBoostedTrees {
    fn fit(&mut self, train: Dataset<'_>, valid: Option<Dataset<'_>>) -> Result<FitReport> {
        if train.is_empty() {
            return Err(PipelineError::EmptyFeatureTable { stage: "fit" });
        }

        let params = self.params.clone();
        let patience = params.early_stopping_rounds.max(1);
        let valid = valid.filter(|v| !v.is_empty());

        self.n_features = train.n_features();
        self.base_score = median(train.targets);
        self.trees.clear();

        let matrix = BinnedMatrix::build(train.rows, self.n_features, params.max_bins);
        let all_rows: Vec<usize> = (0..train.len()).collect();

        let mut train_pred = vec![self.base_score; train.len()];
        let mut valid_pred = valid.map(|v| vec![self.base_score; v.len()]);
        let mut best_valid = valid.map(|v| mean_absolute_error(v.targets, &vec![self.base_score; v.len()]));
        let mut best_iteration = 0;
        let mut history = Vec::new();

        for iteration in 1..=params.n_estimators {
            let residuals: Vec<f64> = train
                .targets
                .iter()
                .zip(&train_pred)
                .map(|(y, p)| y - p)
                .collect();
            let gradients: Vec<f64> = residuals.iter().map(|r| sign(*r)).collect();

            let builder = TreeBuilder::new(&matrix, &gradients, params.max_depth, params.min_samples_leaf);
            let tree = builder.build(all_rows.clone(), &|leaf_rows: &[usize]| {
                let leaf: Vec<f64> = leaf_rows.iter().map(|&r| residuals[r]).collect();
                params.learning_rate * median(&leaf)
            });

            for (pred, row) in train_pred.iter_mut().zip(train.rows) {
                *pred += tree.predict_row(row);
            }
            if let (Some(v), Some(preds)) = (valid, valid_pred.as_mut()) {
                for (pred, row) in preds.iter_mut().zip(v.rows) {
                    *pred += tree.predict_row(row);
                }
            }
            self.trees.push(tree);

            let train_mae = mean_absolute_error(train.targets, &train_pred);
            let valid_mae = valid
                .zip(valid_pred.as_ref())
                .map(|(v, preds)| mean_absolute_error(v.targets, preds));
            history.push(IterationScore {
                iteration,
                train_mae,
                valid_mae,
            });

            if iteration % 100 == 0 {
                debug!(iteration, train_mae, ?valid_mae, "boosting progress");
            }

            match (valid_mae, best_valid) {
                (Some(current), Some(best)) if current < best => {
                    best_valid = Some(current);
                    best_iteration = iteration;
                }
                (Some(_), Some(_)) => {
                    if iteration - best_iteration >= patience {
                        info!(iteration, best_iteration, "early stopping");
                        break;
                    }
                }
                _ => best_iteration = iteration,
            }
        }

        self.trees.truncate(best_iteration);

        Ok(FitReport {
            best_iteration,
            best_valid_mae: best_valid,
            history,
        })
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
