use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::artifacts::{ModelArtifact, save_model, save_schema, write_history};
use crate::assembly::{FeatureRow, prepare_features};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::model::{Dataset, GradientBoostedTrees, Regressor, mean_absolute_error};
use crate::schema::encode_for_training;
use crate::tables::{SourcePaths, SourceTables};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub rows: usize,
    pub train_rows: usize,
    pub valid_rows: usize,
    pub n_features: usize,
    pub best_iteration: usize,
    pub valid_mae: Option<f64>,
}

/// Shuffled (train, valid) index split. The validation side gets
/// `ceil(n * fraction)` rows but never all of them.
pub fn split_indices(n: usize, valid_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    if n < 2 {
        return (indices, Vec::new());
    }
    let valid_len = ((n as f64 * valid_fraction.clamp(0.0, 1.0)).ceil() as usize).min(n - 1);
    let train = indices.split_off(valid_len);
    (train, indices)
}

fn gather(rows: &[Vec<f64>], targets: &[f64], indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
    indices
        .iter()
        .map(|&i| (rows[i].clone(), targets[i]))
        .unzip()
}

pub fn run_training(config: &PipelineConfig) -> Result<TrainingSummary> {
    let paths = SourcePaths::new(&config.data_dir, &config.output_dir);
    let sources = SourceTables::load(&paths)?;
    let prepared = prepare_features(&sources, config)?;

    let labelled: Vec<&FeatureRow> = prepared
        .features
        .rows
        .iter()
        .filter(|row| row.target.is_some())
        .collect();
    if labelled.len() < prepared.features.len() {
        warn!(
            dropped = prepared.features.len() - labelled.len(),
            "rows without a target left out of training"
        );
    }
    if labelled.is_empty() {
        return Err(PipelineError::EmptyFeatureTable { stage: "train" });
    }

    let vectors: Vec<_> = labelled.iter().map(|row| &row.features).collect();
    let targets: Vec<f64> = labelled.iter().filter_map(|row| row.target).collect();
    let (matrix, schema) = encode_for_training(&vectors);

    let (train_idx, valid_idx) = split_indices(matrix.n_rows(), config.valid_fraction, config.seed);
    let (train_rows, train_targets) = gather(matrix.rows(), &targets, &train_idx);
    let (valid_rows, valid_targets) = gather(matrix.rows(), &targets, &valid_idx);

    info!(
        rows = matrix.n_rows(),
        train = train_rows.len(),
        valid = valid_rows.len(),
        features = schema.len(),
        "fitting gradient-boosted trees"
    );

    let mut model = GradientBoostedTrees::new(config.boosting.clone());
    let valid = (!valid_rows.is_empty()).then(|| Dataset::new(&valid_rows, &valid_targets));
    let report = model.fit(Dataset::new(&train_rows, &train_targets), valid)?;

    let valid_mae = valid.map(|v| mean_absolute_error(v.targets, &model.predict(v.rows)));
    match valid_mae {
        Some(mae) => info!(mae, best_iteration = report.best_iteration, "validation MAE"),
        None => warn!("too few rows for a validation split; no MAE reported"),
    }

    let artifact = ModelArtifact {
        trained_at: Utc::now(),
        train_rows: train_rows.len(),
        valid_mae,
        n_features: schema.len(),
        model,
    };
    save_model(&artifact, &paths.model())?;
    save_schema(&schema, &paths.schema())?;
    write_history(&report.history, &paths.history())?;
    info!(output = %config.output_dir.display(), "training artifacts written");

    Ok(TrainingSummary {
        rows: matrix.n_rows(),
        train_rows: train_rows.len(),
        valid_rows: valid_rows.len(),
        n_features: schema.len(),
        best_iteration: report.best_iteration,
        valid_mae,
    })
}
