use polars::prelude::*;
use tracing::info;

use crate::artifacts::{load_model, load_schema};
use crate::assembly::{FeatureRow, prepare_features};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::model::Regressor;
use crate::schema::encode_for_inference;
use crate::tables::{SourcePaths, SourceTables, write_parquet};

pub const PREDICTION_COLUMN: &str = "predictedYardsGained";

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSummary {
    pub raw_plays: usize,
    pub scored_plays: usize,
}

fn predictions_frame(rows: &[FeatureRow], predictions: Vec<f64>) -> Result<DataFrame> {
    let game_ids: Vec<i64> = rows.iter().map(|r| r.key.game_id).collect();
    let play_ids: Vec<i64> = rows.iter().map(|r| r.key.play_id).collect();
    Ok(DataFrame::new(vec![
        Series::new("gameId", game_ids),
        Series::new("playId", play_ids),
        Series::new(PREDICTION_COLUMN, predictions),
    ])?)
}

pub fn run_batch_scoring(config: &PipelineConfig) -> Result<ScoringSummary> {
    let paths = SourcePaths::new(&config.data_dir, &config.output_dir);
    let artifact = load_model(&paths.model())?;
    let schema = load_schema(&paths.schema())?;
    if artifact.model.n_features() == 0 {
        return Err(PipelineError::Unfitted);
    }
    if artifact.model.n_features() != schema.len() {
        return Err(PipelineError::SchemaMismatch {
            expected: artifact.model.n_features(),
            actual: schema.len(),
        });
    }

    let sources = SourceTables::load(&paths)?;
    let raw_plays = sources.plays.height();
    let prepared = prepare_features(&sources, config)?;
    if prepared.features.is_empty() {
        return Err(PipelineError::EmptyFeatureTable { stage: "score" });
    }

    let vectors: Vec<_> = prepared.features.rows.iter().map(|row| &row.features).collect();
    let matrix = encode_for_inference(&vectors, &schema);
    let predictions = artifact.model.predict(matrix.rows());

    let scored = predictions_frame(&prepared.features.rows, predictions)?;
    let mut joined = prepared
        .enriched
        .lazy()
        .join(
            scored.lazy(),
            [col("gameId"), col("playId")],
            [col("gameId"), col("playId")],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;

    write_parquet(&mut joined, &paths.predictions())?;
    info!(
        raw_plays,
        scored = joined.height(),
        path = %paths.predictions().display(),
        "wrote prediction table"
    );

    Ok(ScoringSummary {
        raw_plays,
        scored_plays: joined.height(),
    })
}
