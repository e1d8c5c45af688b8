use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::model::{GradientBoostedTrees, IterationScore};
use crate::schema::ModelSchema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub trained_at: DateTime<Utc>,
    pub train_rows: usize,
    pub valid_mae: Option<f64>,
    pub n_features: usize,
    pub model: GradientBoostedTrees,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn read_artifact(path: &Path, artifact: &'static str) -> Result<String> {
    if !path.exists() {
        return Err(PipelineError::MissingArtifact {
            artifact,
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read_to_string(path)?)
}

pub fn save_model(artifact: &ModelArtifact, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, serde_json::to_string(artifact)?)?;
    Ok(())
}

pub fn load_model(path: &Path) -> Result<ModelArtifact> {
    let raw = read_artifact(path, "model")?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_schema(schema: &ModelSchema, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, serde_json::to_string_pretty(schema)?)?;
    Ok(())
}

pub fn load_schema(path: &Path) -> Result<ModelSchema> {
    let raw = read_artifact(path, "model columns")?;
    Ok(serde_json::from_str(&raw)?)
}

/// One CSV row per boosting round: `iteration,train_mae,valid_mae`.
pub fn write_history(history: &[IterationScore], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = Writer::from_path(path)?;
    for row in history {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoostingParams;
    use tempfile::TempDir;

    #[test]
    fn missing_artifacts_point_at_training() {
        let dir = TempDir::new().unwrap();
        let err = load_model(&dir.path().join("model.json")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingArtifact { artifact: "model", .. }));
        assert!(err.to_string().contains("run `train` first"));

        let err = load_schema(&dir.path().join("model_columns.json")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingArtifact { .. }));
    }

    #[test]
    fn artifacts_round_trip() {
        let dir = TempDir::new().unwrap();
        let artifact = ModelArtifact {
            trained_at: Utc::now(),
            train_rows: 10,
            valid_mae: Some(1.25),
            n_features: 3,
            model: GradientBoostedTrees::new(BoostingParams::default()),
        };
        let path = dir.path().join("out").join("model.json");
        save_model(&artifact, &path).unwrap();
        let back = load_model(&path).unwrap();
        assert_eq!(back.n_features, 3);
        assert_eq!(back.valid_mae, Some(1.25));
        assert_eq!(back.model, artifact.model);

        let schema = ModelSchema::new(vec!["down".into(), "quarter".into()]);
        let schema_path = dir.path().join("out").join("model_columns.json");
        save_schema(&schema, &schema_path).unwrap();
        assert_eq!(load_schema(&schema_path).unwrap(), schema);
    }

    #[test]
    fn history_csv_has_header_and_blank_valid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("training_history.csv");
        let history = vec![
            IterationScore {
                iteration: 1,
                train_mae: 2.5,
                valid_mae: Some(3.0),
            },
            IterationScore {
                iteration: 2,
                train_mae: 2.0,
                valid_mae: None,
            },
        ];
        write_history(&history, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "iteration,train_mae,valid_mae");
        assert_eq!(lines[1], "1,2.5,3.0");
        assert_eq!(lines[2], "2,2.0,");
    }
}
