use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::error::{PipelineError, Result};

pub const PREDICTIONS_FILE: &str = "plays_with_predictions.parquet";
pub const MODEL_FILE: &str = "model.json";
pub const SCHEMA_FILE: &str = "model_columns.json";
pub const HISTORY_FILE: &str = "training_history.csv";

#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl SourcePaths {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn plays(&self) -> PathBuf {
        self.data_dir.join("plays.parquet")
    }

    pub fn games(&self) -> PathBuf {
        self.data_dir.join("games.parquet")
    }

    pub fn player_play(&self) -> PathBuf {
        self.data_dir.join("player_play.parquet")
    }

    pub fn players(&self) -> PathBuf {
        self.data_dir.join("players.parquet")
    }

    pub fn tracking_week(&self, week: i64) -> PathBuf {
        self.data_dir.join(format!("tracking_week_{}.parquet", week))
    }

    pub fn predictions(&self) -> PathBuf {
        self.output_dir.join(PREDICTIONS_FILE)
    }

    pub fn model(&self) -> PathBuf {
        self.output_dir.join(MODEL_FILE)
    }

    pub fn schema(&self) -> PathBuf {
        self.output_dir.join(SCHEMA_FILE)
    }

    pub fn history(&self) -> PathBuf {
        self.output_dir.join(HISTORY_FILE)
    }
}

pub struct SourceTables {
    pub plays: DataFrame,
    pub games: DataFrame,
    pub player_play: DataFrame,
}

impl SourceTables {
    pub fn load(paths: &SourcePaths) -> Result<Self> {
        let plays = read_parquet(&paths.plays(), "plays")?;
        let games = read_parquet(&paths.games(), "games")?;
        let player_play = read_parquet(&paths.player_play(), "player_play")?;
        Ok(Self {
            plays,
            games,
            player_play,
        })
    }
}

pub fn read_parquet(path: &Path, table: &'static str) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::MissingSource {
            table,
            path: path.to_path_buf(),
        });
    }

    let df = LazyFrame::scan_parquet(path, ScanArgsParquet::default())?.collect()?;
    debug!(table, rows = df.height(), path = %path.display(), "loaded table");
    Ok(df)
}

pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(df)?;
    Ok(())
}

pub fn scan_play_frames(path: &Path, game_id: i64, play_id: i64) -> Result<DataFrame> {
    let df = LazyFrame::scan_parquet(path, ScanArgsParquet::default())?
        .filter(
            col("gameId")
                .cast(DataType::Int64)
                .eq(lit(game_id))
                .and(col("playId").cast(DataType::Int64).eq(lit(play_id))),
        )
        .collect()?;
    Ok(df)
}

/// Casts the play key columns so joins never fail on mismatched integer widths.
pub fn with_int64_keys(lf: LazyFrame, keys: &[&str]) -> LazyFrame {
    let casts: Vec<Expr> = keys
        .iter()
        .map(|key| col(key).cast(DataType::Int64))
        .collect();
    lf.with_columns(casts)
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| *c == name)
}

fn column<'a>(df: &'a DataFrame, table: &str, name: &str) -> Result<&'a Series> {
    df.column(name).map_err(|_| PipelineError::MissingColumn {
        table: table.to_string(),
        column: name.to_string(),
    })
}

/// Float view of a column; NaN is treated as missing.
pub fn f64_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, table, name)?.cast(&DataType::Float64)?;
    let values = series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

pub fn i64_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<i64>>> {
    let series = column(df, table, name)?.cast(&DataType::Int64)?;
    let values = series.i64()?.into_iter().collect();
    Ok(values)
}

pub fn str_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, table, name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

pub fn optional_f64_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<f64>>> {
    if has_column(df, name) {
        f64_column(df, table, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

pub fn optional_i64_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<i64>>> {
    if has_column(df, name) {
        i64_column(df, table, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

pub fn optional_str_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<String>>> {
    if has_column(df, name) {
        str_column(df, table, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

pub fn any_value_to_json(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::Bool(v),
        AnyValue::String(v) => Value::String(v.to_string()),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => float_to_json(v as f64),
        AnyValue::Float64(v) => float_to_json(v),
        other => Value::String(other.to_string()),
    }
}

/// Non-finite floats have no JSON form and serialise as `null`.
pub fn float_to_json(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub fn row_to_json(df: &DataFrame, row: usize) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for series in df.get_columns() {
        out.insert(series.name().to_string(), any_value_to_json(series.get(row)?));
    }
    Ok(out)
}

pub fn rows_to_json(df: &DataFrame) -> Result<Vec<Map<String, Value>>> {
    (0..df.height()).map(|row| row_to_json(df, row)).collect()
}
