use std::collections::{BTreeSet, HashMap};

use polars::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::batch::PREDICTION_COLUMN;
use crate::error::{PipelineError, QueryError, Result};
use crate::records::PlayKey;
use crate::tables::{
    SourcePaths, any_value_to_json, f64_column, float_to_json, has_column, i64_column,
    optional_i64_column, optional_str_column, read_parquet, row_to_json, rows_to_json,
    scan_play_frames,
};

pub const SEARCH_LIMIT: usize = 50;

const SEARCH_COLUMNS: [&str; 6] = [
    "gameId",
    "playId",
    "playDescription",
    "displayName",
    "prePenaltyYardsGained",
    PREDICTION_COLUMN,
];
const ROUNDED_COLUMNS: [&str; 2] = ["prePenaltyYardsGained", PREDICTION_COLUMN];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub team: Option<String>,
    pub player_name: Option<String>,
    pub down: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filters {
    pub players: Vec<String>,
    pub teams: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayDetail {
    #[serde(rename = "playInfo")]
    pub play_info: Map<String, Value>,
    #[serde(rename = "trackingData")]
    pub tracking_data: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone)]
struct PlaySummary {
    row: usize,
    team: Option<String>,
    player: Option<String>,
    down: Option<i64>,
    predicted: f64,
}

impl PlaySummary {
    fn matches(&self, query: &SearchQuery) -> bool {
        let team = query.team.as_ref().is_none_or(|t| self.team.as_ref() == Some(t));
        let player = query
            .player_name
            .as_ref()
            .is_none_or(|p| self.player.as_ref() == Some(p));
        let down = query.down.is_none_or(|d| self.down == Some(d));
        team && player && down
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct PredictionStore {
    paths: SourcePaths,
    table: DataFrame,
    index: HashMap<PlayKey, usize>,
    summaries: Vec<PlaySummary>,
    weeks: HashMap<i64, i64>,
}

impl PredictionStore {
    pub fn load(paths: SourcePaths) -> Result<Self> {
        let path = paths.predictions();
        if !path.exists() {
            return Err(PipelineError::MissingArtifact {
                artifact: "prediction table",
                path,
            });
        }
        let mut table = read_parquet(&path, "predictions")?;

        let players_path = paths.players();
        if players_path.exists()
            && has_column(&table, "ballCarrierId")
            && !has_column(&table, "displayName")
        {
            let players = read_parquet(&players_path, "players")?
                .lazy()
                .select([col("nflId").cast(DataType::Int64), col("displayName")]);
            table = table
                .lazy()
                .with_column(col("ballCarrierId").cast(DataType::Int64))
                .join(
                    players,
                    [col("ballCarrierId")],
                    [col("nflId")],
                    JoinArgs::new(JoinType::Left),
                )
                .collect()?;
        }

        let games = read_parquet(&paths.games(), "games")?;
        let weeks: HashMap<i64, i64> = i64_column(&games, "games", "gameId")?
            .into_iter()
            .zip(i64_column(&games, "games", "week")?)
            .filter_map(|(game, week)| Some((game?, week?)))
            .collect();

        Self::from_parts(paths, table, weeks)
    }

    fn from_parts(paths: SourcePaths, table: DataFrame, weeks: HashMap<i64, i64>) -> Result<Self> {
        const TABLE: &str = "predictions";

        let game_ids = i64_column(&table, TABLE, "gameId")?;
        let play_ids = i64_column(&table, TABLE, "playId")?;
        let predicted = f64_column(&table, TABLE, PREDICTION_COLUMN)?;
        let teams = optional_str_column(&table, TABLE, "possessionTeam")?;
        let players = optional_str_column(&table, TABLE, "displayName")?;
        let downs = optional_i64_column(&table, TABLE, "down")?;

        let mut index = HashMap::with_capacity(table.height());
        for (row, (game, play)) in game_ids.into_iter().zip(play_ids).enumerate() {
            if let (Some(game), Some(play)) = (game, play) {
                index.entry(PlayKey::new(game, play)).or_insert(row);
            }
        }

        let summaries = teams
            .into_iter()
            .zip(players)
            .zip(downs)
            .zip(predicted)
            .enumerate()
            .map(|(row, (((team, player), down), predicted))| PlaySummary {
                row,
                team,
                player,
                down,
                predicted: predicted.unwrap_or(f64::NEG_INFINITY),
            })
            .collect();

        info!(plays = table.height(), games = weeks.len(), "prediction table loaded");
        Ok(Self {
            paths,
            table,
            index,
            summaries,
            weeks,
        })
    }

    pub fn len(&self) -> usize {
        self.table.height()
    }

    pub fn is_empty(&self) -> bool {
        self.table.height() == 0
    }

    pub fn list_filters(&self) -> Filters {
        let players: BTreeSet<&str> = self.summaries.iter().filter_map(|s| s.player.as_deref()).collect();
        let teams: BTreeSet<&str> = self.summaries.iter().filter_map(|s| s.team.as_deref()).collect();
        Filters {
            players: players.into_iter().map(str::to_string).collect(),
            teams: teams.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<Map<String, Value>>> {
        let mut hits: Vec<&PlaySummary> = self.summaries.iter().filter(|s| s.matches(query)).collect();
        hits.sort_by(|a, b| b.predicted.total_cmp(&a.predicted));
        hits.truncate(SEARCH_LIMIT);

        let mut columns = Vec::new();
        for name in SEARCH_COLUMNS {
            if !has_column(&self.table, name) {
                continue;
            }
            let series = self.table.column(name)?;
            let rounded = ROUNDED_COLUMNS.contains(&name);
            let series = if rounded {
                series.cast(&DataType::Float64)?
            } else {
                series.clone()
            };
            columns.push((name, series, rounded));
        }

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let mut row = Map::new();
            for (name, series, rounded) in &columns {
                let value = match series.get(hit.row)? {
                    AnyValue::Float64(v) if *rounded => float_to_json(round2(v)),
                    other => any_value_to_json(other),
                };
                row.insert(name.to_string(), value);
            }
            out.push(row);
        }
        Ok(out)
    }

    pub fn get_play(&self, game_id: i64, play_id: i64) -> std::result::Result<PlayDetail, QueryError> {
        let Some(&row) = self.index.get(&PlayKey::new(game_id, play_id)) else {
            return Err(QueryError::NotFound {
                what: format!("play {}/{}", game_id, play_id),
            });
        };
        let play_info = row_to_json(&self.table, row)?;

        let Some(&week) = self.weeks.get(&game_id) else {
            return Err(QueryError::NotFound {
                what: format!("game {}", game_id),
            });
        };
        let path = self.paths.tracking_week(week);
        if !path.exists() {
            return Err(QueryError::NotFound {
                what: format!("tracking data for week {}", week),
            });
        }

        let frames = scan_play_frames(&path, game_id, play_id)?;
        let tracking_data = rows_to_json(&frames)?;
        Ok(PlayDetail {
            play_info,
            tracking_data,
        })
    }
}

/// Process-scoped handle; a store that failed to load makes every query unavailable.
pub struct QueryService {
    store: std::result::Result<PredictionStore, String>,
}

impl QueryService {
    pub fn load(paths: SourcePaths) -> Self {
        match PredictionStore::load(paths) {
            Ok(store) => Self::from_store(store),
            Err(err) => {
                error!(error = %err, "prediction table failed to load; serving 503s");
                Self {
                    store: Err(err.to_string()),
                }
            }
        }
    }

    pub fn from_store(store: PredictionStore) -> Self {
        Self { store: Ok(store) }
    }

    pub fn store(&self) -> std::result::Result<&PredictionStore, QueryError> {
        self.store.as_ref().map_err(|reason| QueryError::Unavailable {
            reason: reason.clone(),
        })
    }

    pub fn list_filters(&self) -> std::result::Result<Filters, QueryError> {
        Ok(self.store()?.list_filters())
    }

    pub fn search(&self, query: &SearchQuery) -> std::result::Result<Vec<Map<String, Value>>, QueryError> {
        Ok(self.store()?.search(query)?)
    }

    pub fn get_play(&self, game_id: i64, play_id: i64) -> std::result::Result<PlayDetail, QueryError> {
        self.store()?.get_play(game_id, play_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::write_parquet;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SourcePaths) {
        let dir = TempDir::new().unwrap();
        let paths = SourcePaths::new(dir.path().join("data"), dir.path().join("out"));

        let mut predictions = DataFrame::new(vec![
            Series::new("gameId", &[1i64, 1, 2, 2]),
            Series::new("playId", &[10i64, 11, 20, 21]),
            Series::new("down", &[1i64, 3, 3, 2]),
            Series::new("possessionTeam", &["KC", "KC", "BUF", "BUF"]),
            Series::new("ballCarrierId", &[100i64, 200, 100, 300]),
            Series::new(
                "playDescription",
                &["run left", "run right", "pass short", "run middle"],
            ),
            Series::new("prePenaltyYardsGained", &[Some(3.0f64), Some(f64::NAN), Some(12.0), None]),
            Series::new(PREDICTION_COLUMN, &[4.567f64, 2.111, 9.999, 5.0]),
        ])
        .unwrap();
        write_parquet(&mut predictions, &paths.predictions()).unwrap();

        let mut players = DataFrame::new(vec![
            Series::new("nflId", &[100i64, 200]),
            Series::new("displayName", &["Runner One", "Runner Two"]),
        ])
        .unwrap();
        write_parquet(&mut players, &paths.players()).unwrap();

        let mut games = DataFrame::new(vec![
            Series::new("gameId", &[1i64, 3]),
            Series::new("week", &[1i64, 2]),
        ])
        .unwrap();
        write_parquet(&mut games, &paths.games()).unwrap();

        let mut tracking = DataFrame::new(vec![
            Series::new("gameId", &[1i64, 1, 1]),
            Series::new("playId", &[10i64, 10, 11]),
            Series::new("frameId", &[1i64, 2, 1]),
            Series::new("x", &[50.0f64, 51.0, 40.0]),
        ])
        .unwrap();
        write_parquet(&mut tracking, &paths.tracking_week(1)).unwrap();

        (dir, paths)
    }

    #[test]
    fn filters_are_sorted_distinct_and_non_null() {
        let (_dir, paths) = fixture();
        let store = PredictionStore::load(paths).unwrap();
        let filters = store.list_filters();
        assert_eq!(filters.players, vec!["Runner One", "Runner Two"]);
        assert_eq!(filters.teams, vec!["BUF", "KC"]);
    }

    #[test]
    fn search_sorts_descending_and_rounds() {
        let (_dir, paths) = fixture();
        let store = PredictionStore::load(paths).unwrap();
        let rows = store.search(&SearchQuery::default()).unwrap();

        let predicted: Vec<f64> = rows
            .iter()
            .map(|r| r[PREDICTION_COLUMN].as_f64().unwrap())
            .collect();
        assert_eq!(predicted, vec![10.0, 5.0, 4.57, 2.11]);
        assert_eq!(rows[0]["displayName"], Value::String("Runner One".into()));
        assert_eq!(rows[1]["displayName"], Value::Null);
        assert_eq!(rows[3]["prePenaltyYardsGained"], Value::Null);
        assert!(rows[0].get("down").is_none());
        assert_eq!(rows[0].len(), SEARCH_COLUMNS.len());
    }

    #[test]
    fn search_filters_intersect() {
        let (_dir, paths) = fixture();
        let store = PredictionStore::load(paths).unwrap();

        let third_down = store
            .search(&SearchQuery {
                down: Some(3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(third_down.len(), 2);

        let both = store
            .search(&SearchQuery {
                down: Some(3),
                team: Some("KC".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0]["playId"], Value::from(11));

        let none = store
            .search(&SearchQuery {
                player_name: Some("Nobody".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn play_detail_reads_only_that_play() {
        let (_dir, paths) = fixture();
        let store = PredictionStore::load(paths).unwrap();

        let detail = store.get_play(1, 10).unwrap();
        assert_eq!(detail.play_info["playDescription"], Value::String("run left".into()));
        assert_eq!(detail.tracking_data.len(), 2);

        let detail = store.get_play(1, 11).unwrap();
        assert_eq!(detail.play_info["prePenaltyYardsGained"], Value::Null);

        let json = serde_json::to_value(&detail).unwrap();
        assert!(json.get("playInfo").is_some());
        assert!(json.get("trackingData").is_some());
    }

    #[test]
    fn missing_play_game_or_week_is_not_found() {
        let (_dir, paths) = fixture();
        let store = PredictionStore::load(paths).unwrap();

        assert!(matches!(store.get_play(9, 9), Err(QueryError::NotFound { .. })));
        // game 2 has predictions but no games row
        assert!(matches!(store.get_play(2, 20), Err(QueryError::NotFound { .. })));
    }

    #[test]
    fn missing_week_file_is_not_found() {
        let (_dir, paths) = fixture();
        let mut games = DataFrame::new(vec![
            Series::new("gameId", &[1i64, 2]),
            Series::new("week", &[1i64, 5]),
        ])
        .unwrap();
        write_parquet(&mut games, &paths.games()).unwrap();

        let store = PredictionStore::load(paths).unwrap();
        match store.get_play(2, 20) {
            Err(QueryError::NotFound { what }) => assert!(what.contains("week 5")),
            other => panic!("unexpected: {:?}", other.map(|d| d.play_info)),
        }
    }

    #[test]
    fn unloadable_store_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let service = QueryService::load(SourcePaths::new(dir.path(), dir.path()));
        assert!(matches!(service.list_filters(), Err(QueryError::Unavailable { .. })));
        assert!(matches!(
            service.search(&SearchQuery::default()),
            Err(QueryError::Unavailable { .. })
        ));
        assert!(matches!(service.get_play(1, 1), Err(QueryError::Unavailable { .. })));
    }
}
