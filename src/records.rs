use polars::prelude::DataFrame;

use crate::error::Result;
use crate::tables::{
    f64_column, i64_column, optional_f64_column, optional_i64_column, str_column,
};

pub const SNAP_EVENT: &str = "ball_snap";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayKey {
    pub game_id: i64,
    pub play_id: i64,
}

impl PlayKey {
    pub fn new(game_id: i64, play_id: i64) -> Self {
        Self { game_id, play_id }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayRecord {
    pub key: Option<PlayKey>,
    pub down: Option<f64>,
    pub yards_to_go: Option<f64>,
    pub quarter: Option<f64>,
    pub play_action: Option<f64>,
    pub possession_team: Option<String>,
    pub defensive_team: Option<String>,
    pub offense_formation: Option<String>,
    pub receiver_alignment: Option<String>,
    pub pre_penalty_yards: Option<f64>,
    pub ball_carrier_id: Option<i64>,
    pub week: Option<i64>,
    pub carrier_avg_yards: Option<f64>,
}

impl PlayRecord {
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        const TABLE: &str = "plays";

        let game_ids = i64_column(df, TABLE, "gameId")?;
        let play_ids = i64_column(df, TABLE, "playId")?;
        let downs = f64_column(df, TABLE, "down")?;
        let yards_to_go = f64_column(df, TABLE, "yardsToGo")?;
        let quarters = f64_column(df, TABLE, "quarter")?;
        let play_action = f64_column(df, TABLE, "playAction")?;
        let possession = str_column(df, TABLE, "possessionTeam")?;
        let defensive = str_column(df, TABLE, "defensiveTeam")?;
        let formation = str_column(df, TABLE, "offenseFormation")?;
        let alignment = str_column(df, TABLE, "receiverAlignment")?;
        let yards = optional_f64_column(df, TABLE, "prePenaltyYardsGained")?;
        let carriers = optional_i64_column(df, TABLE, "ballCarrierId")?;
        let weeks = optional_i64_column(df, TABLE, "week")?;
        let carrier_avg = optional_f64_column(df, TABLE, "carrier_avg_yards")?;

        let mut possession = possession.into_iter();
        let mut defensive = defensive.into_iter();
        let mut formation = formation.into_iter();
        let mut alignment = alignment.into_iter();

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let key = match (game_ids[i], play_ids[i]) {
                (Some(game_id), Some(play_id)) => Some(PlayKey::new(game_id, play_id)),
                _ => None,
            };
            records.push(PlayRecord {
                key,
                down: downs[i],
                yards_to_go: yards_to_go[i],
                quarter: quarters[i],
                play_action: play_action[i],
                possession_team: possession.next().flatten(),
                defensive_team: defensive.next().flatten(),
                offense_formation: formation.next().flatten(),
                receiver_alignment: alignment.next().flatten(),
                pre_penalty_yards: yards[i],
                ball_carrier_id: carriers[i],
                week: weeks[i],
                carrier_avg_yards: carrier_avg[i],
            });
        }

        Ok(records)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingFrame {
    pub key: PlayKey,
    pub nfl_id: Option<i64>,
    pub frame_id: i64,
    pub event: Option<String>,
    pub club: Option<String>,
    pub x: f64,
    pub y: f64,
}

impl TrackingFrame {
    pub fn is_snap(&self) -> bool {
        self.event.as_deref() == Some(SNAP_EVENT)
    }

    /// Rows without a key, frame id or position carry no usable geometry and are skipped.
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        const TABLE: &str = "tracking";

        let game_ids = i64_column(df, TABLE, "gameId")?;
        let play_ids = i64_column(df, TABLE, "playId")?;
        let nfl_ids = optional_i64_column(df, TABLE, "nflId")?;
        let frame_ids = i64_column(df, TABLE, "frameId")?;
        let events = str_column(df, TABLE, "event")?;
        let clubs = str_column(df, TABLE, "club")?;
        let xs = f64_column(df, TABLE, "x")?;
        let ys = f64_column(df, TABLE, "y")?;

        let frames = game_ids
            .into_iter()
            .zip(play_ids)
            .zip(nfl_ids)
            .zip(frame_ids)
            .zip(events)
            .zip(clubs)
            .zip(xs.into_iter().zip(ys))
            .filter_map(
                |((((((game_id, play_id), nfl_id), frame_id), event), club), (x, y))| {
                    Some(TrackingFrame {
                        key: PlayKey::new(game_id?, play_id?),
                        nfl_id,
                        frame_id: frame_id?,
                        event,
                        club,
                        x: x?,
                        y: y?,
                    })
                },
            )
            .collect();

        Ok(frames)
    }
}
