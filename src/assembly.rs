use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use rayon::prelude::*;
use tracing::info;

use crate::config::{BoxRegion, MissingPolicy, PipelineConfig};
use crate::error::Result;
use crate::play_features;
use crate::records::{PlayKey, PlayRecord};
use crate::skill_proxy::enrich_plays;
use crate::tables::{SourcePaths, SourceTables};
use crate::tracking::{TrackingCache, WeekTracking};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    pub down: Option<f64>,
    pub yards_to_go: Option<f64>,
    pub quarter: Option<f64>,
    pub play_action: Option<f64>,
    pub possession_team: Option<String>,
    pub defensive_team: Option<String>,
    pub offense_formation: Option<String>,
    pub receiver_alignment: Option<String>,
    pub carrier_avg_yards: Option<f64>,
    pub offense_area: Option<f64>,
    pub defenders_in_box: Option<f64>,
}

impl FeatureVector {
    /// Same order as [`crate::schema::NUMERIC_COLUMNS`].
    pub fn numeric(&self) -> [Option<f64>; 7] {
        [
            self.down,
            self.yards_to_go,
            self.quarter,
            self.play_action,
            self.carrier_avg_yards,
            self.offense_area,
            self.defenders_in_box,
        ]
    }

    /// Same order as [`crate::schema::CATEGORICAL_COLUMNS`].
    pub fn categorical(&self) -> [Option<&str>; 4] {
        [
            self.possession_team.as_deref(),
            self.defensive_team.as_deref(),
            self.offense_formation.as_deref(),
            self.receiver_alignment.as_deref(),
        ]
    }

    pub fn has_missing(&self) -> bool {
        self.numeric().iter().any(Option::is_none) || self.categorical().iter().any(Option::is_none)
    }

    fn fill_numeric_zero(&mut self) {
        for value in [
            &mut self.down,
            &mut self.yards_to_go,
            &mut self.quarter,
            &mut self.play_action,
            &mut self.carrier_avg_yards,
            &mut self.offense_area,
            &mut self.defenders_in_box,
        ] {
            value.get_or_insert(0.0);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub key: PlayKey,
    pub target: Option<f64>,
    pub features: FeatureVector,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub plays: usize,
    pub no_key_or_week: usize,
    pub no_tracking: usize,
    pub no_snap: usize,
    pub missing_values: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
    pub stats: AssemblyStats,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, key: PlayKey) -> bool {
        self.rows.iter().any(|row| row.key == key)
    }
}

enum Skip {
    NoTracking,
    NoSnap,
}

fn build_row(
    play: &PlayRecord,
    key: PlayKey,
    week: &WeekTracking,
    region: &BoxRegion,
) -> std::result::Result<FeatureRow, Skip> {
    let Some(frames) = week.frames_for(key) else {
        return Err(Skip::NoTracking);
    };
    let Some(snap) = play_features::extract(frames, play, region) else {
        return Err(Skip::NoSnap);
    };

    Ok(FeatureRow {
        key,
        target: play.pre_penalty_yards,
        features: FeatureVector {
            down: play.down,
            yards_to_go: play.yards_to_go,
            quarter: play.quarter,
            play_action: play.play_action,
            possession_team: play.possession_team.clone(),
            defensive_team: play.defensive_team.clone(),
            offense_formation: play.offense_formation.clone(),
            receiver_alignment: play.receiver_alignment.clone(),
            carrier_avg_yards: play.carrier_avg_yards,
            offense_area: snap.offense_area,
            defenders_in_box: Some(snap.defenders_in_box as f64),
        },
    })
}

/// Builds one feature row per play that has tracking and a snap anchor.
///
/// Plays are grouped by week so each weekly file is read at most once; the plays of a
/// loaded week are then extracted in parallel against that immutable week.
pub fn assemble(
    plays: &[PlayRecord],
    cache: &mut TrackingCache,
    region: &BoxRegion,
    policy: MissingPolicy,
) -> Result<FeatureTable> {
    let mut stats = AssemblyStats {
        plays: plays.len(),
        ..Default::default()
    };

    let mut by_week: BTreeMap<i64, Vec<(PlayKey, &PlayRecord)>> = BTreeMap::new();
    for play in plays {
        match (play.key, play.week) {
            (Some(key), Some(week)) => by_week.entry(week).or_default().push((key, play)),
            _ => stats.no_key_or_week += 1,
        }
    }

    let mut rows = Vec::with_capacity(plays.len());
    for (week, week_plays) in by_week {
        let Some(tracking) = cache.week(week)? else {
            stats.no_tracking += week_plays.len();
            continue;
        };

        let built: Vec<std::result::Result<FeatureRow, Skip>> = week_plays
            .par_iter()
            .map(|(key, play)| build_row(play, *key, tracking, region))
            .collect();

        for row in built {
            match row {
                Ok(row) => rows.push(row),
                Err(Skip::NoSnap) => stats.no_snap += 1,
                Err(Skip::NoTracking) => stats.no_tracking += 1,
            }
        }
    }

    let before = rows.len();
    match policy {
        MissingPolicy::DropRows => rows.retain(|row| !row.features.has_missing()),
        MissingPolicy::FillZero => rows.iter_mut().for_each(|row| row.features.fill_numeric_zero()),
    }
    stats.missing_values = before - rows.len();

    info!(
        plays = stats.plays,
        rows = rows.len(),
        no_key_or_week = stats.no_key_or_week,
        no_tracking = stats.no_tracking,
        no_snap = stats.no_snap,
        missing_values = stats.missing_values,
        "assembled feature table"
    );

    Ok(FeatureTable { rows, stats })
}

pub struct PreparedPlays {
    pub enriched: DataFrame,
    pub features: FeatureTable,
}

pub fn prepare_features(sources: &SourceTables, config: &PipelineConfig) -> Result<PreparedPlays> {
    let enriched = enrich_plays(sources, config.min_carrier_plays)?;
    let records = PlayRecord::from_frame(&enriched)?;

    let mut cache = TrackingCache::new(SourcePaths::new(&config.data_dir, &config.output_dir));
    let features = assemble(&records, &mut cache, &config.box_region, config.missing_policy)?;

    Ok(PreparedPlays { enriched, features })
}
