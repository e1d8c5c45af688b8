//! Per-week tracking telemetry, loaded lazily and held for the lifetime of one pipeline run.
//!
//! A [`TrackingCache`] never evicts: every distinct week touched stays resident until the
//! cache is dropped. That is the right trade for a batch run over a handful of weeks and
//! the wrong one for a long-lived service, which is why the query service reads weekly
//! files on demand instead of holding one of these.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::records::{PlayKey, TrackingFrame};
use crate::tables::{SourcePaths, read_parquet};

#[derive(Debug, Default)]
pub struct WeekTracking {
    plays: HashMap<PlayKey, Vec<TrackingFrame>>,
}

impl WeekTracking {
    pub fn load(path: &Path) -> Result<Self> {
        let df = read_parquet(path, "tracking")?;
        Ok(Self::from_frames(TrackingFrame::from_frame(&df)?))
    }

    pub fn from_frames(frames: Vec<TrackingFrame>) -> Self {
        let mut plays: HashMap<PlayKey, Vec<TrackingFrame>> = HashMap::new();
        for frame in frames {
            plays.entry(frame.key).or_default().push(frame);
        }
        Self { plays }
    }

    pub fn frames_for(&self, key: PlayKey) -> Option<&[TrackingFrame]> {
        self.plays.get(&key).map(Vec::as_slice)
    }

    pub fn play_count(&self) -> usize {
        self.plays.len()
    }
}

/// Scoped to one pipeline run. Each week file is read at most once for the cache's lifetime.
pub struct TrackingCache {
    paths: SourcePaths,
    // `None` records a week whose file does not exist, so the disk is checked once.
    weeks: HashMap<i64, Option<WeekTracking>>,
    file_reads: usize,
}

impl TrackingCache {
    pub fn new(paths: SourcePaths) -> Self {
        Self {
            paths,
            weeks: HashMap::new(),
            file_reads: 0,
        }
    }

    pub fn week(&mut self, week: i64) -> Result<Option<&WeekTracking>> {
        if !self.weeks.contains_key(&week) {
            let path = self.paths.tracking_week(week);
            let loaded = if path.exists() {
                self.file_reads += 1;
                let tracking = WeekTracking::load(&path)?;
                info!(week, plays = tracking.play_count(), "loaded tracking week");
                Some(tracking)
            } else {
                warn!(week, path = %path.display(), "tracking file missing; plays for this week are skipped");
                None
            };
            self.weeks.insert(week, loaded);
        }

        Ok(self.weeks.get(&week).and_then(Option::as_ref))
    }

    pub fn get_frames_for_play(
        &mut self,
        game_id: i64,
        play_id: i64,
        week: i64,
    ) -> Result<Option<&[TrackingFrame]>> {
        let week = self.week(week)?;
        Ok(week.and_then(|w| w.frames_for(PlayKey::new(game_id, play_id))))
    }

    pub fn loaded_weeks(&self) -> Vec<i64> {
        let mut weeks: Vec<i64> = self
            .weeks
            .iter()
            .filter(|(_, tracking)| tracking.is_some())
            .map(|(week, _)| *week)
            .collect();
        weeks.sort_unstable();
        weeks
    }

    pub fn file_reads(&self) -> usize {
        self.file_reads
    }
}
