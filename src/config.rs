use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::BoostingParams;

pub const FIELD_WIDTH: f64 = 53.3;
pub const BOX_SIDELINE_MARGIN: f64 = 15.0;

/// Rectangle near the line of scrimmage used to count run defenders.
///
/// x bounds are relative to the line of scrimmage, y bounds are absolute field
/// coordinates. All bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxRegion {
    pub behind_los: f64,
    pub beyond_los: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl BoxRegion {
    pub fn from_field(field_width: f64, sideline_margin: f64) -> Self {
        Self {
            behind_los: 1.0,
            beyond_los: 7.0,
            y_min: sideline_margin,
            y_max: field_width - sideline_margin,
        }
    }

    pub fn contains(&self, line_of_scrimmage: f64, x: f64, y: f64) -> bool {
        x >= line_of_scrimmage - self.behind_los
            && x <= line_of_scrimmage + self.beyond_los
            && y >= self.y_min
            && y <= self.y_max
    }
}

impl Default for BoxRegion {
    fn default() -> Self {
        Self::from_field(FIELD_WIDTH, BOX_SIDELINE_MARGIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    #[default]
    DropRows,
    FillZero,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub box_region: BoxRegion,
    /// Carriers need strictly more charted plays than this to get their own average.
    pub min_carrier_plays: u32,
    pub missing_policy: MissingPolicy,
    pub valid_fraction: f64,
    pub seed: u64,
    pub boosting: BoostingParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("dataset"),
            output_dir: PathBuf::from("output"),
            box_region: BoxRegion::default(),
            min_carrier_plays: 20,
            missing_policy: MissingPolicy::default(),
            valid_fraction: 0.2,
            seed: 42,
            boosting: BoostingParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub host: [u8; 4],
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: [0, 0, 0, 0],
            port: 5001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_box_matches_field_margins() {
        let region = BoxRegion::default();
        assert_eq!(region.y_min, 15.0);
        assert!((region.y_max - 38.3).abs() < 1e-9);
        assert!(region.contains(50.0, 49.0, 15.0));
        assert!(region.contains(50.0, 57.0, 38.3));
        assert!(!region.contains(50.0, 48.9, 20.0));
        assert!(!region.contains(50.0, 52.0, 40.0));
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"min_carrier_plays": 5, "missing_policy": "fill-zero", "box_region": {"y_min": 10.0}}"#,
        )
        .unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.min_carrier_plays, 5);
        assert_eq!(config.missing_policy, MissingPolicy::FillZero);
        assert_eq!(config.box_region.y_min, 10.0);
        assert_eq!(config.box_region.beyond_los, 7.0);
        assert_eq!(config.seed, 42);
    }
}
