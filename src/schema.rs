//! One-hot encoding and the frozen training column schema.
//!
//! Every matrix that reaches the model goes through [`one_hot_encode`] and, at
//! inference time, [`FeatureMatrix::align_to`]. Columns the schema lists but the
//! batch lacks are zero-filled; columns the batch has but the schema lacks are
//! dropped. A category first seen at inference time therefore encodes as all
//! zeros for its variable.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::assembly::FeatureVector;

pub const NUMERIC_COLUMNS: [&str; 7] = [
    "down",
    "yardsToGo",
    "quarter",
    "playAction",
    "carrier_avg_yards",
    "offense_area",
    "defenders_in_box",
];

pub const CATEGORICAL_COLUMNS: [&str; 4] = [
    "possessionTeam",
    "defensiveTeam",
    "offenseFormation",
    "receiverAlignment",
];

/// Suffix of the indicator column that is hot when a categorical value is missing.
pub const UNKNOWN_CATEGORY: &str = "nan";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSchema {
    columns: Vec<String>,
}

impl ModelSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn schema(&self) -> ModelSchema {
        ModelSchema::new(self.columns.clone())
    }

    #[cfg(test)]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[cfg(test)]
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx])
    }

    pub fn align_to(&self, schema: &ModelSchema) -> FeatureMatrix {
        let positions: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let sources: Vec<Option<usize>> = schema
            .columns()
            .iter()
            .map(|c| positions.get(c.as_str()).copied())
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                sources
                    .iter()
                    .map(|src| src.map(|i| row[i]).unwrap_or(0.0))
                    .collect()
            })
            .collect();

        FeatureMatrix::new(schema.columns().to_vec(), rows)
    }
}

pub fn indicator_column(variable: &str, category: Option<&str>) -> String {
    format!("{}_{}", variable, category.unwrap_or(UNKNOWN_CATEGORY))
}

pub fn one_hot_encode(vectors: &[&FeatureVector]) -> FeatureMatrix {
    let mut categories: [BTreeSet<&str>; 4] = Default::default();
    for &vector in vectors {
        for (seen, value) in categories.iter_mut().zip(vector.categorical()) {
            if let Some(value) = value {
                seen.insert(value);
            }
        }
    }

    let mut columns: Vec<String> = NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut offsets = [0usize; 4];
    let mut lookups: Vec<HashMap<&str, usize>> = Vec::with_capacity(4);
    for (i, (variable, seen)) in CATEGORICAL_COLUMNS.iter().zip(&categories).enumerate() {
        offsets[i] = columns.len();
        let mut lookup = HashMap::new();
        for (j, value) in seen.iter().enumerate() {
            lookup.insert(*value, j);
            columns.push(indicator_column(variable, Some(value)));
        }
        columns.push(indicator_column(variable, None));
        lookups.push(lookup);
    }

    let width = columns.len();
    let rows = vectors
        .iter()
        .map(|&vector| {
            let mut row = vec![0.0; width];
            for (slot, value) in row.iter_mut().zip(vector.numeric()) {
                *slot = value.unwrap_or(f64::NAN);
            }
            for (i, value) in vector.categorical().into_iter().enumerate() {
                let hot = match value {
                    Some(v) => offsets[i] + lookups[i][v],
                    None => offsets[i] + lookups[i].len(),
                };
                row[hot] = 1.0;
            }
            row
        })
        .collect();

    FeatureMatrix::new(columns, rows)
}

pub fn encode_for_training(vectors: &[&FeatureVector]) -> (FeatureMatrix, ModelSchema) {
    let matrix = one_hot_encode(vectors);
    let schema = matrix.schema();
    (matrix, schema)
}

pub fn encode_for_inference(vectors: &[&FeatureVector], schema: &ModelSchema) -> FeatureMatrix {
    one_hot_encode(vectors).align_to(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(team: &str, formation: Option<&str>) -> FeatureVector {
        FeatureVector {
            down: Some(2.0),
            yards_to_go: Some(7.0),
            quarter: Some(3.0),
            play_action: Some(1.0),
            possession_team: Some(team.to_string()),
            defensive_team: Some("DEF".to_string()),
            offense_formation: formation.map(str::to_string),
            receiver_alignment: Some("3x1".to_string()),
            carrier_avg_yards: Some(4.2),
            offense_area: Some(30.0),
            defenders_in_box: Some(6.0),
        }
    }

    #[test]
    fn columns_are_numeric_then_sorted_categories_with_unknown() {
        let a = vector("KC", Some("SHOTGUN"));
        let b = vector("BUF", Some("I_FORM"));
        let (matrix, schema) = encode_for_training(&[&a, &b]);

        let expected: Vec<String> = [
            "down",
            "yardsToGo",
            "quarter",
            "playAction",
            "carrier_avg_yards",
            "offense_area",
            "defenders_in_box",
            "possessionTeam_BUF",
            "possessionTeam_KC",
            "possessionTeam_nan",
            "defensiveTeam_DEF",
            "defensiveTeam_nan",
            "offenseFormation_I_FORM",
            "offenseFormation_SHOTGUN",
            "offenseFormation_nan",
            "receiverAlignment_3x1",
            "receiverAlignment_nan",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        assert_eq!(schema.columns(), expected.as_slice());
        assert_eq!(matrix.value(0, "possessionTeam_KC"), Some(1.0));
        assert_eq!(matrix.value(0, "possessionTeam_BUF"), Some(0.0));
        assert_eq!(matrix.value(1, "offenseFormation_I_FORM"), Some(1.0));
        assert_eq!(matrix.value(1, "defenders_in_box"), Some(6.0));
    }

    #[test]
    fn missing_category_hits_unknown_indicator() {
        let a = vector("KC", None);
        let matrix = one_hot_encode(&[&a]);
        assert_eq!(matrix.value(0, "offenseFormation_nan"), Some(1.0));
        assert!(matrix.column_index("offenseFormation_SHOTGUN").is_none());
    }

    #[test]
    fn inference_zero_fills_absent_and_drops_unseen() {
        let train = [vector("KC", Some("SHOTGUN")), vector("BUF", Some("I_FORM"))];
        let (_, schema) = encode_for_training(&train.iter().collect::<Vec<_>>());

        let unseen = vector("KC", Some("WILDCAT"));
        let matrix = encode_for_inference(&[&unseen], &schema);

        assert_eq!(matrix.columns(), schema.columns());
        assert_eq!(matrix.value(0, "possessionTeam_BUF"), Some(0.0));
        assert_eq!(matrix.value(0, "possessionTeam_KC"), Some(1.0));
        assert_eq!(matrix.value(0, "offenseFormation_SHOTGUN"), Some(0.0));
        assert_eq!(matrix.value(0, "offenseFormation_I_FORM"), Some(0.0));
        assert_eq!(matrix.value(0, "offenseFormation_nan"), Some(0.0));
        assert!(matrix.column_index("offenseFormation_WILDCAT").is_none());
    }

    #[test]
    fn alignment_is_idempotent() {
        let train = [vector("KC", Some("SHOTGUN")), vector("BUF", None)];
        let (_, schema) = encode_for_training(&train.iter().collect::<Vec<_>>());

        let batch = [vector("NYJ", Some("PISTOL")), vector("KC", Some("SHOTGUN"))];
        let once = encode_for_inference(&batch.iter().collect::<Vec<_>>(), &schema);
        let twice = once.align_to(&schema);
        assert_eq!(once, twice);
    }

    #[test]
    fn schema_round_trips_as_plain_list() {
        let schema = ModelSchema::new(vec!["down".to_string(), "possessionTeam_KC".to_string()]);
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#"["down","possessionTeam_KC"]"#);
        let back: ModelSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
