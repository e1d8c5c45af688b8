use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::binning::BinnedMatrix;

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// `value <= threshold` goes left; NaN goes right.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn leaf(value: f64) -> Self {
        Self {
            nodes: vec![Node::Leaf { value }],
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    #[cfg(test)]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

struct Split {
    feature: usize,
    bin: usize,
    gain: f64,
}

pub struct TreeBuilder<'a> {
    matrix: &'a BinnedMatrix,
    gradients: &'a [f64],
    max_depth: usize,
    min_samples_leaf: usize,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        matrix: &'a BinnedMatrix,
        gradients: &'a [f64],
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Self {
        Self {
            matrix,
            gradients,
            max_depth,
            min_samples_leaf: min_samples_leaf.max(1),
        }
    }

    pub fn build(&self, rows: Vec<usize>, leaf_value: &dyn Fn(&[usize]) -> f64) -> RegressionTree {
        let mut nodes = Vec::new();
        self.grow(rows, 0, &mut nodes, leaf_value);
        RegressionTree { nodes }
    }

    fn grow(
        &self,
        rows: Vec<usize>,
        depth: usize,
        nodes: &mut Vec<Node>,
        leaf_value: &dyn Fn(&[usize]) -> f64,
    ) -> usize {
        let idx = nodes.len();
        nodes.push(Node::Leaf { value: 0.0 });

        let split = if depth < self.max_depth {
            self.best_split(&rows)
        } else {
            None
        };

        let Some(split) = split else {
            nodes[idx] = Node::Leaf {
                value: leaf_value(&rows),
            };
            return idx;
        };

        let column = &self.matrix.columns[split.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| column[r] as usize <= split.bin);

        let left = self.grow(left_rows, depth + 1, nodes, leaf_value);
        let right = self.grow(right_rows, depth + 1, nodes, leaf_value);
        nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: self.matrix.bins[split.feature].threshold(split.bin),
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize]) -> Option<Split> {
        let n = rows.len();
        if n < 2 * self.min_samples_leaf {
            return None;
        }

        let total: f64 = rows.iter().map(|&r| self.gradients[r]).sum();
        let parent_score = total * total / n as f64;

        (0..self.matrix.n_features())
            .into_par_iter()
            .filter_map(|feature| self.best_split_on(feature, rows, total, parent_score))
            .max_by(|a, b| a.gain.total_cmp(&b.gain).then(b.feature.cmp(&a.feature)))
    }

    fn best_split_on(&self, feature: usize, rows: &[usize], total: f64, parent_score: f64) -> Option<Split> {
        let n_bins = self.matrix.bins[feature].n_bins();
        if n_bins < 2 {
            return None;
        }

        let column = &self.matrix.columns[feature];
        let mut sums = vec![0.0; n_bins];
        let mut counts = vec![0usize; n_bins];
        for &r in rows {
            let bin = column[r] as usize;
            sums[bin] += self.gradients[r];
            counts[bin] += 1;
        }

        let n = rows.len();
        let mut best: Option<Split> = None;
        let mut left_sum = 0.0;
        let mut left_n = 0usize;
        for bin in 0..n_bins - 1 {
            left_sum += sums[bin];
            left_n += counts[bin];
            if left_n < self.min_samples_leaf {
                continue;
            }
            let right_n = n - left_n;
            if right_n < self.min_samples_leaf {
                break;
            }
            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64
                - parent_score;
            if gain > best.as_ref().map_or(MIN_GAIN, |s| s.gain) {
                best = Some(Split { feature, bin, gain });
            }
        }
        best
    }
}
