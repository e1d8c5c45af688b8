use serde::{Deserialize, Serialize};

/// Upper-inclusive bin edges for one feature. A value `v` falls in bin `i` when
/// `v <= thresholds[i]` and `v > thresholds[i - 1]`; values above every edge, and
/// NaN, fall in the last bin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureBins {
    thresholds: Vec<f64>,
}

impl FeatureBins {
    pub fn fit(values: impl Iterator<Item = f64>, max_bins: usize) -> Self {
        let mut distinct: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();

        if distinct.len() < 2 {
            return Self::default();
        }

        let max_bins = max_bins.max(2);
        let thresholds = if distinct.len() <= max_bins {
            distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
        } else {
            let mut edges: Vec<f64> = (1..max_bins)
                .map(|k| distinct[k * distinct.len() / max_bins - 1])
                .collect();
            edges.dedup();
            edges
        };

        Self { thresholds }
    }

    pub fn n_bins(&self) -> usize {
        self.thresholds.len() + 1
    }

    pub fn bin(&self, value: f64) -> usize {
        if value.is_nan() {
            return self.thresholds.len();
        }
        self.thresholds.partition_point(|t| *t < value)
    }

    pub fn threshold(&self, bin: usize) -> f64 {
        self.thresholds[bin]
    }
}

#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    pub bins: Vec<FeatureBins>,
    pub columns: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    pub fn build(rows: &[Vec<f64>], n_features: usize, max_bins: usize) -> Self {
        let max_bins = max_bins.min(u16::MAX as usize);
        let bins: Vec<FeatureBins> = (0..n_features)
            .map(|f| FeatureBins::fit(rows.iter().map(|r| r[f]), max_bins))
            .collect();
        let columns = bins
            .iter()
            .enumerate()
            .map(|(f, b)| rows.iter().map(|r| b.bin(r[f]) as u16).collect())
            .collect();
        Self { bins, columns }
    }

    pub fn n_features(&self) -> usize {
        self.bins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn few_distinct_values_split_at_midpoints() {
        let bins = FeatureBins::fit([1.0, 3.0, 3.0, 5.0].into_iter(), 255);
        assert_eq!(bins.n_bins(), 3);
        assert_eq!(bins.threshold(0), 2.0);
        assert_eq!(bins.bin(1.0), 0);
        assert_eq!(bins.bin(2.0), 0);
        assert_eq!(bins.bin(3.0), 1);
        assert_eq!(bins.bin(9.0), 2);
        assert_eq!(bins.bin(f64::NAN), 2);
    }

    #[test]
    fn constant_feature_has_one_bin() {
        let bins = FeatureBins::fit([7.0, 7.0].into_iter(), 255);
        assert_eq!(bins.n_bins(), 1);
        assert_eq!(bins.bin(7.0), 0);
    }

    #[test]
    fn many_values_are_capped() {
        let bins = FeatureBins::fit((0..1000).map(|v| v as f64), 16);
        assert!(bins.n_bins() <= 16);
        // bin order follows value order
        assert!(bins.bin(10.0) <= bins.bin(500.0));
        assert!(bins.bin(500.0) <= bins.bin(999.0));
    }
}
