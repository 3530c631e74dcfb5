//! Feature scaling
//!
//! Batch z-score standardization fitted over the feature matrix. The raw
//! metrics sit on very different numeric scales (bytes vs. packets per
//! second); without scaling the largest-magnitude column dominates the
//! distance metric.

use serde::{Deserialize, Serialize};

/// Z-score scaler fitted per column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Column means
    means: Vec<f64>,
    /// Column standard deviations (population)
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit the scaler over a feature matrix. Rows must share one width.
    pub fn fit(data: &[Vec<f64>]) -> Self {
        let n_features = data.first().map(|r| r.len()).unwrap_or(0);
        let n_samples = data.len().max(1) as f64;

        let mut means = vec![0.0; n_features];
        for row in data {
            for (i, &val) in row.iter().enumerate() {
                means[i] += val;
            }
        }
        for mean in &mut means {
            *mean /= n_samples;
        }

        let mut stds = vec![0.0; n_features];
        for row in data {
            for (i, &val) in row.iter().enumerate() {
                let d = val - means[i];
                stds[i] += d * d;
            }
        }
        for std in &mut stds {
            *std = (*std / n_samples).sqrt();
        }

        Self { means, stds }
    }

    /// Scale one row. Zero-variance columns map to 0.0.
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(i, &val)| {
                if self.stds[i] < f64::EPSILON {
                    0.0
                } else {
                    (val - self.means[i]) / self.stds[i]
                }
            })
            .collect()
    }

    /// Fit and transform in one pass
    pub fn fit_transform(data: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let scaler = Self::fit(data);
        data.iter().map(|row| scaler.transform_row(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zscore_scaling() {
        let data = vec![vec![1.0, 100.0], vec![3.0, 200.0], vec![5.0, 300.0]];
        let scaled = StandardScaler::fit_transform(&data);

        // Each column is centered
        for col in 0..2 {
            let sum: f64 = scaled.iter().map(|r| r[col]).sum();
            assert!(sum.abs() < 1e-9);
        }

        // Symmetric spacing around the mean
        assert!((scaled[0][0] + scaled[2][0]).abs() < 1e-9);
        assert!(scaled[1][0].abs() < 1e-9);
    }

    #[test]
    fn test_zero_variance_column_maps_to_zero() {
        let data = vec![vec![7.0, 1.0], vec![7.0, 2.0], vec![7.0, 3.0]];
        let scaled = StandardScaler::fit_transform(&data);

        for row in &scaled {
            assert_eq!(row[0], 0.0);
        }
        assert!(scaled[0][1] < scaled[2][1]);
    }
}
