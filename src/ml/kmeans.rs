//! K-means clustering
//!
//! Centroid-based partitioning with seeded initialization and multiple
//! restarts. The seed makes repeated runs on identical input produce
//! identical labels, which the rest of the pipeline relies on.

use rand::prelude::*;

use crate::error::{Result, TrafsiftError};

/// K-means parameters
#[derive(Debug, Clone)]
pub struct KMeans {
    /// Number of clusters
    pub k: usize,
    /// Iteration cap per restart
    pub max_iter: usize,
    /// Convergence tolerance on centroid movement
    pub tolerance: f64,
    /// Restarts; the run with the lowest inertia wins
    pub n_init: usize,
    /// Seed for centroid initialization
    pub seed: u64,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            max_iter: 300,
            tolerance: 1e-4,
            n_init: 10,
            seed,
        }
    }

    /// Partition `data` into `k` clusters, returning one label per row.
    ///
    /// Callers must validate the input first (row count >= k, finite values);
    /// this function only reports non-convergence.
    pub fn fit(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut best: Option<(f64, Vec<usize>)> = None;

        for _ in 0..self.n_init {
            if let Some((inertia, labels)) = self.run_once(data, &mut rng) {
                let better = match &best {
                    Some((best_inertia, _)) => inertia < *best_inertia,
                    None => true,
                };
                if better {
                    best = Some((inertia, labels));
                }
            }
        }

        match best {
            Some((_, labels)) => Ok(labels),
            None => Err(TrafsiftError::ComputationFailure(format!(
                "k-means did not converge within {} iterations",
                self.max_iter
            ))),
        }
    }

    /// One restart; returns (inertia, labels) on convergence
    fn run_once(&self, data: &[Vec<f64>], rng: &mut StdRng) -> Option<(f64, Vec<usize>)> {
        let n = data.len();
        let indices = rand::seq::index::sample(rng, n, self.k);
        let mut centroids: Vec<Vec<f64>> =
            indices.iter().map(|i| data[i].clone()).collect();

        let mut labels = vec![0usize; n];

        for _ in 0..self.max_iter {
            // Assignment step
            for (i, row) in data.iter().enumerate() {
                labels[i] = nearest_centroid(row, &centroids);
            }

            // Update step
            let mut new_centroids = vec![vec![0.0; data[0].len()]; self.k];
            let mut counts = vec![0usize; self.k];
            for (row, &label) in data.iter().zip(&labels) {
                counts[label] += 1;
                for (acc, &val) in new_centroids[label].iter_mut().zip(row) {
                    *acc += val;
                }
            }
            for (centroid, &count) in new_centroids.iter_mut().zip(&counts) {
                if count > 0 {
                    for val in centroid.iter_mut() {
                        *val /= count as f64;
                    }
                }
            }

            // Reseat empty clusters on the point farthest from its centroid
            for cluster in 0..self.k {
                if counts[cluster] == 0 {
                    let farthest = (0..n)
                        .max_by(|&i, &j| {
                            let da = distance_sq(&data[i], &centroids[labels[i]]);
                            let db = distance_sq(&data[j], &centroids[labels[j]]);
                            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                        })
                        .unwrap_or(0);
                    new_centroids[cluster] = data[farthest].clone();
                }
            }

            let shift = centroids
                .iter()
                .zip(&new_centroids)
                .map(|(old, new)| distance_sq(old, new).sqrt())
                .fold(0.0f64, f64::max);

            centroids = new_centroids;

            if shift <= self.tolerance {
                for (i, row) in data.iter().enumerate() {
                    labels[i] = nearest_centroid(row, &centroids);
                }
                let inertia = data
                    .iter()
                    .zip(&labels)
                    .map(|(row, &label)| distance_sq(row, &centroids[label]))
                    .sum();
                return Some((inertia, labels));
            }
        }

        None
    }
}

fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = distance_sq(row, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

fn distance_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, -0.1],
            vec![-0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 9.9],
            vec![9.9, 10.1],
        ]
    }

    #[test]
    fn test_separates_obvious_blobs() {
        let labels = KMeans::new(2, 42).fit(&two_blobs()).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_deterministic_given_seed() {
        let data = two_blobs();
        let a = KMeans::new(2, 42).fit(&data).unwrap();
        let b = KMeans::new(2, 42).fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_equals_n() {
        let data = vec![vec![0.0], vec![1.0], vec![2.0]];
        let labels = KMeans::new(3, 42).fit(&data).unwrap();

        let mut sorted = labels.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
    }
}
