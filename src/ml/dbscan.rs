//! DBSCAN clustering
//!
//! Density-based alternative to k-means for sources that do not form
//! spherical groups. Noise points are collected into a single bucket so
//! every source still receives a cluster assignment.

use crate::error::Result;

/// Label assigned to noise points before bucketing
const NOISE: usize = usize::MAX;

/// DBSCAN parameters
#[derive(Debug, Clone)]
pub struct Dbscan {
    /// Neighborhood radius in scaled feature space
    pub eps: f64,
    /// Minimum neighborhood size (including the point itself) for a core point
    pub min_samples: usize,
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    /// Cluster `data`, returning one label per row. Noise points share one
    /// trailing label so downstream danger scoring sees them as a group,
    /// mirroring how sklearn's -1 label was remapped in the original system.
    pub fn fit(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        let n = data.len();
        let mut labels = vec![NOISE; n];
        let mut visited = vec![false; n];
        let mut next_cluster = 0usize;

        for point in 0..n {
            if visited[point] {
                continue;
            }
            visited[point] = true;

            let neighbors = self.region_query(data, point);
            if neighbors.len() < self.min_samples {
                continue; // stays noise unless absorbed by a later cluster
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[point] = cluster;

            // Expand the cluster breadth-first
            let mut queue = neighbors;
            let mut head = 0;
            while head < queue.len() {
                let candidate = queue[head];
                head += 1;

                if !visited[candidate] {
                    visited[candidate] = true;
                    let candidate_neighbors = self.region_query(data, candidate);
                    if candidate_neighbors.len() >= self.min_samples {
                        queue.extend(candidate_neighbors);
                    }
                }

                if labels[candidate] == NOISE {
                    labels[candidate] = cluster;
                }
            }
        }

        // Bucket remaining noise into one trailing cluster
        if labels.iter().any(|&l| l == NOISE) {
            let noise_cluster = next_cluster;
            for label in &mut labels {
                if *label == NOISE {
                    *label = noise_cluster;
                }
            }
        }

        Ok(labels)
    }

    fn region_query(&self, data: &[Vec<f64>], point: usize) -> Vec<usize> {
        let eps_sq = self.eps * self.eps;
        (0..data.len())
            .filter(|&i| distance_sq(&data[point], &data[i]) <= eps_sq)
            .collect()
    }
}

fn distance_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
