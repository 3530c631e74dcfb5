//! Source-behavior clustering engine
//!
//! Groups traffic sources into behavioral clusters and flags the dangerous
//! ones. The feature vector per source is
//! `[packets_per_second, packet_count, average_packet_size, unique_ports]`,
//! z-score scaled before clustering so no single metric dominates the
//! distance computation.
//!
//! # Example
//! ```ignore
//! use trafsift::config::ClusteringConfig;
//! use trafsift::ml::{extract, ClusterMethod, SourceClusterer};
//!
//! let metrics = extract(&packets);
//! let clusterer = SourceClusterer::new(ClusteringConfig::default());
//! let assignments = clusterer.cluster(&metrics, ClusterMethod::KMeans, 3)?;
//! for a in &assignments {
//!     if a.is_dangerous {
//!         println!("{} -> {} ({:.1})", a.source_ip, a.cluster_name, a.danger_score);
//!     }
//! }
//! ```

pub mod danger;
pub mod dbscan;
pub mod features;
pub mod kmeans;
pub mod scaler;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ClusteringConfig;
use crate::error::{Result, TrafsiftError};

pub use danger::{assign_clusters, ClusterAssignment};
pub use dbscan::Dbscan;
pub use features::{extract, SourceMetrics, MIN_DURATION_SECONDS};
pub use kmeans::KMeans;
pub use scaler::StandardScaler;

/// Width of the per-source feature vector
pub const NUM_FEATURES: usize = 4;

/// Clustering backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMethod {
    KMeans,
    Dbscan,
}

impl FromStr for ClusterMethod {
    type Err = TrafsiftError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kmeans" => Ok(ClusterMethod::KMeans),
            "dbscan" => Ok(ClusterMethod::Dbscan),
            other => Err(TrafsiftError::Config(format!(
                "unknown clustering method: {other}"
            ))),
        }
    }
}

impl fmt::Display for ClusterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterMethod::KMeans => write!(f, "kmeans"),
            ClusterMethod::Dbscan => write!(f, "dbscan"),
        }
    }
}

/// Clusters source metrics and labels the resulting groups
pub struct SourceClusterer {
    config: ClusteringConfig,
}

impl SourceClusterer {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Cluster `metrics` into `k` groups with the given method.
    ///
    /// Fails with `InsufficientData` when there are fewer clusterable
    /// sources than requested clusters rather than silently reducing `k`,
    /// and with `ComputationFailure` on degenerate input.
    pub fn cluster(
        &self,
        metrics: &[SourceMetrics],
        method: ClusterMethod,
        k: usize,
    ) -> Result<Vec<ClusterAssignment>> {
        if metrics.len() < 2 {
            return Err(TrafsiftError::InsufficientData(format!(
                "clustering needs at least 2 sources, got {}",
                metrics.len()
            )));
        }
        if method == ClusterMethod::KMeans && metrics.len() < k {
            return Err(TrafsiftError::InsufficientData(format!(
                "{} clusters requested but only {} clusterable sources",
                k,
                metrics.len()
            )));
        }
        if k == 0 {
            return Err(TrafsiftError::Config(
                "cluster count must be at least 1".to_string(),
            ));
        }

        let matrix = feature_matrix(metrics)?;
        let scaled = StandardScaler::fit_transform(&matrix);

        debug!(
            sources = metrics.len(),
            %method,
            k,
            "running source clustering"
        );

        let labels = match method {
            ClusterMethod::KMeans => {
                let mut model = KMeans::new(k, self.config.seed);
                model.max_iter = self.config.max_iter;
                model.n_init = self.config.n_init;
                model.tolerance = self.config.tolerance;
                model.fit(&scaled)?
            }
            ClusterMethod::Dbscan => {
                Dbscan::new(self.config.dbscan_eps, self.config.dbscan_min_samples)
                    .fit(&scaled)?
            }
        };

        let assignments = assign_clusters(metrics, &labels, self.config.danger_threshold);

        let dangerous = assignments.iter().filter(|a| a.is_dangerous).count();
        info!(
            sources = assignments.len(),
            clusters = assignments
                .iter()
                .map(|a| a.cluster_id)
                .collect::<std::collections::HashSet<_>>()
                .len(),
            dangerous,
            "clustering complete"
        );

        Ok(assignments)
    }
}

/// Build the raw feature matrix, rejecting non-finite and degenerate input
fn feature_matrix(metrics: &[SourceMetrics]) -> Result<Vec<Vec<f64>>> {
    let matrix: Vec<Vec<f64>> = metrics
        .iter()
        .map(|m| {
            vec![
                m.packets_per_second,
                m.packet_count as f64,
                m.average_packet_size,
                m.unique_ports as f64,
            ]
        })
        .collect();

    for (row, metric) in matrix.iter().zip(metrics) {
        if row.iter().any(|v| !v.is_finite()) {
            return Err(TrafsiftError::ComputationFailure(format!(
                "non-finite feature value for source {}",
                metric.source_ip
            )));
        }
    }

    if matrix.iter().all(|row| *row == matrix[0]) {
        return Err(TrafsiftError::ComputationFailure(
            "degenerate feature matrix: all sources have identical metrics".to_string(),
        ));
    }

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_metrics(source: &str, pps: f64, count: u64, avg: f64, ports: u32) -> SourceMetrics {
        SourceMetrics {
            source_ip: source.to_string(),
            packet_count: count,
            packets_per_second: pps,
            average_packet_size: avg,
            total_bytes: (avg * count as f64) as i64,
            duration_seconds: count as f64 / pps.max(0.001),
            unique_ports: ports,
            protocols: vec!["TCP".to_string()],
        }
    }

    fn sample_metrics() -> Vec<SourceMetrics> {
        vec![
            make_metrics("45.142.120.15", 850.0, 8500, 1400.0, 70),
            make_metrics("45.142.120.16", 900.0, 9000, 1350.0, 65),
            make_metrics("192.168.1.5", 2.0, 40, 400.0, 3),
            make_metrics("192.168.1.6", 3.0, 60, 420.0, 2),
            make_metrics("10.0.0.9", 120.0, 1200, 900.0, 15),
            make_metrics("10.0.0.10", 110.0, 1100, 880.0, 12),
        ]
    }

    #[test]
    fn test_kmeans_clustering_deterministic() {
        let metrics = sample_metrics();
        let clusterer = SourceClusterer::new(ClusteringConfig::default());

        let a = clusterer.cluster(&metrics, ClusterMethod::KMeans, 3).unwrap();
        let b = clusterer.cluster(&metrics, ClusterMethod::KMeans, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_similar_sources_share_cluster() {
        let metrics = sample_metrics();
        let clusterer = SourceClusterer::new(ClusteringConfig::default());
        let assignments = clusterer.cluster(&metrics, ClusterMethod::KMeans, 3).unwrap();

        assert_eq!(assignments[0].cluster_id, assignments[1].cluster_id);
        assert_eq!(assignments[2].cluster_id, assignments[3].cluster_id);
        assert_ne!(assignments[0].cluster_id, assignments[2].cluster_id);
    }

    #[test]
    fn test_insufficient_sources_for_k() {
        let metrics = vec![
            make_metrics("1.1.1.1", 10.0, 100, 500.0, 5),
            make_metrics("2.2.2.2", 20.0, 200, 600.0, 8),
        ];
        let clusterer = SourceClusterer::new(ClusteringConfig::default());

        let err = clusterer
            .cluster(&metrics, ClusterMethod::KMeans, 3)
            .unwrap_err();
        assert!(matches!(err, TrafsiftError::InsufficientData(_)));
    }

    #[test]
    fn test_fewer_than_two_sources() {
        let metrics = vec![make_metrics("1.1.1.1", 10.0, 100, 500.0, 5)];
        let clusterer = SourceClusterer::new(ClusteringConfig::default());

        let err = clusterer
            .cluster(&metrics, ClusterMethod::KMeans, 1)
            .unwrap_err();
        assert!(matches!(err, TrafsiftError::InsufficientData(_)));
    }

    #[test]
    fn test_degenerate_identical_metrics() {
        let metrics = vec![
            make_metrics("1.1.1.1", 10.0, 100, 500.0, 5),
            make_metrics("2.2.2.2", 10.0, 100, 500.0, 5),
            make_metrics("3.3.3.3", 10.0, 100, 500.0, 5),
        ];
        let clusterer = SourceClusterer::new(ClusteringConfig::default());

        let err = clusterer
            .cluster(&metrics, ClusterMethod::KMeans, 2)
            .unwrap_err();
        assert!(matches!(err, TrafsiftError::ComputationFailure(_)));
    }

    #[test]
    fn test_dbscan_method() {
        let metrics = sample_metrics();
        let clusterer = SourceClusterer::new(ClusteringConfig::default());
        let assignments = clusterer
            .cluster(&metrics, ClusterMethod::Dbscan, 3)
            .unwrap();

        assert_eq!(assignments.len(), metrics.len());
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("kmeans".parse::<ClusterMethod>().unwrap(), ClusterMethod::KMeans);
        assert_eq!("dbscan".parse::<ClusterMethod>().unwrap(), ClusterMethod::Dbscan);
        assert!("ward".parse::<ClusterMethod>().is_err());
    }
}
