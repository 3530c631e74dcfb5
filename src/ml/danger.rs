//! Cluster danger scoring and naming
//!
//! Once sources are partitioned, each cluster is scored 0-100 from its
//! members' behavioral signals and given a deterministic descriptive name.
//! Cluster IDs are canonicalized by descending danger score so repeated runs
//! on identical input bind the same ID to the same label.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::features::SourceMetrics;

/// Weight of the peak packet rate within a cluster
const RATE_WEIGHT: f64 = 0.5;
/// Weight of the average port diversity
const PORT_WEIGHT: f64 = 0.3;
/// Weight of the cluster's share of all sources
const SHARE_WEIGHT: f64 = 0.2;

/// A source's cluster membership and the cluster's danger verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    /// Originating address
    pub source_ip: String,
    /// Canonical cluster ID, 1..n by descending danger score
    pub cluster_id: u32,
    /// Deterministic descriptive label
    pub cluster_name: String,
    /// Whether the cluster's danger score exceeds the threshold
    pub is_dangerous: bool,
    /// Cluster danger score, 0-100
    pub danger_score: f64,
}

/// Per-cluster aggregates used for scoring and canonical ordering
struct ClusterStats {
    members: Vec<usize>,
    min_source: String,
    score: f64,
    rate_term: f64,
    port_term: f64,
}

/// Score each cluster and produce one assignment per source, aligned with
/// the input order of `metrics`.
///
/// `labels[i]` is the raw cluster label of `metrics[i]`; `threshold` is the
/// 0-100 danger cutoff (scores strictly above it flag the cluster).
pub fn assign_clusters(
    metrics: &[SourceMetrics],
    labels: &[usize],
    threshold: f64,
) -> Vec<ClusterAssignment> {
    debug_assert_eq!(metrics.len(), labels.len());
    if metrics.is_empty() {
        return Vec::new();
    }

    let total_sources = metrics.len() as f64;
    let max_pps_overall = metrics
        .iter()
        .map(|m| m.packets_per_second)
        .fold(0.0f64, f64::max)
        .max(1.0);
    let max_ports_overall = metrics
        .iter()
        .map(|m| m.unique_ports as f64)
        .fold(0.0f64, f64::max)
        .max(1.0);

    // BTreeMap keeps raw-label iteration stable
    let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        clusters.entry(label).or_default().push(i);
    }

    let mut stats: Vec<ClusterStats> = clusters
        .into_values()
        .map(|members| {
            let max_pps = members
                .iter()
                .map(|&i| metrics[i].packets_per_second)
                .fold(0.0f64, f64::max);
            let avg_ports = members
                .iter()
                .map(|&i| metrics[i].unique_ports as f64)
                .sum::<f64>()
                / members.len() as f64;
            let min_source = members
                .iter()
                .map(|&i| metrics[i].source_ip.clone())
                .min()
                .unwrap_or_default();

            let rate_term = RATE_WEIGHT * max_pps / max_pps_overall;
            let port_term = PORT_WEIGHT * avg_ports / max_ports_overall;
            let share_term = SHARE_WEIGHT * members.len() as f64 / total_sources;
            let score = 100.0 * (rate_term + port_term + share_term);

            ClusterStats {
                members,
                min_source,
                score,
                rate_term,
                port_term,
            }
        })
        .collect();

    // Canonical order: descending danger, ties by lowest member address
    stats.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.min_source.cmp(&b.min_source))
    });

    let mut assignments: Vec<(usize, ClusterAssignment)> = Vec::with_capacity(metrics.len());
    for (rank, cluster) in stats.iter().enumerate() {
        let cluster_id = rank as u32 + 1;
        let is_dangerous = cluster.score > threshold;
        let name = cluster_name(cluster.score, cluster.rate_term, cluster.port_term);

        for &i in &cluster.members {
            assignments.push((
                i,
                ClusterAssignment {
                    source_ip: metrics[i].source_ip.clone(),
                    cluster_id,
                    cluster_name: name.clone(),
                    is_dangerous,
                    danger_score: cluster.score,
                },
            ));
        }
    }

    assignments.sort_by_key(|(i, _)| *i);
    assignments.into_iter().map(|(_, a)| a).collect()
}

/// Deterministic cluster label from danger tier and dominant trait
fn cluster_name(score: f64, rate_term: f64, port_term: f64) -> String {
    let trait_name = if port_term > rate_term {
        "Port Scanner"
    } else {
        "High-Volume Flooder"
    };

    if score > 80.0 {
        format!("Critical {trait_name}")
    } else if score > 60.0 {
        format!("High Risk {trait_name}")
    } else if score > 40.0 {
        "Medium Risk Traffic".to_string()
    } else {
        "Normal Traffic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_metrics(source: &str, pps: f64, ports: u32) -> SourceMetrics {
        SourceMetrics {
            source_ip: source.to_string(),
            packet_count: 10,
            packets_per_second: pps,
            average_packet_size: 500.0,
            total_bytes: 5000,
            duration_seconds: 10.0 / pps.max(0.001),
            unique_ports: ports,
            protocols: vec!["TCP".to_string()],
        }
    }

    #[test]
    fn test_scanner_cluster_flagged_dangerous() {
        let metrics = vec![
            make_metrics("45.142.120.15", 900.0, 60), // scanner-like
            make_metrics("192.168.1.5", 2.0, 2),
            make_metrics("192.168.1.6", 3.0, 1),
        ];
        let labels = vec![0, 1, 1];

        let assignments = assign_clusters(&metrics, &labels, 60.0);

        let scanner = &assignments[0];
        assert!(scanner.is_dangerous);
        assert!(scanner.danger_score > 60.0);
        // highest danger gets the canonical ID 1
        assert_eq!(scanner.cluster_id, 1);

        let benign = &assignments[1];
        assert!(!benign.is_dangerous);
        assert_eq!(benign.cluster_name, "Normal Traffic");
        assert_eq!(benign.cluster_id, 2);
    }

    #[test]
    fn test_canonical_ids_ignore_raw_label_permutation() {
        let metrics = vec![
            make_metrics("45.142.120.15", 900.0, 60),
            make_metrics("192.168.1.5", 2.0, 2),
            make_metrics("192.168.1.6", 3.0, 1),
        ];

        let a = assign_clusters(&metrics, &[0, 1, 1], 60.0);
        let b = assign_clusters(&metrics, &[1, 0, 0], 60.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_scores_bounded() {
        let metrics = vec![
            make_metrics("1.1.1.1", 5000.0, 200),
            make_metrics("2.2.2.2", 5000.0, 200),
        ];
        let assignments = assign_clusters(&metrics, &[0, 0], 60.0);

        for a in &assignments {
            assert!(a.danger_score >= 0.0 && a.danger_score <= 100.0);
        }
    }

    #[test]
    fn test_naming_picks_dominant_trait() {
        // Rate dominates: one source with extreme pps, few ports
        let metrics = vec![
            make_metrics("1.1.1.1", 5000.0, 1),
            make_metrics("2.2.2.2", 1.0, 1),
            make_metrics("3.3.3.3", 1.5, 1),
        ];
        let assignments = assign_clusters(&metrics, &[0, 1, 1], 60.0);
        assert!(assignments[0].cluster_name.contains("High-Volume Flooder"));
    }

    #[test]
    fn test_empty_input() {
        assert!(assign_clusters(&[], &[], 60.0).is_empty());
    }
}
