//! Feature extraction from packet streams
//!
//! Aggregates raw packets into one behavioral metrics record per source
//! address. These records feed both the clusterer and the danger scorer.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::packet::PacketRecord;

/// Duration floor for near-simultaneous packets. Prevents divide-by-zero
/// and keeps the rate estimate finite.
pub const MIN_DURATION_SECONDS: f64 = 0.001;

/// Aggregated behavioral metrics for one traffic source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetrics {
    /// Originating address
    pub source_ip: String,
    /// Packets observed from this source
    pub packet_count: u64,
    /// packet_count / duration_seconds
    pub packets_per_second: f64,
    /// Mean frame length in bytes
    pub average_packet_size: f64,
    /// Sum of frame lengths in bytes
    pub total_bytes: i64,
    /// Observation window, floored at [`MIN_DURATION_SECONDS`]
    pub duration_seconds: f64,
    /// Count of distinct destination ports
    pub unique_ports: u32,
    /// Distinct protocol labels, sorted
    pub protocols: Vec<String>,
}

/// Groups packets by source and computes per-source metrics.
///
/// Sources with fewer than 2 packets are dropped: a single observation
/// carries no rate information and the duration floor would turn it into a
/// meaningless spike. Output is sorted by source address.
pub fn extract(packets: &[PacketRecord]) -> Vec<SourceMetrics> {
    let mut groups: BTreeMap<&str, Vec<&PacketRecord>> = BTreeMap::new();
    for packet in packets {
        groups
            .entry(packet.source_ip.as_str())
            .or_default()
            .push(packet);
    }

    let mut metrics = Vec::new();

    for (source_ip, group) in groups {
        if group.len() < 2 {
            debug!(
                source = source_ip,
                "dropping single-packet source, insufficient data for rate estimation"
            );
            continue;
        }

        let first_time = group.iter().map(|p| p.time).fold(f64::INFINITY, f64::min);
        let last_time = group
            .iter()
            .map(|p| p.time)
            .fold(f64::NEG_INFINITY, f64::max);
        let duration = (last_time - first_time).max(MIN_DURATION_SECONDS);

        let count = group.len() as u64;
        let total_bytes: i64 = group.iter().map(|p| p.length).sum();

        let ports: HashSet<u16> = group.iter().map(|p| p.port).collect();
        let mut protocols: Vec<String> = group
            .iter()
            .map(|p| p.protocol.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        protocols.sort();

        metrics.push(SourceMetrics {
            source_ip: source_ip.to_string(),
            packet_count: count,
            packets_per_second: count as f64 / duration,
            average_packet_size: total_bytes as f64 / count as f64,
            total_bytes,
            duration_seconds: duration,
            unique_ports: ports.len() as u32,
            protocols,
        });
    }

    metrics
}
