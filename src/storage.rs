//! Storage collaborator boundary
//!
//! The pipeline reads packets from and writes analysis results to a store
//! behind the [`PacketStore`] trait. Real persistence lives outside this
//! crate; [`MemoryStore`] backs the CLI and the tests.
//!
//! The one atomicity contract the store must honor: replacing a session's
//! clustered-source rows deletes the old rows and inserts the new ones as a
//! unit, so readers never observe a mix of old and new assignments.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::packet::PacketRecord;
use crate::ml::danger::ClusterAssignment;
use crate::ml::features::SourceMetrics;
use crate::scoring::ThreatAssessment;

/// A packet at rest, with its storage identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPacket {
    pub id: i64,
    pub session_id: i64,
    pub record: PacketRecord,
}

/// One clustered source row: the metrics plus the cluster verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteredSource {
    pub metrics: SourceMetrics,
    pub assignment: ClusterAssignment,
    pub calculated_at: DateTime<Utc>,
}

/// A capture session grouping imported packets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub started_at: DateTime<Utc>,
}

/// Storage collaborator contract
pub trait PacketStore {
    /// Create a session and return its ID
    fn create_session(&mut self, name: &str, description: &str) -> i64;

    /// Look up a session
    fn session(&self, session_id: i64) -> Option<Session>;

    /// Insert packets for a session, returning their IDs
    fn insert_packets(&mut self, session_id: i64, records: &[PacketRecord]) -> Vec<i64>;

    /// All packets for a session, in insertion order
    fn packets_for_session(&self, session_id: i64) -> Vec<StoredPacket>;

    /// Look up a single packet
    fn packet(&self, packet_id: i64) -> Option<StoredPacket>;

    /// Atomically replace the session's clustered-source rows
    fn replace_session_analysis(&mut self, session_id: i64, rows: Vec<ClusteredSource>);

    /// Current clustered-source rows for a session
    fn session_analysis(&self, session_id: i64) -> Vec<ClusteredSource>;

    /// Insert or overwrite the assessment for a packet
    fn upsert_assessment(&mut self, assessment: ThreatAssessment);

    /// Current assessment for a packet, if any
    fn assessment(&self, packet_id: i64) -> Option<ThreatAssessment>;
}

/// In-memory store for the CLI and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: HashMap<i64, Session>,
    packets: Vec<StoredPacket>,
    analysis: HashMap<i64, Vec<ClusteredSource>>,
    assessments: HashMap<i64, ThreatAssessment>,
    next_session_id: i64,
    next_packet_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PacketStore for MemoryStore {
    fn create_session(&mut self, name: &str, description: &str) -> i64 {
        self.next_session_id += 1;
        let id = self.next_session_id;
        self.sessions.insert(
            id,
            Session {
                id,
                name: name.to_string(),
                description: description.to_string(),
                started_at: Utc::now(),
            },
        );
        id
    }

    fn session(&self, session_id: i64) -> Option<Session> {
        self.sessions.get(&session_id).cloned()
    }

    fn insert_packets(&mut self, session_id: i64, records: &[PacketRecord]) -> Vec<i64> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            self.next_packet_id += 1;
            ids.push(self.next_packet_id);
            self.packets.push(StoredPacket {
                id: self.next_packet_id,
                session_id,
                record: record.clone(),
            });
        }
        ids
    }

    fn packets_for_session(&self, session_id: i64) -> Vec<StoredPacket> {
        self.packets
            .iter()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect()
    }

    fn packet(&self, packet_id: i64) -> Option<StoredPacket> {
        self.packets.iter().find(|p| p.id == packet_id).cloned()
    }

    fn replace_session_analysis(&mut self, session_id: i64, rows: Vec<ClusteredSource>) {
        self.analysis.insert(session_id, rows);
    }

    fn session_analysis(&self, session_id: i64) -> Vec<ClusteredSource> {
        self.analysis.get(&session_id).cloned().unwrap_or_default()
    }

    fn upsert_assessment(&mut self, assessment: ThreatAssessment) {
        self.assessments.insert(assessment.packet_id, assessment);
    }

    fn assessment(&self, packet_id: i64) -> Option<ThreatAssessment> {
        self.assessments.get(&packet_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::danger::ClusterAssignment;

    fn make_packet(source: &str, time: f64) -> PacketRecord {
        PacketRecord {
            no: 0,
            time,
            source_ip: source.to_string(),
            dest_ip: "10.0.0.1".to_string(),
            protocol: "TCP".to_string(),
            length: 100,
            port: 80,
            info: String::new(),
        }
    }

    fn make_row(source: &str, cluster_id: u32) -> ClusteredSource {
        ClusteredSource {
            metrics: SourceMetrics {
                source_ip: source.to_string(),
                packet_count: 2,
                packets_per_second: 1.0,
                average_packet_size: 100.0,
                total_bytes: 200,
                duration_seconds: 2.0,
                unique_ports: 1,
                protocols: vec!["TCP".to_string()],
            },
            assignment: ClusterAssignment {
                source_ip: source.to_string(),
                cluster_id,
                cluster_name: "Normal Traffic".to_string(),
                is_dangerous: false,
                danger_score: 10.0,
            },
            calculated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sessions_and_packets() {
        let mut store = MemoryStore::new();
        let session = store.create_session("test", "");
        let other = store.create_session("other", "");

        let ids = store.insert_packets(session, &[make_packet("1.1.1.1", 0.0)]);
        store.insert_packets(other, &[make_packet("2.2.2.2", 0.0)]);

        assert_eq!(store.packets_for_session(session).len(), 1);
        assert_eq!(store.packet(ids[0]).unwrap().record.source_ip, "1.1.1.1");
        assert!(store.packet(999).is_none());
        assert!(store.session(999).is_none());
    }

    #[test]
    fn test_replace_semantics() {
        let mut store = MemoryStore::new();
        let session = store.create_session("test", "");

        store.replace_session_analysis(
            session,
            vec![make_row("1.1.1.1", 1), make_row("2.2.2.2", 2)],
        );
        store.replace_session_analysis(session, vec![make_row("3.3.3.3", 1)]);

        let rows = store.session_analysis(session);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].assignment.source_ip, "3.3.3.3");
    }

    #[test]
    fn test_assessment_upsert() {
        let mut store = MemoryStore::new();
        let a = crate::scoring::ThreatAssessment::classify(1, 0.9, None);
        store.upsert_assessment(a);
        let b = crate::scoring::ThreatAssessment::classify(1, 0.2, None);
        store.upsert_assessment(b.clone());

        assert_eq!(store.assessment(1).unwrap().ml_score, 0.2);
        assert!(store.assessment(2).is_none());
    }
}
