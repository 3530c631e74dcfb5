//! Packet threat scoring and classification
//!
//! Two scales coexist by contract: the rule-based heuristic scores a packet
//! 0-100, while model-style probability scores live in 0.0-1.0 and map onto
//! the four-level threat taxonomy. Threat level and maliciousness are always
//! derived from the score, never mutated independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::core::packet::{PacketRecord, STANDARD_MTU_BYTES, STANDARD_PROTOCOLS, SUSPICIOUS_PORTS};

/// Four-level threat taxonomy. String forms are exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Classify a probability-style score (0.0-1.0). Boundary values belong
    /// to the higher tier.
    pub fn from_ml_score(score: f64) -> Self {
        if score >= 0.8 {
            ThreatLevel::Critical
        } else if score >= 0.6 {
            ThreatLevel::High
        } else if score >= 0.4 {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }

    /// High and Critical classify as malicious
    pub fn is_malicious(&self) -> bool {
        matches!(self, ThreatLevel::High | ThreatLevel::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "Low",
            ThreatLevel::Medium => "Medium",
            ThreatLevel::High => "High",
            ThreatLevel::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Heuristic score for one packet with the contributing reasons
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketScore {
    /// 0-100, clamped at 100 (ceiling, not normalized)
    pub score: f64,
    /// Human-readable contributing reasons; empty for normal traffic
    pub reasons: Vec<String>,
}

/// Full scoring result for a stored packet
#[derive(Debug, Clone, Serialize)]
pub struct ThreatReport {
    pub packet_id: i64,
    /// Heuristic threat score, 0-100
    pub threat_score: f64,
    pub threat_level: ThreatLevel,
    pub is_malicious: bool,
    pub reasons: Vec<String>,
}

/// Persisted classification of one packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub packet_id: i64,
    /// Probability-style score, 0.0-1.0
    pub ml_score: f64,
    pub threat_level: ThreatLevel,
    pub is_malicious: bool,
    pub detected_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl ThreatAssessment {
    /// Classify a score into a new assessment
    pub fn classify(packet_id: i64, ml_score: f64, description: Option<String>) -> Self {
        let level = ThreatLevel::from_ml_score(ml_score);
        Self {
            packet_id,
            ml_score,
            threat_level: level,
            is_malicious: level.is_malicious(),
            detected_at: Utc::now(),
            description,
        }
    }

    /// Fold a newly observed score into the assessment: the new authoritative
    /// score is the arithmetic mean of old and new (fixed alpha=0.5
    /// smoothing, a design simplification rather than a Bayesian update),
    /// and the taxonomy is re-derived from it.
    pub fn update_confidence(&mut self, new_score: f64) {
        self.ml_score = (self.ml_score + new_score) / 2.0;
        self.threat_level = ThreatLevel::from_ml_score(self.ml_score);
        self.is_malicious = self.threat_level.is_malicious();
        self.detected_at = Utc::now();
    }
}

/// Rule-based packet scorer
pub struct ThreatScorer {
    config: ScoringConfig,
}

impl Default for ThreatScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl ThreatScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a packet from its destination port, frame length, and protocol
    /// label. Additive heuristic clamped to 100; simultaneous flags saturate
    /// rather than compound. Negative sizes contribute nothing.
    pub fn score_packet(&self, port: u16, size_bytes: i64, protocol: &str) -> PacketScore {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if SUSPICIOUS_PORTS.contains(&port) {
            score += self.config.suspicious_port_score;
            reasons.push(format!("suspicious port {port}"));
        }

        if size_bytes > STANDARD_MTU_BYTES {
            score += self.config.oversize_score;
            reasons.push(format!("oversized packet ({size_bytes} bytes)"));
        }

        if !STANDARD_PROTOCOLS.contains(&protocol) {
            score += self.config.unusual_protocol_score;
            reasons.push(format!("unusual protocol {protocol}"));
        }

        PacketScore {
            score: score.min(100.0),
            reasons,
        }
    }

    /// Score a parsed packet record
    pub fn score_record(&self, packet: &PacketRecord) -> PacketScore {
        self.score_packet(packet.port, packet.length, &packet.protocol)
    }
}

/// Deterministic stand-in for a real model score.
///
/// The original system added random jitter here; dropped so repeated
/// assessments of the same packet agree.
pub fn ml_score_stub(packet: &PacketRecord) -> f64 {
    let mut score: f64 = 0.3;

    if packet.length > STANDARD_MTU_BYTES {
        score += 0.2;
    }
    if packet.protocol == "TCP" {
        score += 0.1;
    }

    score.min(1.0)
}
