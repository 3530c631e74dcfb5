//! Analysis pipeline orchestration
//!
//! Wires the parser, feature extractor, clusterer, and scorer over a storage
//! collaborator: CSV bytes in, per-source cluster assignments and per-packet
//! assessments out. Each operation is request-scoped and synchronous; all
//! data is fetched into memory before computation and failures propagate to
//! the caller without retries.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::parser::CsvParser;
use crate::error::{Result, TrafsiftError};
use crate::ml::{extract, ClusterAssignment, ClusterMethod, SourceClusterer, SourceMetrics};
use crate::scoring::{ml_score_stub, ThreatAssessment, ThreatReport, ThreatScorer};
use crate::storage::{ClusteredSource, PacketStore};

/// Fixed-shape result of a CSV import
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub session_id: i64,
    pub session_name: String,
    pub imported_packets: usize,
    pub sources_analyzed: usize,
    pub dangerous_sources: usize,
    pub clusters: usize,
}

/// Orchestrates ingest, clustering, and scoring over a storage collaborator
pub struct Pipeline<S: PacketStore> {
    store: S,
    config: Config,
    parser: CsvParser,
    clusterer: SourceClusterer,
    scorer: ThreatScorer,
}

impl<S: PacketStore> Pipeline<S> {
    pub fn new(config: Config, store: S) -> Self {
        let clusterer = SourceClusterer::new(config.clustering.clone());
        let scorer = ThreatScorer::new(config.scoring.clone());
        Self {
            store,
            config,
            parser: CsvParser::new(),
            clusterer,
            scorer,
        }
    }

    /// Read access to the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the underlying store
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Clustering method configured as the default
    pub fn default_method(&self) -> Result<ClusterMethod> {
        self.config.clustering.method.parse()
    }

    /// Import a capture CSV: parse, persist packets, extract per-source
    /// metrics, cluster, and replace the session's analysis rows.
    ///
    /// `session_id` attaches the import to an existing session (`NotFound`
    /// if missing); otherwise a session is created. Zero parseable rows is a
    /// `ParseFailure`. A clustering failure still leaves the packets
    /// imported; the caller can recluster with different parameters.
    pub fn import_csv(&mut self, raw: &[u8], session_id: Option<i64>) -> Result<ImportSummary> {
        let packets = self.parser.parse(raw);
        if packets.is_empty() {
            return Err(TrafsiftError::ParseFailure(
                "no parseable packet rows in CSV".to_string(),
            ));
        }

        let (session_id, session_name) = match session_id {
            Some(id) => {
                let session = self.store.session(id).ok_or_else(|| {
                    TrafsiftError::NotFound(format!("session {id} does not exist"))
                })?;
                (session.id, session.name)
            }
            None => {
                let name = format!("Import {}", Utc::now().format("%Y-%m-%d %H:%M"));
                let id = self.store.create_session(&name, "Imported from CSV");
                (id, name)
            }
        };

        let imported = packets.len();
        self.store.insert_packets(session_id, &packets);
        info!(session = session_id, packets = imported, "imported packets");

        let metrics = extract(&packets);
        if metrics.is_empty() {
            warn!(session = session_id, "no clusterable sources in import");
            return Err(TrafsiftError::InsufficientData(
                "no clusterable sources: every source has fewer than 2 packets".to_string(),
            ));
        }

        let method = self.default_method()?;
        let assignments =
            self.clusterer
                .cluster(&metrics, method, self.config.clustering.clusters)?;

        let summary = ImportSummary {
            session_id,
            session_name,
            imported_packets: imported,
            sources_analyzed: assignments.len(),
            dangerous_sources: assignments.iter().filter(|a| a.is_dangerous).count(),
            clusters: distinct_clusters(&assignments),
        };

        self.persist_analysis(session_id, metrics, assignments);

        Ok(summary)
    }

    /// Recompute clustering for a session from its stored packets.
    pub fn recluster_session(
        &mut self,
        session_id: i64,
        method: ClusterMethod,
        k: usize,
    ) -> Result<Vec<ClusterAssignment>> {
        if self.store.session(session_id).is_none() {
            return Err(TrafsiftError::NotFound(format!(
                "session {session_id} does not exist"
            )));
        }

        let stored = self.store.packets_for_session(session_id);
        if stored.is_empty() {
            return Err(TrafsiftError::InsufficientData(format!(
                "no packets stored for session {session_id}"
            )));
        }

        let records: Vec<_> = stored.into_iter().map(|p| p.record).collect();
        let metrics = extract(&records);
        let assignments = self.clusterer.cluster(&metrics, method, k)?;

        self.persist_analysis(session_id, metrics, assignments.clone());

        Ok(assignments)
    }

    /// Cluster ad-hoc metrics without touching storage
    pub fn cluster_metrics(
        &self,
        metrics: &[SourceMetrics],
        method: ClusterMethod,
        k: usize,
    ) -> Result<Vec<ClusterAssignment>> {
        self.clusterer.cluster(metrics, method, k)
    }

    /// Heuristic threat report for a stored packet
    pub fn score_stored_packet(&self, packet_id: i64) -> Result<ThreatReport> {
        let packet = self.store.packet(packet_id).ok_or_else(|| {
            TrafsiftError::NotFound(format!("packet {packet_id} does not exist"))
        })?;

        let result = self.scorer.score_record(&packet.record);
        let level = crate::scoring::ThreatLevel::from_ml_score(result.score / 100.0);

        Ok(ThreatReport {
            packet_id,
            threat_score: result.score,
            threat_level: level,
            is_malicious: level.is_malicious(),
            reasons: result.reasons,
        })
    }

    /// Classify a packet from a supplied model score, or the stub when none
    /// is given. An existing assessment is returned unchanged when no new
    /// score is supplied.
    pub fn assess_packet(
        &mut self,
        packet_id: i64,
        ml_score: Option<f64>,
    ) -> Result<ThreatAssessment> {
        let packet = self.store.packet(packet_id).ok_or_else(|| {
            TrafsiftError::NotFound(format!("packet {packet_id} does not exist"))
        })?;

        if ml_score.is_none() {
            if let Some(existing) = self.store.assessment(packet_id) {
                return Ok(existing);
            }
        }

        let score = ml_score.unwrap_or_else(|| ml_score_stub(&packet.record));
        let assessment = ThreatAssessment::classify(packet_id, score, None);
        self.store.upsert_assessment(assessment.clone());

        info!(
            packet = packet_id,
            score,
            level = %assessment.threat_level,
            "packet assessed"
        );

        Ok(assessment)
    }

    /// Assess every packet in a session, reusing existing assessments and
    /// stubbing scores for packets that have none.
    pub fn assess_session(&mut self, session_id: i64) -> Result<Vec<ThreatAssessment>> {
        if self.store.session(session_id).is_none() {
            return Err(TrafsiftError::NotFound(format!(
                "session {session_id} does not exist"
            )));
        }

        let packets = self.store.packets_for_session(session_id);
        let mut assessments = Vec::with_capacity(packets.len());
        for packet in packets {
            assessments.push(self.assess_packet(packet.id, None)?);
        }

        Ok(assessments)
    }

    /// Fold a new observed score into an existing assessment (arithmetic
    /// mean) and re-derive its taxonomy.
    pub fn update_confidence(&mut self, packet_id: i64, new_score: f64) -> Result<ThreatAssessment> {
        let mut assessment = self.store.assessment(packet_id).ok_or_else(|| {
            TrafsiftError::NotFound(format!("no assessment for packet {packet_id}"))
        })?;

        assessment.update_confidence(new_score);
        self.store.upsert_assessment(assessment.clone());

        Ok(assessment)
    }

    fn persist_analysis(
        &mut self,
        session_id: i64,
        metrics: Vec<SourceMetrics>,
        assignments: Vec<ClusterAssignment>,
    ) {
        let now = Utc::now();
        let rows: Vec<ClusteredSource> = metrics
            .into_iter()
            .zip(assignments)
            .map(|(metrics, assignment)| ClusteredSource {
                metrics,
                assignment,
                calculated_at: now,
            })
            .collect();

        self.store.replace_session_analysis(session_id, rows);
    }
}

fn distinct_clusters(assignments: &[ClusterAssignment]) -> usize {
    let mut ids: Vec<u32> = assignments.iter().map(|a| a.cluster_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}
