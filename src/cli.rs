use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use trafsift::config::Config;
use trafsift::ml::{extract, ClusterMethod};
use trafsift::pipeline::Pipeline;
use trafsift::scoring::{ThreatLevel, ThreatScorer};
use trafsift::storage::{MemoryStore, PacketStore};

#[derive(Parser)]
#[command(name = "trafsift")]
#[command(author, version, about = "Traffic source clustering and threat scoring")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a capture CSV, cluster its sources, and report the results
    Analyze {
        /// Path to the Wireshark CSV export
        file: PathBuf,

        /// Clustering method (kmeans or dbscan)
        #[arg(short, long)]
        method: Option<String>,

        /// Number of clusters
        #[arg(short = 'k', long)]
        clusters: Option<usize>,

        /// Emit JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Show per-source metrics for a capture CSV without clustering
    Metrics {
        /// Path to the Wireshark CSV export
        file: PathBuf,

        /// Emit JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Score a single packet from its attributes
    Score {
        /// Destination port
        #[arg(short, long)]
        port: u16,

        /// Frame length in bytes
        #[arg(short, long)]
        size: i64,

        /// Protocol label (e.g. TCP, TLSv1.2)
        #[arg(long, default_value = "TCP")]
        protocol: String,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Table row for clustered sources
#[derive(Tabled)]
struct SourceRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Packets")]
    packets: u64,
    #[tabled(rename = "Pkt/s")]
    pps: String,
    #[tabled(rename = "Avg Size")]
    avg_size: String,
    #[tabled(rename = "Ports")]
    ports: u32,
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Danger")]
    danger: String,
}

/// Table row for raw metrics
#[derive(Tabled)]
struct MetricsRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Packets")]
    packets: u64,
    #[tabled(rename = "Pkt/s")]
    pps: String,
    #[tabled(rename = "Avg Size")]
    avg_size: String,
    #[tabled(rename = "Total Bytes")]
    total_bytes: i64,
    #[tabled(rename = "Duration (s)")]
    duration: String,
    #[tabled(rename = "Ports")]
    ports: u32,
    #[tabled(rename = "Protocols")]
    protocols: String,
}

pub fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Analyze {
            file,
            method,
            clusters,
            json,
        } => cmd_analyze(config, file, method, clusters, json),
        Commands::Metrics { file, json } => cmd_metrics(file, json),
        Commands::Score {
            port,
            size,
            protocol,
            json,
        } => cmd_score(config, port, size, protocol, json),
    }
}

fn cmd_analyze(
    mut config: Config,
    file: PathBuf,
    method: Option<String>,
    clusters: Option<usize>,
    json: bool,
) -> Result<()> {
    if let Some(method) = method {
        // validate early so a typo fails before parsing the capture
        method.parse::<ClusterMethod>()?;
        config.clustering.method = method;
    }
    if let Some(clusters) = clusters {
        config.clustering.clusters = clusters;
    }

    let raw = std::fs::read(&file)
        .with_context(|| format!("Failed to read capture file: {}", file.display()))?;

    let mut pipeline = Pipeline::new(config, MemoryStore::new());
    let summary = pipeline.import_csv(&raw, None)?;

    let mut rows = pipeline.store().session_analysis(summary.session_id);
    rows.sort_by(|a, b| {
        b.assignment
            .danger_score
            .partial_cmp(&a.assignment.danger_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "summary": summary,
                "sources": rows,
            }))?
        );
        return Ok(());
    }

    println!(
        "Imported {} packets, {} sources in {} clusters",
        summary.imported_packets, summary.sources_analyzed, summary.clusters
    );
    if summary.dangerous_sources > 0 {
        println!(
            "{}",
            format!("{} dangerous source(s) detected", summary.dangerous_sources)
                .red()
                .bold()
        );
    } else {
        println!("{}", "No dangerous sources detected".green());
    }
    println!();

    let table_rows: Vec<SourceRow> = rows
        .iter()
        .map(|row| {
            let danger = format!("{:.1}", row.assignment.danger_score);
            SourceRow {
                source: row.metrics.source_ip.clone(),
                packets: row.metrics.packet_count,
                pps: format!("{:.2}", row.metrics.packets_per_second),
                avg_size: format!("{:.1}", row.metrics.average_packet_size),
                ports: row.metrics.unique_ports,
                cluster: format!(
                    "{} ({})",
                    row.assignment.cluster_id, row.assignment.cluster_name
                ),
                danger: if row.assignment.is_dangerous {
                    danger.red().bold().to_string()
                } else {
                    danger
                },
            }
        })
        .collect();

    println!("{}", Table::new(table_rows));

    Ok(())
}

fn cmd_metrics(file: PathBuf, json: bool) -> Result<()> {
    let raw = std::fs::read(&file)
        .with_context(|| format!("Failed to read capture file: {}", file.display()))?;

    let parser = trafsift::core::CsvParser::new();
    let packets = parser.parse(&raw);
    let metrics = extract(&packets);

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    println!(
        "{} packets parsed, {} sources with enough data",
        packets.len(),
        metrics.len()
    );

    let rows: Vec<MetricsRow> = metrics
        .iter()
        .map(|m| MetricsRow {
            source: m.source_ip.clone(),
            packets: m.packet_count,
            pps: format!("{:.2}", m.packets_per_second),
            avg_size: format!("{:.1}", m.average_packet_size),
            total_bytes: m.total_bytes,
            duration: format!("{:.3}", m.duration_seconds),
            ports: m.unique_ports,
            protocols: m.protocols.join(", "),
        })
        .collect();

    println!("{}", Table::new(rows));

    Ok(())
}

fn cmd_score(config: Config, port: u16, size: i64, protocol: String, json: bool) -> Result<()> {
    let scorer = ThreatScorer::new(config.scoring);
    let result = scorer.score_packet(port, size, &protocol);
    let level = ThreatLevel::from_ml_score(result.score / 100.0);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "score": result.score,
                "level": level.as_str(),
                "isMalicious": level.is_malicious(),
                "reasons": result.reasons,
            }))?
        );
        return Ok(());
    }

    let level_text = match level {
        ThreatLevel::Critical | ThreatLevel::High => level.as_str().red().bold().to_string(),
        ThreatLevel::Medium => level.as_str().yellow().to_string(),
        ThreatLevel::Low => level.as_str().green().to_string(),
    };

    println!("Threat score: {:.0}/100 ({level_text})", result.score);
    if result.reasons.is_empty() {
        println!("No threat indicators");
    } else {
        for reason in &result.reasons {
            println!("  - {reason}");
        }
    }

    Ok(())
}
