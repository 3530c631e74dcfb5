use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or fall back to defaults
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/trafsift/config.toml"),
            PathBuf::from("trafsift.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

/// Clustering engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Default clustering method ("kmeans" or "dbscan")
    #[serde(default = "default_method")]
    pub method: String,

    /// Default cluster count
    #[serde(default = "default_clusters")]
    pub clusters: usize,

    /// Seed for k-means initialization; fixed so repeated runs on identical
    /// input produce identical cluster IDs
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// K-means iteration cap per restart
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// K-means restarts, best inertia wins
    #[serde(default = "default_n_init")]
    pub n_init: usize,

    /// K-means convergence tolerance on centroid movement
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Danger score cutoff (0-100); clusters strictly above are flagged
    #[serde(default = "default_danger_threshold")]
    pub danger_threshold: f64,

    /// DBSCAN neighborhood radius in scaled feature space
    #[serde(default = "default_dbscan_eps")]
    pub dbscan_eps: f64,

    /// DBSCAN minimum neighborhood size for a core point
    #[serde(default = "default_dbscan_min_samples")]
    pub dbscan_min_samples: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            clusters: default_clusters(),
            seed: default_seed(),
            max_iter: default_max_iter(),
            n_init: default_n_init(),
            tolerance: default_tolerance(),
            danger_threshold: default_danger_threshold(),
            dbscan_eps: default_dbscan_eps(),
            dbscan_min_samples: default_dbscan_min_samples(),
        }
    }
}

fn default_method() -> String {
    "kmeans".to_string()
}

fn default_clusters() -> usize {
    3
}

fn default_seed() -> u64 {
    42
}

fn default_max_iter() -> usize {
    300
}

fn default_n_init() -> usize {
    10
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_danger_threshold() -> f64 {
    60.0
}

fn default_dbscan_eps() -> f64 {
    0.5
}

fn default_dbscan_min_samples() -> usize {
    2
}

/// Threat scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Points added for a suspicious destination port
    #[serde(default = "default_port_score")]
    pub suspicious_port_score: f64,

    /// Points added for a frame above the standard Ethernet MTU
    #[serde(default = "default_oversize_score")]
    pub oversize_score: f64,

    /// Points added for a protocol outside the standard set
    #[serde(default = "default_protocol_score")]
    pub unusual_protocol_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            suspicious_port_score: default_port_score(),
            oversize_score: default_oversize_score(),
            unusual_protocol_score: default_protocol_score(),
        }
    }
}

fn default_port_score() -> f64 {
    30.0
}

fn default_oversize_score() -> f64 {
    20.0
}

fn default_protocol_score() -> f64 {
    15.0
}
