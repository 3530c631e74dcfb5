//! Network traffic source clustering and threat scoring
//!
//! `trafsift` ingests Wireshark CSV exports, aggregates per-source
//! behavioral metrics, groups sources into clusters, and scores packets and
//! clusters for threat likelihood.
//!
//! # Example
//! ```ignore
//! use trafsift::config::Config;
//! use trafsift::pipeline::Pipeline;
//! use trafsift::storage::MemoryStore;
//!
//! let mut pipeline = Pipeline::new(Config::load_or_default()?, MemoryStore::new());
//! let summary = pipeline.import_csv(&std::fs::read("capture.csv")?, None)?;
//! println!(
//!     "{} sources analyzed, {} dangerous",
//!     summary.sources_analyzed, summary.dangerous_sources
//! );
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod ml;
pub mod pipeline;
pub mod scoring;
pub mod storage;

pub use config::Config;
pub use error::{Result, TrafsiftError};
pub use pipeline::{ImportSummary, Pipeline};
