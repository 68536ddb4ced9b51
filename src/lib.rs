//! # intel-ingest
//!
//! Daily ingestion of public threat-intelligence feeds into one normalized,
//! line-delimited JSON schema.
//!
//! ## Sources
//!
//! | Source              | Format                          | Output file                    |
//! |---------------------|---------------------------------|--------------------------------|
//! | NVD                 | gzip JSON                       | `cve_nvd_<date>.jsonl`         |
//! | ATT&CK enterprise   | STIX 2.1 bundle, ZIP or JSON    | `attack_enterprise_<date>.jsonl` |
//! | ATT&CK ICS          | STIX 2.1 bundle, ZIP or JSON    | `attack_ics_<date>.jsonl`      |
//! | CISA alerts         | RSS/Atom                        | `cisa_alerts_<date>.jsonl`     |
//! | CISA activity       | RSS/Atom                        | `cisa_activity_<date>.jsonl`   |
//! | MSRC update guide   | paginated OData REST            | `msrc_bulletins_<date>.jsonl`  |
//!
//! Each source is fetched once, normalized, and written independently; a
//! failing source produces no file and the run carries on.
//!
//! ## Quick Start
//!
//! ```no_run
//! use intel_ingest::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         output_dir: "./intel".into(),
//!         ..Default::default()
//!     }
//!     .with_env_overrides();
//!
//!     let pipeline = Pipeline::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = pipeline.run().await?;
//!     println!("{} sources written", summary.written());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Best-score selection for CVSS score sets
pub mod cvss;
/// Error types
pub mod error;
/// RSS/Atom feed parsing
pub mod feed;
/// HTTP transport
pub mod fetch;
/// Run driver
pub mod pipeline;
/// Source adapters
pub mod sources;
/// Core types and events
pub mod types;
/// JSONL output
pub mod writer;

// Re-export commonly used types
pub use config::{Config, HttpConfig, SourcesConfig};
pub use error::{Error, ErrorKind, FetchCause, FetchError, Result};
pub use fetch::{FetchOptions, Fetched, Fetcher};
pub use pipeline::Pipeline;
pub use sources::SourceAdapter;
pub use types::{
    AdvisoryKind, AdvisoryRecord, BulletinRecord, Cvss, Event, Framework, NormalizedRecord,
    RunSummary, SourceId, SourceOutcome, SourceStatus, TechniqueRecord, VulnerabilityRecord,
};
