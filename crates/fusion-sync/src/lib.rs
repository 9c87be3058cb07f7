//! Fusion Sync Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Downloads the fusion-gene reference databases and loads each one into a
//! local SQLite file.
//!
//! # Supported Data Sources
//!
//! - **FusionGDB**: six tab-separated tables, fetched concurrently
//! - **FusionGDB2**: an Excel workbook, converted to TSV before loading
//! - **Mitelman**: a zip archive; only the `MBCA.TXT.DATA` member is loaded (Latin-1)
//! - **COSMIC**: a gzipped export behind authenticated download
//!
//! Every source runs as its own task. A failing source never stops the
//! others; failures are collected and reported together once all sources
//! have finished.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fusion_sync::{CosmicCredentials, HttpFetcher, SyncConfig, SyncOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> fusion_sync::Result<()> {
//!     let config = SyncConfig::new("./db");
//!     let fetcher = Arc::new(HttpFetcher::new(config.timeout(), false)?);
//!     let credentials = CosmicCredentials::from_token("dXNlcjpwYXNz");
//!
//!     let report = SyncOrchestrator::new(config, credentials, fetcher).run().await?;
//!     println!("synced {} sources", report.sources.len());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod artifacts;
pub mod config;
pub mod credentials;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod net;
pub mod orchestrator;
pub mod sources;
pub mod spreadsheet;

pub use artifacts::{ArtifactLedger, CleanupStats};
pub use config::{SourceDescriptor, SyncConfig};
pub use credentials::CosmicCredentials;
pub use error::{Result, SyncError};
pub use loader::{Database, LoadOptions};
pub use manifest::SyncManifest;
pub use net::{Fetcher, HttpFetcher};
pub use orchestrator::{SyncOrchestrator, SyncReport};
pub use sources::{JobContext, SourceJob, SourceReport};
