//! Fusion Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the fusion-sync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Checksums**: SHA-256 digests recorded in the sync manifest
//! - **Types**: text encodings understood by the loaders
//! - **Logging**: one place to configure `tracing` for every binary
//!
//! # Example
//!
//! ```no_run
//! use fusion_common::checksum::compute_file_checksum;
//!
//! fn fingerprint(path: &str) -> fusion_common::Result<String> {
//!     compute_file_checksum(path)
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{CommonError, Result};
