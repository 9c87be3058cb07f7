//! Sync manifest
//!
//! Written next to the databases after a fully successful run, so consumers
//! can tell which snapshot they are looking at without opening every file.

use crate::error::Result;
use crate::sources::SourceReport;
use chrono::{DateTime, Utc};
use fusion_common::checksum::compute_file_checksum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MANIFEST_FILE: &str = "sync_manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncManifest {
    pub synced_at: DateTime<Utc>,
    pub sources: Vec<SourceEntry>,
}

/// One loaded database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,

    /// Database file name, relative to the manifest
    pub database: String,

    pub sha256: String,
    pub size_bytes: u64,

    /// Row count per table
    pub tables: BTreeMap<String, usize>,
}

impl SyncManifest {
    /// Describe the databases behind `reports`, hashing each file
    pub fn from_reports(reports: &[SourceReport]) -> Result<Self> {
        let mut sources = Vec::with_capacity(reports.len());

        for report in reports {
            let size_bytes = std::fs::metadata(&report.database)?.len();
            let sha256 = compute_file_checksum(&report.database)?;
            let database = report
                .database
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| report.database.display().to_string());

            sources.push(SourceEntry {
                name: report.source.clone(),
                database,
                sha256,
                size_bytes,
                tables: report.tables.clone(),
            });
        }

        Ok(Self {
            synced_at: Utc::now(),
            sources,
        })
    }

    /// Write the manifest into `dir`, returning its path
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!(path = %path.display(), sources = self.sources.len(), "Wrote sync manifest");
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn source(&self, name: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|s| s.name == name)
    }
}
