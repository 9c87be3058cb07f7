//! Sync configuration
//!
//! Static descriptors for every data source plus the knobs of a sync run.
//! Defaults point at the public mirrors; every hostname can be overridden
//! from the environment.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of concurrent FusionGDB table downloads
pub const DEFAULT_THREAD_NUM: usize = 2;

/// HTTP timeout; the COSMIC export and the Mitelman archive are large
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Pause between the last job finishing and artifact cleanup
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

/// Static configuration of one remote data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Display name, also the prefix of error messages
    pub name: String,

    /// Base URL the remote files live under
    pub hostname: String,

    /// Remote file names, relative to `hostname`
    pub files: Vec<String>,

    /// Local SQLite file the source is loaded into
    pub database: String,
}

impl SourceDescriptor {
    pub fn new(
        name: impl Into<String>,
        hostname: impl Into<String>,
        files: &[&str],
        database: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            files: files.iter().map(|f| f.to_string()).collect(),
            database: database.into(),
        }
    }

    pub fn fusiongdb() -> Self {
        Self::new(
            "FusionGDB",
            "https://ccsm.uth.edu/FusionGDB/tables",
            &[
                "TCGA_ChiTaRS_combined_fusion_information_on_hg19.txt",
                "TCGA_ChiTaRS_combined_fusion_ORF_analyzed_gencode_h19v19.txt",
                "uniprot_gsymbol.txt",
                "fusion_uniprot_related_drugs.txt",
                "fusion_ppi.txt",
                "fgene_disease_associations.txt",
            ],
            "fusiongdb.db",
        )
    }

    pub fn fusiongdb2() -> Self {
        Self::new(
            "FusionGDB2",
            "https://compbio.uth.edu/FusionGDB2/tables",
            &["FusionGDB2_id.xlsx"],
            "fusiongdb2.db",
        )
    }

    pub fn mitelman() -> Self {
        Self::new(
            "Mitelman",
            "https://storage.googleapis.com/mitelman-data-files/prod",
            &["mitelman_db.zip"],
            "mitelman.db",
        )
    }

    pub fn cosmic() -> Self {
        Self::new(
            "COSMIC",
            "https://cancer.sanger.ac.uk/cosmic/file_download/GRCh38/cosmic/v95",
            &["CosmicFusionExport.tsv.gz"],
            "cosmic.db",
        )
    }

    /// Full URL of one of this source's files
    pub fn url_for(&self, file: &str) -> String {
        format!("{}/{}", self.hostname.trim_end_matches('/'), file)
    }

    /// The first (for most sources, only) remote file
    pub fn primary_file(&self) -> Result<&str> {
        self.files
            .first()
            .map(String::as_str)
            .ok_or_else(|| SyncError::config(format!("{} has no files configured", self.name)))
    }

    fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(SyncError::config(format!("{} hostname cannot be empty", self.name)));
        }
        if self.files.is_empty() || self.files.iter().any(|f| f.trim().is_empty()) {
            return Err(SyncError::config(format!("{} needs at least one file name", self.name)));
        }
        if self.database.trim().is_empty() {
            return Err(SyncError::config(format!("{} database name cannot be empty", self.name)));
        }
        Ok(())
    }

    fn env_key(&self) -> String {
        self.name.to_ascii_uppercase()
    }
}

/// Configuration of one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory every artifact and database is written to
    pub output: PathBuf,

    /// Concurrent downloads inside the FusionGDB job
    pub thread_num: usize,

    pub timeout_secs: u64,

    pub settle_delay_ms: u64,

    /// Skip the COSMIC source (and credential resolution) entirely
    pub skip_cosmic: bool,

    /// Draw progress bars for streamed downloads
    pub show_progress: bool,

    pub fusiongdb: SourceDescriptor,
    pub fusiongdb2: SourceDescriptor,
    pub mitelman: SourceDescriptor,
    pub cosmic: SourceDescriptor,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("."),
            thread_num: DEFAULT_THREAD_NUM,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            skip_cosmic: false,
            show_progress: false,
            fusiongdb: SourceDescriptor::fusiongdb(),
            fusiongdb2: SourceDescriptor::fusiongdb2(),
            mitelman: SourceDescriptor::mitelman(),
            cosmic: SourceDescriptor::cosmic(),
        }
    }
}

impl SyncConfig {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            output: output.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load overrides from environment variables
    ///
    /// - `FUSION_SYNC_OUTPUT`
    /// - `FUSION_SYNC_THREAD_NUM`
    /// - `FUSION_SYNC_TIMEOUT_SECS`
    /// - `FUSION_SYNC_SETTLE_DELAY_MS`
    /// - `FUSION_SYNC_<SOURCE>_HOSTNAME` for FUSIONGDB, FUSIONGDB2, MITELMAN, COSMIC
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(output) = std::env::var("FUSION_SYNC_OUTPUT") {
            config.output = PathBuf::from(output);
        }
        if let Some(n) = env_number("FUSION_SYNC_THREAD_NUM")? {
            config.thread_num = n;
        }
        if let Some(secs) = env_number("FUSION_SYNC_TIMEOUT_SECS")? {
            config.timeout_secs = secs;
        }
        if let Some(ms) = env_number("FUSION_SYNC_SETTLE_DELAY_MS")? {
            config.settle_delay_ms = ms;
        }

        for source in config.sources_mut() {
            let key = format!("FUSION_SYNC_{}_HOSTNAME", source.env_key());
            if let Ok(hostname) = std::env::var(&key) {
                source.hostname = hostname;
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_num == 0 {
            return Err(SyncError::config("thread_num must be greater than 0"));
        }
        if self.timeout_secs == 0 {
            return Err(SyncError::config("timeout_secs must be greater than 0"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(SyncError::config("output directory cannot be empty"));
        }
        for source in [&self.fusiongdb, &self.fusiongdb2, &self.mitelman, &self.cosmic] {
            source.validate()?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    fn sources_mut(&mut self) -> [&mut SourceDescriptor; 4] {
        [
            &mut self.fusiongdb,
            &mut self.fusiongdb2,
            &mut self.mitelman,
            &mut self.cosmic,
        ]
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SyncError::config(format!("{} must be a non-negative integer, got '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}
