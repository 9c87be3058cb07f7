//! Per-source synchronization jobs
//!
//! Every source goes through the same three steps, strictly in order:
//!
//! 1. **fetch**: download remote files into the output directory
//! 2. **transform**: turn downloads into loadable delimited files
//! 3. **load**: write those files into the source's SQLite database
//!
//! A job returns a typed result; it never reports into shared state. The
//! orchestrator decides what a failure means for the run.

pub mod cosmic;
pub mod fusiongdb;
pub mod fusiongdb2;
pub mod mitelman;

pub use cosmic::CosmicJob;
pub use fusiongdb::FusionGdbJob;
pub use fusiongdb2::FusionGdb2Job;
pub use mitelman::MitelmanJob;

use crate::artifacts::ArtifactLedger;
use crate::config::SourceDescriptor;
use crate::error::Result;
use crate::loader::{Database, LoadOptions};
use crate::net::Fetcher;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a job needs from the outside world
#[derive(Clone)]
pub struct JobContext {
    /// Every file a job reads or writes lives under this directory
    pub output_dir: PathBuf,
    pub fetcher: Arc<dyn Fetcher>,
    pub ledger: ArtifactLedger,
    /// Concurrent downloads allowed inside a single job
    pub thread_num: usize,
}

impl JobContext {
    pub fn path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Resolve a local path for `name` and record it for cleanup
    pub fn artifact(&self, name: impl AsRef<Path>) -> PathBuf {
        let path = self.path(name);
        self.ledger.record(path.clone());
        path
    }
}

/// What a successful job produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub database: PathBuf,
    /// Rows loaded per table
    pub tables: BTreeMap<String, usize>,
}

impl SourceReport {
    pub fn total_rows(&self) -> usize {
        self.tables.values().sum()
    }
}

#[async_trait]
pub trait SourceJob: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Download the source's remote files; returns local paths
    async fn fetch(&self, ctx: &JobContext) -> Result<Vec<PathBuf>>;

    /// Turn downloads into loadable files. Most sources load what they fetched.
    async fn transform(&self, _ctx: &JobContext, fetched: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        Ok(fetched)
    }

    async fn load(&self, ctx: &JobContext, files: Vec<PathBuf>) -> Result<SourceReport>;

    async fn run(&self, ctx: &JobContext) -> Result<SourceReport> {
        let fetched = self.fetch(ctx).await?;
        let files = self.transform(ctx, fetched).await?;
        self.load(ctx, files).await
    }
}

/// Load `files` into the descriptor's database on the blocking pool
pub(crate) async fn load_database(
    ctx: &JobContext,
    descriptor: &SourceDescriptor,
    files: Vec<PathBuf>,
    options: LoadOptions,
) -> Result<SourceReport> {
    let database = ctx.path(&descriptor.database);
    let source = descriptor.name.clone();

    tokio::task::spawn_blocking(move || -> Result<SourceReport> {
        let mut db = Database::open(&database)?;
        let tables = db.setup(&files, &options)?;
        Ok(SourceReport {
            source,
            database,
            tables,
        })
    })
    .await?
}

/// All built-in jobs, in the order they are started
pub fn builtin_jobs(
    config: &crate::config::SyncConfig,
    cosmic_token: Option<String>,
) -> Vec<Arc<dyn SourceJob>> {
    let mut jobs: Vec<Arc<dyn SourceJob>> = vec![
        Arc::new(FusionGdbJob::new(config.fusiongdb.clone())),
        Arc::new(MitelmanJob::new(config.mitelman.clone())),
    ];
    if let Some(token) = cosmic_token {
        jobs.push(Arc::new(CosmicJob::new(config.cosmic.clone(), token)));
    }
    jobs.push(Arc::new(FusionGdb2Job::new(config.fusiongdb2.clone())));
    jobs
}
