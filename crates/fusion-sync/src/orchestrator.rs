//! Sync orchestrator
//!
//! Runs every source job as its own tokio task, waits for all of them,
//! cleans up download artifacts once, and reports failures together.
//!
//! A failing source never cancels the others. Databases that did load stay
//! on disk even when the run as a whole fails.

use crate::artifacts::{ArtifactLedger, CleanupStats};
use crate::config::SyncConfig;
use crate::credentials::CosmicCredentials;
use crate::error::{Result, SyncError};
use crate::manifest::SyncManifest;
use crate::net::Fetcher;
use crate::sources::{builtin_jobs, JobContext, SourceJob, SourceReport};
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

/// Outcome of a fully successful run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// One entry per source, sorted by source name
    pub sources: Vec<SourceReport>,
    pub manifest: PathBuf,
    pub cleanup: CleanupStats,
}

pub struct SyncOrchestrator {
    config: SyncConfig,
    credentials: CosmicCredentials,
    fetcher: Arc<dyn Fetcher>,
    jobs: Option<Vec<Arc<dyn SourceJob>>>,
}

impl SyncOrchestrator {
    pub fn new(config: SyncConfig, credentials: CosmicCredentials, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            credentials,
            fetcher,
            jobs: None,
        }
    }

    /// Run these jobs instead of the built-in sources
    pub fn with_jobs(mut self, jobs: Vec<Arc<dyn SourceJob>>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Synchronize every source into the output directory.
    ///
    /// Configuration, credential and output directory errors are returned
    /// before any job starts. After that, every job failure is collected
    /// into [`SyncError::DownloadFailure`].
    pub async fn run(&self) -> Result<SyncReport> {
        let start = Instant::now();
        self.config.validate()?;

        let jobs = match &self.jobs {
            Some(jobs) => jobs.clone(),
            None => {
                let token = if self.config.skip_cosmic {
                    info!("COSMIC disabled, skipping credential check");
                    None
                } else {
                    Some(self.credentials.resolve()?)
                };
                builtin_jobs(&self.config, token)
            },
        };

        ensure_output_dir(&self.config.output)?;

        let ctx = JobContext {
            output_dir: self.config.output.clone(),
            fetcher: Arc::clone(&self.fetcher),
            ledger: ArtifactLedger::new(),
            thread_num: self.config.thread_num,
        };

        info!(
            output = %ctx.output_dir.display(),
            jobs = jobs.len(),
            thread_num = ctx.thread_num,
            "Starting sync"
        );

        // Every task is started before any is awaited
        let mut running: FuturesUnordered<_> = jobs
            .into_iter()
            .map(|job| {
                let name = job.name().to_string();
                let job_ctx = ctx.clone();
                let span = info_span!("source", name = %name);
                let handle = tokio::spawn(async move { job.run(&job_ctx).await }.instrument(span));
                async move { (name, handle.await) }
            })
            .collect();

        let mut reports = Vec::new();
        let mut failures = Vec::new();

        while let Some((name, outcome)) = running.next().await {
            match outcome {
                Ok(Ok(report)) => {
                    info!(
                        source = %name,
                        tables = report.tables.len(),
                        rows = report.total_rows(),
                        "Source synchronized"
                    );
                    reports.push(report);
                },
                Ok(Err(e)) => {
                    error!(source = %name, error = %e, "Source failed");
                    failures.push(format!("{}: {}", name, e));
                },
                Err(e) => {
                    error!(source = %name, error = %e, "Source task panicked");
                    failures.push(format!("{}: job panicked: {}", name, e));
                },
            }
        }

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        let cleanup = self.fetcher.cleanup(&ctx.ledger).await;
        info!(
            removed = cleanup.removed,
            missing = cleanup.missing,
            failed = cleanup.failed,
            "Cleaned up download artifacts"
        );

        if !failures.is_empty() {
            return Err(SyncError::DownloadFailure(failures));
        }

        reports.sort_by(|a, b| a.source.cmp(&b.source));
        let manifest = SyncManifest::from_reports(&reports)?.write(&self.config.output)?;

        info!(
            sources = reports.len(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Sync complete"
        );
        Ok(SyncReport {
            sources: reports,
            manifest,
            cleanup,
        })
    }
}

#[cfg(unix)]
fn ensure_output_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}
