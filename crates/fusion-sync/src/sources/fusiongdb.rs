// FusionGDB synchronization
//
// Six plain tab-separated tables, downloaded with bounded concurrency
// (`thread_num` at a time) and loaded as-is, one table per file.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{info, warn};

use super::{load_database, JobContext, SourceJob, SourceReport};
use crate::config::SourceDescriptor;
use crate::error::Result;
use crate::loader::LoadOptions;

pub struct FusionGdbJob {
    descriptor: SourceDescriptor,
}

impl FusionGdbJob {
    pub fn new(descriptor: SourceDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl SourceJob for FusionGdbJob {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(&self, ctx: &JobContext) -> Result<Vec<PathBuf>> {
        let concurrency = ctx.thread_num.max(1);
        info!(
            source = %self.descriptor.name,
            files = self.descriptor.files.len(),
            concurrency,
            "Downloading tables"
        );

        let targets: Vec<(String, PathBuf)> = self
            .descriptor
            .files
            .iter()
            .map(|file| (self.descriptor.url_for(file), ctx.artifact(file)))
            .collect();

        // Every download runs to completion before any failure is reported
        let results: Vec<Result<PathBuf>> = stream::iter(targets)
            .map(|(url, dest)| async move { ctx.fetcher.fetch_large(&url, &dest).await.map(|_| dest) })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    warn!(source = %self.descriptor.name, error = %e, "Additional download failure");
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        // Load in declared order, not completion order
        Ok(self.descriptor.files.iter().map(|f| ctx.path(f)).collect())
    }

    async fn load(&self, ctx: &JobContext, files: Vec<PathBuf>) -> Result<SourceReport> {
        load_database(ctx, &self.descriptor, files, LoadOptions::tsv()).await
    }
}
