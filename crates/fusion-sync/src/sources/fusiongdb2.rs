// FusionGDB2 synchronization
//
// The source is a single Excel workbook. Its first sheet is converted to a
// tab-delimited `fusionGDB2.csv` (header kept) and that file is loaded.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use super::{load_database, JobContext, SourceJob, SourceReport};
use crate::config::SourceDescriptor;
use crate::error::Result;
use crate::loader::LoadOptions;
use crate::spreadsheet::convert_to_tsv;

/// Local name of the converted sheet
pub const CONVERTED_FILE: &str = "fusionGDB2.csv";

pub struct FusionGdb2Job {
    descriptor: SourceDescriptor,
}

impl FusionGdb2Job {
    pub fn new(descriptor: SourceDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl SourceJob for FusionGdb2Job {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(&self, ctx: &JobContext) -> Result<Vec<PathBuf>> {
        let file = self.descriptor.primary_file()?;
        let dest = ctx.artifact(file);
        // Small enough to download in one piece
        ctx.fetcher.fetch(&self.descriptor.url_for(file), &dest).await?;
        Ok(vec![dest])
    }

    async fn transform(&self, ctx: &JobContext, fetched: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        let output = ctx.artifact(CONVERTED_FILE);
        let target = output.clone();

        let stats = tokio::task::spawn_blocking(move || -> Result<_> {
            let mut converted = None;
            for workbook in &fetched {
                converted = Some(convert_to_tsv(workbook, &target)?);
            }
            Ok(converted)
        })
        .await??;

        if let Some(stats) = stats {
            info!(
                source = %self.descriptor.name,
                rows = stats.rows,
                columns = stats.columns,
                "Converted workbook"
            );
        }
        Ok(vec![output])
    }

    async fn load(&self, ctx: &JobContext, files: Vec<PathBuf>) -> Result<SourceReport> {
        load_database(ctx, &self.descriptor, files, LoadOptions::tsv().with_header()).await
    }
}
