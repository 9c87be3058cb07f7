// COSMIC synchronization
//
// The fusion export sits behind an authenticated endpoint that hands out a
// short-lived signed link. The gzipped download is decompressed next to
// itself and loaded with its header row.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use super::{load_database, JobContext, SourceJob, SourceReport};
use crate::archive::gunzip_file;
use crate::config::SourceDescriptor;
use crate::error::Result;
use crate::loader::LoadOptions;

pub struct CosmicJob {
    descriptor: SourceDescriptor,
    /// Base64 `user:password`, sent as HTTP Basic auth
    token: String,
}

impl CosmicJob {
    pub fn new(descriptor: SourceDescriptor, token: impl Into<String>) -> Self {
        Self {
            descriptor,
            token: token.into(),
        }
    }
}

/// `CosmicFusionExport.tsv.gz` -> `CosmicFusionExport.tsv`
fn decompressed_name(file: &str) -> &str {
    file.strip_suffix(".gz").unwrap_or(file)
}

#[async_trait]
impl SourceJob for CosmicJob {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(&self, ctx: &JobContext) -> Result<Vec<PathBuf>> {
        let file = self.descriptor.primary_file()?;
        let dest = ctx.artifact(file);
        ctx.fetcher
            .fetch_authenticated(&self.descriptor.url_for(file), &self.token, &dest)
            .await?;
        Ok(vec![dest])
    }

    async fn transform(&self, ctx: &JobContext, fetched: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        let mut targets = Vec::with_capacity(fetched.len());
        for src in fetched {
            let name = src
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let dest = ctx.artifact(decompressed_name(&name));
            targets.push((src, dest));
        }

        let outputs: Vec<PathBuf> = targets.iter().map(|(_, dest)| dest.clone()).collect();
        let bytes = tokio::task::spawn_blocking(move || -> Result<u64> {
            let mut total = 0;
            for (src, dest) in &targets {
                total += gunzip_file(src, dest)?;
            }
            Ok(total)
        })
        .await??;

        info!(source = %self.descriptor.name, bytes, "Decompressed export");
        Ok(outputs)
    }

    async fn load(&self, ctx: &JobContext, files: Vec<PathBuf>) -> Result<SourceReport> {
        load_database(ctx, &self.descriptor, files, LoadOptions::tsv().with_header()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::loader::Database;
    use crate::sources::testing::{context, StaticFetcher};
    use crate::SyncError;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::sync::Arc;

    const URL: &str = "http://mirror/cosmic/v95/CosmicFusionExport.tsv.gz";

    fn descriptor() -> SourceDescriptor {
        let mut descriptor = SourceDescriptor::cosmic();
        descriptor.hostname = "http://mirror/cosmic/v95".to_string();
        descriptor
    }

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decompressed_name() {
        assert_eq!(decompressed_name("CosmicFusionExport.tsv.gz"), "CosmicFusionExport.tsv");
        assert_eq!(decompressed_name("plain.tsv"), "plain.tsv");
    }

    #[tokio::test]
    async fn test_run_sends_token_and_loads_export() {
        let dir = tempfile::tempdir().unwrap();
        let export = gzip("SAMPLE_ID\tFUSION_ID\tTRANSLOCATION_NAME\n1\t100\tBCR-ABL1\n2\t101\tEML4-ALK\n");
        let fetcher = Arc::new(StaticFetcher::default().with(format!("{}#dG9rZW4=", URL), export));
        let ctx = context(dir.path(), fetcher.clone());

        let report = CosmicJob::new(descriptor(), "dG9rZW4=").run(&ctx).await.unwrap();

        assert_eq!(report.tables.get("CosmicFusionExport"), Some(&2));
        assert_eq!(fetcher.requested(), vec![format!("{}#dG9rZW4=", URL)]);

        let db = Database::open(dir.path().join("cosmic.db")).unwrap();
        assert_eq!(
            db.columns("CosmicFusionExport").unwrap(),
            vec!["SAMPLE_ID", "FUSION_ID", "TRANSLOCATION_NAME"]
        );
        assert!(ctx.ledger.contains(&dir.path().join("CosmicFusionExport.tsv.gz")));
        assert!(ctx.ledger.contains(&dir.path().join("CosmicFusionExport.tsv")));
    }

    #[tokio::test]
    async fn test_wrong_token_is_a_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StaticFetcher::default().with(format!("{}#good", URL), gzip("A\n1\n"));
        let ctx = context(dir.path(), Arc::new(fetcher));

        let err = CosmicJob::new(descriptor(), "bad").run(&ctx).await.unwrap_err();

        assert!(matches!(err, SyncError::Download { .. }));
        assert!(!dir.path().join("cosmic.db").exists());
    }
}
