// Mitelman synchronization
//
// The source is a zip archive holding several flat files. The whole archive
// is extracted, but only members under the MBCA sentinel path are loaded.
// The data is Latin-1 encoded and has no header row.

use async_trait::async_trait;
use fusion_common::types::TextEncoding;
use std::path::PathBuf;
use tracing::info;

use super::{load_database, JobContext, SourceJob, SourceReport};
use crate::archive::{extract_zip, filter_members, top_level_entries, zip_members};
use crate::config::SourceDescriptor;
use crate::error::{Result, SyncError};
use crate::loader::LoadOptions;

/// Archive path of the member that gets loaded
pub const SENTINEL: &str = "mitelman_db/MBCA.TXT.DATA";

pub struct MitelmanJob {
    descriptor: SourceDescriptor,
}

impl MitelmanJob {
    pub fn new(descriptor: SourceDescriptor) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl SourceJob for MitelmanJob {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(&self, ctx: &JobContext) -> Result<Vec<PathBuf>> {
        let file = self.descriptor.primary_file()?;
        let dest = ctx.artifact(file);
        ctx.fetcher
            .fetch_large(&self.descriptor.url_for(file), &dest)
            .await?;
        Ok(vec![dest])
    }

    async fn transform(&self, ctx: &JobContext, fetched: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        let listed = fetched.clone();
        let members = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut members = Vec::new();
            for archive in &listed {
                members.extend(zip_members(archive)?);
            }
            Ok(members)
        })
        .await??;

        // Tracked before extraction so a partial extract is still cleaned up
        for entry in top_level_entries(&members) {
            ctx.artifact(entry);
        }

        let output_dir = ctx.output_dir.clone();
        let archives = fetched.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            for archive in &archives {
                extract_zip(archive, &output_dir)?;
            }
            Ok(())
        })
        .await??;

        let selected = filter_members(&members, SENTINEL);
        if selected.is_empty() {
            let archive = fetched
                .first()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Err(SyncError::UnexpectedArchiveContents {
                archive,
                sentinel: SENTINEL.to_string(),
            });
        }

        info!(
            source = %self.descriptor.name,
            extracted = members.len(),
            selected = selected.len(),
            "Extracted archive"
        );
        Ok(selected.iter().map(|member| ctx.path(member)).collect())
    }

    async fn load(&self, ctx: &JobContext, files: Vec<PathBuf>) -> Result<SourceReport> {
        let options = LoadOptions::tsv().with_encoding(TextEncoding::Latin1);
        load_database(ctx, &self.descriptor, files, options).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::loader::Database;
    use crate::sources::testing::{context, StaticFetcher};
    use std::io::Write;
    use std::sync::Arc;
    use zip::write::SimpleFileOptions;

    const URL: &str = "http://mirror/prod/mitelman_db.zip";

    fn descriptor() -> SourceDescriptor {
        let mut descriptor = SourceDescriptor::mitelman();
        descriptor.hostname = "http://mirror/prod".to_string();
        descriptor
    }

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_run_loads_only_the_sentinel_member() {
        let dir = tempfile::tempdir().unwrap();
        let archive = zip_bytes(&[
            ("mitelman_db/MBCA.TXT.DATA", &b"1\tt(9;22)\tM\xfcller\n2\tinv(16)\tCML\n"[..]),
            ("mitelman_db/REF.TXT.DATA", &b"99\tref\n"[..]),
        ]);
        let ctx = context(dir.path(), Arc::new(StaticFetcher::default().with(URL, archive)));

        let report = MitelmanJob::new(descriptor()).run(&ctx).await.unwrap();

        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables.get("MBCA"), Some(&2));

        let db = Database::open(dir.path().join("mitelman.db")).unwrap();
        assert_eq!(db.rows("MBCA").unwrap()[0][2].as_deref(), Some("Müller"));

        assert!(ctx.ledger.contains(&dir.path().join("mitelman_db.zip")));
        assert!(ctx.ledger.contains(&dir.path().join("mitelman_db")));
    }

    #[tokio::test]
    async fn test_archive_without_sentinel_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = zip_bytes(&[("mitelman_db/REF.TXT.DATA", &b"99\tref\n"[..])]);
        let ctx = context(dir.path(), Arc::new(StaticFetcher::default().with(URL, archive)));

        let err = MitelmanJob::new(descriptor()).run(&ctx).await.unwrap_err();

        assert!(matches!(err, SyncError::UnexpectedArchiveContents { .. }));
        assert!(err.to_string().contains(SENTINEL));
        assert!(!dir.path().join("mitelman.db").exists());
        // Extracted files are still tracked for cleanup
        assert!(ctx.ledger.contains(&dir.path().join("mitelman_db")));
    }

    #[tokio::test]
    async fn test_failed_extraction_is_still_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        // The absolute path is rejected after the first member is written
        let archive = zip_bytes(&[
            ("mitelman_db/MBCA.TXT.DATA", &b"1\tt(9;22)\n"[..]),
            ("/abs/evil.txt", &b"x"[..]),
        ]);
        let ctx = context(dir.path(), Arc::new(StaticFetcher::default().with(URL, archive)));

        let err = MitelmanJob::new(descriptor()).run(&ctx).await.unwrap_err();
        assert!(matches!(err, SyncError::Archive(_)));
        assert!(ctx.ledger.contains(&dir.path().join("mitelman_db")));

        crate::artifacts::remove_artifacts(ctx.ledger.drain());
        assert!(!dir.path().join("mitelman_db").exists());
        assert!(!dir.path().join("mitelman_db.zip").exists());
        assert!(!dir.path().join("mitelman.db").exists());
    }

    #[tokio::test]
    async fn test_download_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(StaticFetcher::default()));

        let err = MitelmanJob::new(descriptor()).run(&ctx).await.unwrap_err();
        assert!(matches!(err, SyncError::Download { .. }));
    }
}
