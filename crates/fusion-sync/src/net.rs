//! Network fetch primitive
//!
//! [`Fetcher`] is the seam between the sync jobs and the network. Jobs only
//! ever ask for "this URL into that path"; [`HttpFetcher`] is the production
//! implementation over reqwest.

use crate::artifacts::{remove_artifacts, ArtifactLedger, CleanupStats};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download a small file in one piece. Returns the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;

    /// Stream a large file to disk chunk by chunk
    async fn fetch_large(&self, url: &str, dest: &Path) -> Result<u64>;

    /// Resolve a signed download link with Basic auth, then stream the file it points at
    async fn fetch_authenticated(&self, url: &str, token: &str, dest: &Path) -> Result<u64>;

    /// Remove every artifact recorded during the run
    async fn cleanup(&self, ledger: &ArtifactLedger) -> CleanupStats {
        remove_artifacts(ledger.drain())
    }
}

/// Body of the COSMIC authenticated download endpoint
#[derive(Debug, Deserialize)]
struct SignedDownload {
    url: String,
}

pub struct HttpFetcher {
    client: Client,
    progress: Option<MultiProgress>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, show_progress: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fusion-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, show_progress))
    }

    pub fn with_client(client: Client, show_progress: bool) -> Self {
        Self {
            client,
            progress: show_progress.then(MultiProgress::new),
        }
    }

    async fn get(&self, url: &str) -> Result<Response> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        check_status(url, response)
    }

    fn progress_bar(&self, total: Option<u64>, dest: &Path) -> ProgressBar {
        let (Some(multi), Some(total)) = (&self.progress, total) else {
            return ProgressBar::hidden();
        };

        let pb = multi.add(ProgressBar::new(total));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg:30} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(file_label(dest));
        pb
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let bytes = self.get(url).await?.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;

        info!(url = %url, file = %dest.display(), bytes = bytes.len(), "Downloaded");
        Ok(bytes.len() as u64)
    }

    async fn fetch_large(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.get(url).await?;
        let pb = self.progress_bar(response.content_length(), dest);

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            pb.set_position(written);
        }
        file.flush().await?;
        pb.finish_and_clear();

        info!(url = %url, file = %dest.display(), bytes = written, "Downloaded");
        Ok(written)
    }

    async fn fetch_authenticated(&self, url: &str, token: &str, dest: &Path) -> Result<u64> {
        debug!(url = %url, "Requesting signed download link");
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Basic {}", token))
            .send()
            .await?;
        let response = check_status(url, response)?;

        let link: SignedDownload = response
            .json()
            .await
            .map_err(|e| SyncError::download(url, format!("unexpected response body: {}", e)))?;

        self.fetch_large(&link.url, dest).await
    }
}

fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SyncError::download(url, format!("HTTP {}", status)))
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5), false).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_large_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tables/fusion_ppi.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("A\tB\nC\tD\n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("fusion_ppi.txt");
        let url = format!("{}/tables/fusion_ppi.txt", server.uri());

        let written = fetcher().fetch_large(&url, &dest).await.unwrap();

        assert_eq!(written, 8);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "A\tB\nC\tD\n");
    }

    #[tokio::test]
    async fn test_fetch_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/missing.txt", server.uri());
        let err = fetcher()
            .fetch(&url, &dir.path().join("missing.txt"))
            .await
            .unwrap_err();

        match err {
            SyncError::Download { url: failed, reason } => {
                assert_eq!(failed, url);
                assert!(reason.contains("404"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_authenticated_follows_signed_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cosmic/CosmicFusionExport.tsv.gz"))
            .and(header("authorization", "Basic dG9rZW4="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": format!("{}/signed/export.gz", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/signed/export.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("CosmicFusionExport.tsv.gz");
        let url = format!("{}/cosmic/CosmicFusionExport.tsv.gz", server.uri());

        let written = fetcher()
            .fetch_authenticated(&url, "dG9rZW4=", &dest)
            .await
            .unwrap();

        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_fetch_authenticated_rejects_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/cosmic/CosmicFusionExport.tsv.gz", server.uri());
        let err = fetcher()
            .fetch_authenticated(&url, "bad", &dir.path().join("x.gz"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("401"));
    }
}
