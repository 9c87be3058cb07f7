//! Error types for database synchronization

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The server answered, but not with the file
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// One or more sources failed; carries one `"<Source>: <detail>"` line per failure
    #[error("Failed to synchronize {} source(s): {}", .0.len(), .0.join("; "))]
    DownloadFailure(Vec<String>),

    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("COSMIC credentials have not been provided correctly: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive {archive} has no member matching '{sentinel}'")]
    UnexpectedArchiveContents { archive: String, sentinel: String },

    #[error("Malformed spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Malformed delimited file: {0}")]
    Delimited(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] fusion_common::CommonError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    pub fn download(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Messages carried by an aggregate failure, empty for any other error
    pub fn failures(&self) -> &[String] {
        match self {
            Self::DownloadFailure(messages) => messages,
            _ => &[],
        }
    }
}

impl From<calamine::Error> for SyncError {
    fn from(err: calamine::Error) -> Self {
        SyncError::Spreadsheet(err.to_string())
    }
}

impl From<csv::IntoInnerError<csv::Writer<std::fs::File>>> for SyncError {
    fn from(err: csv::IntoInnerError<csv::Writer<std::fs::File>>) -> Self {
        SyncError::Io(err.into_error())
    }
}
