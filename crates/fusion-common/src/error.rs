//! Error types shared by the fusion-sync crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {encoding} text: {detail}")]
    Encoding {
        encoding: &'static str,
        detail: String,
    },
}
