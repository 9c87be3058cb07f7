//! SHA-256 digests for generated files

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hex SHA-256 digest of a file on disk
pub fn compute_file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    compute_checksum(&mut file)
}

/// Hex SHA-256 digest of any readable source, read in 64 KiB chunks
pub fn compute_checksum<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_compute_checksum() {
        let mut cursor = Cursor::new(b"hello world");
        assert_eq!(compute_checksum(&mut cursor).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_compute_file_checksum_spans_chunks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data = vec![b'a'; 200 * 1024];
        file.write_all(&data).unwrap();

        let from_file = compute_file_checksum(file.path()).unwrap();
        let from_memory = compute_checksum(&mut Cursor::new(&data)).unwrap();
        assert_eq!(from_file, from_memory);
        assert_eq!(from_file.len(), 64);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = compute_file_checksum("/nonexistent/fusion.db").unwrap_err();
        assert!(matches!(err, crate::CommonError::Io(_)));
    }
}
