//! Archive extraction
//!
//! Zip archives are extracted in full next to the download, and the caller
//! picks the members it cares about from [`zip_members`]. Gzip files
//! decompress into a sibling file.

use crate::error::Result;
use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Member names of `archive` in archive order; directories keep their trailing `/`
pub fn zip_members(archive: &Path) -> Result<Vec<String>> {
    let zip = zip::ZipArchive::new(BufReader::new(File::open(archive)?))?;
    Ok(zip.file_names().map(str::to_owned).collect())
}

/// Extract every entry of `archive` under `dest`.
///
/// Extraction stops at the first bad entry; whatever was written before it
/// stays on disk. List the members first with [`zip_members`] when the
/// caller has to clean up after a failure.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(BufReader::new(File::open(archive)?))?;
    zip.extract(dest)?;
    debug!(archive = %archive.display(), members = zip.len(), "Extracted zip archive");
    Ok(())
}

/// Members whose path contains `sentinel`, directories excluded
pub fn filter_members(members: &[String], sentinel: &str) -> Vec<String> {
    members
        .iter()
        .filter(|name| !name.ends_with('/') && name.contains(sentinel))
        .cloned()
        .collect()
}

/// First path component of each member, i.e. what extraction created directly in `dest`
pub fn top_level_entries(members: &[String]) -> BTreeSet<PathBuf> {
    members
        .iter()
        .filter_map(|name| {
            Path::new(name)
                .components()
                .find(|c| matches!(c, std::path::Component::Normal(_)))
                .map(|c| PathBuf::from(c.as_os_str()))
        })
        .collect()
}

/// Decompress a gzip file into `dest`, returning the decompressed size
pub fn gunzip_file(src: &Path, dest: &Path) -> Result<u64> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(src)?));
    let mut out = BufWriter::new(File::create(dest)?);
    let size = std::io::copy(&mut decoder, &mut out)?;
    out.flush()?;

    debug!(src = %src.display(), dest = %dest.display(), bytes = size, "Decompressed gzip file");
    Ok(size)
}
