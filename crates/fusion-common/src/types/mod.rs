//! Common types used across fusion-sync

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};

/// Text encoding of a delimited source file.
///
/// Most sources publish UTF-8. The Mitelman dump is ISO-8859-1, where every
/// byte maps to the Unicode code point of the same value, so decoding it can
/// never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    /// Canonical label, as used in HTTP headers
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode one field of raw bytes
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| CommonError::Encoding {
                    encoding: self.label(),
                    detail: e.to_string(),
                }),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
