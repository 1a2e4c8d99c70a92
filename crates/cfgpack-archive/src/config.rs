use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entry::CompressionAlgorithm;
use crate::error::{ArchiveError, ArchiveResult};

/// Settings for writing binary archives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Algorithm tried on each payload.
    pub compression: CompressionAlgorithm,
    /// Payloads of this many bytes or fewer are never compressed.
    pub min_size_for_compression: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression: CompressionAlgorithm::Deflate,
            min_size_for_compression: 32,
        }
    }
}

impl ArchiveConfig {
    /// Store every payload as-is.
    pub fn uncompressed() -> Self {
        Self {
            compression: CompressionAlgorithm::None,
            ..Default::default()
        }
    }

    /// Parse a config from TOML. Missing keys take their default values.
    pub fn from_toml_str(input: &str) -> ArchiveResult<Self> {
        toml::from_str(input).map_err(|e| ArchiveError::Config(e.to_string()))
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}
