use std::fmt;

use bytes::Bytes;
use cfgpack_types::ContentHash;
use serde::{Deserialize, Serialize};

/// Compression applied to an entry payload inside a binary archive.
///
/// Compression is a storage detail: an entry's hash always covers the
/// uncompressed bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    #[default]
    None,
    /// Raw Deflate stream (no zlib or gzip framing).
    Deflate,
}

impl CompressionAlgorithm {
    /// Wire tag of this algorithm.
    pub fn tag(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Deflate => 1,
        }
    }

    /// Parse a wire tag. Returns `None` for algorithms this build cannot decode.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::Deflate),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Deflate => f.write_str("deflate"),
        }
    }
}

/// A named, content-hashed blob inside a config archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigArchiveEntry {
    name: String,
    hash: ContentHash,
    bytes: Bytes,
}

impl ConfigArchiveEntry {
    /// Create an entry with a known hash.
    ///
    /// The caller guarantees `hash` is the content hash of `bytes`.
    pub fn new(name: impl Into<String>, hash: ContentHash, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            hash,
            bytes: bytes.into(),
        }
    }

    /// Create an entry, computing its hash from the payload.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let hash = ContentHash::compute_from_bytes(&bytes);
        Self {
            name: name.into(),
            hash,
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// Uncompressed payload.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns `true` if the stored hash matches the payload.
    pub fn verify(&self) -> bool {
        ContentHash::compute_from_bytes(&self.bytes) == self.hash
    }
}

/// Header of a single entry as stored in a binary archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryHeader {
    pub name: String,
    pub hash: ContentHash,
    pub compression: CompressionAlgorithm,
    /// Number of payload bytes stored in the archive (after compression).
    pub payload_length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_wire_format() {
        assert_eq!(CompressionAlgorithm::None.tag(), 0);
        assert_eq!(CompressionAlgorithm::Deflate.tag(), 1);
        assert_eq!(CompressionAlgorithm::from_tag(1), Some(CompressionAlgorithm::Deflate));
    }

    #[test]
    fn from_tag_unknown() {
        assert!(CompressionAlgorithm::from_tag(2).is_none());
        assert!(CompressionAlgorithm::from_tag(u32::MAX).is_none());
    }

    #[test]
    fn from_bytes_computes_hash() {
        let entry = ConfigArchiveEntry::from_bytes("Items", b"payload".to_vec());
        assert_eq!(entry.hash(), ContentHash::compute_from_bytes(b"payload"));
        assert_eq!(entry.name(), "Items");
        assert_eq!(entry.len(), 7);
        assert!(entry.verify());
    }

    #[test]
    fn verify_detects_wrong_hash() {
        let entry = ConfigArchiveEntry::new("Items", ContentHash::ONE, b"payload".to_vec());
        assert!(!entry.verify());
    }

    #[test]
    fn compression_parses_from_lowercase_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            c: CompressionAlgorithm,
        }
        let w: Wrapper = toml::from_str("c = \"deflate\"").unwrap();
        assert_eq!(w.c, CompressionAlgorithm::Deflate);
    }
}
