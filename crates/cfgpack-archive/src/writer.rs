use cfgpack_types::ContentHash;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::archive::{compute_version_hash, ensure_unique_names, sort_entries, ConfigArchive};
use crate::compression::compress_payload;
use crate::config::ArchiveConfig;
use crate::entry::{CompressionAlgorithm, ConfigArchiveEntry};
use crate::error::{ArchiveError, ArchiveResult};

/// Magic number at the start of every binary archive ("MCA!").
pub const ARCHIVE_MAGIC: u32 = 0x4D43_4121;

/// Schema version written by this build.
pub const SCHEMA_VERSION: i32 = 5;

/// Oldest schema version this build can read.
pub const MIN_SCHEMA_VERSION: i32 = 2;

/// Maximum entry name length, in UTF-16 code units.
pub const MAX_ENTRY_NAME_LENGTH: usize = 1024;

/// Builds a binary archive from a set of entries.
pub struct ArchiveWriter {
    created_at: DateTime<Utc>,
    compression: CompressionAlgorithm,
    min_size_for_compression: usize,
    entries: Vec<ConfigArchiveEntry>,
}

impl ArchiveWriter {
    /// Create a writer that stores payloads uncompressed.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            compression: CompressionAlgorithm::None,
            min_size_for_compression: 0,
            entries: Vec::new(),
        }
    }

    /// Compress payloads longer than `min_size` with `compression`.
    pub fn with_compression(mut self, compression: CompressionAlgorithm, min_size: usize) -> Self {
        self.compression = compression;
        self.min_size_for_compression = min_size;
        self
    }

    /// Apply compression settings from a config.
    pub fn with_config(self, config: &ArchiveConfig) -> Self {
        self.with_compression(config.compression, config.min_size_for_compression)
    }

    /// Add an entry to the archive.
    pub fn add_entry(&mut self, entry: ConfigArchiveEntry) {
        self.entries.push(entry);
    }

    /// Number of entries queued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the archive. Returns its version and the serialized bytes.
    pub fn finish(self) -> ArchiveResult<(ContentHash, Vec<u8>)> {
        encode(
            self.created_at,
            self.entries,
            self.compression,
            self.min_size_for_compression,
        )
    }
}

impl ConfigArchive {
    /// Serialize this archive with the given compression settings.
    pub fn to_bytes(&self, config: &ArchiveConfig) -> ArchiveResult<Vec<u8>> {
        let (_, bytes) = encode(
            self.created_at(),
            self.entries().to_vec(),
            config.compression,
            config.min_size_for_compression,
        )?;
        Ok(bytes)
    }
}

/// Serialize entries into a binary archive.
///
/// Entries are sorted into canonical order first, so the returned version is
/// independent of the order they were passed in.
pub fn encode(
    created_at: DateTime<Utc>,
    mut entries: Vec<ConfigArchiveEntry>,
    compression: CompressionAlgorithm,
    min_size_for_compression: usize,
) -> ArchiveResult<(ContentHash, Vec<u8>)> {
    sort_entries(&mut entries)?;
    ensure_unique_names(entries.iter().map(ConfigArchiveEntry::name))?;
    let version = compute_version_hash(&entries);

    let mut payloads = Vec::with_capacity(entries.len());
    for entry in &entries {
        check_name_length(entry.name())?;
        payloads.push(compress_payload(
            entry.bytes(),
            compression,
            min_size_for_compression,
        )?);
    }

    let payload_total: usize = payloads.iter().map(|(_, p)| p.len()).sum();
    let mut buf = Vec::with_capacity(64 + entries.len() * 64 + payload_total);

    // Header: magic + schema + version + timestamp + entry count
    buf.extend_from_slice(&ARCHIVE_MAGIC.to_le_bytes());
    buf.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    write_hash(&mut buf, version);
    buf.extend_from_slice(&created_at.timestamp_millis().to_le_bytes());
    write_i32_len(&mut buf, entries.len())?;

    for (entry, (algorithm, payload)) in entries.iter().zip(&payloads) {
        write_string(&mut buf, entry.name());
        write_hash(&mut buf, entry.hash());
        buf.extend_from_slice(&algorithm.tag().to_le_bytes());
        write_i32_len(&mut buf, payload.len())?;
    }

    for (_, payload) in &payloads {
        buf.extend_from_slice(payload);
    }

    debug!(
        %version,
        entries = entries.len(),
        %compression,
        bytes = buf.len(),
        "encoded config archive"
    );
    Ok((version, buf))
}

/// Names are limited in UTF-16 code units, so characters outside the Basic
/// Multilingual Plane count twice.
pub(crate) fn check_name_length(name: &str) -> ArchiveResult<()> {
    let length = name.encode_utf16().count();
    if length > MAX_ENTRY_NAME_LENGTH {
        return Err(ArchiveError::NameTooLong {
            length,
            max: MAX_ENTRY_NAME_LENGTH,
        });
    }
    Ok(())
}

fn write_hash(buf: &mut Vec<u8>, hash: ContentHash) {
    buf.extend_from_slice(&hash.low().to_le_bytes());
    buf.extend_from_slice(&hash.high().to_le_bytes());
}

fn write_i32_len(buf: &mut Vec<u8>, len: usize) -> ArchiveResult<()> {
    let value = i32::try_from(len).map_err(|_| ArchiveError::Corrupt {
        offset: buf.len(),
        reason: format!("length {len} does not fit in 32 bits"),
    })?;
    buf.extend_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Write a string as its UTF-8 byte length (varint) followed by the bytes.
fn write_string(buf: &mut Vec<u8>, value: &str) {
    encode_varint(buf, value.len() as u64);
    buf.extend_from_slice(value.as_bytes());
}

/// Encode a u64 as a variable-length integer.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer. Returns (value, bytes_consumed).
pub(crate) fn decode_varint(data: &[u8], offset: usize) -> ArchiveResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(ArchiveError::Corrupt {
                offset,
                reason: "varint overflow".into(),
            });
        }
    }
    Err(ArchiveError::Truncated {
        offset,
        reason: "truncated varint".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from(std::time::UNIX_EPOCH)
    }

    #[test]
    fn varint_roundtrip_small() {
        let mut buf = Vec::new();
        encode_varint(&mut buf, 42);
        let (val, consumed) = decode_varint(&buf, 0).unwrap();
        assert_eq!(val, 42);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn varint_max_u64() {
        let mut buf = Vec::new();
        encode_varint(&mut buf, u64::MAX);
        let (val, _) = decode_varint(&buf, 0).unwrap();
        assert_eq!(val, u64::MAX);
    }

    #[test]
    fn decode_varint_truncated() {
        let err = decode_varint(&[0x80], 7).unwrap_err();
        assert!(matches!(err, ArchiveError::Truncated { offset: 7, .. }));
    }

    #[test]
    fn empty_archive_layout() {
        let (version, bytes) = encode(epoch(), vec![], CompressionAlgorithm::None, 0).unwrap();
        assert_eq!(version, ContentHash::ONE);
        // magic + schema + hash + timestamp + count
        assert_eq!(bytes.len(), 4 + 4 + 16 + 8 + 4);
        assert_eq!(&bytes[0..4], &[0x21, 0x41, 0x43, 0x4D]);
        assert_eq!(&bytes[4..8], &5i32.to_le_bytes());
        assert_eq!(&bytes[8..16], &1u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &0u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &0i64.to_le_bytes());
        assert_eq!(&bytes[32..36], &0i32.to_le_bytes());
    }

    #[test]
    fn headers_precede_payloads() {
        let entries = vec![
            ConfigArchiveEntry::from_bytes("B", b"bbb".to_vec()),
            ConfigArchiveEntry::from_bytes("A", b"aa".to_vec()),
        ];
        let (_, bytes) = encode(epoch(), entries, CompressionAlgorithm::None, 0).unwrap();
        // header 36 + per entry: 1 (len) + 1 (name) + 16 + 4 + 4
        let headers_end = 36 + 2 * 26;
        assert_eq!(bytes.len(), headers_end + 5);
        assert_eq!(&bytes[headers_end..], b"aabbb");
        assert_eq!(&bytes[36..38], &[1, b'A']);
    }

    #[test]
    fn overlong_name_is_rejected() {
        let name = "x".repeat(MAX_ENTRY_NAME_LENGTH + 1);
        let entries = vec![ConfigArchiveEntry::from_bytes(name, b"x".to_vec())];
        let err = encode(epoch(), entries, CompressionAlgorithm::None, 0).unwrap_err();
        assert!(matches!(err, ArchiveError::NameTooLong { length: 1025, max: 1024 }));
    }

    #[test]
    fn name_limit_counts_code_units_not_bytes() {
        let name = "ä".repeat(MAX_ENTRY_NAME_LENGTH);
        let entries = vec![ConfigArchiveEntry::from_bytes(name, b"x".to_vec())];
        assert!(encode(epoch(), entries, CompressionAlgorithm::None, 0).is_ok());
    }

    #[test]
    fn name_limit_counts_utf16_units() {
        // Each emoji is a surrogate pair.
        let name = "\u{1F600}".repeat(MAX_ENTRY_NAME_LENGTH / 2 + 1);
        assert_eq!(name.chars().count(), 513);
        let entries = vec![ConfigArchiveEntry::from_bytes(name, b"x".to_vec())];
        let err = encode(epoch(), entries, CompressionAlgorithm::None, 0).unwrap_err();
        assert!(matches!(err, ArchiveError::NameTooLong { length: 1026, .. }));

        let fits = "\u{1F600}".repeat(MAX_ENTRY_NAME_LENGTH / 2);
        assert!(check_name_length(&fits).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let entries = vec![
            ConfigArchiveEntry::from_bytes("A", b"first".to_vec()),
            ConfigArchiveEntry::from_bytes("A", b"second".to_vec()),
        ];
        let err = encode(epoch(), entries, CompressionAlgorithm::None, 0).unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntryName(name) if name == "A"));

        let mut writer = ArchiveWriter::new(epoch());
        writer.add_entry(ConfigArchiveEntry::from_bytes("B", b"1".to_vec()));
        writer.add_entry(ConfigArchiveEntry::from_bytes("B", b"1".to_vec()));
        assert!(matches!(writer.finish(), Err(ArchiveError::DuplicateEntryName(_))));
    }

    #[test]
    fn writer_matches_encode() {
        let mut writer = ArchiveWriter::new(epoch()).with_compression(CompressionAlgorithm::Deflate, 8);
        writer.add_entry(ConfigArchiveEntry::from_bytes("Items", vec![7u8; 100]));
        assert_eq!(writer.len(), 1);
        let (version, bytes) = writer.finish().unwrap();

        let (version2, bytes2) = encode(
            epoch(),
            vec![ConfigArchiveEntry::from_bytes("Items", vec![7u8; 100])],
            CompressionAlgorithm::Deflate,
            8,
        )
        .unwrap();
        assert_eq!(version, version2);
        assert_eq!(bytes, bytes2);
        assert!(bytes.len() < 36 + 26 + 100);
    }
}
