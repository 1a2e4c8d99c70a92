use bytes::Bytes;
use cfgpack_types::ContentHash;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::archive::{
    compute_version_hash, ensure_unique_names, test_archive_version, ConfigArchive,
};
use crate::compression::decompress_payload;
use crate::entry::{CompressionAlgorithm, ConfigArchiveEntry, EntryHeader};
use crate::error::{ArchiveError, ArchiveResult};
use crate::writer::{
    check_name_length, decode_varint, ARCHIVE_MAGIC, MAX_ENTRY_NAME_LENGTH, MIN_SCHEMA_VERSION,
    SCHEMA_VERSION,
};

/// First four bytes of a version pointer file, which is sometimes handed to
/// the archive reader by mistake.
const POINTER_FILE_PREFIX: &[u8; 4] = b"vers";

/// Archive-level header fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub schema_version: i32,
    /// Stored version hash. Absent before schema version 4.
    pub version: Option<ContentHash>,
    /// Creation time. The Unix epoch before schema version 3.
    pub created_at: DateTime<Utc>,
    pub entry_count: usize,
}

/// Sequential reader over the bytes of a binary archive.
#[derive(Debug)]
pub struct ArchiveReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ArchiveReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Read the archive header. Must be called first.
    pub fn read_archive_header(&mut self) -> ArchiveResult<ArchiveHeader> {
        let magic: [u8; 4] = self.read_array("magic")?;
        if &magic == POINTER_FILE_PREFIX {
            return Err(ArchiveError::PointerFileInsteadOfArchive);
        }
        let magic = u32::from_le_bytes(magic);
        if magic != ARCHIVE_MAGIC {
            return Err(ArchiveError::InvalidMagic {
                expected: ARCHIVE_MAGIC,
                actual: magic,
            });
        }

        let schema_version = self.read_i32("schema version")?;
        if schema_version > SCHEMA_VERSION {
            return Err(ArchiveError::SchemaTooNew {
                version: schema_version,
                max: SCHEMA_VERSION,
            });
        }
        if schema_version < MIN_SCHEMA_VERSION {
            return Err(ArchiveError::SchemaTooOld {
                version: schema_version,
                min: MIN_SCHEMA_VERSION,
            });
        }

        let version = if schema_version >= 4 {
            Some(self.read_hash("archive version")?)
        } else {
            None
        };

        let created_at = if schema_version >= 3 {
            let millis = self.read_i64("timestamp")?;
            DateTime::from_timestamp_millis(millis).ok_or(ArchiveError::InvalidTimestamp(millis))?
        } else {
            DateTime::<Utc>::from(std::time::UNIX_EPOCH)
        };

        let entry_count = self.read_len("entry count")?;

        Ok(ArchiveHeader {
            schema_version,
            version,
            created_at,
            entry_count,
        })
    }

    /// Read one entry header.
    pub fn read_entry_header(&mut self, schema_version: i32) -> ArchiveResult<EntryHeader> {
        let name = self.read_string()?;
        let hash = self.read_hash("entry hash")?;

        let tag = self.read_u32("compression")?;
        // Up to schema 4 this field held flags and payloads were never compressed.
        let tag = if schema_version <= 4 {
            CompressionAlgorithm::None.tag()
        } else {
            tag
        };

        let payload_length = self.read_len("payload length")?;
        let compression =
            CompressionAlgorithm::from_tag(tag).ok_or(ArchiveError::UnsupportedCompression(tag))?;

        Ok(EntryHeader {
            name,
            hash,
            compression,
            payload_length,
        })
    }

    /// Read `len` raw payload bytes.
    pub fn read_payload(&mut self, len: usize) -> ArchiveResult<&'a [u8]> {
        self.take(len, "entry payload")
    }

    fn take(&mut self, len: usize, what: &str) -> ArchiveResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ArchiveError::Truncated {
                offset: self.pos,
                reason: format!("{what} needs {len} bytes, {} left", self.remaining()),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self, what: &str) -> ArchiveResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn read_u32(&mut self, what: &str) -> ArchiveResult<u32> {
        Ok(u32::from_le_bytes(self.read_array(what)?))
    }

    fn read_i32(&mut self, what: &str) -> ArchiveResult<i32> {
        Ok(i32::from_le_bytes(self.read_array(what)?))
    }

    fn read_i64(&mut self, what: &str) -> ArchiveResult<i64> {
        Ok(i64::from_le_bytes(self.read_array(what)?))
    }

    fn read_u64(&mut self, what: &str) -> ArchiveResult<u64> {
        Ok(u64::from_le_bytes(self.read_array(what)?))
    }

    fn read_hash(&mut self, what: &str) -> ArchiveResult<ContentHash> {
        let low = self.read_u64(what)?;
        let high = self.read_u64(what)?;
        Ok(ContentHash::new(low, high))
    }

    fn read_len(&mut self, what: &str) -> ArchiveResult<usize> {
        let offset = self.pos;
        let value = self.read_i32(what)?;
        usize::try_from(value).map_err(|_| ArchiveError::Corrupt {
            offset,
            reason: format!("negative {what}: {value}"),
        })
    }

    fn read_string(&mut self) -> ArchiveResult<String> {
        let offset = self.pos;
        let (byte_len, consumed) = decode_varint(&self.data[self.pos..], offset)?;
        self.pos += consumed;

        // One UTF-16 code unit takes at most 3 UTF-8 bytes.
        let max_bytes = (MAX_ENTRY_NAME_LENGTH * 3) as u64;
        if byte_len > max_bytes {
            return Err(ArchiveError::NameTooLong {
                length: byte_len as usize,
                max: MAX_ENTRY_NAME_LENGTH,
            });
        }

        let raw = self.take(byte_len as usize, "entry name")?;
        let name = std::str::from_utf8(raw).map_err(|e| ArchiveError::Corrupt {
            offset,
            reason: format!("entry name is not UTF-8: {e}"),
        })?;
        check_name_length(name)?;
        Ok(name.to_string())
    }
}

/// Read only the archive-level header of a binary archive.
pub fn read_archive_header(data: &[u8]) -> ArchiveResult<ArchiveHeader> {
    ArchiveReader::new(data).read_archive_header()
}

/// Read the archive header followed by every entry header.
pub fn read_headers(data: &[u8]) -> ArchiveResult<(ArchiveHeader, Vec<EntryHeader>)> {
    let mut reader = ArchiveReader::new(data);
    let header = reader.read_archive_header()?;
    let entries = (0..header.entry_count)
        .map(|_| reader.read_entry_header(header.schema_version))
        .collect::<ArchiveResult<Vec<_>>>()?;
    Ok((header, entries))
}

/// Deserialize a binary archive and verify its version.
///
/// Compressed payloads are inflated. Archives older than schema version 4
/// carry no version; theirs is recomputed from the entries.
pub fn decode(data: &[u8]) -> ArchiveResult<ConfigArchive> {
    let mut reader = ArchiveReader::new(data);
    let header = reader.read_archive_header()?;

    let mut entry_headers = Vec::with_capacity(header.entry_count.min(4096));
    for _ in 0..header.entry_count {
        entry_headers.push(reader.read_entry_header(header.schema_version)?);
    }

    ensure_unique_names(entry_headers.iter().map(|h| h.name.as_str()))?;

    let mut entries = Vec::with_capacity(entry_headers.len());
    for entry in entry_headers {
        let stored = reader.read_payload(entry.payload_length)?;
        let payload = decompress_payload(stored, entry.compression)?;
        entries.push(ConfigArchiveEntry::new(
            entry.name,
            entry.hash,
            Bytes::copy_from_slice(&payload),
        ));
    }

    if reader.remaining() > 0 {
        warn!(
            trailing = reader.remaining(),
            "ignoring trailing bytes after config archive payloads"
        );
    }

    let version = header
        .version
        .unwrap_or_else(|| compute_version_hash(&entries));
    let archive = ConfigArchive::from_parts(version, header.created_at, entries);
    test_archive_version(&archive)?;

    debug!(
        %version,
        schema = header.schema_version,
        entries = archive.len(),
        "decoded config archive"
    );
    Ok(archive)
}

/// Check every entry's payload against its content hash.
pub fn verify_entries(archive: &ConfigArchive) -> ArchiveResult<()> {
    for entry in archive.entries() {
        let computed = ContentHash::compute_from_bytes(entry.bytes());
        if computed != entry.hash() {
            return Err(ArchiveError::EntryHashMismatch {
                name: entry.name().to_string(),
                expected: entry.hash(),
                computed,
            });
        }
    }
    Ok(())
}

impl ConfigArchive {
    /// Deserialize a binary archive. See [`decode`].
    pub fn from_bytes(data: &[u8]) -> ArchiveResult<Self> {
        decode(data)
    }
}
