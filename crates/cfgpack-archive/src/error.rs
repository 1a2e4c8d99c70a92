use cfgpack_types::{ContentHash, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive magic: expected 0x{expected:08x}, got 0x{actual:08x}")]
    InvalidMagic { expected: u32, actual: u32 },

    #[error("data starts with 'vers': this is a version pointer file, not a config archive")]
    PointerFileInsteadOfArchive,

    #[error("archive schema version {version} is newer than the newest supported ({max})")]
    SchemaTooNew { version: i32, max: i32 },

    #[error("archive schema version {version} is older than the oldest supported ({min})")]
    SchemaTooOld { version: i32, min: i32 },

    #[error("entry name is {length} characters, the maximum is {max}")]
    NameTooLong { length: usize, max: usize },

    #[error("invalid entry name '{0}'")]
    InvalidEntryName(String),

    #[error("duplicate entry name '{0}'")]
    DuplicateEntryName(String),

    #[error("unsupported compression algorithm tag {0}")]
    UnsupportedCompression(u32),

    #[error("unexpected end of archive at offset {offset}: {reason}")]
    Truncated { offset: usize, reason: String },

    #[error("corrupt archive at offset {offset}: {reason}")]
    Corrupt { offset: usize, reason: String },

    #[error("archive version mismatch: stored {stored}, computed {computed}")]
    VersionMismatch {
        stored: ContentHash,
        computed: ContentHash,
    },

    #[error("content hash mismatch for entry '{name}': expected {expected}, computed {computed}")]
    EntryHashMismatch {
        name: String,
        expected: ContentHash,
        computed: ContentHash,
    },

    #[error("invalid timestamp: {0} ms")]
    InvalidTimestamp(i64),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("malformed folder index at line {line}: {reason}")]
    MalformedIndex { line: usize, reason: String },

    #[error("invalid hash: {0}")]
    InvalidHash(#[from] TypeError),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
