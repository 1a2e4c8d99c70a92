//! Config archive format for cfgpack.
//!
//! A config archive is an immutable bundle of named, content-hashed blobs
//! whose version is the fold of every `(name, hash)` pair in canonical name
//! order.
//!
//! # Architecture
//!
//! - **Binary form**: header, per-entry headers, then payloads; payloads may be
//!   Deflate-compressed when that makes them smaller
//! - **Folder form** (`Index.txt` + one file per entry): for inspection and diffing
//! - **ArchiveWriter** / [`encode`]: build the binary form from entries
//! - **ArchiveReader** / [`decode`]: parse any schema version from 2 to 5

pub mod archive;
pub mod compression;
pub mod config;
pub mod entry;
pub mod error;
pub mod folder;
pub mod reader;
pub mod writer;

pub use archive::{compute_version_hash, sort_entries, test_archive_version, ConfigArchive, EntryNameOrder};
pub use compression::{compress_payload, decompress_payload};
pub use config::ArchiveConfig;
pub use entry::{CompressionAlgorithm, ConfigArchiveEntry, EntryHeader};
pub use error::{ArchiveError, ArchiveResult};
pub use folder::{
    read_from_folder, read_from_folder_async, write_to_folder, write_to_folder_async, FolderIndex,
    INDEX_FILE_NAME,
};
pub use reader::{decode, read_archive_header, read_headers, verify_entries, ArchiveHeader, ArchiveReader};
pub use writer::{encode, ArchiveWriter, ARCHIVE_MAGIC, MAX_ENTRY_NAME_LENGTH, MIN_SCHEMA_VERSION, SCHEMA_VERSION};
