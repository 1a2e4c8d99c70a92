//! Folder encoding: one file per entry plus a plain-text `Index.txt`.
//!
//! ```text
//! MetaplayArchive <version> <timestamp-millis>
//! <entry-name> <entry-hash>
//! ...
//! ```

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use cfgpack_types::ContentHash;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::archive::{ensure_unique_names, test_archive_version, ConfigArchive};
use crate::entry::ConfigArchiveEntry;
use crate::error::{ArchiveError, ArchiveResult};

/// Name of the index file inside an archive folder.
pub const INDEX_FILE_NAME: &str = "Index.txt";

/// Token at the start of the index file.
pub const INDEX_MAGIC: &str = "MetaplayArchive";

/// Parsed contents of `Index.txt`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderIndex {
    pub version: ContentHash,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<(String, ContentHash)>,
}

impl FolderIndex {
    pub fn from_archive(archive: &ConfigArchive) -> Self {
        Self {
            version: archive.version(),
            created_at: archive.created_at(),
            entries: archive
                .entries()
                .iter()
                .map(|e| (e.name().to_string(), e.hash()))
                .collect(),
        }
    }

    /// Render as index file text.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{INDEX_MAGIC} {} {}\n",
            self.version,
            self.created_at.timestamp_millis()
        );
        for (name, hash) in &self.entries {
            out.push_str(name);
            out.push(' ');
            out.push_str(&hash.to_hex());
            out.push('\n');
        }
        out
    }

    /// Parse index file text.
    pub fn parse(text: &str) -> ArchiveResult<Self> {
        let mut lines = text.lines().enumerate();

        let (_, header) = lines.next().ok_or(ArchiveError::MalformedIndex {
            line: 1,
            reason: "empty index".into(),
        })?;
        let malformed = |line: usize, reason: String| ArchiveError::MalformedIndex { line, reason };

        let fields: Vec<&str> = header.split_whitespace().collect();
        let [magic, version, millis] = fields[..] else {
            return Err(malformed(1, format!("expected 3 fields, found {}", fields.len())));
        };
        if magic != INDEX_MAGIC {
            return Err(malformed(1, format!("expected '{INDEX_MAGIC}', found '{magic}'")));
        }
        let version: ContentHash = version.parse()?;
        let millis: i64 = millis
            .parse()
            .map_err(|e| malformed(1, format!("bad timestamp '{millis}': {e}")))?;
        let created_at =
            DateTime::from_timestamp_millis(millis).ok_or(ArchiveError::InvalidTimestamp(millis))?;

        let mut entries = Vec::new();
        for (i, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            // Names may contain spaces; the hash never does.
            let (name, hash) = line
                .rsplit_once(' ')
                .ok_or_else(|| malformed(i + 1, "expected '<name> <hash>'".into()))?;
            validate_entry_name(name)?;
            entries.push((name.to_string(), hash.parse()?));
        }
        ensure_unique_names(entries.iter().map(|(name, _)| name.as_str()))?;

        Ok(Self {
            version,
            created_at,
            entries,
        })
    }
}

/// Reject names that would escape the folder or clash with the index.
pub fn validate_entry_name(name: &str) -> ArchiveResult<()> {
    let invalid = || ArchiveError::InvalidEntryName(name.to_string());
    if name.is_empty() || name.contains(['\n', '\r', '\\']) || name == INDEX_FILE_NAME {
        return Err(invalid());
    }
    let path = Path::new(name);
    if path.is_absolute()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(invalid());
    }
    Ok(())
}

fn entry_path(dir: &Path, name: &str) -> ArchiveResult<PathBuf> {
    validate_entry_name(name)?;
    Ok(dir.join(name))
}

fn load_entry(name: String, expected: ContentHash, bytes: Vec<u8>) -> ArchiveResult<ConfigArchiveEntry> {
    let computed = ContentHash::compute_from_bytes(&bytes);
    if computed != expected {
        warn!(%name, %expected, %computed, "entry file does not match its index hash");
        return Err(ArchiveError::EntryHashMismatch {
            name,
            expected,
            computed,
        });
    }
    Ok(ConfigArchiveEntry::new(name, computed, Bytes::from(bytes)))
}

fn finish_read(index: FolderIndex, entries: Vec<ConfigArchiveEntry>) -> ArchiveResult<ConfigArchive> {
    let archive = ConfigArchive::from_parts(index.version, index.created_at, entries);
    test_archive_version(&archive)?;
    Ok(archive)
}

/// Write `archive` into `dir`, creating it if needed. The index is written last.
pub fn write_to_folder(archive: &ConfigArchive, dir: impl AsRef<Path>) -> ArchiveResult<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    for entry in archive.entries() {
        let path = entry_path(dir, entry.name())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, entry.bytes())?;
    }
    std::fs::write(dir.join(INDEX_FILE_NAME), FolderIndex::from_archive(archive).render())?;
    debug!(dir = %dir.display(), entries = archive.len(), "wrote archive folder");
    Ok(())
}

/// Read an archive folder, verifying every entry hash and the version.
pub fn read_from_folder(dir: impl AsRef<Path>) -> ArchiveResult<ConfigArchive> {
    let dir = dir.as_ref();
    let index = FolderIndex::parse(&std::fs::read_to_string(dir.join(INDEX_FILE_NAME))?)?;
    let mut entries = Vec::with_capacity(index.entries.len());
    for (name, hash) in &index.entries {
        let bytes = std::fs::read(entry_path(dir, name)?)?;
        entries.push(load_entry(name.clone(), *hash, bytes)?);
    }
    debug!(dir = %dir.display(), entries = entries.len(), "read archive folder");
    finish_read(index, entries)
}

/// Async form of [`write_to_folder`]. Produces identical files.
pub async fn write_to_folder_async(archive: &ConfigArchive, dir: impl AsRef<Path>) -> ArchiveResult<()> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;
    for entry in archive.entries() {
        let path = entry_path(dir, entry.name())?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, entry.bytes()).await?;
    }
    tokio::fs::write(
        dir.join(INDEX_FILE_NAME),
        FolderIndex::from_archive(archive).render(),
    )
    .await?;
    debug!(dir = %dir.display(), entries = archive.len(), "wrote archive folder");
    Ok(())
}

/// Async form of [`read_from_folder`].
pub async fn read_from_folder_async(dir: impl AsRef<Path>) -> ArchiveResult<ConfigArchive> {
    let dir = dir.as_ref();
    let text = tokio::fs::read_to_string(dir.join(INDEX_FILE_NAME)).await?;
    let index = FolderIndex::parse(&text)?;
    let mut entries = Vec::with_capacity(index.entries.len());
    for (name, hash) in &index.entries {
        let bytes = tokio::fs::read(entry_path(dir, name)?).await?;
        entries.push(load_entry(name.clone(), *hash, bytes)?);
    }
    debug!(dir = %dir.display(), entries = entries.len(), "read archive folder");
    finish_read(index, entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigArchive {
        let created_at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        ConfigArchive::new(
            created_at,
            vec![
                ConfigArchiveEntry::from_bytes("Shared.mpc", b"shared".to_vec()),
                ConfigArchiveEntry::from_bytes("Items/Weapons.mpc", b"sword".to_vec()),
                ConfigArchiveEntry::from_bytes("Empty.mpc", Vec::new()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn folder_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = sample();
        write_to_folder(&archive, dir.path()).unwrap();

        assert!(dir.path().join("Items/Weapons.mpc").exists());
        let read = read_from_folder(dir.path()).unwrap();
        assert_eq!(read, archive);
    }

    #[test]
    fn index_layout() {
        let archive = sample();
        let text = FolderIndex::from_archive(&archive).render();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            format!("MetaplayArchive {} 1700000000000", archive.version())
        );
        let first = &archive.entries()[0];
        assert_eq!(lines.next().unwrap(), format!("{} {}", first.name(), first.hash()));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn index_parse_roundtrip_with_spaces_in_names() {
        let index = FolderIndex {
            version: ContentHash::new(5, 6),
            created_at: DateTime::from_timestamp_millis(42).unwrap(),
            entries: vec![("My Items.mpc".into(), ContentHash::new(1, 2))],
        };
        assert_eq!(FolderIndex::parse(&index.render()).unwrap(), index);
    }

    #[test]
    fn bad_index_magic() {
        let err = FolderIndex::parse("SomethingElse 0 0\n").unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedIndex { line: 1, .. }));
    }

    #[test]
    fn bad_index_hash() {
        let text = format!("{INDEX_MAGIC} {} 0\nA nothex\n", ContentHash::ONE);
        let err = FolderIndex::parse(&text).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidHash(_)));
    }

    #[test]
    fn repeated_index_names_are_rejected() {
        let hash = ContentHash::compute_from_bytes(b"x");
        let text = format!("{INDEX_MAGIC} {} 0\nA {hash}\nB {hash}\nA {hash}\n", ContentHash::ONE);
        let err = FolderIndex::parse(&text).unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntryName(name) if name == "A"));
    }

    #[test]
    fn tampered_file_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        write_to_folder(&sample(), dir.path()).unwrap();
        std::fs::write(dir.path().join("Shared.mpc"), b"edited").unwrap();

        let err = read_from_folder(dir.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::EntryHashMismatch { name, .. } if name == "Shared.mpc"));
    }

    #[test]
    fn tampered_version_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = sample();
        write_to_folder(&archive, dir.path()).unwrap();
        let index_path = dir.path().join(INDEX_FILE_NAME);
        let text = std::fs::read_to_string(&index_path)
            .unwrap()
            .replace(&archive.version().to_hex(), &ContentHash::new(9, 9).to_hex());
        std::fs::write(&index_path, text).unwrap();

        let err = read_from_folder(dir.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::VersionMismatch { .. }));
    }

    #[test]
    fn escaping_names_are_rejected() {
        for name in ["../outside", "a/../../b", "/etc/passwd", "", "Index.txt", "a\\b"] {
            assert!(
                matches!(validate_entry_name(name), Err(ArchiveError::InvalidEntryName(_))),
                "{name:?} should be rejected"
            );
        }
        assert!(validate_entry_name("Items/Weapons.mpc").is_ok());

        let dir = tempfile::tempdir().unwrap();
        let archive = ConfigArchive::new(
            Utc::now(),
            vec![ConfigArchiveEntry::from_bytes("../escape", b"x".to_vec())],
        )
        .unwrap();
        assert!(write_to_folder(&archive, dir.path()).is_err());
    }

    #[test]
    fn missing_index_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_from_folder(dir.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
    }

    #[tokio::test]
    async fn async_matches_blocking() {
        let archive = sample();
        let sync_dir = tempfile::tempdir().unwrap();
        let async_dir = tempfile::tempdir().unwrap();

        write_to_folder(&archive, sync_dir.path()).unwrap();
        write_to_folder_async(&archive, async_dir.path()).await.unwrap();

        for file in [INDEX_FILE_NAME, "Shared.mpc", "Items/Weapons.mpc", "Empty.mpc"] {
            assert_eq!(
                std::fs::read(sync_dir.path().join(file)).unwrap(),
                std::fs::read(async_dir.path().join(file)).unwrap(),
                "{file} differs"
            );
        }

        let read = read_from_folder_async(async_dir.path()).await.unwrap();
        assert_eq!(read, archive);
    }
}
