//! The in-memory config archive and its canonical entry order.

use std::cmp::Ordering;
use std::collections::HashSet;

use bytes::Bytes;
use cfgpack_types::{compute_version_hash_for_entries, ContentHash};
use chrono::{DateTime, Utc};
use icu_collator::{Collator, CollatorOptions, Strength};
use tracing::warn;

use crate::entry::ConfigArchiveEntry;
use crate::error::{ArchiveError, ArchiveResult};

/// An immutable, versioned bundle of named entries.
///
/// Entries are kept in canonical order (see [`sort_entries`]) and the
/// `version` is the fold of their `(name, hash)` pairs in that order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigArchive {
    version: ContentHash,
    created_at: DateTime<Utc>,
    entries: Vec<ConfigArchiveEntry>,
}

impl ConfigArchive {
    /// Build an archive, sorting the entries and computing the version.
    ///
    /// Fails if two entries share a name.
    pub fn new(created_at: DateTime<Utc>, mut entries: Vec<ConfigArchiveEntry>) -> ArchiveResult<Self> {
        sort_entries(&mut entries)?;
        ensure_unique_names(entries.iter().map(ConfigArchiveEntry::name))?;
        let version = compute_version_hash(&entries);
        Ok(Self {
            version,
            created_at,
            entries,
        })
    }

    /// Assemble an archive from stored parts without reordering or rehashing.
    ///
    /// Use [`test_archive_version`] to check that `version` matches.
    pub fn from_parts(
        version: ContentHash,
        created_at: DateTime<Utc>,
        entries: Vec<ConfigArchiveEntry>,
    ) -> Self {
        Self {
            version,
            created_at,
            entries,
        }
    }

    /// An archive with no entries. Its version is [`ContentHash::ONE`].
    pub fn empty(created_at: DateTime<Utc>) -> Self {
        Self {
            version: compute_version_hash(&[]),
            created_at,
            entries: Vec::new(),
        }
    }

    pub fn version(&self) -> ContentHash {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn entries(&self) -> &[ConfigArchiveEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ConfigArchiveEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by exact name.
    pub fn entry(&self, name: &str) -> Option<&ConfigArchiveEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Payload of the named entry.
    pub fn entry_bytes(&self, name: &str) -> Option<&Bytes> {
        self.entry(name).map(ConfigArchiveEntry::bytes)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Version recomputed from the entries in their stored order.
    pub fn computed_version(&self) -> ContentHash {
        compute_version_hash(&self.entries)
    }
}

/// Fold the `(name, hash)` pairs of `entries` into a version hash.
///
/// The fold is order-sensitive and this function does not sort: pass entries
/// in canonical order to reproduce an archive's stored version.
pub fn compute_version_hash(entries: &[ConfigArchiveEntry]) -> ContentHash {
    compute_version_hash_for_entries(entries.iter().map(|e| (e.name(), e.hash())))
}

/// Check that an archive's stored version matches its entries.
pub fn test_archive_version(archive: &ConfigArchive) -> ArchiveResult<()> {
    let computed = archive.computed_version();
    if computed != archive.version() {
        warn!(
            stored = %archive.version(),
            %computed,
            "config archive version does not match its contents"
        );
        return Err(ArchiveError::VersionMismatch {
            stored: archive.version(),
            computed,
        });
    }
    Ok(())
}

/// Fail with [`ArchiveError::DuplicateEntryName`] on the first repeated name.
pub(crate) fn ensure_unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> ArchiveResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ArchiveError::DuplicateEntryName(name.to_string()));
        }
    }
    Ok(())
}

/// Comparer for entry names.
///
/// Names are ordered by Unicode root-locale collation at tertiary strength,
/// which is what culture-invariant string comparison resolves to. Names the
/// collator considers equal are ordered by code point so the order is total.
pub struct EntryNameOrder {
    collator: Collator,
}

impl EntryNameOrder {
    pub fn new() -> ArchiveResult<Self> {
        let mut options = CollatorOptions::new();
        options.strength = Some(Strength::Tertiary);
        let collator = Collator::try_new(&Default::default(), options)
            .map_err(|e| ArchiveError::Config(format!("cannot create name collator: {e}")))?;
        Ok(Self { collator })
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.collator.compare(a, b).then_with(|| a.cmp(b))
    }
}

/// Sort entries into canonical archive order.
pub fn sort_entries(entries: &mut [ConfigArchiveEntry]) -> ArchiveResult<()> {
    let order = EntryNameOrder::new()?;
    entries.sort_by(|a, b| order.compare(a.name(), b.name()));
    Ok(())
}
