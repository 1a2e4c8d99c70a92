//! Source locations for syntax tree nodes.
//!
//! A [`SourceLocation`] points at a rectangular cell range within one source
//! sheet. Locations are used to point validation errors at the tightest known
//! range of cells.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the sheet a location belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Half-open range of row or column indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub start: u32,
    pub end: u32,
}

impl CellRange {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "cell range start after end");
        Self { start, end }
    }

    /// A range covering exactly one index.
    pub fn single(index: u32) -> Self {
        Self::new(index, index.saturating_add(1))
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Overlapping part of both ranges, or `None` if they are disjoint.
    pub fn intersect(&self, other: &CellRange) -> Option<CellRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(CellRange { start, end })
    }
}

/// A rectangular range of cells within a source sheet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub source: SourceId,
    pub rows: CellRange,
    pub columns: CellRange,
}

impl SourceLocation {
    pub fn new(source: SourceId, rows: CellRange, columns: CellRange) -> Self {
        Self {
            source,
            rows,
            columns,
        }
    }

    /// Location of a single cell.
    pub fn cell(source: SourceId, row: u32, column: u32) -> Self {
        Self::new(source, CellRange::single(row), CellRange::single(column))
    }

    /// Bounding location of both, or `None` if they come from different sources.
    pub fn union(&self, other: &SourceLocation) -> Option<SourceLocation> {
        if self.source != other.source {
            return None;
        }
        Some(SourceLocation {
            source: self.source.clone(),
            rows: self.rows.union(&other.rows),
            columns: self.columns.union(&other.columns),
        })
    }

    /// Narrow this location to the part covered by `sub`.
    ///
    /// Fails if the sources differ or the ranges do not overlap.
    pub fn narrow(&self, sub: &SourceLocation) -> Option<SourceLocation> {
        if self.source != sub.source {
            return None;
        }
        Some(SourceLocation {
            source: self.source.clone(),
            rows: self.rows.intersect(&sub.rows)?,
            columns: self.columns.intersect(&sub.columns)?,
        })
    }

    /// Bounding location of every location in the iterator.
    ///
    /// Locations from a source other than the first one's are skipped.
    pub fn union_all<'a, I>(locations: I) -> Option<SourceLocation>
    where
        I: IntoIterator<Item = &'a SourceLocation>,
    {
        let mut iter = locations.into_iter();
        let first = iter.next()?.clone();
        Some(iter.fold(first, |acc, loc| acc.union(loc).unwrap_or(acc)))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:rows {}..{}:cols {}..{}",
            self.source, self.rows.start, self.rows.end, self.columns.start, self.columns.end
        )
    }
}

/// Resolves a config item reference into a source location for diagnostics.
pub trait LocationResolver {
    /// Look up the location of `config_key` in `sheet_name`, narrowed to the
    /// member named by `member_path_hint` when one is given.
    fn resolve(
        &self,
        sheet_name: &str,
        config_key: Option<&str>,
        member_path_hint: Option<&str>,
    ) -> Option<SourceLocation>;
}
