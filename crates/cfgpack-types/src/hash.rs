use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// 128-bit content fingerprint.
///
/// A `ContentHash` is the first 16 bytes of the BLAKE3 digest of some content,
/// split into two little-endian 64-bit halves. Identical content always
/// produces the same hash. [`ContentHash::ZERO`] never identifies real content;
/// it is reserved to mean "no content".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentHash {
    low: u64,
    high: u64,
}

impl ContentHash {
    /// The reserved "absent" hash.
    pub const ZERO: Self = Self { low: 0, high: 0 };

    /// Version of an archive with no entries.
    pub const ONE: Self = Self { low: 1, high: 0 };

    /// Create from the two 64-bit halves.
    pub const fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// Compute the content hash of raw bytes.
    pub fn compute_from_bytes(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        let bytes = digest.as_bytes();
        let mut low = [0u8; 8];
        let mut high = [0u8; 8];
        low.copy_from_slice(&bytes[0..8]);
        high.copy_from_slice(&bytes[8..16]);
        Self {
            low: u64::from_le_bytes(low),
            high: u64::from_le_bytes(high),
        }
    }

    pub const fn low(&self) -> u64 {
        self.low
    }

    pub const fn high(&self) -> u64 {
        self.high
    }

    /// Returns `true` for the reserved [`ContentHash::ZERO`].
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Fold a named hash into a running accumulator.
    ///
    /// The fold is order-dependent: the same `(name, hash)` pairs fed in a
    /// different order produce a different accumulator. All arithmetic wraps.
    pub fn fold(self, name: &str, hash: ContentHash) -> ContentHash {
        let name_hash = Self::compute_from_bytes(name.as_bytes());
        Self {
            low: self.low.wrapping_mul(7919) ^ name_hash.low ^ hash.low,
            high: self.high.wrapping_mul(1797) ^ name_hash.high ^ hash.high,
        }
    }

    /// Full hex-encoded string (32 characters, high half first).
    pub fn to_hex(&self) -> String {
        format!("{:016x}{:016x}", self.high, self.low)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        self.to_hex()[..8].to_string()
    }

    /// Parse from a 32-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 16 {
            return Err(TypeError::InvalidLength {
                expected: 16,
                actual: bytes.len(),
            });
        }
        let mut high = [0u8; 8];
        let mut low = [0u8; 8];
        high.copy_from_slice(&bytes[0..8]);
        low.copy_from_slice(&bytes[8..16]);
        Ok(Self {
            low: u64::from_be_bytes(low),
            high: u64::from_be_bytes(high),
        })
    }
}

/// Compute the version hash of an archive from its `(name, hash)` pairs.
///
/// Pairs are folded in the order given, so callers must pass entries in the
/// archive's canonical order to reproduce a stored version. A result of
/// [`ContentHash::ZERO`] is remapped to [`ContentHash::ONE`].
pub fn compute_version_hash_for_entries<'a, I>(entries: I) -> ContentHash
where
    I: IntoIterator<Item = (&'a str, ContentHash)>,
{
    let folded = entries
        .into_iter()
        .fold(ContentHash::ZERO, |acc, (name, hash)| acc.fold(name, hash));
    if folded.is_zero() {
        ContentHash::ONE
    } else {
        folded
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
