use std::borrow::Cow;
use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::entry::CompressionAlgorithm;
use crate::error::{ArchiveError, ArchiveResult};

/// Compress a payload for storage.
///
/// Payloads no longer than `min_size` are stored as-is. A compressed payload
/// is only kept if it is strictly smaller than the original; otherwise the
/// original is stored with [`CompressionAlgorithm::None`].
pub fn compress_payload(
    bytes: &[u8],
    compression: CompressionAlgorithm,
    min_size: usize,
) -> ArchiveResult<(CompressionAlgorithm, Cow<'_, [u8]>)> {
    match compression {
        CompressionAlgorithm::Deflate if bytes.len() > min_size => {
            let compressed = deflate(bytes)?;
            if compressed.len() < bytes.len() {
                Ok((CompressionAlgorithm::Deflate, Cow::Owned(compressed)))
            } else {
                Ok((CompressionAlgorithm::None, Cow::Borrowed(bytes)))
            }
        }
        _ => Ok((CompressionAlgorithm::None, Cow::Borrowed(bytes))),
    }
}

/// Undo [`compress_payload`].
pub fn decompress_payload(
    bytes: &[u8],
    compression: CompressionAlgorithm,
) -> ArchiveResult<Cow<'_, [u8]>> {
    match compression {
        CompressionAlgorithm::None => Ok(Cow::Borrowed(bytes)),
        CompressionAlgorithm::Deflate => Ok(Cow::Owned(inflate(bytes)?)),
    }
}

fn deflate(bytes: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| ArchiveError::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ArchiveError::CompressionFailed(e.to_string()))
}

/// Largest payload an entry may inflate to: the largest length the archive
/// format can record for an uncompressed payload.
pub const MAX_INFLATED_SIZE: u64 = i32::MAX as u64;

fn inflate(bytes: &[u8]) -> ArchiveResult<Vec<u8>> {
    inflate_limited(bytes, MAX_INFLATED_SIZE)
}

fn inflate_limited(bytes: &[u8], limit: u64) -> ArchiveResult<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(bytes)
        .take(limit + 1)
        .read_to_end(&mut out)
        .map_err(|e| ArchiveError::DecompressionFailed(e.to_string()))?;
    if out.len() as u64 > limit {
        return Err(ArchiveError::DecompressionFailed(format!(
            "payload inflates past {limit} bytes"
        )));
    }
    Ok(out)
}
