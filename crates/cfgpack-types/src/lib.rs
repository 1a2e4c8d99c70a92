//! Foundation types for cfgpack.
//!
//! Every other cfgpack crate depends on `cfgpack-types` for the content hash
//! used to identify archive entries and whole archives.
//!
//! # Key Types
//!
//! - [`ContentHash`]: 128-bit content fingerprint; `ZERO` is reserved for "none"
//! - [`compute_version_hash_for_entries`]: order-sensitive archive version fold

pub mod error;
pub mod hash;

pub use error::TypeError;
pub use hash::{compute_version_hash_for_entries, ContentHash};
