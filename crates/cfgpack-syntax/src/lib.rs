//! Config syntax trees for cfgpack.
//!
//! Sheet readers produce one multi-variant [`RootObject`] per item. This crate
//! turns those into single-variant objects ready for typed parsing:
//!
//! - [`extract_aliases`] hoists the `/Aliases` member into [`RootObject::aliases`]
//! - [`extract_variants`] expands column- and row-style variant overrides
//! - [`detect_duplicate_objects`] reports repeated `(id, variant)` pairs
//! - [`inherit_variant_values_from_baseline`] and
//!   [`inherit_key_value_variant_values_from_baseline`] back-fill variants
//!   from their baseline
//! - [`build_sheet_objects`] runs all of the above for one sheet

pub mod build_log;
pub mod error;
pub mod inheritance;
pub mod location;
pub mod node;
pub mod pipeline;
pub mod root;
pub mod variants;

pub use build_log::{
    detect_duplicate_objects, BuildLog, BuildMessage, BuildMessageLevel, CollectingBuildLog,
};
pub use error::{SyntaxError, SyntaxResult};
pub use inheritance::{
    copy_values, inherit_key_value_variant_values_from_baseline,
    inherit_variant_values_from_baseline,
};
pub use location::{CellRange, LocationResolver, SourceId, SourceLocation};
pub use node::{CollectionNode, NodeBase, NodeMemberId, NodeRef, ObjectNode, ScalarNode};
pub use pipeline::{build_sheet_objects, InheritancePolicy};
pub use root::{extract_aliases, ObjectId, RootObject, ALIASES_MEMBER, VARIANT_MEMBER};
pub use variants::{extract_variants, ExtractedVariants};
