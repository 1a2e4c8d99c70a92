use thiserror::Error;

use crate::root::ObjectId;

/// Structural errors in a config syntax tree.
///
/// Each of these is fatal to the single item being processed: the tree is
/// malformed at the source and must be fixed there.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("object {id} has already had its variants extracted (variant '{variant_id}')")]
    AlreadyExtracted { id: ObjectId, variant_id: String },

    #[error("member '{member}' of {id}: variants nested inside variants are unsupported")]
    NestedVariants { id: ObjectId, member: String },

    #[error("member '{member}' of {id} is defined more than once for variant '{variant_id}'")]
    ConflictingVariantMember {
        id: ObjectId,
        member: String,
        variant_id: String,
    },

    #[error("object {id} mixes a /Variant row override with column variant '{variant_id}'")]
    RowOverrideWithColumnVariants { id: ObjectId, variant_id: String },

    #[error("object {id} has a /Variant member with no variant ids")]
    EmptyVariantList { id: ObjectId },

    #[error("object {id}: member '{member}' must be a scalar")]
    ExpectedScalar { id: ObjectId, member: String },

    #[error("object {id} already has aliases extracted")]
    AliasesAlreadyExtracted { id: ObjectId },

    #[error("member '{member}' is an object in the baseline but not in the variant")]
    ShapeMismatch { member: String },

    #[error("member '{member}' still carries variant '{variant_id}'; run variant extraction first")]
    UnextractedVariant { member: String, variant_id: String },

    #[error("expected at most one baseline object, found {count}")]
    MultipleBaselines { count: usize },
}

/// Result alias for syntax tree operations.
pub type SyntaxResult<T> = Result<T, SyntaxError>;
