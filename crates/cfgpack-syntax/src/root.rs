//! Top-level config items and alias hoisting.

use std::fmt;

use crate::error::{SyntaxError, SyntaxResult};
use crate::location::SourceLocation;
use crate::node::{NodeBase, NodeMemberId, ObjectNode};

/// Member carrying a row-style variant override list.
pub const VARIANT_MEMBER: &str = "/Variant";

/// Member carrying comma-separated alternate keys.
pub const ALIASES_MEMBER: &str = "/Aliases";

/// Identity of a top-level item: the raw values of its key columns.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Vec<String>);

impl ObjectId {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(key: &str) -> Self {
        Self(vec![key.to_string()])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.0.join("."))
    }
}

/// A top-level config item as produced by the sheet reader.
///
/// Before variant extraction the node may still hold variant-tagged members
/// at any depth. After extraction each `RootObject` describes exactly one
/// variant (or the baseline, when `variant_id` is `None`) and no member
/// anywhere in its tree carries a variant tag.
#[derive(Clone, Debug, PartialEq)]
pub struct RootObject {
    pub id: ObjectId,
    pub node: ObjectNode,
    pub location: Option<SourceLocation>,
    pub aliases: Option<String>,
    pub variant_id: Option<String>,
}

impl RootObject {
    /// A baseline object with no aliases.
    pub fn new(id: ObjectId, node: ObjectNode, location: Option<SourceLocation>) -> Self {
        Self {
            id,
            node,
            location,
            aliases: None,
            variant_id: None,
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.variant_id.is_none()
    }

    /// The aliases split into trimmed, non-empty keys.
    pub fn alias_list(&self) -> Vec<&str> {
        self.aliases
            .as_deref()
            .map(split_list)
            .unwrap_or_default()
    }

    /// Short human-readable identity including the variant, for diagnostics.
    pub fn describe(&self) -> String {
        match &self.variant_id {
            Some(variant) => format!("{} (variant {})", self.id, variant),
            None => self.id.to_string(),
        }
    }
}

/// Split a comma-separated list into trimmed, non-empty items.
pub(crate) fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

/// Hoist the `/Aliases` member of `obj` into its `aliases` field.
///
/// Returns the object unchanged when it has no `/Aliases` member. Calling this
/// on an object whose aliases were already hoisted is an error.
pub fn extract_aliases(obj: RootObject) -> SyntaxResult<RootObject> {
    if obj.aliases.is_some() {
        return Err(SyntaxError::AliasesAlreadyExtracted { id: obj.id });
    }

    let key = NodeMemberId::new(ALIASES_MEMBER);
    let aliases = match obj.node.members.get(&key) {
        None => return Ok(obj),
        Some(node) => match node.as_ref() {
            NodeBase::Scalar(scalar) => scalar.value.clone(),
            _ => {
                return Err(SyntaxError::ExpectedScalar {
                    id: obj.id,
                    member: ALIASES_MEMBER.to_string(),
                })
            }
        },
    };

    // Shallow copy of the top-level members only; subtrees stay shared.
    let mut node = obj.node;
    node.members.shift_remove(&key);

    Ok(RootObject {
        node,
        aliases: Some(aliases),
        ..obj
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indexmap::IndexMap;

    use super::*;
    use crate::node::{CollectionNode, ScalarNode};

    fn object_with(members: Vec<(&str, NodeBase)>) -> RootObject {
        let members: IndexMap<_, _> = members
            .into_iter()
            .map(|(name, node)| (NodeMemberId::new(name), Arc::new(node)))
            .collect();
        RootObject::new(ObjectId::from("Sword"), ObjectNode::new(members, None), None)
    }

    #[test]
    fn extracts_aliases_member() {
        let obj = object_with(vec![
            ("Damage", ScalarNode::new("10", None).into()),
            (ALIASES_MEMBER, ScalarNode::new("Blade, Sabre", None).into()),
            ("Weight", ScalarNode::new("3", None).into()),
        ]);
        let damage = Arc::clone(obj.node.member("Damage").unwrap());

        let out = extract_aliases(obj).unwrap();
        assert_eq!(out.aliases.as_deref(), Some("Blade, Sabre"));
        assert_eq!(out.alias_list(), vec!["Blade", "Sabre"]);
        assert!(out.node.member(ALIASES_MEMBER).is_none());
        let names: Vec<_> = out.node.members.keys().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["Damage", "Weight"]);
        assert!(Arc::ptr_eq(out.node.member("Damage").unwrap(), &damage));
    }

    #[test]
    fn object_without_aliases_is_returned_unchanged() {
        let obj = object_with(vec![("Damage", ScalarNode::new("10", None).into())]);
        let out = extract_aliases(obj.clone()).unwrap();
        assert_eq!(out, obj);
        assert!(out.aliases.is_none());
    }

    #[test]
    fn extracting_twice_fails() {
        let obj = object_with(vec![(ALIASES_MEMBER, ScalarNode::new("A", None).into())]);
        let once = extract_aliases(obj).unwrap();
        let err = extract_aliases(once).unwrap_err();
        assert!(matches!(err, SyntaxError::AliasesAlreadyExtracted { .. }));
    }

    #[test]
    fn non_scalar_aliases_fail() {
        let obj = object_with(vec![(ALIASES_MEMBER, CollectionNode::empty().into())]);
        let err = extract_aliases(obj).unwrap_err();
        assert!(matches!(err, SyntaxError::ExpectedScalar { .. }));
    }

    #[test]
    fn object_id_display_joins_parts() {
        let id = ObjectId::new(vec!["Level".into(), "3".into()]);
        assert_eq!(id.to_string(), "'Level.3'");
    }
}
