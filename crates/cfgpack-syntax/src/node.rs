//! The config syntax tree.
//!
//! A tree is built from three node kinds: [`ScalarNode`] leaves holding a raw
//! string, ordered [`CollectionNode`]s, and [`ObjectNode`]s whose members are
//! keyed by [`NodeMemberId`]. A member id may carry a variant tag, in which
//! case the member is an override that only applies to that variant.
//!
//! Child links are [`NodeRef`]s, so transformations can share unchanged
//! subtrees with their input instead of copying them.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::location::SourceLocation;

/// Shared reference to a node.
pub type NodeRef = Arc<NodeBase>;

/// Identity of an object member: its name plus an optional variant tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeMemberId {
    pub name: String,
    pub variant_id: Option<String>,
}

impl NodeMemberId {
    /// A plain (non-variant) member id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant_id: None,
        }
    }

    /// A member id that overrides the member for one variant.
    pub fn with_variant(name: impl Into<String>, variant_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant_id: Some(variant_id.into()),
        }
    }

    pub fn is_variant(&self) -> bool {
        self.variant_id.is_some()
    }
}

impl fmt::Display for NodeMemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant_id {
            Some(variant) => write!(f, "{}[{}]", self.name, variant),
            None => f.write_str(&self.name),
        }
    }
}

/// A node in the syntax tree.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeBase {
    Scalar(ScalarNode),
    Collection(CollectionNode),
    Object(ObjectNode),
}

impl NodeBase {
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Scalar(s) => s.location.as_ref(),
            Self::Collection(c) => c.location.as_ref(),
            Self::Object(o) => o.location.as_ref(),
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarNode> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionNode> {
        match self {
            Self::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Returns `true` for a collection with no elements.
    pub fn is_empty_collection(&self) -> bool {
        matches!(self, Self::Collection(c) if c.elements.is_empty())
    }

    /// Copy the whole tree so the result shares nothing with `self`.
    pub fn deep_clone(&self) -> NodeBase {
        match self {
            Self::Scalar(s) => Self::Scalar(s.clone()),
            Self::Collection(c) => Self::Collection(c.deep_clone()),
            Self::Object(o) => Self::Object(o.deep_clone()),
        }
    }

    /// First variant-tagged member found anywhere in the subtree.
    pub fn find_variant_member(&self) -> Option<&NodeMemberId> {
        match self {
            Self::Scalar(_) => None,
            Self::Collection(c) => c
                .elements
                .iter()
                .flatten()
                .find_map(|elem| elem.find_variant_member()),
            Self::Object(o) => o.find_variant_member(),
        }
    }
}

impl From<ScalarNode> for NodeBase {
    fn from(node: ScalarNode) -> Self {
        Self::Scalar(node)
    }
}

impl From<CollectionNode> for NodeBase {
    fn from(node: CollectionNode) -> Self {
        Self::Collection(node)
    }
}

impl From<ObjectNode> for NodeBase {
    fn from(node: ObjectNode) -> Self {
        Self::Object(node)
    }
}

/// A leaf holding a raw, unescaped string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScalarNode {
    pub value: String,
    pub location: Option<SourceLocation>,
}

impl ScalarNode {
    pub fn new(value: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            value: value.into(),
            location,
        }
    }
}

/// An ordered list of nodes. Elements may be absent.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionNode {
    pub elements: Vec<Option<NodeRef>>,
    /// Bounding union of all element locations.
    pub location: Option<SourceLocation>,
}

impl CollectionNode {
    pub fn new(elements: Vec<Option<NodeRef>>) -> Self {
        let location = SourceLocation::union_all(
            elements
                .iter()
                .flatten()
                .filter_map(|elem| elem.location()),
        );
        Self { elements, location }
    }

    pub fn empty() -> Self {
        Self {
            elements: Vec::new(),
            location: None,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn deep_clone(&self) -> Self {
        Self {
            elements: self
                .elements
                .iter()
                .map(|elem| elem.as_ref().map(|node| Arc::new(node.deep_clone())))
                .collect(),
            location: self.location.clone(),
        }
    }
}

/// An object with members in insertion order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ObjectNode {
    pub members: IndexMap<NodeMemberId, NodeRef>,
    pub location: Option<SourceLocation>,
}

impl ObjectNode {
    pub fn new(members: IndexMap<NodeMemberId, NodeRef>, location: Option<SourceLocation>) -> Self {
        Self { members, location }
    }

    /// Look up a non-variant member by name.
    pub fn member(&self, name: &str) -> Option<&NodeRef> {
        self.members.get(&NodeMemberId::new(name))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Copy the object and every descendant into freshly allocated nodes.
    pub fn deep_clone(&self) -> Self {
        Self {
            members: self
                .members
                .iter()
                .map(|(id, node)| (id.clone(), Arc::new(node.deep_clone())))
                .collect(),
            location: self.location.clone(),
        }
    }

    /// First variant-tagged member found in this object or its descendants.
    pub fn find_variant_member(&self) -> Option<&NodeMemberId> {
        self.members.iter().find_map(|(id, node)| {
            if id.is_variant() {
                Some(id)
            } else {
                node.find_variant_member()
            }
        })
    }
}
