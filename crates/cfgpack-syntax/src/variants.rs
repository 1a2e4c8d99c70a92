//! Variant extraction.
//!
//! A sheet row may describe several variants of one item at once: individual
//! members can be tagged with a variant id (column-style overrides), and the
//! whole row can be marked as applying to a list of variants through the
//! `/Variant` member (row-style overrides). [`extract_variants`] expands such a
//! multi-variant [`RootObject`] into one single-variant object per variant.
//!
//! Expansion runs bottom-up. Every node expands into an ordered map from
//! variant id (`None` for the baseline) to the node as seen by that variant:
//!
//! - scalars and empty collections never define variants;
//! - a collection yields one collection per variant found in any element,
//!   left-padded with `None` so each element keeps its original index;
//! - an object files each member into the bucket of the variant that defines
//!   it, and drops variant buckets made up solely of empty collections.
//!
//! Subtrees without any variants are shared with the input rather than copied.

use std::iter;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{SyntaxError, SyntaxResult};
use crate::node::{CollectionNode, NodeBase, NodeMemberId, NodeRef, ObjectNode};
use crate::root::{split_list, ObjectId, RootObject, VARIANT_MEMBER};

/// Per-variant expansion of a node, in encounter order.
type VariantMap<T> = IndexMap<Option<String>, T>;

/// Iterator over the single-variant objects extracted from one root object.
pub type ExtractedVariants<'a> = Box<dyn Iterator<Item = SyntaxResult<RootObject>> + 'a>;

/// Expand a multi-variant root object into one object per variant.
///
/// The tree is expanded eagerly so structural errors surface immediately;
/// the resulting objects are produced lazily in the order their variants were
/// first encountered. Fails if `obj` is already a single-variant object.
pub fn extract_variants(obj: &RootObject) -> SyntaxResult<ExtractedVariants<'_>> {
    if let Some(variant_id) = &obj.variant_id {
        return Err(SyntaxError::AlreadyExtracted {
            id: obj.id.clone(),
            variant_id: variant_id.clone(),
        });
    }

    let expander = Expander { id: &obj.id };
    let buckets: VariantMap<ObjectNode> = if obj.node.is_empty() {
        iter::once((None, obj.node.clone())).collect()
    } else {
        expander.expand_object(&obj.node)?
    };
    debug!(id = %obj.id, buckets = buckets.len(), "expanded object variants");

    // A row override applies to the whole row; it cannot be combined with
    // column overrides.
    if obj.node.members.keys().any(|id| id.name == VARIANT_MEMBER) {
        if let Some(variant_id) = buckets.keys().flatten().next() {
            return Err(SyntaxError::RowOverrideWithColumnVariants {
                id: obj.id.clone(),
                variant_id: variant_id.clone(),
            });
        }
    }

    Ok(Box::new(
        buckets
            .into_iter()
            .flat_map(move |(variant_id, node)| emit_bucket(obj, variant_id, node)),
    ))
}

/// Turn one expanded bucket into the root objects it stands for.
fn emit_bucket<'a>(
    obj: &'a RootObject,
    variant_id: Option<String>,
    mut node: ObjectNode,
) -> ExtractedVariants<'a> {
    let row_key = NodeMemberId::new(VARIANT_MEMBER);

    if variant_id.is_some() {
        return Box::new(iter::once(Ok(derive_root(obj, node, variant_id))));
    }

    let Some(row_override) = node.members.shift_remove(&row_key) else {
        return Box::new(iter::once(Ok(derive_root(obj, node, None))));
    };

    let NodeBase::Scalar(scalar) = row_override.as_ref() else {
        return Box::new(iter::once(Err(SyntaxError::ExpectedScalar {
            id: obj.id.clone(),
            member: VARIANT_MEMBER.to_string(),
        })));
    };

    let mut variant_ids: Vec<String> = split_list(&scalar.value)
        .into_iter()
        .map(str::to_string)
        .collect();

    match variant_ids.len() {
        0 => Box::new(iter::once(Err(SyntaxError::EmptyVariantList {
            id: obj.id.clone(),
        }))),
        1 => Box::new(iter::once(Ok(derive_root(obj, node, variant_ids.pop())))),
        // Each variant gets its own copy of the tree.
        _ => Box::new(
            variant_ids
                .into_iter()
                .map(move |variant_id| Ok(derive_root(obj, node.deep_clone(), Some(variant_id)))),
        ),
    }
}

fn derive_root(obj: &RootObject, node: ObjectNode, variant_id: Option<String>) -> RootObject {
    RootObject {
        id: obj.id.clone(),
        node,
        location: obj.location.clone(),
        aliases: obj.aliases.clone(),
        variant_id,
    }
}

fn single<T>(value: T) -> VariantMap<T> {
    iter::once((None, value)).collect()
}

struct Expander<'a> {
    id: &'a ObjectId,
}

impl Expander<'_> {
    fn expand_node(&self, node: &NodeRef) -> SyntaxResult<VariantMap<NodeRef>> {
        match node.as_ref() {
            NodeBase::Scalar(_) => Ok(single(Arc::clone(node))),
            NodeBase::Collection(coll) if coll.is_empty() => Ok(single(Arc::clone(node))),
            NodeBase::Collection(coll) => {
                let expanded = self.expand_collection(coll)?;
                if collection_unchanged(coll, &expanded) {
                    return Ok(single(Arc::clone(node)));
                }
                Ok(expanded
                    .into_iter()
                    .map(|(variant, elements)| {
                        (variant, Arc::new(NodeBase::from(CollectionNode::new(elements))))
                    })
                    .collect())
            }
            NodeBase::Object(obj) if obj.is_empty() => Ok(single(Arc::clone(node))),
            NodeBase::Object(obj) => {
                let expanded = self.expand_object(obj)?;
                if object_unchanged(obj, &expanded) {
                    return Ok(single(Arc::clone(node)));
                }
                Ok(expanded
                    .into_iter()
                    .map(|(variant, object)| (variant, Arc::new(NodeBase::from(object))))
                    .collect())
            }
        }
    }

    fn expand_collection(
        &self,
        coll: &CollectionNode,
    ) -> SyntaxResult<VariantMap<Vec<Option<NodeRef>>>> {
        let mut per_variant: VariantMap<Vec<Option<NodeRef>>> = IndexMap::new();

        for (index, element) in coll.elements.iter().enumerate() {
            let expanded: VariantMap<Option<NodeRef>> = match element {
                None => single(None),
                Some(node) => self
                    .expand_node(node)?
                    .into_iter()
                    .map(|(variant, node)| (variant, Some(node)))
                    .collect(),
            };

            for (variant, node) in expanded {
                let elements = per_variant.entry(variant).or_default();
                elements.resize(index, None);
                elements.push(node);
            }
        }

        Ok(per_variant)
    }

    fn expand_object(&self, obj: &ObjectNode) -> SyntaxResult<VariantMap<ObjectNode>> {
        let mut buckets: VariantMap<IndexMap<NodeMemberId, NodeRef>> = IndexMap::new();

        for (member_id, child) in &obj.members {
            let mut expanded = self.expand_node(child)?;

            match &member_id.variant_id {
                Some(variant_id) => {
                    let baseline = match (expanded.len(), expanded.shift_remove(&None::<String>)) {
                        (1, Some(node)) => node,
                        _ => {
                            return Err(SyntaxError::NestedVariants {
                                id: self.id.clone(),
                                member: member_id.name.clone(),
                            })
                        }
                    };
                    let variant = Some(variant_id.clone());
                    self.file_member(&mut buckets, variant, &member_id.name, baseline)?;
                }
                None => {
                    for (variant, node) in expanded {
                        self.file_member(&mut buckets, variant, &member_id.name, node)?;
                    }
                }
            }
        }

        // A variant bucket with nothing but empty collections is scaffolding
        // left over from ingestion, not real content.
        buckets.retain(|variant, members| {
            variant.is_none() || !members.values().all(|node| node.is_empty_collection())
        });

        Ok(buckets
            .into_iter()
            .map(|(variant, members)| (variant, ObjectNode::new(members, obj.location.clone())))
            .collect())
    }

    fn file_member(
        &self,
        buckets: &mut VariantMap<IndexMap<NodeMemberId, NodeRef>>,
        variant: Option<String>,
        name: &str,
        node: NodeRef,
    ) -> SyntaxResult<()> {
        let members = buckets.entry(variant.clone()).or_default();
        let key = NodeMemberId::new(name);
        if members.contains_key(&key) {
            return Err(SyntaxError::ConflictingVariantMember {
                id: self.id.clone(),
                member: name.to_string(),
                variant_id: variant.unwrap_or_default(),
            });
        }
        members.insert(key, node);
        Ok(())
    }
}

fn collection_unchanged(
    original: &CollectionNode,
    expanded: &VariantMap<Vec<Option<NodeRef>>>,
) -> bool {
    if expanded.len() != 1 {
        return false;
    }
    let Some(elements) = expanded.get(&None::<String>) else {
        return false;
    };
    elements.len() == original.len()
        && elements
            .iter()
            .zip(&original.elements)
            .all(|(new, old)| match (new, old) {
                (Some(new), Some(old)) => Arc::ptr_eq(new, old),
                (None, None) => true,
                _ => false,
            })
}

fn object_unchanged(original: &ObjectNode, expanded: &VariantMap<ObjectNode>) -> bool {
    if expanded.len() != 1 {
        return false;
    }
    let Some(object) = expanded.get(&None::<String>) else {
        return false;
    };
    object.len() == original.len()
        && object
            .members
            .iter()
            .zip(&original.members)
            .all(|((new_id, new), (old_id, old))| new_id == old_id && Arc::ptr_eq(new, old))
}
