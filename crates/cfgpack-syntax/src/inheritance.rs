//! Baseline inheritance for extracted variants.
//!
//! After [`extract_variants`](crate::extract_variants) a variant object only
//! holds the members its variant overrides. The functions here back-fill the
//! rest from the baseline object with the same id.
//!
//! Two policies exist:
//!
//! - [`inherit_variant_values_from_baseline`] copies every member the variant
//!   lacks, recursing into nested objects.
//! - [`inherit_key_value_variant_values_from_baseline`] is for flat key-value
//!   configs, where each variant is a patch. Only top-level members the variant
//!   actually touches are merged; absent members stay absent so patches for
//!   different variants remain independent.
//!
//! Nodes are updated copy-on-write, so subtrees shared with the baseline are
//! never mutated.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{SyntaxError, SyntaxResult};
use crate::node::{NodeBase, NodeMemberId, NodeRef, ObjectNode};
use crate::root::{ObjectId, RootObject};

/// Copy values from `src` into `dst` wherever `dst` has nothing of its own.
///
/// A member missing from `dst`, or present only as an empty collection, is
/// replaced by the `src` member. Members that are objects on both sides are
/// merged recursively. Neither tree may still contain variant-tagged members.
pub fn copy_values(dst: &mut ObjectNode, src: &ObjectNode) -> SyntaxResult<()> {
    reject_variant_members(dst)?;
    reject_variant_members(src)?;

    for (id, src_node) in &src.members {
        match dst.members.get_mut(id) {
            None => {
                dst.members.insert(id.clone(), Arc::clone(src_node));
            }
            Some(dst_node) => inherit_member(id, dst_node, src_node)?,
        }
    }
    Ok(())
}

fn inherit_member(id: &NodeMemberId, dst: &mut NodeRef, src: &NodeRef) -> SyntaxResult<()> {
    if dst.is_empty_collection() {
        *dst = Arc::clone(src);
        return Ok(());
    }

    let NodeBase::Object(src_obj) = src.as_ref() else {
        return Ok(());
    };
    if !dst.is_object() {
        return Err(SyntaxError::ShapeMismatch {
            member: id.name.clone(),
        });
    }
    match Arc::make_mut(dst) {
        NodeBase::Object(dst_obj) => copy_values(dst_obj, src_obj),
        _ => Ok(()),
    }
}

fn reject_variant_members(obj: &ObjectNode) -> SyntaxResult<()> {
    match obj.members.keys().find(|id| id.is_variant()) {
        Some(id) => Err(SyntaxError::UnextractedVariant {
            member: id.name.clone(),
            variant_id: id.variant_id.clone().unwrap_or_default(),
        }),
        None => Ok(()),
    }
}

/// Fill every variant object from the baseline object with the same id.
///
/// Variant objects without a matching baseline are left untouched; they are
/// items that only exist in some variants. When several baselines share an
/// id, the first one is used.
pub fn inherit_variant_values_from_baseline(
    objects: Vec<RootObject>,
) -> SyntaxResult<Vec<RootObject>> {
    let mut baselines: HashMap<ObjectId, ObjectNode> = HashMap::new();
    for obj in objects.iter().filter(|obj| obj.is_baseline()) {
        baselines
            .entry(obj.id.clone())
            .or_insert_with(|| obj.node.clone());
    }

    let mut inherited = 0usize;
    let result = objects
        .into_iter()
        .map(|mut obj| {
            if !obj.is_baseline() {
                if let Some(baseline) = baselines.get(&obj.id) {
                    copy_values(&mut obj.node, baseline)?;
                    inherited += 1;
                }
            }
            Ok(obj)
        })
        .collect::<SyntaxResult<Vec<_>>>()?;

    debug!(
        baselines = baselines.len(),
        inherited, "inherited variant values from baselines"
    );
    Ok(result)
}

/// Merge baseline values into the top-level members each variant touches.
///
/// Fails if more than one baseline is present. Without a baseline the input
/// is returned unchanged. Top-level variant members that are still empty
/// collections after the merge are removed.
pub fn inherit_key_value_variant_values_from_baseline(
    objects: Vec<RootObject>,
) -> SyntaxResult<Vec<RootObject>> {
    let count = objects.iter().filter(|obj| obj.is_baseline()).count();
    if count > 1 {
        return Err(SyntaxError::MultipleBaselines { count });
    }
    let Some(baseline) = objects
        .iter()
        .find(|obj| obj.is_baseline())
        .map(|obj| obj.node.clone())
    else {
        return Ok(objects);
    };
    reject_variant_members(&baseline)?;

    objects
        .into_iter()
        .map(|mut obj| {
            if obj.is_baseline() {
                return Ok(obj);
            }
            reject_variant_members(&obj.node)?;
            for (id, node) in obj.node.members.iter_mut() {
                if let Some(base_node) = baseline.members.get(id) {
                    inherit_member(id, node, base_node)?;
                }
            }
            obj.node
                .members
                .retain(|_, node| !node.is_empty_collection());
            Ok(obj)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::node::{CollectionNode, ScalarNode};

    fn scalar(value: &str) -> NodeRef {
        Arc::new(ScalarNode::new(value, None).into())
    }

    fn empty() -> NodeRef {
        Arc::new(CollectionNode::empty().into())
    }

    fn object(members: Vec<(&str, NodeRef)>) -> ObjectNode {
        let members: IndexMap<_, _> = members
            .into_iter()
            .map(|(name, node)| (NodeMemberId::new(name), node))
            .collect();
        ObjectNode::new(members, None)
    }

    fn nested(members: Vec<(&str, NodeRef)>) -> NodeRef {
        Arc::new(object(members).into())
    }

    fn root(id: &str, variant: Option<&str>, node: ObjectNode) -> RootObject {
        let mut obj = RootObject::new(ObjectId::from(id), node, None);
        obj.variant_id = variant.map(str::to_string);
        obj
    }

    fn value<'a>(obj: &'a ObjectNode, name: &str) -> &'a str {
        &obj.member(name).unwrap().as_scalar().unwrap().value
    }

    #[test]
    fn copies_missing_and_empty_members() {
        let base = object(vec![("A", scalar("1")), ("B", scalar("2")), ("C", scalar("3"))]);
        let mut variant = object(vec![("A", scalar("10")), ("B", empty())]);

        copy_values(&mut variant, &base).unwrap();
        assert_eq!(value(&variant, "A"), "10");
        assert_eq!(value(&variant, "B"), "2");
        assert_eq!(value(&variant, "C"), "3");
    }

    #[test]
    fn merges_nested_objects_without_mutating_baseline() {
        let base_stats = nested(vec![("Hp", scalar("5")), ("Mp", scalar("7"))]);
        let base = object(vec![("Stats", Arc::clone(&base_stats))]);
        let mut variant = object(vec![("Stats", nested(vec![("Hp", scalar("50"))]))]);

        copy_values(&mut variant, &base).unwrap();
        let stats = variant.member("Stats").unwrap().as_object().unwrap();
        assert_eq!(value(stats, "Hp"), "50");
        assert_eq!(value(stats, "Mp"), "7");

        let untouched = base_stats.as_object().unwrap();
        assert_eq!(value(untouched, "Hp"), "5");
    }

    #[test]
    fn object_over_scalar_is_shape_mismatch() {
        let base = object(vec![("Stats", nested(vec![("Hp", scalar("5"))]))]);
        let mut variant = object(vec![("Stats", scalar("oops"))]);
        let err = copy_values(&mut variant, &base).unwrap_err();
        assert_eq!(err, SyntaxError::ShapeMismatch { member: "Stats".into() });
    }

    #[test]
    fn variant_tagged_members_are_rejected() {
        let base = object(vec![("A", scalar("1"))]);
        let mut variant = ObjectNode::default();
        variant
            .members
            .insert(NodeMemberId::with_variant("A", "X"), scalar("2"));
        let err = copy_values(&mut variant, &base).unwrap_err();
        assert!(matches!(err, SyntaxError::UnextractedVariant { .. }));
    }

    #[test]
    fn inherit_matches_by_id_and_skips_orphans() {
        let objects = vec![
            root("Sword", None, object(vec![("Damage", scalar("10")), ("Weight", scalar("3"))])),
            root("Sword", Some("Hard"), object(vec![("Damage", scalar("20"))])),
            root("Bow", Some("Hard"), object(vec![("Damage", scalar("8"))])),
        ];

        let out = inherit_variant_values_from_baseline(objects).unwrap();
        assert_eq!(value(&out[1].node, "Weight"), "3");
        assert_eq!(value(&out[1].node, "Damage"), "20");
        assert_eq!(out[2].node.len(), 1);
        assert_eq!(out[0].node.len(), 2);
    }

    #[test]
    fn key_value_only_touches_present_members() {
        let objects = vec![
            root(
                "Global",
                None,
                object(vec![
                    ("StartGold", scalar("100")),
                    ("Limits", nested(vec![("Max", scalar("5")), ("Min", scalar("1"))])),
                ]),
            ),
            root(
                "Global",
                Some("A"),
                object(vec![("Limits", nested(vec![("Max", scalar("9"))]))]),
            ),
            root("Global", Some("B"), object(vec![("StartGold", scalar("200"))])),
        ];

        let out = inherit_key_value_variant_values_from_baseline(objects).unwrap();

        let a = &out[1].node;
        assert!(a.member("StartGold").is_none());
        let limits = a.member("Limits").unwrap().as_object().unwrap();
        assert_eq!(value(limits, "Max"), "9");
        assert_eq!(value(limits, "Min"), "1");

        let b = &out[2].node;
        assert!(b.member("Limits").is_none());
        assert_eq!(value(b, "StartGold"), "200");
    }

    #[test]
    fn key_value_strips_leftover_empty_collections() {
        let objects = vec![
            root("Global", None, object(vec![("Rewards", empty()), ("Gold", scalar("1"))])),
            root(
                "Global",
                Some("A"),
                object(vec![("Rewards", empty()), ("Gold", scalar("2")), ("Extra", empty())]),
            ),
        ];

        let out = inherit_key_value_variant_values_from_baseline(objects).unwrap();
        let names: Vec<_> = out[1].node.members.keys().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["Gold"]);
        assert_eq!(out[0].node.len(), 2);
    }

    #[test]
    fn key_value_fills_empty_collection_from_baseline() {
        let rewards = Arc::new(NodeBase::from(CollectionNode::new(vec![Some(scalar("x"))])));
        let objects = vec![
            root("Global", None, object(vec![("Rewards", Arc::clone(&rewards))])),
            root("Global", Some("A"), object(vec![("Rewards", empty())])),
        ];

        let out = inherit_key_value_variant_values_from_baseline(objects).unwrap();
        assert!(Arc::ptr_eq(out[1].node.member("Rewards").unwrap(), &rewards));
    }

    #[test]
    fn key_value_rejects_multiple_baselines() {
        let objects = vec![
            root("Global", None, ObjectNode::default()),
            root("Global", None, ObjectNode::default()),
        ];
        let err = inherit_key_value_variant_values_from_baseline(objects).unwrap_err();
        assert_eq!(err, SyntaxError::MultipleBaselines { count: 2 });
    }

    #[test]
    fn key_value_without_baseline_is_identity() {
        let objects = vec![root("Global", Some("A"), object(vec![("Gold", scalar("2"))]))];
        let out = inherit_key_value_variant_values_from_baseline(objects.clone()).unwrap();
        assert_eq!(out, objects);
    }
}
