//! End-to-end processing of one sheet's root objects.

use tracing::debug;

use crate::build_log::{detect_duplicate_objects, BuildLog, BuildMessage};
use crate::error::SyntaxResult;
use crate::inheritance::{
    inherit_key_value_variant_values_from_baseline, inherit_variant_values_from_baseline,
};
use crate::root::{extract_aliases, RootObject};
use crate::variants::extract_variants;

/// How variant objects inherit values from their baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InheritancePolicy {
    /// Library sheets: copy everything the variant lacks, recursively.
    #[default]
    Recursive,
    /// Key-value configs: merge only the top-level members a variant touches.
    KeyValue,
}

/// Turn a sheet's multi-variant root objects into single-variant objects.
///
/// Runs alias hoisting and variant extraction per item, reports duplicate
/// `(id, variant)` pairs, then applies baseline inheritance. A structural
/// error in one item is logged against that item and the item is dropped;
/// the remaining items are still processed. Inheritance errors abort the
/// whole sheet.
pub fn build_sheet_objects(
    sheet_name: &str,
    objects: Vec<RootObject>,
    policy: InheritancePolicy,
    log: &mut dyn BuildLog,
) -> SyntaxResult<Vec<RootObject>> {
    let input_count = objects.len();
    let mut extracted = Vec::with_capacity(objects.len());

    for obj in objects {
        let location = obj.location.clone();
        let config_key = obj.id.parts().join(".");
        match extract_item(obj) {
            Ok(variants) => extracted.extend(variants),
            Err(err) => log.log(
                BuildMessage::error(err.to_string())
                    .with_sheet(sheet_name)
                    .with_config_key(config_key)
                    .with_location(location),
            ),
        }
    }

    detect_duplicate_objects(&extracted, Some(sheet_name), log);

    let result = match policy {
        InheritancePolicy::Recursive => inherit_variant_values_from_baseline(extracted)?,
        InheritancePolicy::KeyValue => inherit_key_value_variant_values_from_baseline(extracted)?,
    };

    debug!(
        sheet = sheet_name,
        items = input_count,
        objects = result.len(),
        ?policy,
        "built sheet objects"
    );
    Ok(result)
}

fn extract_item(obj: RootObject) -> SyntaxResult<Vec<RootObject>> {
    let obj = extract_aliases(obj)?;
    let variants = extract_variants(&obj)?.collect::<SyntaxResult<Vec<_>>>()?;
    Ok(variants)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::build_log::CollectingBuildLog;
    use crate::node::{NodeMemberId, NodeRef, ObjectNode, ScalarNode};
    use crate::root::{ObjectId, ALIASES_MEMBER, VARIANT_MEMBER};

    fn scalar(value: &str) -> NodeRef {
        Arc::new(ScalarNode::new(value, None).into())
    }

    fn item(id: &str, members: Vec<(NodeMemberId, NodeRef)>) -> RootObject {
        RootObject::new(
            ObjectId::from(id),
            ObjectNode::new(members.into_iter().collect(), None),
            None,
        )
    }

    #[test]
    fn builds_variants_with_inherited_values() {
        let objects = vec![
            item(
                "Sword",
                vec![
                    (NodeMemberId::new("Damage"), scalar("10")),
                    (NodeMemberId::new("Weight"), scalar("3")),
                    (NodeMemberId::with_variant("Damage", "Hard"), scalar("20")),
                    (NodeMemberId::new(ALIASES_MEMBER), scalar("Blade")),
                ],
            ),
            item(
                "Sword",
                vec![
                    (NodeMemberId::new("Damage"), scalar("30")),
                    (NodeMemberId::new(VARIANT_MEMBER), scalar("Nightmare")),
                ],
            ),
        ];

        let mut log = CollectingBuildLog::new();
        let out =
            build_sheet_objects("Items", objects, InheritancePolicy::Recursive, &mut log).unwrap();

        assert!(!log.has_errors());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].aliases.as_deref(), Some("Blade"));
        assert_eq!(out[1].variant_id.as_deref(), Some("Hard"));
        assert!(out[1].node.member("Weight").is_some());
        assert_eq!(out[2].variant_id.as_deref(), Some("Nightmare"));
        assert!(out[2].node.member("Weight").is_some());
        assert!(out[2].node.member(VARIANT_MEMBER).is_none());
    }

    #[test]
    fn broken_item_is_logged_and_skipped() {
        let objects = vec![
            item("Good", vec![(NodeMemberId::new("Damage"), scalar("1"))]),
            item(
                "Bad",
                vec![
                    (NodeMemberId::new("Damage"), scalar("1")),
                    (NodeMemberId::new(VARIANT_MEMBER), scalar(",")),
                ],
            ),
        ];

        let mut log = CollectingBuildLog::new();
        let out =
            build_sheet_objects("Items", objects, InheritancePolicy::Recursive, &mut log).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(log.error_count(), 1);
        assert_eq!(log.messages()[0].config_key.as_deref(), Some("Bad"));
    }

    #[test]
    fn duplicates_are_reported_but_kept() {
        let objects = vec![
            item("Sword", vec![(NodeMemberId::new("Damage"), scalar("1"))]),
            item("Sword", vec![(NodeMemberId::new("Damage"), scalar("2"))]),
        ];

        let mut log = CollectingBuildLog::new();
        let out =
            build_sheet_objects("Items", objects, InheritancePolicy::Recursive, &mut log).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(log.error_count(), 1);
    }
}
