//! Entity extraction from response shapes
//!
//! A node is an entity when it carries a non-empty `properties` tree without a
//! `version` attribute (versioned nodes are response wrappers). The entity's
//! properties are the node's attributes plus one `reference(<tag>)` per child
//! tag; the node stays in the residual tree with its children only.

use std::collections::BTreeMap;

use super::types::{PROPERTIES_KEY, Shape, ShapeTree, TypeTag, merge_shapes};
use crate::models::ObjectStructure;

/// Attribute marking a node as a versioned wrapper rather than an entity
pub const VERSION_ATTRIBUTE: &str = "version";

/// Result of [`extract_entities`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedEntities {
    /// Input tree with the `properties` of every entity node removed
    pub residual: ShapeTree,
    /// Entities found, keyed by tag name
    pub entities: BTreeMap<String, ObjectStructure>,
}

/// Split a response shape into its entities and the residual structure
///
/// Extraction recurses into every structured child, whether or not the child
/// itself was an entity. Repeated discoveries of the same tag are merged.
pub fn extract_entities(tree: &ShapeTree) -> ExtractedEntities {
    let mut entities = BTreeMap::new();
    let residual = extract_children(tree, &mut entities);
    ExtractedEntities { residual, entities }
}

fn extract_children(
    tree: &ShapeTree,
    entities: &mut BTreeMap<String, ObjectStructure>,
) -> ShapeTree {
    tree.iter()
        .map(|(key, shape)| {
            let shape = match shape {
                Shape::Tree(node) => Shape::Tree(extract_node(key, node, entities)),
                Shape::Scalar(_) => shape.clone(),
            };
            (key.clone(), shape)
        })
        .collect()
}

fn extract_node(
    key: &str,
    node: &ShapeTree,
    entities: &mut BTreeMap<String, ObjectStructure>,
) -> ShapeTree {
    let Some(properties) = entity_properties(node) else {
        return node
            .iter()
            .map(|(child, shape)| match shape {
                Shape::Tree(grandchild) if child != PROPERTIES_KEY => (
                    child.clone(),
                    Shape::Tree(extract_node(child, grandchild, entities)),
                ),
                _ => (child.clone(), shape.clone()),
            })
            .collect();
    };

    let mut entity_properties = properties.clone();
    for child in node.keys().filter(|child| child.as_str() != PROPERTIES_KEY) {
        entity_properties.unify_insert(child.clone(), Shape::Scalar(TypeTag::Reference(child.clone())));
    }
    record_entity(key, entity_properties, entities);

    let mut residual = node.clone();
    residual.remove(PROPERTIES_KEY);
    extract_children(&residual, entities)
}

fn entity_properties(node: &ShapeTree) -> Option<&ShapeTree> {
    node.properties()
        .filter(|properties| !properties.is_empty() && !properties.contains_key(VERSION_ATTRIBUTE))
}

fn record_entity(
    name: &str,
    properties: ShapeTree,
    entities: &mut BTreeMap<String, ObjectStructure>,
) {
    match entities.get_mut(name) {
        Some(existing) => existing.properties = merge_shapes(&existing.properties, &properties),
        None => {
            entities.insert(name.to_string(), ObjectStructure::new(name, properties));
        }
    }
}
