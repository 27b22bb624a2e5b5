//! Return-type resolution for endpoint responses
//!
//! The response shape is searched depth-first for tags naming a known entity.
//! All matches at the shallowest level of a branch are the branch's result.
//! A match is a collection when its containing tag is the entity name plus `s`
//! (`Alliances` containing `Alliance`). When several branches yield results,
//! they are concatenated under the tag where the branches meet.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::inference::{Shape, ShapeTree};

/// One entity returned by an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReturn {
    pub entity_name: String,
    /// Tag the entity elements sit in
    pub container_tag: String,
    pub is_collection: bool,
}

impl EntityReturn {
    fn new(entity_name: &str, container_tag: &str) -> Self {
        Self {
            entity_name: entity_name.to_string(),
            container_tag: container_tag.to_string(),
            is_collection: container_tag.strip_suffix('s') == Some(entity_name),
        }
    }
}

/// Entities returned by an endpoint and the tag to unwrap them from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnType {
    pub parent_tag: Option<String>,
    pub entities: Vec<EntityReturn>,
}

impl ReturnType {
    /// The endpoint returns no known entity
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // Results without a parent tag come from the unnamed root and carry no container
    fn is_usable(&self) -> bool {
        self.parent_tag.is_some() && !self.entities.is_empty()
    }
}

/// Determine which entities a residual response shape returns
pub fn resolve_return_type(response: &ShapeTree, entity_names: &BTreeSet<String>) -> ReturnType {
    resolve(response, entity_names, None)
}

fn resolve(tree: &ShapeTree, entity_names: &BTreeSet<String>, parent_tag: Option<&str>) -> ReturnType {
    let mut results = Vec::new();

    if let Some(parent) = parent_tag {
        let matches: Vec<EntityReturn> = tree
            .keys()
            .filter(|key| entity_names.contains(*key))
            .map(|entity| EntityReturn::new(entity, parent))
            .collect();
        if !matches.is_empty() {
            results.push(ReturnType {
                parent_tag: Some(parent.to_string()),
                entities: matches,
            });
        }
    }

    for (key, shape) in tree.iter().filter(|(key, _)| !entity_names.contains(*key)) {
        if let Shape::Tree(child) = shape {
            let result = resolve(child, entity_names, Some(key.as_str()));
            if result.is_usable() {
                results.push(result);
            }
        }
    }

    match results.len() {
        0 => ReturnType::default(),
        1 => results.remove(0),
        _ => ReturnType {
            parent_tag: parent_tag.map(str::to_string),
            entities: results.into_iter().flat_map(|result| result.entities).collect(),
        },
    }
}
