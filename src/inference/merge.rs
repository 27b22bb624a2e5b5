//! Merging of independently produced schemas and applying overrides

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::info;

use super::aggregate::{merge_flows, merge_object_structures};
use super::error::SchemaError;
use super::types::MergeMode;
use crate::models::{ApiStructure, ObjectStructure, ServiceEndpoints};

/// Merge two schemas, widening every shared endpoint and entity
///
/// When either side has no endpoints at all, the other side is returned as-is.
pub fn merge_api_structures(
    s1: &ApiStructure,
    s2: &ApiStructure,
) -> Result<ApiStructure, SchemaError> {
    if s2.endpoints.is_empty() {
        return Ok(s1.clone());
    }
    if s1.endpoints.is_empty() {
        return Ok(s2.clone());
    }

    let merged = combine(s1, s2, MergeMode::Widen)?;
    info!(
        "Merged schemas into {} endpoints and {} entities",
        merged.endpoint_count(),
        merged.entities.len()
    );
    Ok(merged)
}

/// Left fold of [`merge_api_structures`], seeded with the first schema
///
/// A single schema comes back unchanged, entities-only schemas included.
pub fn merge_all(
    schemas: impl IntoIterator<Item = ApiStructure>,
) -> Result<ApiStructure, SchemaError> {
    let mut schemas = schemas.into_iter();
    let Some(first) = schemas.next() else {
        return Ok(ApiStructure::default());
    };
    schemas.try_fold(first, |acc, schema| merge_api_structures(&acc, &schema))
}

/// Apply hand-written corrections on top of an inferred schema
///
/// Shared endpoints and entities are merged with the override winning every
/// conflict it has a value for; everything else is kept from either side.
/// Applying the same overrides twice changes nothing.
pub fn apply_overrides(
    structure: &ApiStructure,
    overrides: &ApiStructure,
) -> Result<ApiStructure, SchemaError> {
    let result = combine(structure, overrides, MergeMode::Override)?;
    info!(
        "Applied overrides for {} endpoints and {} entities",
        overrides.endpoint_count(),
        overrides.entities.len()
    );
    Ok(result)
}

fn combine(
    first: &ApiStructure,
    second: &ApiStructure,
    mode: MergeMode,
) -> Result<ApiStructure, SchemaError> {
    Ok(ApiStructure {
        endpoints: combine_endpoints(&first.endpoints, &second.endpoints, mode),
        entities: combine_entities(&first.entities, &second.entities, mode)?,
    })
}

fn combine_endpoints(
    first: &ServiceEndpoints,
    second: &ServiceEndpoints,
    mode: MergeMode,
) -> ServiceEndpoints {
    let mut result = first.clone();
    for (service, endpoints) in second {
        let target = result.entry(service.clone()).or_default();
        for (endpoint, flow) in endpoints {
            match target.entry(endpoint.clone()) {
                Entry::Occupied(mut existing) => {
                    let merged = merge_flows(existing.get(), flow, mode);
                    existing.insert(merged);
                }
                Entry::Vacant(slot) => {
                    slot.insert(flow.clone());
                }
            }
        }
    }
    result
}

fn combine_entities(
    first: &BTreeMap<String, ObjectStructure>,
    second: &BTreeMap<String, ObjectStructure>,
    mode: MergeMode,
) -> Result<BTreeMap<String, ObjectStructure>, SchemaError> {
    let mut result = first.clone();
    for (name, entity) in second {
        match result.entry(name.clone()) {
            Entry::Occupied(mut existing) => {
                let merged = merge_object_structures(existing.get(), entity, mode)?;
                existing.insert(merged);
            }
            Entry::Vacant(slot) => {
                slot.insert(entity.clone());
            }
        }
    }
    Ok(result)
}
