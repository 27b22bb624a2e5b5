//! Folding of repeated observations into one canonical record

use std::collections::BTreeMap;

use super::error::SchemaError;
use super::types::{MergeMode, merge_shapes_with};
use crate::models::{FlowDetails, ObjectStructure, ServiceEndpoints};

/// Flows grouped by service then endpoint, each group in observation order
pub type OrganizedFlows = BTreeMap<String, BTreeMap<String, Vec<FlowDetails>>>;

/// Merge two observations of the same endpoint
///
/// Shapes merge per `mode`. Identity fields keep `f1`'s value unless it is
/// empty; in override mode any non-empty value from `f2` wins.
pub fn merge_flows(f1: &FlowDetails, f2: &FlowDetails, mode: MergeMode) -> FlowDetails {
    let overriding = mode == MergeMode::Override;

    FlowDetails {
        content_parameters: merge_shapes_with(&f1.content_parameters, &f2.content_parameters, mode),
        content_structure: merge_shapes_with(&f1.content_structure, &f2.content_structure, mode),
        content_type: if (overriding || f1.content_type.is_unknown()) && !f2.content_type.is_unknown() {
            f2.content_type
        } else {
            f1.content_type
        },
        endpoint: pick_identity(&f1.endpoint, &f2.endpoint, overriding),
        method: pick_identity(&f1.method, &f2.method, overriding),
        query_parameters: merge_shapes_with(&f1.query_parameters, &f2.query_parameters, mode),
        response_gzipped: if overriding {
            f2.response_gzipped
        } else {
            f1.response_gzipped || f2.response_gzipped
        },
        response_structure: merge_shapes_with(&f1.response_structure, &f2.response_structure, mode),
        service: pick_identity(&f1.service, &f2.service, overriding),
        capture: match (&f1.capture, &f2.capture) {
            (_, Some(capture)) if overriding => Some(capture.clone()),
            (Some(capture), _) => Some(capture.clone()),
            (None, capture) => capture.clone(),
        },
    }
}

fn pick_identity(first: &str, second: &str, overriding: bool) -> String {
    if (overriding || first.is_empty()) && !second.is_empty() {
        second.to_string()
    } else {
        first.to_string()
    }
}

/// Merge two discoveries of the same entity
pub fn merge_object_structures(
    o1: &ObjectStructure,
    o2: &ObjectStructure,
    mode: MergeMode,
) -> Result<ObjectStructure, SchemaError> {
    if o1.object_type_name != o2.object_type_name {
        return Err(SchemaError::SchemaIdentityConflict {
            left: o1.object_type_name.clone(),
            right: o2.object_type_name.clone(),
        });
    }

    Ok(ObjectStructure::new(
        o1.object_type_name.as_str(),
        merge_shapes_with(&o1.properties, &o2.properties, mode),
    ))
}

/// Group flows by service and endpoint
///
/// Flows are stably sorted by `service + endpoint` first so that every group
/// keeps observation order and the fold over it is reproducible.
pub fn organize_flows(flows: impl IntoIterator<Item = FlowDetails>) -> OrganizedFlows {
    let mut sorted: Vec<FlowDetails> = flows.into_iter().collect();
    sorted.sort_by_cached_key(FlowDetails::sort_key);

    let mut organized = OrganizedFlows::new();
    for flow in sorted {
        organized
            .entry(flow.service.clone())
            .or_default()
            .entry(flow.endpoint.clone())
            .or_default()
            .push(flow);
    }
    organized
}

/// Fold every endpoint group into a single flow
pub fn singularize_flows(organized: OrganizedFlows) -> ServiceEndpoints {
    organized
        .into_iter()
        .map(|(service, endpoints)| {
            let endpoints = endpoints
                .into_iter()
                .filter_map(|(endpoint, flows)| {
                    let mut flows = flows.into_iter();
                    let first = flows.next()?;
                    let merged = flows.fold(first, |acc, flow| merge_flows(&acc, &flow, MergeMode::Widen));
                    Some((endpoint, merged))
                })
                .collect::<BTreeMap<_, _>>();
            (service, endpoints)
        })
        .filter(|(_, endpoints)| !endpoints.is_empty())
        .collect()
}

/// Fold repeated entity discoveries into one entity per name
pub fn singularize_entities(
    entities: impl IntoIterator<Item = ObjectStructure>,
) -> Result<BTreeMap<String, ObjectStructure>, SchemaError> {
    let mut result: BTreeMap<String, ObjectStructure> = BTreeMap::new();
    for entity in entities {
        let merged = match result.get(&entity.object_type_name) {
            Some(existing) => merge_object_structures(existing, &entity, MergeMode::Widen)?,
            None => entity,
        };
        result.insert(merged.object_type_name.clone(), merged);
    }
    Ok(result)
}
