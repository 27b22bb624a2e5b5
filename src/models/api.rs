//! The complete inferred schema: endpoints plus entities

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::null_as_default;
use super::{FlowDetails, ObjectStructure};
use crate::inference::ShapeTree;

/// service -> endpoint -> contract
pub type ServiceEndpoints = BTreeMap<String, BTreeMap<String, FlowDetails>>;

/// Inferred API schema
///
/// Serialized as `{"endpoints": {service: {endpoint: flow}}, "entities": {name: properties}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "SchemaDocument", into = "SchemaDocument")]
pub struct ApiStructure {
    pub endpoints: ServiceEndpoints,
    pub entities: BTreeMap<String, ObjectStructure>,
}

impl ApiStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// No endpoints and no entities
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty() && self.entities.is_empty()
    }

    /// Number of distinct endpoints across all services
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.values().map(BTreeMap::len).sum()
    }

    /// All flows, ordered by service then endpoint
    pub fn flows(&self) -> impl Iterator<Item = &FlowDetails> {
        self.endpoints.values().flat_map(BTreeMap::values)
    }

    pub fn flow(&self, service: &str, endpoint: &str) -> Option<&FlowDetails> {
        self.endpoints.get(service)?.get(endpoint)
    }

    pub fn entity(&self, name: &str) -> Option<&ObjectStructure> {
        self.entities.get(name)
    }

    pub fn entity_names(&self) -> BTreeSet<String> {
        self.entities.keys().cloned().collect()
    }

    /// Insert a flow under its own service/endpoint, replacing any existing one
    pub fn insert_flow(&mut self, flow: FlowDetails) -> Option<FlowDetails> {
        self.endpoints
            .entry(flow.service.clone())
            .or_default()
            .insert(flow.endpoint.clone(), flow)
    }

    /// Insert an entity under its own name, replacing any existing one
    pub fn insert_entity(&mut self, entity: ObjectStructure) -> Option<ObjectStructure> {
        self.entities.insert(entity.object_type_name.clone(), entity)
    }

    /// Structural equality over every persisted field
    pub fn contract_eq(&self, other: &ApiStructure) -> bool {
        self.entities == other.entities
            && self.endpoints.len() == other.endpoints.len()
            && self.endpoints.iter().all(|(service, endpoints)| {
                other.endpoints.get(service).is_some_and(|others| {
                    endpoints.len() == others.len()
                        && endpoints.iter().all(|(name, flow)| {
                            others.get(name).is_some_and(|o| flow.contract_eq(o))
                        })
                })
            })
    }
}

/// On-disk layout of a schema file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchemaDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    endpoints: ServiceEndpoints,
    #[serde(default, deserialize_with = "null_as_default")]
    entities: BTreeMap<String, ShapeTree>,
}

impl From<SchemaDocument> for ApiStructure {
    fn from(document: SchemaDocument) -> Self {
        let endpoints = document
            .endpoints
            .into_iter()
            .map(|(service, endpoints)| {
                let endpoints = endpoints
                    .into_iter()
                    .map(|(endpoint, mut flow)| {
                        if flow.service.is_empty() {
                            flow.service = service.clone();
                        }
                        if flow.endpoint.is_empty() {
                            flow.endpoint = endpoint.clone();
                        }
                        (endpoint, flow)
                    })
                    .collect();
                (service, endpoints)
            })
            .collect();

        let entities = document
            .entities
            .into_iter()
            .map(|(name, properties)| (name.clone(), ObjectStructure::new(name, properties)))
            .collect();

        Self {
            endpoints,
            entities,
        }
    }
}

impl From<ApiStructure> for SchemaDocument {
    fn from(structure: ApiStructure) -> Self {
        Self {
            endpoints: structure.endpoints,
            entities: structure
                .entities
                .into_iter()
                .map(|(name, entity)| (name, entity.properties))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::TypeTag;

    #[test]
    fn test_fills_identity_from_keys() {
        let schema: ApiStructure = serde_json::from_str(
            r#"{"endpoints": {"UserService": {"ListUsers": {"method": "GET"}}}, "entities": {}}"#,
        )
        .unwrap();

        let flow = schema.flow("UserService", "ListUsers").unwrap();
        assert_eq!(flow.service, "UserService");
        assert_eq!(flow.endpoint, "ListUsers");
        assert_eq!(flow.method, "GET");
    }

    #[test]
    fn test_entities_serialize_as_name_map() {
        let mut schema = ApiStructure::new();
        schema.insert_entity(ObjectStructure::new(
            "User",
            ShapeTree::new().with("Id", TypeTag::Int),
        ));
        schema.insert_entity(ObjectStructure::new(
            "Alliance",
            ShapeTree::new().with("Name", TypeTag::Str),
        ));

        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(
            json,
            r#"{"endpoints":{},"entities":{"Alliance":{"Name":"str"},"User":{"Id":"int"}}}"#
        );
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let schema: ApiStructure = serde_json::from_str(r#"{"entities": null}"#).unwrap();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_contract_eq_sees_shape_differences() {
        let mut a = ApiStructure::new();
        a.insert_flow(FlowDetails::new("UserService", "ListUsers", "GET"));
        let mut b = a.clone();
        assert!(a.contract_eq(&b));

        let mut changed = FlowDetails::new("UserService", "ListUsers", "GET");
        changed.query_parameters.insert("id", TypeTag::Int);
        b.insert_flow(changed);
        assert!(!a.contract_eq(&b));
    }
}
