//! Preparation of a schema for the source-code generator
//!
//! The generator is a pure renderer; everything it needs (identifiers,
//! versions, return types, entity relationships) is derived here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::naming::{
    convert_camel_to_snake_case, endpoint_version, parameter_identifier, property_identifier,
};
use super::return_type::{ReturnType, resolve_return_type};
use crate::inference::{CacheableEndpoints, Shape, ShapeTree, TypeTag};
use crate::models::{ApiStructure, ContentType, FlowDetails, ObjectStructure};

/// Everything the generator renders
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorInput {
    pub services: Vec<ServiceData>,
    pub entities: Vec<EntityData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceData {
    pub name: String,
    pub name_snake_case: String,
    /// At least one endpoint of the service is cacheable
    pub is_cacheable: bool,
    /// Latest version of every endpoint
    pub endpoints: Vec<EndpointData>,
    /// Every endpoint version
    pub raw_endpoints: Vec<EndpointData>,
    /// Sorted, distinct entity types returned by any endpoint
    pub entity_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointData {
    pub name: String,
    pub name_snake_case: String,
    pub name_without_version: String,
    pub name_snake_case_without_version: String,
    pub version: u32,
    pub method: String,
    pub content_type: ContentType,
    pub content_structure: ShapeTree,
    pub response_gzipped: bool,
    pub parameters: Vec<ParameterData>,
    pub return_type: ReturnType,
    /// Property carrying the data version of a cacheable endpoint's response
    pub data_version_property_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterData {
    pub name: String,
    pub name_snake_case: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityData {
    pub name: String,
    pub name_snake_case: String,
    /// Snake-cased id property, if the entity has one
    pub id_property_name: Option<String>,
    /// Properties sorted by name
    pub properties: Vec<PropertyData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyData {
    pub name: String,
    pub name_snake_case: String,
    /// Builtin type name, or the referenced entity's name
    #[serde(rename = "type")]
    pub type_name: String,
    pub is_builtin: bool,
    pub is_collection: bool,
}

/// Derive the generator input from a finished schema
pub fn prepare_api_data(schema: &ApiStructure, cacheable: &CacheableEndpoints) -> GeneratorInput {
    let entity_names = schema.entity_names();

    let services = schema
        .endpoints
        .iter()
        .map(|(service, endpoints)| {
            let service_cacheable = cacheable.get(service);
            prepare_service(service, endpoints, &entity_names, service_cacheable)
        })
        .collect();

    let entities = schema
        .entities
        .values()
        .map(|entity| prepare_entity(entity, &entity_names))
        .collect();

    GeneratorInput { services, entities }
}

fn prepare_service(
    service: &str,
    endpoints: &BTreeMap<String, FlowDetails>,
    entity_names: &BTreeSet<String>,
    cacheable: Option<&BTreeMap<String, String>>,
) -> ServiceData {
    let raw_endpoints: Vec<EndpointData> = endpoints
        .iter()
        .map(|(name, flow)| prepare_endpoint(name, flow, entity_names, cacheable))
        .collect();

    let mut latest_versions: BTreeMap<&str, u32> = BTreeMap::new();
    for endpoint in &raw_endpoints {
        let latest = latest_versions
            .entry(endpoint.name_snake_case_without_version.as_str())
            .or_insert(endpoint.version);
        *latest = (*latest).max(endpoint.version);
    }
    let latest: Vec<EndpointData> = raw_endpoints
        .iter()
        .filter(|endpoint| {
            latest_versions.get(endpoint.name_snake_case_without_version.as_str())
                == Some(&endpoint.version)
        })
        .cloned()
        .collect();

    let entity_types: BTreeSet<String> = raw_endpoints
        .iter()
        .flat_map(|endpoint| &endpoint.return_type.entities)
        .map(|returned| returned.entity_name.clone())
        .collect();

    ServiceData {
        name: service.to_string(),
        name_snake_case: convert_camel_to_snake_case(service),
        is_cacheable: cacheable.is_some_and(|endpoints| !endpoints.is_empty()),
        endpoints: latest,
        raw_endpoints,
        entity_types: entity_types.into_iter().collect(),
    }
}

fn prepare_endpoint(
    name: &str,
    flow: &FlowDetails,
    entity_names: &BTreeSet<String>,
    cacheable: Option<&BTreeMap<String, String>>,
) -> EndpointData {
    let (name_without_version, version) = endpoint_version(name);
    let parameter_source = if flow.query_parameters.is_empty() {
        &flow.content_parameters
    } else {
        &flow.query_parameters
    };

    EndpointData {
        name: name.to_string(),
        name_snake_case: convert_camel_to_snake_case(name),
        name_without_version: name_without_version.to_string(),
        name_snake_case_without_version: convert_camel_to_snake_case(name_without_version),
        version,
        method: flow.method.clone(),
        content_type: flow.content_type,
        content_structure: flow.content_structure.clone(),
        response_gzipped: flow.response_gzipped,
        parameters: extract_parameters(parameter_source),
        return_type: resolve_return_type(&flow.response_structure, entity_names),
        data_version_property_name: cacheable
            .and_then(|endpoints| endpoints.get(name_without_version))
            .cloned(),
    }
}

fn extract_parameters(parameters: &ShapeTree) -> Vec<ParameterData> {
    parameters
        .iter()
        .filter(|(name, _)| !name.is_empty())
        .filter_map(|(name, shape)| {
            let tag = shape.as_tag()?;
            Some(ParameterData {
                name: name.clone(),
                name_snake_case: parameter_identifier(name),
                type_name: builtin_type_name(tag).to_string(),
            })
        })
        .collect()
}

// Unknown types are generated as strings
fn builtin_type_name(tag: &TypeTag) -> &str {
    if tag.is_none() { "str" } else { tag.type_name() }
}

fn prepare_entity(entity: &ObjectStructure, entity_names: &BTreeSet<String>) -> EntityData {
    let properties: Vec<PropertyData> = entity
        .properties
        .iter()
        .filter_map(|(name, shape)| match shape {
            Shape::Scalar(TypeTag::Reference(tag)) => {
                let (target, is_collection) = find_entity_for_reference(tag, entity_names)?;
                Some(PropertyData {
                    name: name.clone(),
                    name_snake_case: property_identifier(name),
                    type_name: target,
                    is_builtin: false,
                    is_collection,
                })
            }
            Shape::Scalar(tag) => Some(PropertyData {
                name: name.clone(),
                name_snake_case: property_identifier(name),
                type_name: builtin_type_name(tag).to_string(),
                is_builtin: true,
                is_collection: false,
            }),
            Shape::Tree(_) => None,
        })
        .collect();

    let id_property_name = find_id_property(&entity.object_type_name, &properties)
        .map(property_identifier);

    EntityData {
        name: entity.object_type_name.clone(),
        name_snake_case: convert_camel_to_snake_case(&entity.object_type_name),
        id_property_name,
        properties,
    }
}

/// Resolve a reference tag to an entity: `Rooms` -> (`Room`, collection), `User` -> (`User`, single)
pub fn find_entity_for_reference(
    tag: &str,
    entity_names: &BTreeSet<String>,
) -> Option<(String, bool)> {
    if let Some(singular) = tag.strip_suffix('s')
        && entity_names.contains(singular)
    {
        return Some((singular.to_string(), true));
    }
    entity_names
        .contains(tag)
        .then(|| (tag.to_string(), false))
}

fn find_id_property<'a>(entity_name: &str, properties: &'a [PropertyData]) -> Option<&'a str> {
    let exact = format!("{entity_name}Id");
    properties
        .iter()
        .find(|property| property.name == exact)
        .or_else(|| properties.iter().find(|property| property.name == "Id"))
        .map(|property| property.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ApiStructure {
        let mut schema = ApiStructure::new();

        let mut list_v1 = FlowDetails::new("ItemService", "ListItemDesigns", "GET");
        list_v1.query_parameters.insert("languageKey", TypeTag::Str);
        list_v1.response_structure = ShapeTree::new().with(
            "ListItemDesigns",
            ShapeTree::new().with("ItemDesigns", ShapeTree::new().with("ItemDesign", ShapeTree::new())),
        );
        let mut list_v2 = list_v1.clone();
        list_v2.endpoint = "ListItemDesigns2".to_string();
        list_v2.query_parameters.insert("designVersion", TypeTag::None);

        let mut update = FlowDetails::new("ItemService", "UpdateItem", "POST");
        update.content_parameters.insert("ItemId", TypeTag::Int);

        schema.insert_flow(list_v1);
        schema.insert_flow(list_v2);
        schema.insert_flow(update);

        schema.insert_entity(ObjectStructure::new(
            "ItemDesign",
            ShapeTree::new()
                .with("ItemDesignId", TypeTag::Int)
                .with("ItemDesignName", TypeTag::None)
                .with("Rooms", TypeTag::Reference("Rooms".to_string()))
                .with("Ghosts", TypeTag::Reference("Ghosts".to_string())),
        ));
        schema.insert_entity(ObjectStructure::new(
            "Room",
            ShapeTree::new().with("Id", TypeTag::Int),
        ));
        schema
    }

    #[test]
    fn test_prepare_services() {
        let mut cacheable = CacheableEndpoints::new();
        cacheable
            .entry("ItemService".to_string())
            .or_default()
            .insert("ListItemDesigns".to_string(), "ItemDesignVersion".to_string());

        let input = prepare_api_data(&schema(), &cacheable);
        assert_eq!(input.services.len(), 1);

        let service = &input.services[0];
        assert_eq!(service.name_snake_case, "item_service");
        assert!(service.is_cacheable);
        assert_eq!(service.raw_endpoints.len(), 3);
        assert_eq!(
            service.endpoints.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            vec!["ListItemDesigns2", "UpdateItem"]
        );
        assert_eq!(service.entity_types, vec!["ItemDesign".to_string()]);

        let list = &service.endpoints[0];
        assert_eq!(list.version, 2);
        assert_eq!(list.name_snake_case_without_version, "list_item_designs");
        assert_eq!(list.data_version_property_name.as_deref(), Some("ItemDesignVersion"));
        assert_eq!(list.return_type.parent_tag.as_deref(), Some("ItemDesigns"));
        assert!(list.return_type.entities[0].is_collection);
        assert_eq!(
            list.parameters,
            vec![
                ParameterData {
                    name: "designVersion".to_string(),
                    name_snake_case: "design_version".to_string(),
                    type_name: "str".to_string(),
                },
                ParameterData {
                    name: "languageKey".to_string(),
                    name_snake_case: "language_key".to_string(),
                    type_name: "str".to_string(),
                },
            ]
        );

        let update = &service.endpoints[1];
        assert_eq!(update.parameters[0].name, "ItemId");
        assert_eq!(update.parameters[0].type_name, "int");
        assert_eq!(update.data_version_property_name, None);
    }

    #[test]
    fn test_prepare_entities() {
        let input = prepare_api_data(&schema(), &CacheableEndpoints::new());
        let names: Vec<&str> = input.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ItemDesign", "Room"]);

        let item = &input.entities[0];
        assert_eq!(item.id_property_name.as_deref(), Some("item_design_id"));
        let properties: Vec<(&str, &str, bool)> = item
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p.type_name.as_str(), p.is_collection))
            .collect();
        assert_eq!(
            properties,
            vec![
                ("ItemDesignId", "int", false),
                ("ItemDesignName", "str", false),
                ("Rooms", "Room", true),
            ]
        );

        let room = &input.entities[1];
        assert_eq!(room.id_property_name.as_deref(), Some("id_"));
    }

    #[test]
    fn test_id_parameter_keeps_its_name() {
        let mut schema = ApiStructure::new();
        let mut get_user = FlowDetails::new("UserService", "GetUser", "GET");
        get_user.query_parameters.insert("id", TypeTag::Int);
        get_user.query_parameters.insert("from", TypeTag::DateTime);
        schema.insert_flow(get_user);

        let input = prepare_api_data(&schema, &CacheableEndpoints::new());
        let parameters: Vec<&str> = input.services[0].endpoints[0]
            .parameters
            .iter()
            .map(|p| p.name_snake_case.as_str())
            .collect();
        assert_eq!(parameters, vec!["from_", "id"]);
    }

    #[test]
    fn test_find_entity_for_reference() {
        let names: BTreeSet<String> = ["Room", "User", "Status"].iter().map(|s| s.to_string()).collect();
        assert_eq!(find_entity_for_reference("Rooms", &names), Some(("Room".to_string(), true)));
        assert_eq!(find_entity_for_reference("User", &names), Some(("User".to_string(), false)));
        assert_eq!(find_entity_for_reference("Status", &names), Some(("Status".to_string(), false)));
        assert_eq!(find_entity_for_reference("Ghosts", &names), None);
    }
}
