//! Code generator support
//!
//! Derives everything a client generator needs from a finished schema:
//! which entities each endpoint returns, identifier spellings, endpoint
//! versions and entity relationships. Rendering itself happens elsewhere.

pub mod naming;
pub mod prepare;
pub mod return_type;

pub use naming::{
    RESERVED_IDENTIFIERS, RESERVED_PROPERTY_NAMES, convert_camel_to_snake_case, endpoint_version,
    parameter_identifier, property_identifier, safe_identifier,
};
pub use prepare::{
    EndpointData, EntityData, GeneratorInput, ParameterData, PropertyData, ServiceData,
    find_entity_for_reference, prepare_api_data,
};
pub use return_type::{EntityReturn, ReturnType, resolve_return_type};
