//! Schema inference engine for captured API traffic
//!
//! This module reconstructs the typed schema of an undocumented API from
//! observed request/response exchanges.
//!
//! ## Features
//!
//! - **Type inference** - Classify scalar values as int, float, bool, datetime or str
//! - **Body decoding** - XML and JSON bodies, base64 + zlib compressed responses
//! - **Entity extraction** - Detect recurring entity types in response shapes
//! - **Aggregation** - Fold repeated observations of an endpoint into one contract
//! - **Schema merging** - Combine schemas from separate runs and apply overrides
//!
//! ## Example
//!
//! ```rust,ignore
//! use flow_schema::inference::{Exchange, ParserConfig, StructureParser};
//!
//! let mut parser = StructureParser::with_config(ParserConfig::default());
//! parser.add_exchange(
//!     &Exchange::new("GET", "/UserService/ListUsers?id=5", "capture-1")
//!         .with_response_body(r#"<ListUsers><Users><User Id="5"/></Users></ListUsers>"#),
//! )?;
//!
//! let schema = parser.finalize()?;
//! println!("{}", serde_json::to_string_pretty(&schema)?);
//! ```

mod aggregate;
mod config;
mod decoder;
mod entities;
mod error;
mod formats;
mod inferrer;
mod merge;
mod types;

pub use aggregate::{
    OrganizedFlows, merge_flows, merge_object_structures, organize_flows, singularize_entities,
    singularize_flows,
};
pub use config::{CacheableEndpoints, ParserConfig, ParserConfigBuilder};
pub use decoder::{Exchange, decode_exchange, parse_query, shape_of_json, shape_of_xml, split_path};
pub use entities::{ExtractedEntities, VERSION_ATTRIBUTE, extract_entities};
pub use error::{ExchangeError, SchemaError};
pub use formats::{infer_scalar_type, is_timestamp};
pub use inferrer::{ParseStats, StructureParser, parse_exchanges};
pub use merge::{apply_overrides, merge_all, merge_api_structures};
pub use types::{
    MergeMode, PROPERTIES_KEY, Shape, ShapeTree, TypeTag, merge_shapes, merge_shapes_with,
    unify_shape, unify_tag,
};
