//! Flow Schema - API schema reconstruction from captured traffic
//!
//! Provides:
//! - Decoding of captured request/response exchanges into typed shapes
//! - Entity detection and aggregation of repeated observations
//! - Merging of schemas from separate capture runs, and overrides
//! - Schema file loading/saving
//! - Return-type resolution and input preparation for client code generators

pub mod codegen;
pub mod inference;
pub mod model;
pub mod models;

// Re-export commonly used types
pub use inference::{
    Exchange, ExchangeError, MergeMode, ParseStats, ParserConfig, SchemaError, Shape, ShapeTree,
    StructureParser, TypeTag, apply_overrides, merge_all, merge_api_structures, parse_exchanges,
};
pub use model::{read_schema, write_schema};
pub use models::{ApiStructure, CaptureHandle, ContentType, FlowDetails, ObjectStructure};

pub use codegen::{GeneratorInput, ReturnType, prepare_api_data, resolve_return_type};
