//! Schema loading and saving functionality
//!
//! Provides file operations for schema documents, cacheable-endpoint maps
//! and override files.

pub mod loader;
pub mod saver;

pub use loader::{read_and_merge_schemas, read_cacheable_endpoints, read_schema, schema_from_json_str};
pub use saver::{schema_to_json_string, write_schema};
