//! Schema file saving
//!
//! Keys are written in sorted order, so saving the same schema twice produces
//! byte-identical files.

use std::path::Path;

use tracing::info;

use crate::inference::SchemaError;
use crate::models::ApiStructure;

/// Serialize a schema; `compressed` output contains no whitespace
pub fn schema_to_json_string(
    schema: &ApiStructure,
    compressed: bool,
) -> Result<String, SchemaError> {
    let json = if compressed {
        serde_json::to_string(schema)?
    } else {
        serde_json::to_string_pretty(schema)?
    };
    Ok(json)
}

/// Write a schema file, replacing any existing file
pub fn write_schema(
    path: impl AsRef<Path>,
    schema: &ApiStructure,
    compressed: bool,
) -> Result<(), SchemaError> {
    let path = path.as_ref();
    let json = schema_to_json_string(schema, compressed)?;
    std::fs::write(path, json)?;
    info!(
        "Saved {} endpoints and {} entities to {}",
        schema.endpoint_count(),
        schema.entities.len(),
        path.display()
    );
    Ok(())
}
