//! Schema file loading
//!
//! Reads schema files written by [`super::saver`], cacheable-endpoint maps and
//! override files. Missing files are reported as
//! [`SchemaError::MissingInputFile`] before any parsing happens.

use std::path::Path;

use tracing::{info, warn};

use crate::inference::{CacheableEndpoints, SchemaError, merge_all};
use crate::models::ApiStructure;

/// Parse a schema document
pub fn schema_from_json_str(content: &str) -> Result<ApiStructure, SchemaError> {
    Ok(serde_json::from_str(content)?)
}

/// Read a schema file
pub fn read_schema(path: impl AsRef<Path>) -> Result<ApiStructure, SchemaError> {
    let content = read_input(path.as_ref())?;
    let schema = schema_from_json_str(&content)?;
    info!(
        "Loaded {} endpoints and {} entities from {}",
        schema.endpoint_count(),
        schema.entities.len(),
        path.as_ref().display()
    );
    Ok(schema)
}

/// Read several schema files and merge them left to right
pub fn read_and_merge_schemas<P: AsRef<Path>>(
    paths: impl IntoIterator<Item = P>,
) -> Result<ApiStructure, SchemaError> {
    let schemas = paths
        .into_iter()
        .map(|path| read_schema(path))
        .collect::<Result<Vec<_>, _>>()?;
    if schemas.is_empty() {
        warn!("No schema files given to merge");
    }
    merge_all(schemas)
}

/// Read a cacheable-endpoint map: service -> unversioned endpoint -> data version property
pub fn read_cacheable_endpoints(
    path: impl AsRef<Path>,
) -> Result<CacheableEndpoints, SchemaError> {
    let content = read_input(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

fn read_input(path: &Path) -> Result<String, SchemaError> {
    if !path.is_file() {
        return Err(SchemaError::MissingInputFile(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}
