//! Error types for schema inference and merging

use std::path::PathBuf;

use thiserror::Error;

/// Errors that make a single captured exchange unusable
///
/// The capture pipeline logs these and drops the exchange; the batch continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Request path is not `/service/endpoint`
    #[error("Malformed path: expected /service/endpoint, found '{0}'")]
    MalformedPath(String),

    /// Response body is neither XML nor base64-encoded zlib-compressed XML
    #[error("Unparseable response body: {0}")]
    UnparseableResponse(String),

    /// XML nesting deeper than the configured limit
    #[error("Maximum nesting depth exceeded: {depth} > {max}")]
    MaxDepthExceeded { depth: usize, max: usize },
}

/// Errors surfaced to the caller of the inference and merge entry points
#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    /// An exchange could not be decoded
    #[error("Malformed exchange: {0}")]
    MalformedExchange(#[from] ExchangeError),

    /// Two entities with different names were merged under the same key
    #[error("Cannot merge entity '{right}' into entity '{left}'")]
    SchemaIdentityConflict { left: String, right: String },

    /// Input file does not exist
    #[error("Input file not found: {}", .0.display())]
    MissingInputFile(PathBuf),

    /// Schema file is not a valid schema document
    #[error("Invalid schema JSON: {0}")]
    InvalidJsonSchema(String),

    /// Configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for SchemaError {
    fn from(e: serde_json::Error) -> Self {
        SchemaError::InvalidJsonSchema(e.to_string())
    }
}

impl From<std::io::Error> for SchemaError {
    fn from(e: std::io::Error) -> Self {
        SchemaError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for SchemaError {
    fn from(e: toml::de::Error) -> Self {
        SchemaError::InvalidConfig(e.to_string())
    }
}
