//! Configuration for traffic parsing

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::SchemaError;

/// Cacheable endpoints: service -> unversioned endpoint name -> data version property
pub type CacheableEndpoints = BTreeMap<String, BTreeMap<String, String>>;

/// Configuration for decoding and filtering captured exchanges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Services whose flows are discarded
    pub blocked_services: BTreeSet<String>,

    /// Endpoint name prefixes whose flows are discarded
    pub blocked_endpoint_prefixes: Vec<String>,

    /// Endpoints whose responses clients may cache, handed through to code generation
    pub cacheable_endpoints: CacheableEndpoints,

    /// Try base64 + zlib when a response body is not plain XML
    pub decode_compressed_responses: bool,

    /// Maximum XML element nesting depth
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            blocked_services: BTreeSet::new(),
            blocked_endpoint_prefixes: Vec::new(),
            cacheable_endpoints: CacheableEndpoints::new(),
            decode_compressed_responses: true,
            max_depth: 64,
        }
    }
}

impl ParserConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::default()
    }

    /// Parse a TOML configuration document
    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SchemaError::MissingInputFile(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Whether flows for this service/endpoint pair are discarded
    pub fn is_blocked(&self, service: &str, endpoint: &str) -> bool {
        self.blocked_services.contains(service)
            || self
                .blocked_endpoint_prefixes
                .iter()
                .any(|prefix| endpoint.starts_with(prefix.as_str()))
    }
}

/// Builder for ParserConfig
#[derive(Debug, Default)]
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl ParserConfigBuilder {
    /// Discard all flows of a service
    pub fn block_service(mut self, service: impl Into<String>) -> Self {
        self.config.blocked_services.insert(service.into());
        self
    }

    /// Discard all flows whose endpoint starts with `prefix`
    pub fn block_endpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.blocked_endpoint_prefixes.push(prefix.into());
        self
    }

    /// Mark an endpoint as cacheable, keyed by its unversioned name
    pub fn cacheable_endpoint(
        mut self,
        service: impl Into<String>,
        endpoint: impl Into<String>,
        data_version_property: impl Into<String>,
    ) -> Self {
        self.config
            .cacheable_endpoints
            .entry(service.into())
            .or_default()
            .insert(endpoint.into(), data_version_property.into());
        self
    }

    /// Enable or disable the base64 + zlib response fallback
    pub fn decode_compressed_responses(mut self, decode: bool) -> Self {
        self.config.decode_compressed_responses = decode;
        self
    }

    /// Set the maximum XML nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ParserConfig {
        self.config
    }
}
