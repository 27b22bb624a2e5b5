//! Observed contract of one endpoint

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::null_as_default;
use crate::inference::ShapeTree;

/// Body encoding detected for a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "xml")]
    Xml,
    /// No body, or a body that parsed as neither XML nor JSON
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "json",
            ContentType::Xml => "xml",
            ContentType::Unknown => "",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ContentType::Unknown)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference back to the captured exchange a flow was decoded from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureHandle(String);

impl CaptureHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One endpoint's observed request/response contract
///
/// Identity (equality, hashing, ordering) is `(service, endpoint)` only: two
/// values with the same identity describe the same endpoint and must be merged
/// rather than kept side by side. Use [`FlowDetails::contract_eq`] to compare
/// the inferred shapes as well.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDetails {
    /// Flattened scalar leaves of `content_structure`
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_parameters: ShapeTree,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_structure: ShapeTree,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_type: ContentType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub endpoint: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query_parameters: ShapeTree,
    #[serde(default, deserialize_with = "null_as_default")]
    pub response_gzipped: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub response_structure: ShapeTree,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service: String,
    /// Source exchange; never persisted
    #[serde(skip)]
    pub capture: Option<CaptureHandle>,
}

impl FlowDetails {
    /// Create an empty contract for an endpoint
    pub fn new(
        service: impl Into<String>,
        endpoint: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            endpoint: endpoint.into(),
            method: method.into(),
            ..Self::default()
        }
    }

    /// Key used to order flows before grouping (`service + endpoint`, byte-wise)
    pub fn sort_key(&self) -> String {
        format!("{}{}", self.service, self.endpoint)
    }

    /// Compare every persisted field, not just the identity
    pub fn contract_eq(&self, other: &FlowDetails) -> bool {
        self.service == other.service
            && self.endpoint == other.endpoint
            && self.method == other.method
            && self.content_type == other.content_type
            && self.query_parameters == other.query_parameters
            && self.content_structure == other.content_structure
            && self.content_parameters == other.content_parameters
            && self.response_structure == other.response_structure
            && self.response_gzipped == other.response_gzipped
    }
}

impl fmt::Display for FlowDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.endpoint)
    }
}

impl PartialEq for FlowDetails {
    fn eq(&self, other: &Self) -> bool {
        self.service == other.service && self.endpoint == other.endpoint
    }
}

impl Eq for FlowDetails {}

impl Hash for FlowDetails {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service.hash(state);
        self.endpoint.hash(state);
    }
}

impl PartialOrd for FlowDetails {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FlowDetails {
    fn cmp(&self, other: &Self) -> Ordering {
        self.service
            .cmp(&other.service)
            .then_with(|| self.endpoint.cmp(&other.endpoint))
    }
}
