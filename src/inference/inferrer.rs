//! Capture pipeline: decode, filter, extract and aggregate exchanges

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::aggregate::{organize_flows, singularize_entities, singularize_flows};
use super::config::ParserConfig;
use super::decoder::{Exchange, decode_exchange, split_path};
use super::entities::extract_entities;
use super::error::SchemaError;
use crate::models::{ApiStructure, FlowDetails, ObjectStructure};

/// Statistics from a capture run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStats {
    /// Exchanges decoded into flows
    pub exchanges_processed: usize,
    /// Exchanges dropped because they could not be decoded
    pub exchanges_dropped: usize,
    /// Exchanges discarded by the block-list
    pub flows_blocked: usize,
    /// Distinct service/endpoint pairs seen
    pub endpoints: usize,
    /// Distinct entity names seen
    pub entities: usize,
}

/// Accumulates captured exchanges into an API schema
///
/// Exchanges that cannot be decoded are logged and dropped; the rest of the
/// batch is unaffected.
pub struct StructureParser {
    config: ParserConfig,
    flows: Vec<FlowDetails>,
    entities: Vec<ObjectStructure>,
    endpoint_keys: BTreeSet<(String, String)>,
    entity_names: BTreeSet<String>,
    processed_count: usize,
    dropped_count: usize,
    blocked_count: usize,
}

impl StructureParser {
    /// Create a parser with default configuration
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Create a parser with custom configuration
    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            flows: Vec::new(),
            entities: Vec::new(),
            endpoint_keys: BTreeSet::new(),
            entity_names: BTreeSet::new(),
            processed_count: 0,
            dropped_count: 0,
            blocked_count: 0,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Add one exchange
    ///
    /// A decoding failure is logged, counted and returned as
    /// [`SchemaError::MalformedExchange`]; the parser stays usable.
    pub fn add_exchange(&mut self, exchange: &Exchange) -> Result<(), SchemaError> {
        if let Ok((service, endpoint, _)) = split_path(&exchange.path)
            && self.config.is_blocked(service, endpoint)
        {
            debug!("Skipping blocked flow {}/{} ({})", service, endpoint, exchange.handle);
            self.blocked_count += 1;
            return Ok(());
        }

        let mut flow = match decode_exchange(exchange, &self.config) {
            Ok(flow) => flow,
            Err(e) => {
                warn!("Dropping exchange {}: {}", exchange.handle, e);
                self.dropped_count += 1;
                return Err(SchemaError::MalformedExchange(e));
            }
        };

        let extracted = extract_entities(&flow.response_structure);
        flow.response_structure = extracted.residual;
        for entity in extracted.entities.into_values() {
            self.entity_names.insert(entity.object_type_name.clone());
            self.entities.push(entity);
        }

        self.endpoint_keys
            .insert((flow.service.clone(), flow.endpoint.clone()));
        self.flows.push(flow);
        self.processed_count += 1;
        Ok(())
    }

    /// Add a batch of exchanges, skipping the ones that fail to decode
    pub fn add_exchanges<'a>(&mut self, exchanges: impl IntoIterator<Item = &'a Exchange>) {
        for exchange in exchanges {
            // Failures are already logged and counted
            let _ = self.add_exchange(exchange);
        }
    }

    /// Fold all accumulated observations into one schema
    pub fn finalize(self) -> Result<ApiStructure, SchemaError> {
        let stats = self.stats();
        let endpoints = singularize_flows(organize_flows(self.flows));
        let entities = singularize_entities(self.entities)?;

        info!(
            "Parsed {} exchanges into {} endpoints and {} entities ({} dropped, {} blocked)",
            stats.exchanges_processed,
            stats.endpoints,
            stats.entities,
            stats.exchanges_dropped,
            stats.flows_blocked
        );

        Ok(ApiStructure {
            endpoints,
            entities,
        })
    }

    /// Get current statistics
    pub fn stats(&self) -> ParseStats {
        ParseStats {
            exchanges_processed: self.processed_count,
            exchanges_dropped: self.dropped_count,
            flows_blocked: self.blocked_count,
            endpoints: self.endpoint_keys.len(),
            entities: self.entity_names.len(),
        }
    }

    /// Number of exchanges decoded so far
    pub fn processed_count(&self) -> usize {
        self.processed_count
    }
}

impl Default for StructureParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a whole capture in one go
pub fn parse_exchanges(
    exchanges: &[Exchange],
    config: &ParserConfig,
) -> Result<ApiStructure, SchemaError> {
    let mut parser = StructureParser::with_config(config.clone());
    parser.add_exchanges(exchanges);
    parser.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ExchangeError, Shape, TypeTag};

    fn list_users(handle: &str, query: &str) -> Exchange {
        Exchange::new("GET", format!("/UserService/ListUsers{query}"), handle).with_response_body(
            r#"<UserService><ListUsers><Users><User Id="1" Name="a"/></Users></ListUsers></UserService>"#,
        )
    }

    #[test]
    fn test_parser_collects_flows_and_entities() {
        let mut parser = StructureParser::new();
        parser.add_exchange(&list_users("1", "")).unwrap();
        parser.add_exchange(&list_users("2", "?id=5")).unwrap();

        let stats = parser.stats();
        assert_eq!(stats.exchanges_processed, 2);
        assert_eq!(stats.endpoints, 1);
        assert_eq!(stats.entities, 1);

        let schema = parser.finalize().unwrap();
        let flow = schema.flow("UserService", "ListUsers").unwrap();
        assert_eq!(flow.query_parameters.get("id"), Some(&Shape::Scalar(TypeTag::Int)));
        assert!(schema.entity("User").is_some());
    }

    #[test]
    fn test_parser_drops_bad_exchanges() {
        let mut parser = StructureParser::new();
        let bad_path = Exchange::new("GET", "/nope", "bad-path");
        let bad_body = Exchange::new("GET", "/UserService/ListUsers", "bad-body")
            .with_response_body("%%% not a body %%%");

        assert!(matches!(
            parser.add_exchange(&bad_path),
            Err(SchemaError::MalformedExchange(ExchangeError::MalformedPath(_)))
        ));
        assert!(matches!(
            parser.add_exchange(&bad_body),
            Err(SchemaError::MalformedExchange(ExchangeError::UnparseableResponse(_)))
        ));
        parser.add_exchange(&list_users("good", "")).unwrap();

        let stats = parser.stats();
        assert_eq!(stats.exchanges_dropped, 2);
        assert_eq!(stats.exchanges_processed, 1);
    }

    #[test]
    fn test_parser_block_list() {
        let config = ParserConfig::builder()
            .block_service("FileService")
            .block_endpoint_prefix("Debug")
            .build();
        let exchanges = vec![
            Exchange::new("GET", "/FileService/GetFile", "1"),
            Exchange::new("GET", "/UserService/DebugDump", "2"),
            list_users("3", ""),
        ];

        let mut parser = StructureParser::with_config(config);
        parser.add_exchanges(&exchanges);
        assert_eq!(parser.stats().flows_blocked, 2);

        let schema = parser.finalize().unwrap();
        assert_eq!(schema.endpoint_count(), 1);
        assert!(schema.endpoints.get("FileService").is_none());
    }

    #[test]
    fn test_parse_exchanges_empty() {
        let schema = parse_exchanges(&[], &ParserConfig::default()).unwrap();
        assert!(schema.is_empty());
    }
}
