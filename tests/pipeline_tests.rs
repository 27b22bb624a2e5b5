//! Capture pipeline tests

use std::collections::BTreeSet;
use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use flow_schema::codegen::{EntityReturn, resolve_return_type};
use flow_schema::inference::{
    Exchange, ParserConfig, Shape, StructureParser, TypeTag, parse_exchanges,
};
use flow_schema::models::ContentType;

fn tag_of(shape: Option<&Shape>) -> Option<&TypeTag> {
    shape.and_then(Shape::as_tag)
}

fn compressed(xml: &str) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes()).unwrap();
    STANDARD.encode(encoder.finish().unwrap()).into_bytes()
}

mod query_parameter_tests {
    use super::*;

    #[test]
    fn test_query_types() {
        let exchanges = vec![Exchange::new(
            "GET",
            "/DummyService/Dummy?a=5&b=true&c=2016-01-06T00:00:00",
            "1",
        )];
        let schema = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();
        let flow = schema.flow("DummyService", "Dummy").unwrap();

        assert_eq!(tag_of(flow.query_parameters.get("a")), Some(&TypeTag::Int));
        assert_eq!(tag_of(flow.query_parameters.get("b")), Some(&TypeTag::Bool));
        assert_eq!(tag_of(flow.query_parameters.get("c")), Some(&TypeTag::DateTime));
    }

    #[test]
    fn test_optional_parameter_is_kept() {
        let exchanges = vec![
            Exchange::new("GET", "/UserService/ListUsers", "1"),
            Exchange::new("GET", "/UserService/ListUsers?id=5", "2"),
        ];
        let schema = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();
        let flow = schema.flow("UserService", "ListUsers").unwrap();

        assert_eq!(tag_of(flow.query_parameters.get("id")), Some(&TypeTag::Int));
        assert_eq!(schema.endpoint_count(), 1);
    }

    #[test]
    fn test_missing_equals_recovery() {
        let exchanges = vec![Exchange::new("GET", "/UserService/GetUser?id123", "1")];
        let schema = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();
        let flow = schema.flow("UserService", "GetUser").unwrap();

        assert_eq!(tag_of(flow.query_parameters.get("id")), Some(&TypeTag::Int));
    }

    #[test]
    fn test_values_widen_across_observations() {
        let exchanges = vec![
            Exchange::new("GET", "/UserService/Search?q=5", "1"),
            Exchange::new("GET", "/UserService/Search?q=5.5", "2"),
            Exchange::new("GET", "/UserService/Search?q=bob", "3"),
        ];
        let schema = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();
        let flow = schema.flow("UserService", "Search").unwrap();

        assert_eq!(tag_of(flow.query_parameters.get("q")), Some(&TypeTag::Str));
    }
}

mod entity_pipeline_tests {
    use super::*;

    #[test]
    fn test_alliance_entity_and_return_type() {
        let exchanges = vec![
            Exchange::new("GET", "/AllianceService/ListAlliancesByRanking", "1").with_response_body(
                r#"<Alliances><Alliance Name="Pirates"/><Alliance Name="Traders"/></Alliances>"#,
            ),
        ];
        let schema = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();

        let alliance = schema.entity("Alliance").unwrap();
        assert_eq!(tag_of(alliance.properties.get("Name")), Some(&TypeTag::Str));
        assert_eq!(alliance.properties.len(), 1);

        let flow = schema
            .flow("AllianceService", "ListAlliancesByRanking")
            .unwrap();
        let alliances = flow
            .response_structure
            .get("Alliances")
            .and_then(Shape::as_tree)
            .unwrap();
        let residual = alliances.get("Alliance").and_then(Shape::as_tree).unwrap();
        assert!(residual.properties().is_none());

        let return_type = resolve_return_type(&flow.response_structure, &schema.entity_names());
        assert_eq!(return_type.parent_tag.as_deref(), Some("Alliances"));
        assert_eq!(
            return_type.entities,
            vec![EntityReturn {
                entity_name: "Alliance".to_string(),
                container_tag: "Alliances".to_string(),
                is_collection: true,
            }]
        );
    }

    #[test]
    fn test_entities_merge_across_endpoints() {
        let exchanges = vec![
            Exchange::new("GET", "/UserService/ListUsers", "1")
                .with_response_body(r#"<ListUsers><Users><User Id="1"/></Users></ListUsers>"#),
            Exchange::new("GET", "/UserService/GetUser", "2").with_response_body(
                r#"<GetUser><User Id="abc" LastLogin="2020-01-01T10:00:00"/></GetUser>"#,
            ),
        ];
        let schema = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();

        let user = schema.entity("User").unwrap();
        assert_eq!(tag_of(user.properties.get("Id")), Some(&TypeTag::Str));
        assert_eq!(tag_of(user.properties.get("LastLogin")), Some(&TypeTag::DateTime));
        assert_eq!(schema.entities.len(), 1);
    }

    #[test]
    fn test_versioned_wrapper_is_not_an_entity() {
        let exchanges = vec![
            Exchange::new("GET", "/SettingService/GetLatestVersion3", "1").with_response_body(
                r#"<GetLatestSetting><Setting version="3" MaintenanceMessage="x"/></GetLatestSetting>"#,
            ),
        ];
        let schema = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();

        assert!(schema.entities.is_empty());
        let entity_names: BTreeSet<String> = schema.entity_names();
        let flow = schema.flow("SettingService", "GetLatestVersion3").unwrap();
        assert!(resolve_return_type(&flow.response_structure, &entity_names).is_empty());
    }
}

mod body_decoding_tests {
    use super::*;

    #[test]
    fn test_compressed_response() {
        let exchanges = vec![
            Exchange::new("GET", "/ItemService/ListItemDesigns2", "1").with_response_body(compressed(
                r#"<ListItemDesigns><ItemDesigns><ItemDesign ItemDesignId="1"/></ItemDesigns></ListItemDesigns>"#,
            )),
        ];
        let schema = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();

        let flow = schema.flow("ItemService", "ListItemDesigns2").unwrap();
        assert!(flow.response_gzipped);
        assert!(schema.entity("ItemDesign").is_some());
    }

    #[test]
    fn test_json_and_xml_requests() {
        let exchanges = vec![
            Exchange::new("POST", "/UserService/Login", "1")
                .with_request_body(r#"{"DeviceKey": "abc", "Checksum": 12}"#),
            Exchange::new("POST", "/UserService/Update", "2")
                .with_request_body(r#"<Update><User Name="x"/></Update>"#),
        ];
        let schema = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();

        let login = schema.flow("UserService", "Login").unwrap();
        assert_eq!(login.content_type, ContentType::Json);
        assert_eq!(tag_of(login.content_parameters.get("Checksum")), Some(&TypeTag::Int));

        let update = schema.flow("UserService", "Update").unwrap();
        assert_eq!(update.content_type, ContentType::Xml);
        assert_eq!(tag_of(update.content_parameters.get("Name")), Some(&TypeTag::Str));
    }

    #[test]
    fn test_bad_exchanges_do_not_abort_the_batch() {
        let exchanges = vec![
            Exchange::new("GET", "/broken", "1"),
            Exchange::new("GET", "/UserService/ListUsers", "2").with_response_body("<<<"),
            Exchange::new("GET", "/UserService/GetUser?id=1", "3"),
        ];

        let mut parser = StructureParser::new();
        parser.add_exchanges(&exchanges);
        let stats = parser.stats();
        assert_eq!(stats.exchanges_dropped, 2);
        assert_eq!(stats.exchanges_processed, 1);

        let schema = parser.finalize().unwrap();
        assert_eq!(schema.endpoint_count(), 1);
    }
}

mod determinism_tests {
    use super::*;

    #[test]
    fn test_rerun_is_byte_identical() {
        let exchanges = vec![
            Exchange::new("GET", "/UserService/ListUsers?b=1&a=2", "1")
                .with_response_body(r#"<ListUsers><Users><User Id="1" Name="a"/></Users></ListUsers>"#),
            Exchange::new("GET", "/AllianceService/ListAlliances", "2")
                .with_response_body(r#"<Alliances><Alliance Name="x"/></Alliances>"#),
            Exchange::new("GET", "/UserService/ListUsers", "3"),
        ];

        let first = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();
        let second = parse_exchanges(&exchanges, &ParserConfig::default()).unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
