//! Decoding of captured exchanges into draft flows
//!
//! A request path must look like `/service/endpoint`. Query values, request
//! bodies (XML or JSON) and response bodies (XML, optionally base64-encoded
//! zlib) are turned into shape trees with [`infer_scalar_type`].

use std::io::Read;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::ZlibDecoder;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::Value;

use super::config::ParserConfig;
use super::error::ExchangeError;
use super::formats::infer_scalar_type;
use super::types::{MergeMode, PROPERTIES_KEY, Shape, ShapeTree, TypeTag, unify_shape};
use crate::models::{CaptureHandle, ContentType, FlowDetails};

/// One captured request/response pair, as handed over by the capture reader
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: String,
    /// Path including the query string, e.g. `/UserService/ListUsers?id=5`
    pub path: String,
    pub request_body: Vec<u8>,
    pub response_body: Vec<u8>,
    pub request_content_type: Option<String>,
    pub response_content_type: Option<String>,
    pub handle: CaptureHandle,
}

impl Exchange {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            request_body: Vec::new(),
            response_body: Vec::new(),
            request_content_type: None,
            response_content_type: None,
            handle: CaptureHandle::new(handle),
        }
    }

    pub fn with_request_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request_body = body.into();
        self
    }

    pub fn with_request_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.request_content_type = Some(content_type.into());
        self
    }

    pub fn with_response_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.response_body = body.into();
        self
    }

    pub fn with_response_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.response_content_type = Some(content_type.into());
        self
    }
}

/// Decode one exchange into a draft flow carrying the exchange's handle
pub fn decode_exchange(
    exchange: &Exchange,
    config: &ParserConfig,
) -> Result<FlowDetails, ExchangeError> {
    let (service, endpoint, query) = split_path(&exchange.path)?;
    let mut flow = FlowDetails::new(service, endpoint, exchange.method.as_str());

    if let Some(query) = query {
        flow.query_parameters = parse_query(query);
    }

    if let Some((content_type, structure)) = decode_request_body(exchange, config.max_depth) {
        flow.content_type = content_type;
        flow.content_parameters = structure.leaves();
        flow.content_structure = structure;
    }

    let (response_structure, gzipped) = decode_response_body(&exchange.response_body, config)?;
    flow.response_structure = response_structure;
    flow.response_gzipped = gzipped;
    flow.capture = Some(exchange.handle.clone());

    Ok(flow)
}

/// Split `/service/endpoint?query` into its parts
pub fn split_path(path: &str) -> Result<(&str, &str, Option<&str>), ExchangeError> {
    let (path_part, query) = match path.split_once('?') {
        Some((path_part, query)) => (path_part, Some(query)),
        None => (path, None),
    };

    let mut segments = path_part.split('/');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(""), Some(service), Some(endpoint), None)
            if !service.is_empty() && !endpoint.is_empty() =>
        {
            Ok((service, endpoint, query))
        }
        _ => Err(ExchangeError::MalformedPath(path.to_string())),
    }
}

/// Infer the type of every query parameter; repeated keys are unified
pub fn parse_query(query: &str) -> ShapeTree {
    let mut parameters = ShapeTree::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (percent_decode(key), Some(percent_decode(value))),
            None => recover_pair(pair),
        };
        let tag = value.map_or(TypeTag::None, |value| infer_scalar_type(&value));
        parameters.unify_insert(key, Shape::Scalar(tag));
    }
    parameters
}

// `id123` -> (`id`, `123`): the first digit starts the value
fn recover_pair(pair: &str) -> (String, Option<String>) {
    match pair.find(|c: char| c.is_ascii_digit()) {
        Some(split) if split > 0 => {
            let (key, value) = pair.split_at(split);
            (percent_decode(key), Some(percent_decode(value)))
        }
        _ => (percent_decode(pair), None),
    }
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn decode_request_body(exchange: &Exchange, max_depth: usize) -> Option<(ContentType, ShapeTree)> {
    let body = exchange.request_body.as_slice();
    if is_blank(body) {
        return None;
    }

    let json_first = exchange
        .request_content_type
        .as_deref()
        .is_some_and(|hint| hint.to_ascii_lowercase().contains("json"));

    let as_xml = || {
        shape_of_xml(body, max_depth)
            .ok()
            .map(|shape| (ContentType::Xml, shape))
    };
    let as_json = || shape_of_json_body(body).map(|shape| (ContentType::Json, shape));

    if json_first {
        as_json().or_else(as_xml)
    } else {
        as_xml().or_else(as_json)
    }
}

fn decode_response_body(
    body: &[u8],
    config: &ParserConfig,
) -> Result<(ShapeTree, bool), ExchangeError> {
    if is_blank(body) {
        return Ok((ShapeTree::new(), false));
    }

    match shape_of_xml(body, config.max_depth) {
        Ok(shape) => Ok((shape, false)),
        Err(err @ ExchangeError::MaxDepthExceeded { .. }) => Err(err),
        Err(err) if !config.decode_compressed_responses => Err(err),
        Err(_) => {
            let inflated = inflate_base64_zlib(body)?;
            let shape = shape_of_xml(&inflated, config.max_depth)?;
            Ok((shape, true))
        }
    }
}

fn inflate_base64_zlib(body: &[u8]) -> Result<Vec<u8>, ExchangeError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| ExchangeError::UnparseableResponse(format!("not XML, not UTF-8: {e}")))?;
    let compressed = STANDARD
        .decode(text.trim())
        .map_err(|e| ExchangeError::UnparseableResponse(format!("not XML, not base64: {e}")))?;

    let mut inflated = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut inflated)
        .map_err(|e| ExchangeError::UnparseableResponse(format!("not zlib data: {e}")))?;
    Ok(inflated)
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Shape of a JSON value
///
/// Array items are merged into a single shape; an empty array is `none`.
pub fn shape_of_json(value: &Value) -> Shape {
    match value {
        Value::Null => Shape::Scalar(TypeTag::None),
        Value::Bool(_) => Shape::Scalar(TypeTag::Bool),
        Value::Number(number) => Shape::Scalar(infer_scalar_type(&number.to_string())),
        Value::String(text) => Shape::Scalar(infer_scalar_type(text)),
        Value::Array(items) => items
            .iter()
            .map(shape_of_json)
            .fold(Shape::Scalar(TypeTag::None), |acc, item| {
                unify_shape(&acc, &item, MergeMode::Widen)
            }),
        Value::Object(fields) => Shape::Tree(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), shape_of_json(value)))
                .collect(),
        ),
    }
}

// Only bodies whose top level is structured count as JSON
fn shape_of_json_body(body: &[u8]) -> Option<ShapeTree> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match shape_of_json(&value) {
        Shape::Tree(tree) => Some(tree),
        Shape::Scalar(_) => None,
    }
}

struct OpenElement {
    tag: String,
    node: ShapeTree,
}

/// Shape of an XML document: `{root_tag: node}`
///
/// Each node holds `properties` (attribute types, only when the element has
/// attributes) and one entry per child tag. Repeated sibling tags are merged.
pub fn shape_of_xml(body: &[u8], max_depth: usize) -> Result<ShapeTree, ExchangeError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| ExchangeError::UnparseableResponse(format!("XML is not UTF-8: {e}")))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<(String, ShapeTree)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let element = open_element(e, &stack, &root, max_depth)?;
                stack.push(element);
            }
            Ok(Event::Empty(ref e)) => {
                let element = open_element(e, &stack, &root, max_depth)?;
                close_element(element, &mut stack, &mut root);
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or_else(|| {
                    ExchangeError::UnparseableResponse("unexpected closing tag".to_string())
                })?;
                close_element(element, &mut stack, &mut root);
            }
            Ok(Event::Text(_)) | Ok(Event::CData(_)) => {
                if stack.is_empty() {
                    return Err(ExchangeError::UnparseableResponse(
                        "text outside of the root element".to_string(),
                    ));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExchangeError::UnparseableResponse(format!(
                    "XML error at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ExchangeError::UnparseableResponse(format!(
            "unclosed element '{}'",
            open.tag
        )));
    }

    let (tag, node) = root.ok_or_else(|| {
        ExchangeError::UnparseableResponse("document has no root element".to_string())
    })?;
    Ok(ShapeTree::new().with(tag, node))
}

fn open_element(
    start: &BytesStart<'_>,
    stack: &[OpenElement],
    root: &Option<(String, ShapeTree)>,
    max_depth: usize,
) -> Result<OpenElement, ExchangeError> {
    if stack.is_empty() && root.is_some() {
        return Err(ExchangeError::UnparseableResponse(
            "more than one root element".to_string(),
        ));
    }

    let depth = stack.len() + 1;
    if depth > max_depth {
        return Err(ExchangeError::MaxDepthExceeded {
            depth,
            max: max_depth,
        });
    }

    let tag = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut properties = ShapeTree::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            ExchangeError::UnparseableResponse(format!("bad attribute on '{tag}': {e}"))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value().map_err(|e| {
            ExchangeError::UnparseableResponse(format!("bad attribute value on '{tag}': {e}"))
        })?;
        properties.unify_insert(key, Shape::Scalar(infer_scalar_type(&value)));
    }

    let mut node = ShapeTree::new();
    if !properties.is_empty() {
        node.insert(PROPERTIES_KEY, properties);
    }
    Ok(OpenElement { tag, node })
}

fn close_element(
    element: OpenElement,
    stack: &mut [OpenElement],
    root: &mut Option<(String, ShapeTree)>,
) {
    match stack.last_mut() {
        Some(parent) => parent
            .node
            .unify_insert(element.tag, Shape::Tree(element.node)),
        None => *root = Some((element.tag, element.node)),
    }
}
