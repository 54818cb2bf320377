//! Outbound protocol messages.
//!
//! [`ResponseBuilder`] collects context properties and discovery endpoints
//! and assembles a [`Message`]. Optional parts are `Option`s skipped during
//! serialization: the protocol rejects an empty `context` object and an
//! `endpoint` on grant or discovery responses, so neither may appear.

use crate::PAYLOAD_VERSION;
use crate::directive::Scope;
use crate::interface;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Response names that must not carry an `endpoint`.
pub const ENDPOINTLESS_RESPONSES: [&str; 2] = ["AcceptGrant.Response", "Discover.Response"];

/// Placeholder for a missing half of the response endpoint.
const INVALID: &str = "INVALID";

/// A complete outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    pub event: Event,
}

impl Message {
    pub fn name(&self) -> &str {
        &self.event.header.name
    }

    pub fn is_error(&self) -> bool {
        self.name() == "ErrorResponse"
    }

    /// `payload.type` of an error response.
    pub fn error_type(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        self.event.payload.get("type").and_then(Value::as_str)
    }

    /// First context property with the given namespace and name.
    pub fn context_property(&self, namespace: &str, name: &str) -> Option<&ContextProperty> {
        self.context
            .as_ref()?
            .properties
            .iter()
            .find(|p| p.namespace == namespace && p.name == name)
    }

    pub fn to_value(&self) -> Value {
        // Every field is a string, number, map or sequence.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub properties: Vec<ContextProperty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub header: ResponseHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ResponseEndpoint>,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHeader {
    pub namespace: String,
    pub name: String,
    pub message_id: Uuid,
    pub payload_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEndpoint {
    pub scope: Scope,
    pub endpoint_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<BTreeMap<String, String>>,
}

/// A timestamped observation attached to a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextProperty {
    pub namespace: String,
    pub name: String,
    pub value: Value,
    pub time_of_sample: DateTime<Utc>,
    pub uncertainty_in_milliseconds: u64,
}

/// A capability declared by a discovered endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "type")]
    pub kind: String,
    pub interface: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<CapabilityProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityProperties {
    pub supported: Vec<SupportedProperty>,
    pub proactively_reported: bool,
    pub retrievable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedProperty {
    pub name: String,
}

/// An endpoint in a discovery payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredEndpoint {
    pub endpoint_id: String,
    pub friendly_name: String,
    pub description: String,
    pub manufacturer_name: String,
    pub display_categories: Vec<String>,
    pub capabilities: Vec<Capability>,
    pub additional_attributes: AdditionalAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalAttributes {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub software_version: String,
    pub custom_identifier: String,
}

impl Default for AdditionalAttributes {
    fn default() -> Self {
        Self {
            manufacturer: "Sample Manufacturer".into(),
            model: "Sample Model".into(),
            serial_number: "U11112233456".into(),
            firmware_version: "1.24.2546".into(),
            software_version: "1.036".into(),
            custom_identifier: "Sample custom ID".into(),
        }
    }
}

/// `payload.type` of an `ErrorResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    InvalidDirective,
    InternalError,
    EndpointUnreachable,
    NoSuchEndpoint,
    InvalidValue,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidDirective => "INVALID_DIRECTIVE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::EndpointUnreachable => "ENDPOINT_UNREACHABLE",
            Self::NoSuchEndpoint => "NO_SUCH_ENDPOINT",
            Self::InvalidValue => "INVALID_VALUE",
        }
    }
}

/// Options for a new response.
///
/// Defaults: namespace `Alexa`, name `Response`, empty payload, no endpoint
/// and no correlation token.
#[derive(Debug, Clone)]
pub struct ResponseOptions {
    pub namespace: String,
    pub name: String,
    pub token: Option<String>,
    pub endpoint_id: Option<String>,
    pub correlation_token: Option<String>,
    pub cookie: Option<BTreeMap<String, String>>,
    pub payload: Map<String, Value>,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            namespace: interface::ALEXA.into(),
            name: "Response".into(),
            token: None,
            endpoint_id: None,
            correlation_token: None,
            cookie: None,
            payload: Map::new(),
        }
    }
}

impl ResponseOptions {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Options for one context property.
///
/// Defaults to a healthy `Alexa.EndpointHealth.connectivity` reading with
/// zero uncertainty.
#[derive(Debug, Clone)]
pub struct ContextPropertyOptions {
    pub namespace: String,
    pub name: String,
    pub value: Value,
    pub uncertainty_in_milliseconds: u64,
}

impl Default for ContextPropertyOptions {
    fn default() -> Self {
        Self {
            namespace: interface::ENDPOINT_HEALTH.into(),
            name: "connectivity".into(),
            value: json!({"value": "OK"}),
            uncertainty_in_milliseconds: 0,
        }
    }
}

impl ContextPropertyOptions {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            value,
            uncertainty_in_milliseconds: 0,
        }
    }
}

/// Options for a capability. Defaults to the bare `Alexa` interface.
#[derive(Debug, Clone)]
pub struct CapabilityOptions {
    pub interface: String,
    pub supported: Vec<String>,
    pub proactively_reported: bool,
    pub retrievable: bool,
}

impl Default for CapabilityOptions {
    fn default() -> Self {
        Self {
            interface: interface::ALEXA.into(),
            supported: Vec::new(),
            proactively_reported: false,
            retrievable: false,
        }
    }
}

impl CapabilityOptions {
    /// An interface exposing the given properties.
    pub fn supporting(interface: impl Into<String>, supported: &[&str]) -> Self {
        Self {
            interface: interface.into(),
            supported: supported.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Build a capability. `properties` is only present when something is supported.
pub fn create_capability(options: CapabilityOptions) -> Capability {
    let properties = (!options.supported.is_empty()).then(|| CapabilityProperties {
        supported: options
            .supported
            .into_iter()
            .map(|name| SupportedProperty { name })
            .collect(),
        proactively_reported: options.proactively_reported,
        retrievable: options.retrievable,
    });
    Capability {
        kind: "AlexaInterface".into(),
        interface: options.interface,
        version: PAYLOAD_VERSION.into(),
        properties,
    }
}

/// Options for a discovered endpoint.
///
/// Without an `endpoint_id` a random `endpoint_NNNNNN` id is generated. The
/// six-digit space makes collisions likely beyond a few hundred devices.
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    pub endpoint_id: Option<String>,
    pub friendly_name: String,
    pub description: String,
    pub manufacturer_name: String,
    pub display_categories: Vec<String>,
    pub capabilities: Vec<Capability>,
    pub additional_attributes: AdditionalAttributes,
    pub cookie: Option<BTreeMap<String, String>>,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            endpoint_id: None,
            friendly_name: "Sample light".into(),
            description: "Smart Home Tutorial: Virtual smart light bulb".into(),
            manufacturer_name: "Sample Manufacturer".into(),
            display_categories: vec!["LIGHT".into()],
            capabilities: Vec::new(),
            additional_attributes: AdditionalAttributes::default(),
            cookie: None,
        }
    }
}

pub fn create_endpoint(options: EndpointOptions) -> DiscoveredEndpoint {
    let endpoint_id = options.endpoint_id.unwrap_or_else(random_endpoint_id);
    DiscoveredEndpoint {
        endpoint_id,
        friendly_name: options.friendly_name,
        description: options.description,
        manufacturer_name: options.manufacturer_name,
        display_categories: options.display_categories,
        capabilities: options.capabilities,
        additional_attributes: options.additional_attributes,
        cookie: options.cookie,
    }
}

fn random_endpoint_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..=999_999);
    format!("endpoint_{suffix:06}")
}

/// Accumulates the parts of a response.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    header: ResponseHeader,
    endpoint: Option<ResponseEndpoint>,
    payload: Map<String, Value>,
    properties: Vec<ContextProperty>,
    endpoints: Vec<DiscoveredEndpoint>,
}

impl ResponseBuilder {
    pub fn new(options: ResponseOptions) -> Self {
        let header = ResponseHeader {
            namespace: options.namespace,
            name: options.name,
            message_id: Uuid::new_v4(),
            payload_version: PAYLOAD_VERSION.into(),
            correlation_token: options.correlation_token,
        };

        let endpointless = ENDPOINTLESS_RESPONSES.contains(&header.name.as_str());
        let endpoint = match (options.token, options.endpoint_id) {
            _ if endpointless => None,
            (None, None) => None,
            (token, endpoint_id) => Some(ResponseEndpoint {
                scope: Scope {
                    kind: "BearerToken".into(),
                    token: token.unwrap_or_else(|| INVALID.into()),
                },
                endpoint_id: endpoint_id.unwrap_or_else(|| INVALID.into()),
                cookie: options.cookie,
            }),
        };

        Self {
            header,
            endpoint,
            payload: options.payload,
            properties: Vec::new(),
            endpoints: Vec::new(),
        }
    }

    /// An `ErrorResponse` with `{type, message}` payload.
    ///
    /// Only the addressing of `options` is used: correlation token, token,
    /// endpoint id and cookie.
    pub fn error(
        options: ResponseOptions,
        error_type: ErrorType,
        message: impl Into<String>,
    ) -> Self {
        let mut payload = Map::new();
        payload.insert("type".into(), Value::from(error_type.as_str()));
        payload.insert("message".into(), Value::from(message.into()));
        Self::new(ResponseOptions {
            namespace: interface::ALEXA.into(),
            name: "ErrorResponse".into(),
            payload,
            ..options
        })
    }

    /// Append one context property sampled now.
    pub fn add_context_property(&mut self, options: ContextPropertyOptions) -> &mut Self {
        self.properties.push(ContextProperty {
            namespace: options.namespace,
            name: options.name,
            value: options.value,
            time_of_sample: Utc::now(),
            uncertainty_in_milliseconds: options.uncertainty_in_milliseconds,
        });
        self
    }

    pub fn add_payload_endpoint(&mut self, options: EndpointOptions) -> &mut Self {
        self.endpoints.push(create_endpoint(options));
        self
    }

    /// Assemble the message.
    ///
    /// `context` is omitted without properties and `payload.endpoints` without
    /// discovery endpoints.
    pub fn build(&self) -> Message {
        let mut payload = self.payload.clone();
        if !self.endpoints.is_empty() {
            let endpoints = self
                .endpoints
                .iter()
                .map(|e| serde_json::to_value(e).unwrap_or(Value::Null))
                .collect();
            payload.insert("endpoints".into(), Value::Array(endpoints));
        }

        let context = (!self.properties.is_empty()).then(|| Context {
            properties: self.properties.clone(),
        });

        Message {
            context,
            event: Event {
                header: self.header.clone(),
                endpoint: self.endpoint.clone(),
                payload,
            },
        }
    }
}
