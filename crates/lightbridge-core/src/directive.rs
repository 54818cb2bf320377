//! Inbound directives.
//!
//! A raw message is parsed once into a [`Directive`]; handlers then pull the
//! pieces they need through accessors that fail with
//! [`DirectiveError::Malformed`] when the path they expect is absent.

use crate::PAYLOAD_VERSION;
use crate::color::ColorTriple;
use crate::interface;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A parsed directive (the contents of the top-level `directive` key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    pub header: DirectiveHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<DirectiveEndpoint>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveHeader {
    pub namespace: String,
    pub name: String,
    pub payload_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<String>,
}

/// The device a directive targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveEndpoint {
    pub scope: Scope,
    pub endpoint_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "type", default = "bearer_token")]
    pub kind: String,
    pub token: String,
}

fn bearer_token() -> String {
    "BearerToken".to_string()
}

/// Grant carried by an `AcceptGrant` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub code: String,
    pub grantee_token: String,
}

/// Target of a power directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// What a directive asks for, decided by `(namespace, name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    AcceptGrant,
    ReportState,
    Discover,
    SetColor,
    SetPower(PowerState),
}

impl DirectiveKind {
    /// `None` when no handler exists for the pair.
    pub fn classify(namespace: &str, name: &str) -> Option<Self> {
        match (namespace, name) {
            (interface::AUTHORIZATION, "AcceptGrant") => Some(Self::AcceptGrant),
            (interface::ALEXA, "ReportState") => Some(Self::ReportState),
            // Some clients echo the response name back; treat it as a request.
            (interface::DISCOVERY, "Discover" | "Discover.Response") => Some(Self::Discover),
            (interface::COLOR_CONTROLLER, _) => Some(Self::SetColor),
            (interface::POWER_CONTROLLER, "TurnOn") => Some(Self::SetPower(PowerState::On)),
            (interface::POWER_CONTROLLER, "TurnOff") => Some(Self::SetPower(PowerState::Off)),
            _ => None,
        }
    }
}

/// Error extracting a directive or one of its fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("missing key: directive")]
    MissingDirective,
    #[error("unsupported payload version: {}", .0.as_deref().unwrap_or("<none>"))]
    UnsupportedVersion(Option<String>),
    #[error("malformed directive: {0}")]
    Malformed(String),
}

impl DirectiveError {
    fn missing(path: &str) -> Self {
        Self::Malformed(format!("missing {path}"))
    }
}

impl Directive {
    /// Parse a raw inbound message.
    ///
    /// The version is checked before the rest of the envelope so that a
    /// future-version message is reported as such even if its shape differs.
    pub fn parse(raw: &Value) -> Result<Self, DirectiveError> {
        let body = raw.get("directive").ok_or(DirectiveError::MissingDirective)?;

        let version = body
            .pointer("/header/payloadVersion")
            .and_then(Value::as_str);
        if version != Some(PAYLOAD_VERSION) {
            return Err(DirectiveError::UnsupportedVersion(version.map(str::to_owned)));
        }

        Self::deserialize(body).map_err(|e| DirectiveError::Malformed(e.to_string()))
    }

    pub fn namespace(&self) -> &str {
        &self.header.namespace
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn correlation_token(&self) -> Option<&str> {
        self.header.correlation_token.as_deref()
    }

    pub fn kind(&self) -> Option<DirectiveKind> {
        DirectiveKind::classify(self.namespace(), self.name())
    }

    fn require_endpoint(&self) -> Result<&DirectiveEndpoint, DirectiveError> {
        self.endpoint
            .as_ref()
            .ok_or_else(|| DirectiveError::missing("directive.endpoint"))
    }

    pub fn endpoint_id(&self) -> Result<&str, DirectiveError> {
        Ok(&self.require_endpoint()?.endpoint_id)
    }

    /// The bearer token identifying the user.
    ///
    /// Grants carry it as the grantee, discovery in the payload scope, and
    /// device directives in the endpoint scope.
    pub fn token(&self) -> Result<&str, DirectiveError> {
        match self.namespace() {
            interface::AUTHORIZATION => self.payload_str("/grantee/token"),
            interface::DISCOVERY => self.payload_str("/scope/token"),
            _ => Ok(&self.require_endpoint()?.scope.token),
        }
    }

    pub fn cookie(&self) -> Option<&BTreeMap<String, String>> {
        self.endpoint.as_ref().and_then(|e| e.cookie.as_ref())
    }

    pub fn grant(&self) -> Result<Grant, DirectiveError> {
        Ok(Grant {
            code: self.payload_str("/grant/code")?.to_string(),
            grantee_token: self.payload_str("/grantee/token")?.to_string(),
        })
    }

    /// The requested color, as sent (not yet validated for conversion).
    pub fn color(&self) -> Result<ColorTriple, DirectiveError> {
        let raw = self
            .payload
            .get("color")
            .ok_or_else(|| DirectiveError::missing("directive.payload.color"))?;
        ColorTriple::deserialize(raw)
            .map_err(|e| DirectiveError::Malformed(format!("directive.payload.color: {e}")))
    }

    fn payload_str(&self, pointer: &str) -> Result<&str, DirectiveError> {
        self.payload
            .pointer(pointer)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DirectiveError::missing(&format!("directive.payload{}", pointer.replace('/', ".")))
            })
    }
}
