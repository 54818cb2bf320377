//! Errors surfaced at the router boundary.

use crate::color::ColorError;
use crate::directive::DirectiveError;
use crate::ports::{DirectoryError, PublishError};
use crate::response::ErrorType;

/// Why a directive could not be answered with a success response.
///
/// Every variant maps onto an `ErrorResponse`; see [`RouteError::error_type`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouteError {
    #[error("Missing key: directive, Is the request a valid Alexa Directive?")]
    InvalidDirective,
    #[error("This skill only supports Smart Home API version 3")]
    UnsupportedVersion(Option<String>),
    #[error("{0}")]
    Malformed(String),
    #[error("No handler for directive {namespace}.{name}")]
    UnrecognizedDirective { namespace: String, name: String },
    #[error("Unknown endpoint: {0}")]
    NoSuchEndpoint(String),
    #[error("Invalid color: {0}")]
    InvalidValue(#[from] ColorError),
    #[error("Device directory failure: {0}")]
    Directory(#[from] DirectoryError),
    #[error("Unable to reach endpoint database.")]
    EndpointUnreachable {
        endpoint_id: String,
        #[source]
        source: PublishError,
    },
}

impl RouteError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::InvalidDirective | Self::Malformed(_) | Self::UnrecognizedDirective { .. } => {
                ErrorType::InvalidDirective
            }
            Self::UnsupportedVersion(_) | Self::Directory(_) => ErrorType::InternalError,
            Self::NoSuchEndpoint(_) => ErrorType::NoSuchEndpoint,
            Self::InvalidValue(_) => ErrorType::InvalidValue,
            Self::EndpointUnreachable { .. } => ErrorType::EndpointUnreachable,
        }
    }
}

impl From<DirectiveError> for RouteError {
    fn from(err: DirectiveError) -> Self {
        match err {
            DirectiveError::MissingDirective => Self::InvalidDirective,
            DirectiveError::UnsupportedVersion(version) => Self::UnsupportedVersion(version),
            DirectiveError::Malformed(_) => Self::Malformed(err.to_string()),
        }
    }
}
