//! Core of the smart-home light adapter.
//!
//! Translates voice-assistant directives into bulb commands and device state
//! into protocol responses. Transport, storage and command delivery live
//! behind the [`DeviceDirectory`] and [`CommandChannel`] ports; this crate only
//! validates, routes, converts colors and builds messages.

pub mod color;
pub mod device;
pub mod directive;
mod error;
pub mod ports;
pub mod response;
mod router;

pub use color::{ColorError, ColorTriple, PackedColor, hsl_to_packed, packed_to_hsl};
pub use device::{Device, DeviceRef, User};
pub use directive::{Directive, DirectiveError, DirectiveKind, PowerState};
pub use error::RouteError;
pub use ports::{Command, CommandChannel, DeviceDirectory, DirectoryError, PublishError};
pub use response::{ErrorType, Message, ResponseBuilder};
pub use router::Router;

/// The only protocol payload version handled.
pub const PAYLOAD_VERSION: &str = "3";

/// Protocol interface namespaces.
pub mod interface {
    pub const ALEXA: &str = "Alexa";
    pub const AUTHORIZATION: &str = "Alexa.Authorization";
    pub const DISCOVERY: &str = "Alexa.Discovery";
    pub const POWER_CONTROLLER: &str = "Alexa.PowerController";
    pub const COLOR_CONTROLLER: &str = "Alexa.ColorController";
    pub const ENDPOINT_HEALTH: &str = "Alexa.EndpointHealth";
}
