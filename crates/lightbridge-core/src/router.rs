//! Directive dispatch.
//!
//! [`Router::handle`] is the single entry point: it never fails, every error
//! becomes an `ErrorResponse`. Each request is validated, routed by
//! `(namespace, name)`, and answered after at most one directory read or one
//! command publish.

use crate::color::{ColorTriple, hsl_to_packed};
use crate::directive::{Directive, DirectiveKind, PowerState};
use crate::error::RouteError;
use crate::interface;
use crate::ports::{Command, CommandChannel, DeviceDirectory};
use crate::response::{
    CapabilityOptions, ContextPropertyOptions, EndpointOptions, Message, ResponseBuilder,
    ResponseOptions, create_capability,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Routes directives to handlers backed by the injected collaborators.
#[derive(Clone)]
pub struct Router {
    directory: Arc<dyn DeviceDirectory>,
    channel: Arc<dyn CommandChannel>,
}

impl Router {
    pub fn new(directory: Arc<dyn DeviceDirectory>, channel: Arc<dyn CommandChannel>) -> Self {
        Self { directory, channel }
    }

    /// Answer one raw inbound message.
    pub async fn handle(&self, raw: &Value) -> Message {
        tracing::debug!(request = %raw, "directive received");

        let message = match Directive::parse(raw) {
            Ok(directive) => match self.route(&directive).await {
                Ok(message) => message,
                Err(err) => reject(Some(&directive), err),
            },
            Err(err) => reject(None, err.into()),
        };

        tracing::debug!(response = %message.to_value(), "response built");
        message
    }

    async fn route(&self, directive: &Directive) -> Result<Message, RouteError> {
        let kind = directive
            .kind()
            .ok_or_else(|| RouteError::UnrecognizedDirective {
                namespace: directive.namespace().to_string(),
                name: directive.name().to_string(),
            })?;

        tracing::info!(
            namespace = directive.namespace(),
            name = directive.name(),
            "dispatching directive"
        );

        match kind {
            DirectiveKind::AcceptGrant => self.accept_grant(directive),
            DirectiveKind::ReportState => self.report_state(directive).await,
            DirectiveKind::Discover => self.discover(directive).await,
            DirectiveKind::SetColor => self.set_color(directive).await,
            DirectiveKind::SetPower(state) => self.set_power(directive, state).await,
        }
    }

    fn accept_grant(&self, directive: &Directive) -> Result<Message, RouteError> {
        // No token exchange happens; any well-formed grant is accepted.
        let grant = directive.grant()?;
        tracing::debug!(grantee = %grant.grantee_token, "grant accepted");

        Ok(ResponseBuilder::new(ResponseOptions::new(
            interface::AUTHORIZATION,
            "AcceptGrant.Response",
        ))
        .build())
    }

    async fn report_state(&self, directive: &Directive) -> Result<Message, RouteError> {
        let token = directive.token()?;
        let endpoint_id = directive.endpoint_id()?;

        let device = self
            .directory
            .get_device(token, endpoint_id)
            .await?
            .ok_or_else(|| RouteError::NoSuchEndpoint(endpoint_id.to_string()))?;

        let connectivity = if device.online {
            json!({"value": "OK"})
        } else {
            json!({"value": "UNREACHABLE", "reason": "INTERNET_UNREACHABLE"})
        };

        let mut response = ResponseBuilder::new(ResponseOptions {
            token: Some(token.to_string()),
            endpoint_id: Some(endpoint_id.to_string()),
            correlation_token: directive.correlation_token().map(str::to_owned),
            cookie: directive.cookie().cloned(),
            ..ResponseOptions::new(interface::ALEXA, "StateReport")
        });
        response
            .add_context_property(ContextPropertyOptions::new(
                interface::ENDPOINT_HEALTH,
                "connectivity",
                connectivity,
            ))
            .add_context_property(ContextPropertyOptions::new(
                interface::POWER_CONTROLLER,
                "powerState",
                json!(device.power_state()),
            ))
            .add_context_property(ContextPropertyOptions::new(
                interface::COLOR_CONTROLLER,
                "color",
                color_value(&device.color_or_default()),
            ));
        Ok(response.build())
    }

    async fn discover(&self, directive: &Directive) -> Result<Message, RouteError> {
        let token = directive.token()?;
        let user = self.directory.get_user(token).await?;

        let capabilities = vec![
            create_capability(CapabilityOptions::default()),
            create_capability(CapabilityOptions::supporting(
                interface::POWER_CONTROLLER,
                &["powerState"],
            )),
            create_capability(CapabilityOptions::supporting(
                interface::COLOR_CONTROLLER,
                &["color"],
            )),
            create_capability(CapabilityOptions {
                retrievable: true,
                ..CapabilityOptions::supporting(interface::ENDPOINT_HEALTH, &["connectivity"])
            }),
        ];

        let mut response = ResponseBuilder::new(ResponseOptions::new(
            interface::DISCOVERY,
            "Discover.Response",
        ));
        for device in &user.devices {
            response.add_payload_endpoint(EndpointOptions {
                endpoint_id: Some(device.id.clone()),
                friendly_name: device.nickname.clone(),
                capabilities: capabilities.clone(),
                ..EndpointOptions::default()
            });
        }

        tracing::info!(user = %user.user_id, devices = user.devices.len(), "discovery answered");
        Ok(response.build())
    }

    async fn set_color(&self, directive: &Directive) -> Result<Message, RouteError> {
        let endpoint_id = directive.endpoint_id()?;
        let requested = directive.color()?;
        let packed = hsl_to_packed(&requested)?;

        tracing::debug!(endpoint_id, color = %packed, "setting color");
        self.publish(endpoint_id, Command::color(endpoint_id, packed))
            .await?;

        let mut response = ack(directive)?;
        // Echo what was asked for, not the quantized color.
        response.add_context_property(ContextPropertyOptions::new(
            interface::COLOR_CONTROLLER,
            "color",
            color_value(&requested),
        ));
        Ok(response.build())
    }

    async fn set_power(
        &self,
        directive: &Directive,
        state: PowerState,
    ) -> Result<Message, RouteError> {
        let endpoint_id = directive.endpoint_id()?;

        tracing::debug!(endpoint_id, state = state.as_str(), "setting power");
        self.publish(endpoint_id, Command::power(endpoint_id, state.is_on()))
            .await?;

        let mut response = ack(directive)?;
        response.add_context_property(ContextPropertyOptions::new(
            interface::POWER_CONTROLLER,
            "powerState",
            json!(state.as_str()),
        ));
        Ok(response.build())
    }

    async fn publish(&self, endpoint_id: &str, command: Command) -> Result<(), RouteError> {
        self.channel
            .publish(endpoint_id, &command)
            .await
            .map_err(|source| RouteError::EndpointUnreachable {
                endpoint_id: endpoint_id.to_string(),
                source,
            })
    }
}

/// Turn a failure into an `ErrorResponse`.
///
/// Once the directive has parsed, the error carries its correlation token and,
/// when it names one, its endpoint.
fn reject(directive: Option<&Directive>, err: RouteError) -> Message {
    tracing::warn!(kind = err.error_type().as_str(), "directive rejected: {}", err);

    let mut options = ResponseOptions::default();
    if let Some(directive) = directive {
        options.correlation_token = directive.correlation_token().map(str::to_owned);
        if let Some(endpoint) = &directive.endpoint {
            options.token = Some(endpoint.scope.token.clone());
            options.endpoint_id = Some(endpoint.endpoint_id.clone());
            options.cookie = endpoint.cookie.clone();
        }
    }
    ResponseBuilder::error(options, err.error_type(), err.to_string()).build()
}

/// A bare `Alexa.Response` addressed back to the directive's endpoint.
fn ack(directive: &Directive) -> Result<ResponseBuilder, RouteError> {
    Ok(ResponseBuilder::new(ResponseOptions {
        token: Some(directive.token()?.to_string()),
        endpoint_id: Some(directive.endpoint_id()?.to_string()),
        correlation_token: directive.correlation_token().map(str::to_owned),
        cookie: directive.cookie().cloned(),
        ..ResponseOptions::default()
    }))
}

fn color_value(color: &ColorTriple) -> Value {
    json!({
        "hue": color.hue,
        "saturation": color.saturation,
        "brightness": color.brightness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceRef, User};
    use crate::ports::{DirectoryError, MockCommandChannel, MockDeviceDirectory, PublishError};

    fn router(directory: MockDeviceDirectory, channel: MockCommandChannel) -> Router {
        Router::new(Arc::new(directory), Arc::new(channel))
    }

    fn idle_router() -> Router {
        router(MockDeviceDirectory::new(), MockCommandChannel::new())
    }

    fn directive(namespace: &str, name: &str, payload: Value) -> Value {
        json!({
            "directive": {
                "header": {
                    "namespace": namespace,
                    "name": name,
                    "payloadVersion": "3",
                    "messageId": "1bd5d003-31b9-476f-ad03-71d471922820",
                    "correlationToken": "corr-token"
                },
                "endpoint": {
                    "scope": {"type": "BearerToken", "token": "user-token"},
                    "endpointId": "bulb-1"
                },
                "payload": payload
            }
        })
    }

    #[tokio::test]
    async fn missing_directive_is_invalid() {
        let message = idle_router().handle(&json!({"hello": "world"})).await;
        assert!(message.is_error());
        assert_eq!(message.error_type(), Some("INVALID_DIRECTIVE"));
        assert_eq!(
            message.event.payload["message"],
            "Missing key: directive, Is the request a valid Alexa Directive?"
        );
    }

    #[tokio::test]
    async fn old_version_is_internal_error() {
        let mut raw = directive("Alexa.PowerController", "TurnOn", json!({}));
        raw["directive"]["header"]["payloadVersion"] = json!("2");

        let message = idle_router().handle(&raw).await;
        assert_eq!(message.error_type(), Some("INTERNAL_ERROR"));
        assert_eq!(
            message.event.payload["message"],
            "This skill only supports Smart Home API version 3"
        );
    }

    #[tokio::test]
    async fn unknown_directive_is_reported() {
        let raw = directive("Alexa.ThermostatController", "SetTargetTemperature", json!({}));
        let message = idle_router().handle(&raw).await;
        assert_eq!(message.error_type(), Some("INVALID_DIRECTIVE"));
        assert!(
            message.event.payload["message"]
                .as_str()
                .unwrap()
                .contains("Alexa.ThermostatController.SetTargetTemperature")
        );
    }

    #[tokio::test]
    async fn power_directive_without_endpoint_is_malformed() {
        let mut raw = directive("Alexa.PowerController", "TurnOn", json!({}));
        raw["directive"].as_object_mut().unwrap().remove("endpoint");

        let message = idle_router().handle(&raw).await;
        assert_eq!(message.error_type(), Some("INVALID_DIRECTIVE"));
    }

    #[tokio::test]
    async fn accept_grant_always_succeeds() {
        let raw = json!({
            "directive": {
                "header": {
                    "namespace": "Alexa.Authorization",
                    "name": "AcceptGrant",
                    "payloadVersion": "3",
                    "messageId": "abc"
                },
                "payload": {
                    "grant": {"type": "OAuth2.AuthorizationCode", "code": "code"},
                    "grantee": {"type": "BearerToken", "token": "user-token"}
                }
            }
        });

        let message = idle_router().handle(&raw).await;
        assert_eq!(message.name(), "AcceptGrant.Response");
        assert_eq!(message.event.header.namespace, "Alexa.Authorization");
        let value = message.to_value();
        assert!(value["event"].get("endpoint").is_none());
        assert!(value.get("context").is_none());
    }

    #[tokio::test]
    async fn turn_on_unreachable() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_publish()
            .times(1)
            .returning(|id, _| Err(PublishError::NoSubscriber(id.to_string())));

        let raw = directive("Alexa.PowerController", "TurnOn", json!({}));
        let message = router(MockDeviceDirectory::new(), channel).handle(&raw).await;
        assert_eq!(message.error_type(), Some("ENDPOINT_UNREACHABLE"));
        assert_eq!(
            message.event.payload["message"],
            "Unable to reach endpoint database."
        );
    }

    #[tokio::test]
    async fn turn_off_publishes_and_acks() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_publish()
            .withf(|id, command| id == "bulb-1" && *command == Command::power("bulb-1", false))
            .times(1)
            .returning(|_, _| Ok(()));

        let raw = directive("Alexa.PowerController", "TurnOff", json!({}));
        let message = router(MockDeviceDirectory::new(), channel).handle(&raw).await;

        assert_eq!(message.name(), "Response");
        assert_eq!(
            message.event.header.correlation_token.as_deref(),
            Some("corr-token")
        );
        let endpoint = message.event.endpoint.as_ref().unwrap();
        assert_eq!(endpoint.endpoint_id, "bulb-1");
        assert_eq!(endpoint.scope.token, "user-token");

        let power = message
            .context_property("Alexa.PowerController", "powerState")
            .unwrap();
        assert_eq!(power.value, json!("OFF"));
        assert_eq!(message.context.as_ref().unwrap().properties.len(), 1);
    }

    #[tokio::test]
    async fn set_color_publishes_packed_and_echoes_request() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_publish()
            .withf(|id, command| {
                id == "bulb-1"
                    && serde_json::to_value(command).unwrap()
                        == json!({
                            "deviceId": "bulb-1",
                            "color": {"red": 255, "green": 0, "blue": 0, "type": 0}
                        })
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let requested = json!({"hue": 360.0, "saturation": 1.0, "brightness": 1.0});
        let raw = directive("Alexa.ColorController", "SetColor", json!({"color": requested}));
        let message = router(MockDeviceDirectory::new(), channel).handle(&raw).await;

        assert!(!message.is_error());
        let color = message
            .context_property("Alexa.ColorController", "color")
            .unwrap();
        assert_eq!(color.value, requested);
    }

    #[tokio::test]
    async fn set_color_out_of_range_is_rejected_before_publish() {
        let mut channel = MockCommandChannel::new();
        channel.expect_publish().never();

        let raw = directive(
            "Alexa.ColorController",
            "SetColor",
            json!({"color": {"hue": 10.0, "saturation": 2.0, "brightness": 1.0}}),
        );
        let message = router(MockDeviceDirectory::new(), channel).handle(&raw).await;
        assert_eq!(message.error_type(), Some("INVALID_VALUE"));
    }

    #[tokio::test]
    async fn set_color_failure_is_unreachable() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_publish()
            .times(1)
            .returning(|_, _| Err(PublishError::Closed));

        let raw = directive(
            "Alexa.ColorController",
            "SetColor",
            json!({"color": {"hue": 120.0, "saturation": 0.5, "brightness": 0.5}}),
        );
        let message = router(MockDeviceDirectory::new(), channel).handle(&raw).await;
        assert_eq!(message.error_type(), Some("ENDPOINT_UNREACHABLE"));
        assert_eq!(
            message.event.header.correlation_token.as_deref(),
            Some("corr-token")
        );
        let endpoint = message.event.endpoint.as_ref().unwrap();
        assert_eq!(endpoint.endpoint_id, "bulb-1");
        assert_eq!(endpoint.scope.token, "user-token");
    }

    #[tokio::test]
    async fn rejected_value_keeps_correlation_token() {
        let raw = directive(
            "Alexa.ColorController",
            "SetColor",
            json!({"color": {"hue": 10.0, "saturation": 1.0, "brightness": -0.5}}),
        );
        let message = idle_router().handle(&raw).await;
        assert_eq!(message.error_type(), Some("INVALID_VALUE"));
        assert_eq!(
            message.event.header.correlation_token.as_deref(),
            Some("corr-token")
        );
    }

    #[tokio::test]
    async fn unparsed_envelope_has_no_addressing() {
        let message = idle_router().handle(&json!({"hello": "world"})).await;
        assert!(message.event.header.correlation_token.is_none());
        assert!(message.event.endpoint.is_none());
    }

    #[tokio::test]
    async fn report_state_online_device() {
        let mut directory = MockDeviceDirectory::new();
        directory
            .expect_get_device()
            .withf(|token, id| token == "user-token" && id == "bulb-1")
            .times(1)
            .returning(|_, _| {
                Ok(Some(Device {
                    onoff: true,
                    online: true,
                    color: Some(ColorTriple::new(120.0, 1.0, 0.5)),
                }))
            });

        let raw = directive("Alexa", "ReportState", json!({}));
        let message = router(directory, MockCommandChannel::new()).handle(&raw).await;

        assert_eq!(message.name(), "StateReport");
        assert_eq!(message.event.endpoint.as_ref().unwrap().endpoint_id, "bulb-1");
        assert_eq!(message.context.as_ref().unwrap().properties.len(), 3);
        assert_eq!(
            message
                .context_property("Alexa.EndpointHealth", "connectivity")
                .unwrap()
                .value,
            json!({"value": "OK"})
        );
        assert_eq!(
            message
                .context_property("Alexa.PowerController", "powerState")
                .unwrap()
                .value,
            json!("ON")
        );
        assert_eq!(
            message
                .context_property("Alexa.ColorController", "color")
                .unwrap()
                .value,
            json!({"hue": 120.0, "saturation": 1.0, "brightness": 0.5})
        );
    }

    #[tokio::test]
    async fn report_state_offline_uncolored_device() {
        let mut directory = MockDeviceDirectory::new();
        directory
            .expect_get_device()
            .returning(|_, _| Ok(Some(Device::default())));

        let raw = directive("Alexa", "ReportState", json!({}));
        let message = router(directory, MockCommandChannel::new()).handle(&raw).await;

        assert_eq!(
            message
                .context_property("Alexa.EndpointHealth", "connectivity")
                .unwrap()
                .value,
            json!({"value": "UNREACHABLE", "reason": "INTERNET_UNREACHABLE"})
        );
        assert_eq!(
            message
                .context_property("Alexa.PowerController", "powerState")
                .unwrap()
                .value,
            json!("OFF")
        );
        assert_eq!(
            message
                .context_property("Alexa.ColorController", "color")
                .unwrap()
                .value,
            json!({"hue": 0.0, "saturation": 0.0, "brightness": 1.0})
        );
    }

    #[tokio::test]
    async fn report_state_unknown_device() {
        let mut directory = MockDeviceDirectory::new();
        directory.expect_get_device().returning(|_, _| Ok(None));

        let raw = directive("Alexa", "ReportState", json!({}));
        let message = router(directory, MockCommandChannel::new()).handle(&raw).await;
        assert_eq!(message.error_type(), Some("NO_SUCH_ENDPOINT"));
    }

    #[tokio::test]
    async fn directory_failure_is_internal_error() {
        let mut directory = MockDeviceDirectory::new();
        directory
            .expect_get_device()
            .returning(|_, _| Err(DirectoryError::Unavailable("timeout".into())));

        let raw = directive("Alexa", "ReportState", json!({}));
        let message = router(directory, MockCommandChannel::new()).handle(&raw).await;
        assert_eq!(message.error_type(), Some("INTERNAL_ERROR"));
    }

    fn discover_directive(name: &str) -> Value {
        json!({
            "directive": {
                "header": {
                    "namespace": "Alexa.Discovery",
                    "name": name,
                    "payloadVersion": "3",
                    "messageId": "abc"
                },
                "payload": {"scope": {"type": "BearerToken", "token": "user-token"}}
            }
        })
    }

    #[tokio::test]
    async fn discover_lists_each_device() {
        let mut directory = MockDeviceDirectory::new();
        directory
            .expect_get_user()
            .withf(|token| token == "user-token")
            .times(1)
            .returning(|token| {
                Ok(User {
                    user_id: token.to_string(),
                    devices: vec![
                        DeviceRef::new("bulb-1", "Desk lamp"),
                        DeviceRef::new("bulb-2", "Hallway"),
                    ],
                })
            });

        let message = router(directory, MockCommandChannel::new())
            .handle(&discover_directive("Discover"))
            .await;
        assert_eq!(message.name(), "Discover.Response");

        let value = message.to_value();
        assert!(value["event"].get("endpoint").is_none());
        assert!(value.get("context").is_none());

        let endpoints = value["event"]["payload"]["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0]["endpointId"], "bulb-1");
        assert_eq!(endpoints[1]["friendlyName"], "Hallway");
        for endpoint in endpoints {
            let interfaces: Vec<&str> = endpoint["capabilities"]
                .as_array()
                .unwrap()
                .iter()
                .map(|c| c["interface"].as_str().unwrap())
                .collect();
            assert_eq!(
                interfaces,
                [
                    "Alexa",
                    "Alexa.PowerController",
                    "Alexa.ColorController",
                    "Alexa.EndpointHealth"
                ]
            );
        }
    }

    #[tokio::test]
    async fn echoed_discover_response_is_treated_as_discover() {
        let mut directory = MockDeviceDirectory::new();
        directory
            .expect_get_user()
            .returning(|token| Ok(User::empty(token)));

        let message = router(directory, MockCommandChannel::new())
            .handle(&discover_directive("Discover.Response"))
            .await;
        assert_eq!(message.name(), "Discover.Response");
        assert!(message.event.payload.get("endpoints").is_none());
    }
}
