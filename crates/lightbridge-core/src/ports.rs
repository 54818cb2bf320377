//! Collaborator ports: where device state comes from and where commands go.
//!
//! The router owns one of each behind an `Arc`, handed in at construction.

use crate::color::PackedColor;
use crate::device::{Device, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Read access to device and user records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Look up one device. `Ok(None)` when the directory has no such device.
    async fn get_device(&self, token: &str, endpoint_id: &str)
    -> Result<Option<Device>, DirectoryError>;

    /// Look up the user behind `token`.
    ///
    /// Unknown tokens yield [`User::empty`], not an error.
    async fn get_user(&self, token: &str) -> Result<User, DirectoryError>;
}

/// Delivery of commands to physical devices. Single attempt, no retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn publish(&self, endpoint_id: &str, command: &Command) -> Result<(), PublishError>;
}

/// Command payload delivered to a bulb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Power {
        #[serde(rename = "deviceId")]
        device_id: String,
        onoff: bool,
    },
    Color {
        #[serde(rename = "deviceId")]
        device_id: String,
        color: RgbCommand,
    },
}

impl Command {
    pub fn power(device_id: impl Into<String>, on: bool) -> Self {
        Self::Power {
            device_id: device_id.into(),
            onoff: on,
        }
    }

    pub fn color(device_id: impl Into<String>, color: PackedColor) -> Self {
        Self::Color {
            device_id: device_id.into(),
            color: RgbCommand::from(color),
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Self::Power { device_id, .. } | Self::Color { device_id, .. } => device_id,
        }
    }
}

/// Unpacked channel bytes. `type` is always 0 (plain RGB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbCommand {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl From<PackedColor> for RgbCommand {
    fn from(color: PackedColor) -> Self {
        Self {
            red: color.red(),
            green: color.green(),
            blue: color.blue(),
            kind: 0,
        }
    }
}

impl From<RgbCommand> for PackedColor {
    fn from(rgb: RgbCommand) -> Self {
        PackedColor::from_rgb(rgb.red, rgb.green, rgb.blue)
    }
}

/// Directory backend failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Command delivery failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PublishError {
    #[error("no device subscribed to {0}")]
    NoSubscriber(String),
    #[error("command channel closed")]
    Closed,
}
