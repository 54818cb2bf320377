//! Device and user records as read from the device directory.

use crate::color::ColorTriple;
use serde::{Deserialize, Serialize};

/// Last known state of a bulb.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub onoff: bool,
    pub online: bool,
    /// `None` until a color has been set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorTriple>,
}

impl Device {
    /// Protocol power state string.
    pub fn power_state(&self) -> &'static str {
        if self.onoff { "ON" } else { "OFF" }
    }

    /// Color to report, falling back to white.
    pub fn color_or_default(&self) -> ColorTriple {
        self.color.unwrap_or_default()
    }
}

/// A device as listed under a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    pub id: String,
    pub nickname: String,
}

impl DeviceRef {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
        }
    }
}

/// A user and the devices linked to their account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub devices: Vec<DeviceRef>,
}

impl User {
    /// A user with no linked devices.
    ///
    /// Directories return this for unknown tokens instead of failing.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            devices: Vec::new(),
        }
    }
}
