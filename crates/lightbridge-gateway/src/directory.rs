//! In-memory device directory.

use crate::config::DeviceFile;
use async_trait::async_trait;
use lightbridge_core::{
    Command, Device, DeviceDirectory, DirectoryError, PackedColor, User, packed_to_hsl,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Records {
    /// Keyed by bearer token.
    users: HashMap<String, User>,
    /// Keyed by endpoint id.
    devices: HashMap<String, Device>,
}

/// Users and devices held in memory, updated as commands are delivered.
#[derive(Default)]
pub struct MemoryDirectory {
    records: RwLock<Records>,
}

impl MemoryDirectory {
    pub fn from_file(file: DeviceFile) -> Self {
        let users = file
            .users
            .into_iter()
            .map(|entry| {
                let user = User {
                    user_id: entry.token.clone(),
                    devices: entry.devices,
                };
                (entry.token, user)
            })
            .collect();
        Self {
            records: RwLock::new(Records {
                users,
                devices: file.devices,
            }),
        }
    }

    /// Record the state a delivered command puts the device in.
    ///
    /// Only known devices are tracked; commands for other ids leave no record.
    pub async fn apply(&self, command: &Command) {
        let mut records = self.records.write().await;
        let Some(device) = records.devices.get_mut(command.device_id()) else {
            return;
        };
        match command {
            Command::Power { onoff, .. } => device.onoff = *onoff,
            Command::Color { color, .. } => {
                device.color = Some(packed_to_hsl(PackedColor::from(*color)));
            }
        }
    }

    /// Mark a known device connected or not. Returns `false` for unknown ids.
    pub async fn set_online(&self, endpoint_id: &str, online: bool) -> bool {
        match self.records.write().await.devices.get_mut(endpoint_id) {
            Some(device) => {
                device.online = online;
                true
            }
            None => false,
        }
    }

    pub async fn device_count(&self) -> usize {
        self.records.read().await.devices.len()
    }
}

#[async_trait]
impl DeviceDirectory for MemoryDirectory {
    async fn get_device(
        &self,
        _token: &str,
        endpoint_id: &str,
    ) -> Result<Option<Device>, DirectoryError> {
        Ok(self.records.read().await.devices.get(endpoint_id).cloned())
    }

    async fn get_user(&self, token: &str) -> Result<User, DirectoryError> {
        let records = self.records.read().await;
        Ok(records
            .users
            .get(token)
            .cloned()
            .unwrap_or_else(|| User::empty(token)))
    }
}
