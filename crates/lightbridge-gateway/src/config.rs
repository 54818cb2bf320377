//! Command-line configuration and the device seed file.

use clap::Parser;
use lightbridge_core::{Device, DeviceRef};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "lightbridge-gateway", about = "Smart-home light adapter gateway")]
pub struct Args {
    /// Port for the directive endpoint and device sockets.
    #[arg(long, env = "LIGHTBRIDGE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to listen on.
    #[arg(long, env = "LIGHTBRIDGE_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// TOML file describing users and devices.
    #[arg(long, env = "LIGHTBRIDGE_DEVICES")]
    pub devices: Option<PathBuf>,
}

impl Args {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Contents of the device seed file.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceFile {
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub devices: HashMap<String, Device>,
}

/// A user, keyed by the bearer token the assistant presents.
#[derive(Debug, Deserialize)]
pub struct UserEntry {
    pub token: String,
    #[serde(default)]
    pub devices: Vec<DeviceRef>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid device file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl DeviceFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }
}

impl std::str::FromStr for DeviceFile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
