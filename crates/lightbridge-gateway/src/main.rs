//! Gateway hosting the light adapter.
//!
//! Accepts directives on `POST /directive` and delivers bulb commands over
//! WebSockets at `/devices/{endpoint_id}`.
//!
//!   cargo run -p lightbridge-gateway -- --port 8080 --devices devices.toml

mod config;
mod directory;
mod hub;
mod server;

use clap::Parser;
use config::{Args, DeviceFile};
use directory::MemoryDirectory;
use hub::DeviceHub;
use lightbridge_core::Router;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("lightbridge_core=info".parse()?)
                .add_directive("lightbridge_gateway=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let file = match &args.devices {
        Some(path) => DeviceFile::load(path)?,
        None => DeviceFile::default(),
    };
    let users = file.users.len();
    let directory = Arc::new(MemoryDirectory::from_file(file));
    tracing::info!(
        "Loaded {} users and {} devices",
        users,
        directory.device_count().await
    );
    let hub = Arc::new(DeviceHub::new(directory.clone()));
    let router = Router::new(directory, hub.clone());

    server::run(args.addr(), server::AppState { router, hub }).await
}
