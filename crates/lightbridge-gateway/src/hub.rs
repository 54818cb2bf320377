//! Command fan-out to connected bulbs.
//!
//! Each bulb holds one WebSocket subscription keyed by its endpoint id.
//! Publishing to an endpoint with no live subscription fails, which the
//! router reports as unreachable.

use crate::directory::MemoryDirectory;
use async_trait::async_trait;
use lightbridge_core::{Command, CommandChannel, PublishError};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};

struct Subscription {
    generation: u64,
    sender: mpsc::UnboundedSender<Command>,
}

pub struct DeviceHub {
    directory: Arc<MemoryDirectory>,
    subscriptions: RwLock<HashMap<String, Subscription>>,
    next_generation: AtomicU64,
}

impl DeviceHub {
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self {
            directory,
            subscriptions: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Subscribe a bulb, replacing any earlier connection for the same id.
    ///
    /// The returned generation must be passed back to [`unsubscribe`](Self::unsubscribe).
    pub async fn subscribe(&self, endpoint_id: &str) -> (u64, mpsc::UnboundedReceiver<Command>) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscriptions.write().await.insert(
            endpoint_id.to_string(),
            Subscription { generation, sender },
        );
        if !self.directory.set_online(endpoint_id, true).await {
            tracing::warn!("{} is not in the device directory", endpoint_id);
        }
        (generation, receiver)
    }

    /// Drop a subscription unless a newer connection has taken its place.
    pub async fn unsubscribe(&self, endpoint_id: &str, generation: u64) {
        let mut subscriptions = self.subscriptions.write().await;
        let current = subscriptions
            .get(endpoint_id)
            .is_some_and(|s| s.generation == generation);
        if current {
            subscriptions.remove(endpoint_id);
            drop(subscriptions);
            self.directory.set_online(endpoint_id, false).await;
        }
    }

    pub async fn connected(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

#[async_trait]
impl CommandChannel for DeviceHub {
    async fn publish(&self, endpoint_id: &str, command: &Command) -> Result<(), PublishError> {
        {
            let subscriptions = self.subscriptions.read().await;
            let subscription = subscriptions
                .get(endpoint_id)
                .ok_or_else(|| PublishError::NoSubscriber(endpoint_id.to_string()))?;
            subscription
                .sender
                .send(command.clone())
                .map_err(|_| PublishError::Closed)?;
        }
        self.directory.apply(command).await;
        Ok(())
    }
}
