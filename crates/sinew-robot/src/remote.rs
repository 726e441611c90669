//! Remote connectors that need no network
//!
//! [`InProcessConnector`] resolves remote addresses to robots living in the same
//! process. It is how child robots are composed in tests and embedded setups.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use sinew_core::{FramePart, RemoteConfig, RemoteConnector, Resource, ResourceName, RobotSource};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves remote addresses to in-process robots
#[derive(Default)]
pub struct InProcessConnector {
    robots: RwLock<HashMap<String, Arc<dyn RobotSource>>>,
}

impl InProcessConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `robot` reachable at `address`
    pub fn insert(&self, address: impl Into<String>, robot: Arc<dyn RobotSource>) {
        self.robots.write().insert(address.into(), robot);
    }

    pub fn remove(&self, address: &str) -> Option<Arc<dyn RobotSource>> {
        self.robots.write().remove(address)
    }
}

#[async_trait]
impl RemoteConnector for InProcessConnector {
    async fn connect(&self, config: &RemoteConfig) -> Result<Arc<dyn RobotSource>> {
        let robot = self
            .robots
            .read()
            .get(&config.address)
            .cloned()
            .ok_or_else(|| anyhow!("no robot at address {}", config.address))?;
        debug!(remote = %config.name, address = %config.address, "Connected in-process remote");
        Ok(Arc::new(InProcessRemote { robot }))
    }
}

/// View of an in-process robot held by a parent.
///
/// The child's lifetime belongs to whoever created it, so closing the view
/// leaves the child running.
struct InProcessRemote {
    robot: Arc<dyn RobotSource>,
}

#[async_trait]
impl RobotSource for InProcessRemote {
    async fn resource_names(&self) -> Result<Vec<ResourceName>> {
        self.robot.resource_names().await
    }

    async fn resource_by_name(&self, name: &ResourceName) -> Result<Arc<dyn Resource>> {
        self.robot.resource_by_name(name).await
    }

    async fn frame_system_parts(&self) -> Result<Vec<FramePart>> {
        self.robot.frame_system_parts().await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Connector for robots configured without any remote transport
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemoteConnector;

#[async_trait]
impl RemoteConnector for NoRemoteConnector {
    async fn connect(&self, config: &RemoteConfig) -> Result<Arc<dyn RobotSource>> {
        Err(anyhow!(
            "no remote transport configured for {} at {}",
            config.name,
            config.address
        ))
    }
}
