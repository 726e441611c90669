//! Local robot
//!
//! Ties a resource manager to the configuration it was built from, carries the
//! default services, and assembles the robot's frame system from local and
//! remote frame parts.

use anyhow::Result;
use async_trait::async_trait;
use sinew_core::{
    FramePart, FrameSystem, RemoteConnector, RemoteFrames, Resource, ResourceMap, ResourceName,
    RobotConfig, RobotSource, ServiceConfig,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::manager::{ResourceManager, RobotError};
use crate::registry::{ConstructorLookup, GlobalRegistry};
use crate::remote::NoRemoteConnector;
use crate::services::{StatusService, DEFAULT_SERVICES};

pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// How a robot finds constructors and reaches its remotes
#[derive(Clone)]
pub struct RobotOptions {
    pub name: String,
    pub lookup: Arc<dyn ConstructorLookup>,
    pub connector: Arc<dyn RemoteConnector>,
    /// Upper bound for each round-trip to a remote
    pub remote_timeout: Duration,
}

impl Default for RobotOptions {
    fn default() -> Self {
        Self {
            name: "robot".to_string(),
            lookup: Arc::new(GlobalRegistry),
            connector: Arc::new(NoRemoteConnector),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

impl RobotOptions {
    pub fn with_lookup(mut self, lookup: Arc<dyn ConstructorLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_remote_timeout(mut self, remote_timeout: Duration) -> Self {
        self.remote_timeout = remote_timeout;
        self
    }
}

pub struct LocalRobot {
    config: RobotConfig,
    options: RobotOptions,
    manager: ResourceManager,
}

impl LocalRobot {
    /// Build every resource, the default services, and a first frame system.
    ///
    /// On failure everything built so far is closed and the original error is returned.
    pub async fn new(config: RobotConfig, options: RobotOptions) -> Result<Arc<Self>, RobotError> {
        let robot = Arc::new(Self {
            manager: ResourceManager::with_remote_timeout(options.remote_timeout),
            config,
            options,
        });

        match robot.start().await {
            Ok(()) => {
                info!(
                    robot = %robot.options.name,
                    resources = robot.manager.resource_names().await.len(),
                    remotes = robot.manager.remote_names().await.len(),
                    "Robot ready"
                );
                Ok(robot)
            }
            Err(e) => {
                error!(robot = %robot.options.name, error = %e, "Robot construction failed");
                if let Err(close_err) = robot.manager.close().await {
                    warn!(error = %close_err, "Failed to close partially built robot");
                }
                Err(e)
            }
        }
    }

    async fn start(&self) -> Result<(), RobotError> {
        let lookup = self.options.lookup.as_ref();
        self.manager
            .process_config(&self.config, lookup, self.options.connector.as_ref())
            .await?;

        for subtype in DEFAULT_SERVICES {
            if self.config.service(subtype).is_some() {
                continue;
            }
            let service = ServiceConfig::new(subtype);
            let name = service.resource_name();
            let constructor = lookup
                .lookup_service(subtype)
                .ok_or_else(|| RobotError::UnknownService(subtype.to_string()))?;
            let resource = constructor
                .construct(&service)
                .await
                .map_err(|source| RobotError::Construction {
                    name: name.clone(),
                    source,
                })?;
            self.manager.add_resource(name, resource).await?;
        }

        self.update_default_services().await?;

        let frames = self.frame_system(&self.options.name).await?;
        debug!(frames = frames.len(), "Frame system assembled");
        Ok(())
    }

    /// Hand every default service a snapshot of the robot's resources, then its config
    pub async fn update_default_services(&self) -> Result<(), RobotError> {
        let snapshot = self.resource_snapshot().await;

        for subtype in DEFAULT_SERVICES {
            let name = ResourceName::service(subtype);
            let service = self.manager.resource_by_name(&name).await?;
            let update_error = |source| RobotError::Update {
                name: name.clone(),
                source,
            };

            if let Some(status) = service.as_any().downcast_ref::<StatusService>() {
                status.set_remotes(self.manager.remote_names().await);
            }
            if let Some(updatable) = service.as_updatable() {
                updatable.update(&snapshot).await.map_err(update_error)?;
            }
            if let (Some(updatable), Some(config)) =
                (service.as_config_updatable(), self.config.service(subtype))
            {
                updatable.update_config(config).await.map_err(update_error)?;
            }
        }
        Ok(())
    }

    /// Local resources plus every remote resource that resolves in time
    async fn resource_snapshot(&self) -> ResourceMap {
        let mut snapshot = self.manager.snapshot().await;
        for remote in self.manager.remotes().await {
            for name in remote.names {
                if snapshot.contains_key(&name) {
                    continue;
                }
                match timeout(self.options.remote_timeout, remote.source.resource_by_name(&name)).await {
                    Ok(Ok(resource)) => {
                        snapshot.insert(name, resource);
                    }
                    Ok(Err(e)) => {
                        debug!(remote = %remote.config.name, resource = %name, error = %e, "Skipping remote resource");
                    }
                    Err(_) => {
                        debug!(remote = %remote.config.name, resource = %name, "Timed out resolving remote resource");
                    }
                }
            }
        }
        snapshot
    }

    pub async fn resource_by_name(&self, name: &ResourceName) -> Result<Arc<dyn Resource>, RobotError> {
        self.manager.resource_by_name(name).await
    }

    pub async fn resource_names(&self) -> Vec<ResourceName> {
        self.manager.resource_names().await
    }

    pub async fn remote_names(&self) -> Vec<String> {
        self.manager.remote_names().await
    }

    pub async fn remote_by_name(&self, name: &str) -> Option<Arc<dyn RobotSource>> {
        self.manager.remote_by_name(name).await
    }

    /// Remotes skipped during construction, with the reason
    pub async fn remote_failures(&self) -> BTreeMap<String, String> {
        self.manager.remote_failures().await
    }

    /// Swap the implementation of a reconfigurable component
    pub async fn reconfigure(&self, name: &ResourceName, next: Arc<dyn Resource>) -> Result<(), RobotError> {
        self.manager.reconfigure(name, next).await?;
        self.update_default_services().await
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// The configuration this robot was built from
    pub fn config(&self) -> RobotConfig {
        self.config.clone()
    }

    /// Frame parts of every connected remote that declares an attachment.
    ///
    /// Remotes that fail or time out are skipped with a warning.
    pub async fn remote_frames(&self) -> Vec<RemoteFrames> {
        let mut contributions = Vec::new();
        for remote in self.manager.remotes().await {
            if remote.config.frame.is_none() {
                debug!(remote = %remote.config.name, "Remote has no frame attachment, skipping its frames");
                continue;
            }
            match timeout(self.options.remote_timeout, remote.source.frame_system_parts()).await {
                Ok(Ok(parts)) => contributions.push(RemoteFrames::new(&remote.config, parts)),
                Ok(Err(e)) => {
                    warn!(remote = %remote.config.name, error = %e, "Failed to fetch remote frames");
                }
                Err(_) => {
                    warn!(
                        remote = %remote.config.name,
                        timeout_ms = self.options.remote_timeout.as_millis() as u64,
                        "Timed out fetching remote frames"
                    );
                }
            }
        }
        contributions
    }

    /// Local frame parts followed by every remote's renamed parts
    pub async fn frame_system_parts(&self) -> Vec<FramePart> {
        let mut parts = self.config.frame_parts();
        for remote in self.remote_frames().await {
            parts.extend(remote.into_parts());
        }
        parts
    }

    pub async fn frame_system(&self, name: &str) -> Result<FrameSystem, RobotError> {
        let remotes = self.remote_frames().await;
        Ok(FrameSystem::build(name, self.config.frame_parts(), remotes)?)
    }

    /// Close every resource and remote; safe to call more than once
    pub async fn close(&self) -> Result<(), RobotError> {
        info!(robot = %self.options.name, "Closing robot");
        self.manager.close().await
    }
}

#[async_trait]
impl RobotSource for LocalRobot {
    async fn resource_names(&self) -> Result<Vec<ResourceName>> {
        Ok(LocalRobot::resource_names(self).await)
    }

    async fn resource_by_name(&self, name: &ResourceName) -> Result<Arc<dyn Resource>> {
        Ok(LocalRobot::resource_by_name(self, name).await?)
    }

    async fn frame_system_parts(&self) -> Result<Vec<FramePart>> {
        Ok(LocalRobot::frame_system_parts(self).await)
    }

    async fn close(&self) -> Result<()> {
        Ok(LocalRobot::close(self).await?)
    }
}
