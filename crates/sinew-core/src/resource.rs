//! Resource naming and the traits shared by every resource and robot source

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{RemoteConfig, ServiceConfig};
use crate::frame::FramePart;

/// Default namespace for resources built into the runtime
pub const NAMESPACE_RDK: &str = "rdk";

/// Resource type for hardware or software components
pub const TYPE_COMPONENT: &str = "component";

/// Resource type for services
pub const TYPE_SERVICE: &str = "service";

/// Structured identifier used as the key across the resource graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceName {
    pub namespace: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub subtype: String,
    pub name: String,
}

impl ResourceName {
    pub fn new(
        namespace: impl Into<String>,
        resource_type: impl Into<String>,
        subtype: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            resource_type: resource_type.into(),
            subtype: subtype.into(),
            name: name.into(),
        }
    }

    /// Name of a component in the default namespace
    pub fn component(subtype: &str, name: &str) -> Self {
        Self::new(NAMESPACE_RDK, TYPE_COMPONENT, subtype, name)
    }

    /// Name of a service in the default namespace. Services are keyed by subtype only.
    pub fn service(subtype: &str) -> Self {
        Self::new(NAMESPACE_RDK, TYPE_SERVICE, subtype, "")
    }

    pub fn is_component(&self) -> bool {
        self.resource_type == TYPE_COMPONENT
    }

    pub fn is_service(&self) -> bool {
        self.resource_type == TYPE_SERVICE
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.resource_type, self.subtype)?;
        if !self.name.is_empty() {
            write!(f, "/{}", self.name)?;
        }
        Ok(())
    }
}

/// Snapshot of live resources handed to updatable resources
pub type ResourceMap = HashMap<ResourceName, Arc<dyn Resource>>;

/// A constructed component or service owned by a resource manager.
///
/// Capabilities are declared explicitly: a resource that wants to be told
/// about its peers returns itself from [`Resource::as_updatable`].
#[async_trait]
pub trait Resource: Send + Sync {
    /// Typed access for callers that know the concrete type
    fn as_any(&self) -> &dyn Any;

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        None
    }

    fn as_config_updatable(&self) -> Option<&dyn ConfigUpdatable> {
        None
    }

    /// Release whatever the resource holds. Called at most once by the manager.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Resources that need to see every other resource of the robot
#[async_trait]
pub trait Updatable: Send + Sync {
    async fn update(&self, resources: &ResourceMap) -> anyhow::Result<()>;
}

/// Resources that accept a refreshed service configuration
#[async_trait]
pub trait ConfigUpdatable: Send + Sync {
    async fn update_config(&self, config: &ServiceConfig) -> anyhow::Result<()>;
}

/// Read-only query surface of a robot, local or federated
#[async_trait]
pub trait RobotSource: Send + Sync {
    async fn resource_names(&self) -> anyhow::Result<Vec<ResourceName>>;

    async fn resource_by_name(&self, name: &ResourceName) -> anyhow::Result<Arc<dyn Resource>>;

    /// Frame parts of this robot, already merged with its own remotes
    async fn frame_system_parts(&self) -> anyhow::Result<Vec<FramePart>>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Establishes connections to remote robots declared in configuration
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, config: &RemoteConfig) -> anyhow::Result<Arc<dyn RobotSource>>;
}
