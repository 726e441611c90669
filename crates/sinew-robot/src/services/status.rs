//! Status service: the resource list as last reported to the robot
//!
//! Connected remotes are listed as `component:remote/<name>` entries. The web
//! service is left out.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sinew_core::{Resource, ResourceMap, ResourceName, Updatable};
use std::any::Any;

use super::WEB;

/// Subtype under which connected remotes are listed
pub const REMOTE_SUBTYPE: &str = "remote";

#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub name: ResourceName,
    pub subtype: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct StatusService {
    entries: RwLock<Vec<ResourceStatus>>,
    remotes: RwLock<Vec<String>>,
}

impl StatusService {
    /// One entry per resource and connected remote, sorted by name
    pub fn status(&self) -> Vec<ResourceStatus> {
        self.entries.read().clone()
    }

    /// Remotes to list on the next update
    pub fn set_remotes(&self, remotes: Vec<String>) {
        *self.remotes.write() = remotes;
    }
}

#[async_trait]
impl Resource for StatusService {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        Some(self)
    }
}

#[async_trait]
impl Updatable for StatusService {
    async fn update(&self, resources: &ResourceMap) -> Result<()> {
        let now = Utc::now();
        let web = ResourceName::service(WEB);
        let remotes = self
            .remotes
            .read()
            .iter()
            .map(|remote| ResourceName::component(REMOTE_SUBTYPE, remote))
            .collect::<Vec<_>>();
        let mut entries: Vec<ResourceStatus> = resources
            .keys()
            .filter(|name| **name != web)
            .cloned()
            .chain(remotes)
            .map(|name| ResourceStatus {
                subtype: name.subtype.clone(),
                name,
                updated_at: now,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        *self.entries.write() = entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::fake::FakeComponent;
    use sinew_core::ComponentConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_status_lists_every_resource() {
        let service = StatusService::default();
        let mut resources = ResourceMap::new();
        let config = ComponentConfig::new("cam", "camera", "fake");
        resources.insert(config.resource_name(), Arc::new(FakeComponent::new(config)));
        resources.insert(ResourceName::service("status"), Arc::new(StatusService::default()));

        service.update(&resources).await.unwrap();
        let status = service.status();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].name, ResourceName::component("camera", "cam"));
        assert_eq!(status[1].subtype, "status");
    }

    #[tokio::test]
    async fn test_status_lists_remotes_and_hides_web() {
        let service = StatusService::default();
        let mut resources = ResourceMap::new();
        resources.insert(ResourceName::service(WEB), Arc::new(StatusService::default()));
        resources.insert(ResourceName::service("status"), Arc::new(StatusService::default()));
        service.set_remotes(vec!["tool".to_string()]);

        service.update(&resources).await.unwrap();
        let names: Vec<ResourceName> = service.status().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                ResourceName::component(REMOTE_SUBTYPE, "tool"),
                ResourceName::service("status"),
            ]
        );
    }
}
