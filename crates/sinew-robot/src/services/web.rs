//! Web service: the set of resources exposed to clients

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use sinew_core::{Resource, ResourceMap, ResourceName, Updatable};
use std::any::Any;

use super::WEB;

#[derive(Default)]
pub struct WebService {
    exposed: RwLock<Vec<ResourceName>>,
}

impl WebService {
    pub fn exposed(&self) -> Vec<ResourceName> {
        self.exposed.read().clone()
    }
}

#[async_trait]
impl Resource for WebService {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        Some(self)
    }
}

#[async_trait]
impl Updatable for WebService {
    async fn update(&self, resources: &ResourceMap) -> Result<()> {
        let own = ResourceName::service(WEB);
        let mut exposed: Vec<ResourceName> =
            resources.keys().filter(|name| **name != own).cloned().collect();
        exposed.sort();
        *self.exposed.write() = exposed;
        Ok(())
    }
}
