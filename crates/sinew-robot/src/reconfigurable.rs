//! Reconfigurable resource wrapper
//!
//! Other components hold the wrapper, so the implementation behind it can be
//! replaced without invalidating their references.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use sinew_core::{ConfigUpdatable, Resource, ResourceMap, ServiceConfig, Updatable};
use std::any::Any;
use std::sync::Arc;

use crate::registry::ReconfigurableWrapper;

pub struct ReconfigurableResource {
    current: RwLock<Arc<dyn Resource>>,
}

impl ReconfigurableResource {
    pub fn new(inner: Arc<dyn Resource>) -> Self {
        Self {
            current: RwLock::new(inner),
        }
    }

    pub fn wrap(inner: Arc<dyn Resource>) -> Result<Arc<dyn Resource>> {
        Ok(Arc::new(Self::new(inner)))
    }

    /// Wrapper suitable for [`crate::Registry::register_reconfigurable`]
    pub fn wrapper() -> ReconfigurableWrapper {
        Arc::new(Self::wrap)
    }

    /// The implementation currently behind the wrapper
    pub fn current(&self) -> Arc<dyn Resource> {
        self.current.read().clone()
    }

    /// Install `next` and return the previous implementation
    pub fn swap(&self, next: Arc<dyn Resource>) -> Arc<dyn Resource> {
        std::mem::replace(&mut *self.current.write(), next)
    }
}

#[async_trait]
impl Resource for ReconfigurableResource {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        if self.current.read().as_updatable().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_config_updatable(&self) -> Option<&dyn ConfigUpdatable> {
        if self.current.read().as_config_updatable().is_some() {
            Some(self)
        } else {
            None
        }
    }

    async fn close(&self) -> Result<()> {
        let inner = self.current();
        inner.close().await
    }
}

#[async_trait]
impl Updatable for ReconfigurableResource {
    async fn update(&self, resources: &ResourceMap) -> Result<()> {
        let inner = self.current();
        match inner.as_updatable() {
            Some(updatable) => updatable.update(resources).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ConfigUpdatable for ReconfigurableResource {
    async fn update_config(&self, config: &ServiceConfig) -> Result<()> {
        let inner = self.current();
        match inner.as_config_updatable() {
            Some(updatable) => updatable.update_config(config).await,
            None => Ok(()),
        }
    }
}
