//! Fake component models
//!
//! Hardware-free stand-ins that keep their configuration and count how often
//! they were closed.

use anyhow::Result;
use async_trait::async_trait;
use sinew_core::{ComponentConfig, Resource};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::reconfigurable::ReconfigurableResource;
use crate::registry::Registry;

pub const FAKE_MODEL: &str = "fake";

/// Subtypes with a fake model
pub const FAKE_SUBTYPES: [&str; 6] = ["arm", "gripper", "camera", "sensor", "gps", "motor"];

pub struct FakeComponent {
    config: ComponentConfig,
    closed: AtomicUsize,
}

impl FakeComponent {
    pub fn new(config: ComponentConfig) -> Self {
        Self {
            config,
            closed: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resource for FakeComponent {
    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        debug!(component = %self.config.name, "Closed fake component");
        Ok(())
    }
}

/// Register the fake model for every fake subtype; arms and grippers are reconfigurable
pub fn register_fake_models(registry: &mut Registry) {
    for subtype in FAKE_SUBTYPES {
        registry.register_component_fn(subtype, FAKE_MODEL, |deps, config| {
            for dependency in &config.depends_on {
                deps.require(dependency)?;
            }
            Ok(Arc::new(FakeComponent::new(config.clone())))
        });
    }
    registry.register_reconfigurable("arm", ReconfigurableResource::wrapper());
    registry.register_reconfigurable("gripper", ReconfigurableResource::wrapper());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConstructorLookup, Dependencies};

    #[tokio::test]
    async fn test_fake_models() {
        let mut registry = Registry::new();
        register_fake_models(&mut registry);
        for subtype in FAKE_SUBTYPES {
            assert!(registry.lookup_component(subtype, FAKE_MODEL).is_some());
        }
        assert!(registry.lookup_reconfigurable("arm").is_some());
        assert!(registry.lookup_reconfigurable("camera").is_none());

        let mut gripper = ComponentConfig::new("grip", "gripper", FAKE_MODEL);
        gripper.depends_on.push("arm1".to_string());
        let constructor = registry.lookup_component("gripper", FAKE_MODEL).unwrap();
        assert!(constructor.construct(&Dependencies::new(), &gripper).await.is_err());

        let mut deps = Dependencies::new();
        deps.insert(
            "arm1",
            Arc::new(FakeComponent::new(ComponentConfig::new("arm1", "arm", FAKE_MODEL))),
        );
        let resource = constructor.construct(&deps, &gripper).await.unwrap();
        resource.close().await.unwrap();
        let fake = resource.as_any().downcast_ref::<FakeComponent>().unwrap();
        assert_eq!(fake.close_count(), 1);
    }
}
