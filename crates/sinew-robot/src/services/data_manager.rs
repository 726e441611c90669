//! Data manager service: capture settings and the resources eligible for capture

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sinew_core::{ConfigUpdatable, Resource, ResourceMap, ResourceName, ServiceConfig, Updatable};
use std::any::Any;
use tracing::debug;

/// Capture settings taken from the service attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_capture_dir")]
    pub capture_dir: String,
    #[serde(default)]
    pub capture_frequency_hz: f64,
}

fn default_capture_dir() -> String {
    ".sinew/capture".to_string()
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            capture_dir: default_capture_dir(),
            capture_frequency_hz: 0.0,
        }
    }
}

impl CaptureSettings {
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(config.attributes.clone()))
            .with_context(|| format!("invalid attributes for service {}", config.subtype))
    }
}

#[derive(Default)]
pub struct DataManagerService {
    settings: RwLock<CaptureSettings>,
    capturable: RwLock<Vec<ResourceName>>,
}

impl DataManagerService {
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            settings: RwLock::new(CaptureSettings::from_config(config)?),
            capturable: RwLock::new(Vec::new()),
        })
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings.read().clone()
    }

    /// Components seen at the last update, sorted
    pub fn capturable(&self) -> Vec<ResourceName> {
        self.capturable.read().clone()
    }
}

#[async_trait]
impl Resource for DataManagerService {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        Some(self)
    }

    fn as_config_updatable(&self) -> Option<&dyn ConfigUpdatable> {
        Some(self)
    }
}

#[async_trait]
impl Updatable for DataManagerService {
    async fn update(&self, resources: &ResourceMap) -> Result<()> {
        let mut capturable: Vec<ResourceName> = resources
            .keys()
            .filter(|name| name.is_component())
            .cloned()
            .collect();
        capturable.sort();
        *self.capturable.write() = capturable;
        Ok(())
    }
}

#[async_trait]
impl ConfigUpdatable for DataManagerService {
    async fn update_config(&self, config: &ServiceConfig) -> Result<()> {
        let settings = CaptureSettings::from_config(config)?;
        debug!(
            capture_dir = %settings.capture_dir,
            frequency_hz = settings.capture_frequency_hz,
            "Applied capture settings"
        );
        *self.settings.write() = settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(attributes: serde_json::Value) -> ServiceConfig {
        let mut config = ServiceConfig::new("data_manager");
        if let serde_json::Value::Object(map) = attributes {
            config.attributes = map;
        }
        config
    }

    #[tokio::test]
    async fn test_update_config() {
        let service = DataManagerService::default();
        assert_eq!(service.settings(), CaptureSettings::default());

        service
            .update_config(&config(json!({"capture_dir": "/tmp/cap", "capture_frequency_hz": 2.5})))
            .await
            .unwrap();
        let settings = service.settings();
        assert_eq!(settings.capture_dir, "/tmp/cap");
        assert_eq!(settings.capture_frequency_hz, 2.5);
    }

    #[tokio::test]
    async fn test_invalid_attributes_rejected() {
        let service = DataManagerService::default();
        let err = service
            .update_config(&config(json!({"capture_frequency_hz": "fast"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid attributes for service data_manager"));
        assert_eq!(service.settings(), CaptureSettings::default());

        assert!(DataManagerService::from_config(&config(json!({"capture_dir": 3}))).is_err());
    }

    #[tokio::test]
    async fn test_only_components_capturable() {
        let service = DataManagerService::default();
        let mut resources = ResourceMap::new();
        resources.insert(ResourceName::service("status"), std::sync::Arc::new(DataManagerService::default()));
        let arm = sinew_core::ComponentConfig::new("arm1", "arm", "fake");
        resources.insert(
            arm.resource_name(),
            std::sync::Arc::new(crate::components::fake::FakeComponent::new(arm)),
        );
        service.update(&resources).await.unwrap();
        assert_eq!(service.capturable(), vec![ResourceName::component("arm", "arm1")]);
    }
}
