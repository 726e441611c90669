//! Sensors service: tracks which resources can be read as sensors

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use sinew_core::{Resource, ResourceMap, ResourceName, Updatable};
use std::any::Any;

/// Subtypes that produce readings
pub const SENSOR_SUBTYPES: [&str; 5] = ["sensor", "gps", "imu", "movement_sensor", "force_matrix"];

#[derive(Default)]
pub struct SensorsService {
    sensors: RwLock<Vec<ResourceName>>,
}

impl SensorsService {
    /// Sensor-capable resources seen at the last update, sorted
    pub fn sensors(&self) -> Vec<ResourceName> {
        self.sensors.read().clone()
    }
}

#[async_trait]
impl Resource for SensorsService {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        Some(self)
    }
}

#[async_trait]
impl Updatable for SensorsService {
    async fn update(&self, resources: &ResourceMap) -> Result<()> {
        let mut sensors: Vec<ResourceName> = resources
            .keys()
            .filter(|name| name.is_component() && SENSOR_SUBTYPES.contains(&name.subtype.as_str()))
            .cloned()
            .collect();
        sensors.sort();
        *self.sensors.write() = sensors;
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
    async fn test_update_keeps_sensor_subtypes() {
        let mut resources = ResourceMap::new();
        for (name, subtype) in [("gps1", "gps"), ("arm1", "arm"), ("imu1", "imu")] {
            let config = ComponentConfig::new(name, subtype, "fake");
            resources.insert(config.resource_name(), Arc::new(FakeComponent::new(config)));
        }

        let service = SensorsService::default();
        assert!(service.sensors().is_empty());
        service.update(&resources).await.unwrap();
        assert_eq!(
            service.sensors(),
            vec![
                ResourceName::component("gps", "gps1"),
                ResourceName::component("imu", "imu1"),
            ]
        );
    }
}
