//! Builtin services every robot carries

pub mod data_manager;
pub mod sensors;
pub mod status;
pub mod web;

pub use data_manager::{CaptureSettings, DataManagerService};
pub use sensors::SensorsService;
pub use status::{ResourceStatus, StatusService, REMOTE_SUBTYPE};
pub use web::WebService;

use std::sync::Arc;

use crate::registry::Registry;

pub const SENSORS: &str = "sensors";
pub const STATUS: &str = "status";
pub const WEB: &str = "web";
pub const DATA_MANAGER: &str = "data_manager";

/// Services constructed for every robot, in construction and update order
pub const DEFAULT_SERVICES: [&str; 4] = [SENSORS, STATUS, WEB, DATA_MANAGER];

/// Register constructors for the default services
pub fn register_default_services(registry: &mut Registry) {
    registry.register_service_fn(SENSORS, |_| Ok(Arc::new(SensorsService::default())));
    registry.register_service_fn(STATUS, |_| Ok(Arc::new(StatusService::default())));
    registry.register_service_fn(WEB, |_| Ok(Arc::new(WebService::default())));
    registry.register_service_fn(DATA_MANAGER, |config| {
        Ok(Arc::new(DataManagerService::from_config(config)?))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConstructorLookup;

    #[test]
    fn test_default_services_registered() {
        let mut registry = Registry::new();
        register_default_services(&mut registry);
        for subtype in DEFAULT_SERVICES {
            assert!(registry.lookup_service(subtype).is_some(), "{}", subtype);
        }
        assert!(registry.lookup_service("navigation").is_none());
    }
}
