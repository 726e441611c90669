//! Sinew Robot - Resource manager and local robot runtime
//!
//! This crate turns a robot configuration into a live resource graph:
//! - Constructor registry and lookup for components and services
//! - Resource manager: dependency-ordered construction, lookup, reconfiguration, close
//! - Default services carried by every robot
//! - In-process remotes, so robots can be federated into other robots

pub mod components;
pub mod manager;
pub mod reconfigurable;
pub mod registry;
pub mod remote;
pub mod robot;
pub mod services;

pub use manager::{CloseFailure, ConnectedRemote, ResourceManager, RobotError};
pub use reconfigurable::ReconfigurableResource;
pub use registry::{
    ComponentConstructor, ConstructorLookup, Dependencies, GlobalRegistry, Registry,
    ServiceConstructor,
};
pub use remote::{InProcessConnector, NoRemoteConnector};
pub use robot::{LocalRobot, RobotOptions, DEFAULT_REMOTE_TIMEOUT};
pub use services::DEFAULT_SERVICES;

/// Register the default services and the fake component models
pub fn register_builtins(registry: &mut Registry) {
    services::register_default_services(registry);
    components::register_fake_models(registry);
}
