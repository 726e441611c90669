//! Sinew Core - Core types, configuration document, and frame system
//!
//! This crate provides the foundational types for the Sinew runtime:
//! - Resource names and the resource/capability traits every component implements
//! - The robot configuration document (components, services, remotes)
//! - Frame parts, the frame system builder, and the transform engine
//! - The query surface shared by local robots and federated remotes

pub mod config;
pub mod frame;
pub mod frame_system;
pub mod resource;

pub use config::{
    ComponentConfig, ConfigError, FrameConfig, JointConfig, JointKind, Pose, RemoteConfig,
    RobotConfig, ServiceConfig,
};
pub use frame::{Frame, FrameInputs, FramePart, WORLD};
pub use frame_system::{FrameError, FrameSystem, RemoteFrames, rename_remote_parts};
pub use resource::{
    ConfigUpdatable, RemoteConnector, Resource, ResourceMap, ResourceName, RobotSource,
    Updatable,
};
