//! Robot configuration document
//!
//! The configuration lists the components, services, and remotes a robot is
//! built from. It is usually loaded from TOML, but any serde format works.

use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::frame::FramePart;
use crate::resource::ResourceName;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse robot config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Pose in 3D space (x, y, z, roll, pitch, yaw), angles in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub roll: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
}

impl Pose {
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }

    /// Rigid transform equivalent of this pose (rotation applied roll, pitch, then yaw)
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(self.x, self.y, self.z),
            UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw),
        )
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        let (roll, pitch, yaw) = iso.rotation.euler_angles();
        let t = iso.translation.vector;
        Self {
            x: t.x,
            y: t.y,
            z: t.z,
            roll,
            pitch,
            yaw,
        }
    }
}

/// Kind of motion a joint contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointKind {
    /// Rotation about `axis`, input in radians
    Revolute,
    /// Translation along `axis`, input in the frame's length unit
    Prismatic,
}

/// A single degree of freedom driven by a named input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointConfig {
    pub kind: JointKind,
    #[serde(default = "default_axis")]
    pub axis: [f64; 3],
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

fn default_axis() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

/// How a frame attaches to its parent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Name of the parent frame ("world" for the root)
    #[serde(default)]
    pub parent: String,
    /// Fixed offset from the parent
    #[serde(default)]
    pub pose: Pose,
    /// Optional joint applied after the offset
    #[serde(default)]
    pub joint: Option<JointConfig>,
}

impl FrameConfig {
    pub fn new(parent: impl Into<String>, pose: Pose) -> Self {
        Self {
            parent: parent.into(),
            pose,
            joint: None,
        }
    }
}

/// A component declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    pub subtype: String,
    pub model: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Names of components that must be constructed first
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub frame: Option<FrameConfig>,
}

impl ComponentConfig {
    pub fn new(name: &str, subtype: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            subtype: subtype.to_string(),
            model: model.to_string(),
            attributes: Map::new(),
            depends_on: Vec::new(),
            frame: None,
        }
    }

    pub fn resource_name(&self) -> ResourceName {
        ResourceName::component(&self.subtype, &self.name)
    }
}

/// A service declaration. Services are identified by subtype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub subtype: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ServiceConfig {
    pub fn new(subtype: &str) -> Self {
        Self {
            subtype: subtype.to_string(),
            attributes: Map::new(),
        }
    }

    pub fn resource_name(&self) -> ResourceName {
        ResourceName::service(&self.subtype)
    }
}

/// A federated sub-robot declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    /// Connection information understood by the configured connector
    pub address: String,
    /// Prefix every frame contributed by this remote with "<name>."
    #[serde(default)]
    pub frame_prefix: bool,
    /// Fail robot construction when this remote cannot be reached
    #[serde(default)]
    pub required: bool,
    /// Where the remote's world attaches in this robot's frame tree
    #[serde(default)]
    pub frame: Option<FrameConfig>,
}

impl RemoteConfig {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            frame_prefix: false,
            required: false,
            frame: None,
        }
    }
}

/// Root robot configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub remotes: Vec<RemoteConfig>,
}

impl RobotConfig {
    /// Parse a configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn service(&self, subtype: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.subtype == subtype)
    }

    /// Frame parts declared by local components, in declaration order
    pub fn frame_parts(&self) -> Vec<FramePart> {
        self.components
            .iter()
            .filter_map(|c| {
                c.frame.as_ref().map(|frame| FramePart {
                    name: c.name.clone(),
                    frame: frame.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_robot_config() {
        let content = r#"
[[components]]
name = "pieceArm"
subtype = "arm"
model = "fake"
frame = { parent = "world", pose = { x = 500.0, z = 300.0 } }

[[components]]
name = "pieceGripper"
subtype = "gripper"
model = "fake"
depends_on = ["pieceArm"]
attributes = { width = 80.0 }

[components.frame]
parent = "pieceArm"
pose = { z = -100.0 }
joint = { kind = "prismatic", axis = [1.0, 0.0, 0.0], min = 0.0, max = 80.0 }

[[services]]
subtype = "data_manager"
attributes = { capture_dir = "/tmp/capture" }

[[remotes]]
name = "r1"
address = "127.0.0.1:8081"
frame_prefix = true
frame = { parent = "pieceArm" }
"#;
        let config = RobotConfig::from_toml(content).unwrap();
        assert_eq!(config.components.len(), 2);
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.remotes.len(), 1);

        let arm = &config.components[0];
        assert_eq!(arm.resource_name(), ResourceName::component("arm", "pieceArm"));
        let frame = arm.frame.as_ref().unwrap();
        assert_eq!(frame.parent, "world");
        assert_eq!(frame.pose, Pose::from_translation(500.0, 0.0, 300.0));

        let gripper = &config.components[1];
        assert_eq!(gripper.depends_on, vec!["pieceArm".to_string()]);
        assert_eq!(gripper.attributes["width"], 80.0);
        let joint = gripper.frame.as_ref().unwrap().joint.as_ref().unwrap();
        assert_eq!(joint.kind, JointKind::Prismatic);
        assert_eq!(joint.max, Some(80.0));

        let remote = &config.remotes[0];
        assert!(remote.frame_prefix);
        assert!(!remote.required);

        assert_eq!(
            config.service("data_manager").unwrap().attributes["capture_dir"],
            "/tmp/capture"
        );
        assert_eq!(config.frame_parts().len(), 2);
    }

    #[test]
    fn test_pose_isometry_conversion() {
        let pose = Pose {
            x: 1.0,
            y: -2.0,
            z: 0.5,
            roll: 0.1,
            pitch: -0.2,
            yaw: 0.3,
        };
        let back = Pose::from_isometry(&pose.to_isometry());
        for (a, b) in [
            (pose.x, back.x),
            (pose.y, back.y),
            (pose.z, back.z),
            (pose.roll, back.roll),
            (pose.pitch, back.pitch),
            (pose.yaw, back.yaw),
        ] {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
