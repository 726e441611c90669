//! Frames and frame parts
//!
//! A frame part is the declaration a component (or remote) contributes; a frame
//! is the validated node the frame system keeps for it.

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{FrameConfig, JointKind};
use crate::frame_system::FrameError;

/// Name of the root frame of every frame system
pub const WORLD: &str = "world";

/// Joint values keyed by frame name, one value per degree of freedom
pub type FrameInputs = HashMap<String, Vec<f64>>;

/// A named frame declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePart {
    pub name: String,
    pub frame: FrameConfig,
}

impl FramePart {
    pub fn new(name: impl Into<String>, frame: FrameConfig) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }
}

/// Transform of a frame relative to its parent
#[derive(Debug, Clone, PartialEq)]
enum FrameTransform {
    Static(Isometry3<f64>),
    Joint {
        offset: Isometry3<f64>,
        kind: JointKind,
        axis: Unit<Vector3<f64>>,
        min: f64,
        max: f64,
    },
}

/// A node of the frame system
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    name: String,
    parent: Option<String>,
    transform: FrameTransform,
}

impl Frame {
    /// The root frame
    pub fn world() -> Self {
        Self {
            name: WORLD.to_string(),
            parent: None,
            transform: FrameTransform::Static(Isometry3::identity()),
        }
    }

    pub fn from_part(part: &FramePart) -> Result<Self, FrameError> {
        let offset = part.frame.pose.to_isometry();
        let transform = match &part.frame.joint {
            None => FrameTransform::Static(offset),
            Some(joint) => {
                let axis = Unit::try_new(Vector3::from(joint.axis), 1e-9)
                    .ok_or_else(|| FrameError::InvalidAxis(part.name.clone()))?;
                FrameTransform::Joint {
                    offset,
                    kind: joint.kind,
                    axis,
                    min: joint.min.unwrap_or(f64::NEG_INFINITY),
                    max: joint.max.unwrap_or(f64::INFINITY),
                }
            }
        };
        Ok(Self {
            name: part.name.clone(),
            parent: Some(part.frame.parent.clone()),
            transform,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent frame name, `None` only for world
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Number of input values this frame consumes
    pub fn dof(&self) -> usize {
        match self.transform {
            FrameTransform::Static(_) => 0,
            FrameTransform::Joint { .. } => 1,
        }
    }

    /// Pose of this frame relative to its parent for the given inputs
    pub fn transform(&self, inputs: &[f64]) -> Result<Isometry3<f64>, FrameError> {
        if inputs.len() != self.dof() {
            return Err(FrameError::InputCountMismatch {
                frame: self.name.clone(),
                expected: self.dof(),
                got: inputs.len(),
            });
        }
        match &self.transform {
            FrameTransform::Static(offset) => Ok(*offset),
            FrameTransform::Joint {
                offset,
                kind,
                axis,
                min,
                max,
            } => {
                let value = inputs[0];
                if !(*min..=*max).contains(&value) {
                    return Err(FrameError::InputOutOfRange {
                        frame: self.name.clone(),
                        value,
                        min: *min,
                        max: *max,
                    });
                }
                let motion = match kind {
                    JointKind::Revolute => Isometry3::from_parts(
                        Translation3::identity(),
                        UnitQuaternion::from_axis_angle(axis, value),
                    ),
                    JointKind::Prismatic => Isometry3::from_parts(
                        Translation3::from(axis.into_inner() * value),
                        UnitQuaternion::identity(),
                    ),
                };
                Ok(offset * motion)
            }
        }
    }
}
