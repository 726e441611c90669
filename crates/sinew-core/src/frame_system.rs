//! Frame system builder and transform engine
//!
//! A frame system is an immutable tree of frames rooted at [`WORLD`]. It is
//! assembled from a flat list of frame parts, possibly contributed by several
//! robots, and answers "where is X relative to Y" by composing the rigid
//! transforms along the tree.

use nalgebra::{Isometry3, Point3};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::debug;

use crate::config::{FrameConfig, RemoteConfig};
use crate::frame::{Frame, FrameInputs, FramePart, WORLD};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("parent field in frame config for part \"{0}\" is empty")]
    EmptyParent(String),
    #[error("cannot have more than one frame with name {0}")]
    DuplicateFrame(String),
    #[error("there are no frames that connect to a 'world' node. Root node must be named 'world'")]
    NoWorldConnection,
    #[error("parent frame \"{parent}\" of part \"{frame}\" does not exist")]
    ParentNotFound { frame: String, parent: String },
    #[error("frame \"{0}\" is part of a cycle not connected to world")]
    Cycle(String),
    #[error("frame \"{0}\" does not exist")]
    UnknownFrame(String),
    #[error("no input given for frame \"{0}\"")]
    MissingInput(String),
    #[error("frame \"{frame}\" expects {expected} inputs, got {got}")]
    InputCountMismatch {
        frame: String,
        expected: usize,
        got: usize,
    },
    #[error("input {value} for frame \"{frame}\" is outside [{min}, {max}]")]
    InputOutOfRange {
        frame: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("joint axis of frame \"{0}\" has zero length")]
    InvalidAxis(String),
}

/// Frame parts fetched from one remote, with the remote's attachment settings
#[derive(Debug, Clone)]
pub struct RemoteFrames {
    pub name: String,
    pub prefix: bool,
    /// Where the remote's world attaches; `None` means the remote contributes nothing
    pub attachment: Option<FrameConfig>,
    pub parts: Vec<FramePart>,
}

impl RemoteFrames {
    pub fn new(config: &RemoteConfig, parts: Vec<FramePart>) -> Self {
        Self {
            name: config.name.clone(),
            prefix: config.frame_prefix,
            attachment: config.frame.clone(),
            parts,
        }
    }

    /// Connector-attached (and possibly prefixed) parts ready to merge
    pub fn into_parts(self) -> Vec<FramePart> {
        match self.attachment {
            Some(attachment) => rename_remote_parts(self.parts, &self.name, self.prefix, attachment),
            None => {
                debug!(remote = %self.name, "Remote has no frame attachment, skipping its frames");
                Vec::new()
            }
        }
    }
}

/// Name of the synthetic frame joining a remote's world to its attachment point
pub fn connector_name(remote: &str) -> String {
    format!("{}_{}", remote, WORLD)
}

/// Re-root a remote's parts under `"<remote>_world"` and add that connector.
///
/// Parts parented to the remote's world are re-parented to the connector. With
/// `prefix` every part name and every other parent reference becomes
/// `"<remote>.<name>"`. The connector itself is never prefixed.
pub fn rename_remote_parts(
    parts: Vec<FramePart>,
    remote: &str,
    prefix: bool,
    attachment: FrameConfig,
) -> Vec<FramePart> {
    let connector = connector_name(remote);
    let mut renamed: Vec<FramePart> = parts
        .into_iter()
        .map(|mut part| {
            if part.frame.parent == WORLD {
                part.frame.parent = connector.clone();
            }
            if prefix {
                part.name = format!("{}.{}", remote, part.name);
                if part.frame.parent != connector {
                    part.frame.parent = format!("{}.{}", remote, part.frame.parent);
                }
            }
            part
        })
        .collect();
    renamed.push(FramePart::new(connector, attachment));
    renamed
}

/// Validated, immutable tree of frames rooted at world
#[derive(Debug, Clone)]
pub struct FrameSystem {
    name: String,
    frames: HashMap<String, Frame>,
}

impl FrameSystem {
    /// Merge local parts with every remote contribution and build the tree
    pub fn build(
        name: &str,
        local_parts: Vec<FramePart>,
        remotes: Vec<RemoteFrames>,
    ) -> Result<Self, FrameError> {
        let mut parts = local_parts;
        for remote in remotes {
            parts.extend(remote.into_parts());
        }
        Self::from_parts(name, parts)
    }

    /// Build the tree from an already merged list of parts
    pub fn from_parts(name: &str, parts: Vec<FramePart>) -> Result<Self, FrameError> {
        for part in &parts {
            if part.frame.parent.is_empty() {
                return Err(FrameError::EmptyParent(part.name.clone()));
            }
        }
        if parts.iter().any(|p| p.name == WORLD) {
            return Err(FrameError::DuplicateFrame(WORLD.to_string()));
        }

        let mut seen = HashSet::new();
        for part in &parts {
            if !seen.insert(part.name.as_str()) {
                return Err(FrameError::DuplicateFrame(part.name.clone()));
            }
        }

        if !parts.is_empty() && !parts.iter().any(|p| p.frame.parent == WORLD) {
            return Err(FrameError::NoWorldConnection);
        }

        for part in &parts {
            let parent = part.frame.parent.as_str();
            if parent != WORLD && !seen.contains(parent) {
                return Err(FrameError::ParentNotFound {
                    frame: part.name.clone(),
                    parent: parent.to_string(),
                });
            }
        }

        // Every frame must be reachable from world; anything left over sits on a cycle.
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for part in &parts {
            children
                .entry(part.frame.parent.as_str())
                .or_default()
                .push(part.name.as_str());
        }
        let mut reached: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([WORLD]);
        while let Some(current) = queue.pop_front() {
            for &child in children.get(current).into_iter().flatten() {
                if reached.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        if let Some(part) = parts.iter().find(|p| !reached.contains(p.name.as_str())) {
            return Err(FrameError::Cycle(part.name.clone()));
        }

        let mut frames = HashMap::with_capacity(parts.len() + 1);
        frames.insert(WORLD.to_string(), Frame::world());
        for part in &parts {
            frames.insert(part.name.clone(), Frame::from_part(part)?);
        }

        let system = Self {
            name: name.to_string(),
            frames,
        };
        debug!(name = %system.name, frames = ?system.frame_names(), "Built frame system");
        Ok(system)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All frame names, world included, sorted
    pub fn frame_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.frames.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false: world is present in every frame system
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Look up a frame; absence is not an error
    pub fn get_frame(&self, name: &str) -> Option<&Frame> {
        self.frames.get(name)
    }

    /// Parent of a frame, `None` for world or unknown frames
    pub fn parent(&self, name: &str) -> Option<&Frame> {
        self.frames
            .get(name)
            .and_then(|f| f.parent())
            .and_then(|p| self.frames.get(p))
    }

    /// Pose of `name` relative to world
    pub fn transform_frame(
        &self,
        inputs: &FrameInputs,
        name: &str,
    ) -> Result<Isometry3<f64>, FrameError> {
        let mut frame = self
            .frames
            .get(name)
            .ok_or_else(|| FrameError::UnknownFrame(name.to_string()))?;
        let mut pose = Isometry3::identity();

        while let Some(parent) = frame.parent() {
            let segment = if frame.dof() == 0 {
                frame.transform(&[])?
            } else {
                let values = inputs
                    .get(frame.name())
                    .ok_or_else(|| FrameError::MissingInput(frame.name().to_string()))?;
                frame.transform(values)?
            };
            pose = segment * pose;
            frame = self
                .frames
                .get(parent)
                .ok_or_else(|| FrameError::UnknownFrame(parent.to_string()))?;
        }
        Ok(pose)
    }

    /// Express a point given in frame `from` in frame `to`
    pub fn transform_point(
        &self,
        inputs: &FrameInputs,
        point: Point3<f64>,
        from: &str,
        to: &str,
    ) -> Result<Point3<f64>, FrameError> {
        let from_pose = self.transform_frame(inputs, from)?;
        let to_pose = self.transform_frame(inputs, to)?;
        Ok(to_pose.inverse() * (from_pose * point))
    }

    /// Express a pose given in frame `from` in frame `to`
    pub fn transform_pose(
        &self,
        inputs: &FrameInputs,
        pose: &Isometry3<f64>,
        from: &str,
        to: &str,
    ) -> Result<Isometry3<f64>, FrameError> {
        let from_pose = self.transform_frame(inputs, from)?;
        let to_pose = self.transform_frame(inputs, to)?;
        Ok(to_pose.inverse() * from_pose * pose)
    }
}
