//! REST API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use sinew_core::{FrameInputs, Pose, ResourceName};
use sinew_robot::RobotError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> axum::response::Response {
    (status, Json(ApiError::new(msg))).into_response()
}

#[derive(Serialize)]
struct StatusResponse {
    name: String,
    version: &'static str,
    started_at: DateTime<Utc>,
    resources: usize,
    remotes: usize,
}

/// Robot summary
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        name: state.robot.name().to_string(),
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        resources: state.robot.resource_names().await.len(),
        remotes: state.robot.remote_names().await.len(),
    })
}

/// List every resource name, local and remote
pub async fn list_resources(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.robot.resource_names().await)
}

#[derive(Serialize)]
struct ResourceResponse {
    name: ResourceName,
    display: String,
}

/// Look up one component by subtype and name
pub async fn get_component(
    State(state): State<Arc<AppState>>,
    Path((subtype, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let resource_name = ResourceName::component(&subtype, &name);
    match state.robot.resource_by_name(&resource_name).await {
        Ok(_) => Json(ResourceResponse {
            display: resource_name.to_string(),
            name: resource_name,
        })
        .into_response(),
        Err(e @ RobotError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

#[derive(Serialize)]
struct RemotesResponse {
    remotes: Vec<String>,
    failures: BTreeMap<String, String>,
}

/// Connected remotes and the ones skipped during construction
pub async fn list_remotes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(RemotesResponse {
        remotes: state.robot.remote_names().await,
        failures: state.robot.remote_failures().await,
    })
}

#[derive(Serialize)]
struct FrameInfo {
    name: String,
    parent: Option<String>,
    dof: usize,
    /// Pose relative to world, absent when a joint on the path needs an input
    world_pose: Option<Pose>,
}

#[derive(Serialize)]
struct FramesResponse {
    name: String,
    frames: Vec<FrameInfo>,
}

/// Current frame system, assembled from local and remote parts
pub async fn get_frames(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.robot.frame_system(state.robot.name()).await {
        Ok(fs) => {
            let frames = fs
                .frame_names()
                .into_iter()
                .filter_map(|name| {
                    let world_pose = fs
                        .transform_frame(&FrameInputs::new(), &name)
                        .ok()
                        .map(|iso| Pose::from_isometry(&iso));
                    fs.get_frame(&name).map(|frame| FrameInfo {
                        parent: frame.parent().map(str::to_string),
                        dof: frame.dof(),
                        world_pose,
                        name,
                    })
                })
                .collect();
            Json(FramesResponse {
                name: fs.name().to_string(),
                frames,
            })
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Frame system assembly failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Transform request body
#[derive(Deserialize)]
pub struct TransformRequest {
    point: [f64; 3],
    from: String,
    to: String,
    /// Joint values keyed by frame name
    #[serde(default)]
    inputs: FrameInputs,
}

#[derive(Serialize)]
struct TransformResponse {
    point: [f64; 3],
    frame: String,
}

/// Express a point given in one frame in another
pub async fn transform_point(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransformRequest>,
) -> impl IntoResponse {
    let fs = match state.robot.frame_system(state.robot.name()).await {
        Ok(fs) => fs,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let [x, y, z] = req.point;
    match fs.transform_point(&req.inputs, Point3::new(x, y, z), &req.from, &req.to) {
        Ok(p) => {
            debug!(from = %req.from, to = %req.to, "Transformed point");
            Json(TransformResponse {
                point: [p.x, p.y, p.z],
                frame: req.to,
            })
            .into_response()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// The robot configuration the daemon was started with
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.robot.config())
}
