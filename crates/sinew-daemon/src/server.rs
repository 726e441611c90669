//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use sinew_remote::RemoteServer;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::api;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(api::get_status))
        .route("/api/resources", get(api::list_resources))
        .route("/api/resources/{subtype}/{name}", get(api::get_component))
        .route("/api/remotes", get(api::list_remotes))
        .route("/api/frames", get(api::get_frames))
        .route("/api/frames/transform", post(api::transform_point))
        .route("/api/config", get(api::get_config))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the REST API (and the remote responder, when configured) until ctrl-c, then close the robot
pub async fn run(state: Arc<AppState>) -> Result<()> {
    if let Some(remote_bind) = &state.config.daemon.remote_bind {
        let responder = RemoteServer::bind(remote_bind).await?;
        let robot = state.robot.clone();
        tokio::spawn(async move {
            if let Err(e) = responder.serve(robot).await {
                error!(error = %e, "Remote responder failed");
            }
        });
    }

    let bind = state.config.daemon.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("Shutting down");
    state.robot.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const CONFIG: &str = r#"
[daemon]
name = "testbot"

[[robot.components]]
name = "pieceArm"
subtype = "arm"
model = "fake"
frame = { parent = "world", pose = { x = 500.0, z = 300.0 } }

[[robot.components]]
name = "pieceGripper"
subtype = "gripper"
model = "fake"
depends_on = ["pieceArm"]
frame = { parent = "pieceArm", pose = { z = -100.0 } }
"#;

    async fn app() -> (Router, Arc<AppState>) {
        sinew_robot::register_builtins(&mut sinew_robot::registry::global().write());
        let config: Config = toml::from_str(CONFIG).unwrap();
        let state = AppState::new(config).await.unwrap();
        (router(state.clone()), state)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_resources_and_status() {
        let (app, state) = app().await;

        let (status, body) = get_json(app.clone(), "/api/resources").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 6);

        let (status, body) = get_json(app.clone(), "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "testbot");
        assert_eq!(body["resources"], 6);

        let (status, body) = get_json(app.clone(), "/api/resources/arm/pieceArm").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["display"], "rdk:component:arm/pieceArm");

        let (status, body) = get_json(app, "/api/resources/arm/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "resource rdk:component:arm/ghost not found");

        state.robot.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_frames_and_transform() {
        let (app, state) = app().await;

        let (status, body) = get_json(app.clone(), "/api/frames").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "testbot");
        let frames = body["frames"].as_array().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1]["name"], "pieceGripper");
        assert_eq!(frames[1]["parent"], "pieceArm");
        assert_eq!(frames[1]["world_pose"]["x"], 500.0);
        assert_eq!(frames[1]["world_pose"]["z"], 200.0);

        let (status, body) = post_json(
            app.clone(),
            "/api/frames/transform",
            json!({"point": [0.0, 0.0, 0.0], "from": "pieceGripper", "to": "world"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let point: Vec<f64> = serde_json::from_value(body["point"].clone()).unwrap();
        assert!((point[0] - 500.0).abs() < 1e-9);
        assert!((point[2] - 200.0).abs() < 1e-9);

        let (status, body) = post_json(
            app,
            "/api/frames/transform",
            json!({"point": [0.0, 0.0, 0.0], "from": "nowhere", "to": "world"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "frame \"nowhere\" does not exist");

        state.robot.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_remotes_and_config() {
        let (app, state) = app().await;

        let (status, body) = get_json(app.clone(), "/api/remotes").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["remotes"].as_array().unwrap().is_empty());

        let (status, body) = get_json(app, "/api/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["components"].as_array().unwrap().len(), 2);

        state.robot.close().await.unwrap();
    }
}
