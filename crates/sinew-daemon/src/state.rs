//! Application state management

use anyhow::Result;
use chrono::{DateTime, Utc};
use sinew_remote::UdpConnector;
use sinew_robot::{GlobalRegistry, LocalRobot, RobotOptions};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// The robot this daemon runs
    pub robot: Arc<LocalRobot>,
    /// Configuration
    pub config: Config,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build the robot described by `config`.
    ///
    /// Constructors are looked up in the process-wide registry, so builtins
    /// must be registered before this is called.
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let options = RobotOptions {
            name: config.daemon.name.clone(),
            lookup: Arc::new(GlobalRegistry),
            connector: Arc::new(UdpConnector::new(config.daemon.remote_timeout())),
            remote_timeout: config.daemon.remote_timeout(),
        };
        let robot = LocalRobot::new(config.robot.clone(), options).await?;
        info!(robot = %robot.name(), "Robot constructed");

        Ok(Arc::new(Self {
            robot,
            config,
            started_at: Utc::now(),
        }))
    }
}
