//! Network-backed remote robot

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sinew_core::{FramePart, RemoteConfig, RemoteConnector, Resource, ResourceName, RobotSource};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::protocol::{
    EmptyReq, FramePartsRsp, ResourceNamesRsp, GROUP_ROBOT, ID_FRAME_PARTS, ID_RESOURCE_NAMES,
    OP_READ, RC_OK,
};
use crate::transport::{TransportError, UdpTransport};

/// Default timeout for a single remote round-trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("remote not reachable at {0}")]
    NotReachable(String),
    #[error("remote returned rc={rc}: {err}")]
    Remote { rc: i32, err: String },
    #[error("resource {0} not found on remote")]
    NotFound(ResourceName),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// A remote robot reached over UDP
pub struct RemoteClient {
    name: String,
    transport: Mutex<UdpTransport>,
}

impl RemoteClient {
    /// Open a transport to `address` and check that a robot answers there
    pub async fn connect(name: &str, address: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut transport = UdpTransport::new(address, timeout).await?;
        if !transport.ping().await? {
            return Err(ClientError::NotReachable(address.to_string()));
        }
        info!(remote = %name, target = %transport.target(), "Remote answered");
        Ok(Self {
            name: name.to_string(),
            transport: Mutex::new(transport),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn read<T: DeserializeOwned>(&self, id: u8) -> Result<T, ClientError> {
        let body = serde_cbor::to_vec(&EmptyReq {}).map_err(TransportError::from)?;
        let response = self
            .transport
            .lock()
            .await
            .transceive(OP_READ, GROUP_ROBOT, id, &body)
            .await?;
        Ok(serde_cbor::from_slice(&response).map_err(TransportError::from)?)
    }

    pub async fn fetch_resource_names(&self) -> Result<Vec<ResourceName>, ClientError> {
        let rsp: ResourceNamesRsp = self.read(ID_RESOURCE_NAMES).await?;
        check_rc(rsp.rc, rsp.err)?;
        Ok(rsp.names)
    }

    pub async fn fetch_frame_parts(&self) -> Result<Vec<FramePart>, ClientError> {
        let rsp: FramePartsRsp = self.read(ID_FRAME_PARTS).await?;
        check_rc(rsp.rc, rsp.err)?;
        Ok(rsp.parts)
    }
}

fn check_rc(rc: i32, err: Option<String>) -> Result<(), ClientError> {
    if rc == RC_OK {
        Ok(())
    } else {
        Err(ClientError::Remote {
            rc,
            err: err.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl RobotSource for RemoteClient {
    async fn resource_names(&self) -> Result<Vec<ResourceName>> {
        Ok(self.fetch_resource_names().await?)
    }

    async fn resource_by_name(&self, name: &ResourceName) -> Result<Arc<dyn Resource>> {
        if !self.fetch_resource_names().await?.contains(name) {
            return Err(ClientError::NotFound(name.clone()).into());
        }
        Ok(Arc::new(RemoteResource {
            remote: self.name.clone(),
            name: name.clone(),
        }))
    }

    async fn frame_system_parts(&self) -> Result<Vec<FramePart>> {
        Ok(self.fetch_frame_parts().await?)
    }

    async fn close(&self) -> Result<()> {
        debug!(remote = %self.name, "Closing remote client");
        Ok(())
    }
}

/// Handle to a resource living on a remote robot
#[derive(Debug, Clone)]
pub struct RemoteResource {
    remote: String,
    name: ResourceName,
}

impl RemoteResource {
    /// Name of the remote this resource lives on
    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn name(&self) -> &ResourceName {
        &self.name
    }
}

#[async_trait]
impl Resource for RemoteResource {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Connects configured remotes over UDP
#[derive(Debug, Clone, Copy)]
pub struct UdpConnector {
    timeout: Duration,
}

impl UdpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for UdpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl RemoteConnector for UdpConnector {
    async fn connect(&self, config: &RemoteConfig) -> Result<Arc<dyn RobotSource>> {
        let client = RemoteClient::connect(&config.name, &config.address, self.timeout).await?;
        Ok(Arc::new(client))
    }
}
