//! Responder that serves a robot to parent robots

use anyhow::Result;
use sinew_core::RobotSource;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::protocol::{
    EchoReq, EchoRsp, ErrorRsp, FramePartsRsp, Header, ResourceNamesRsp, GROUP_ROBOT, HEADER_LEN,
    ID_ECHO, ID_FRAME_PARTS, ID_RESOURCE_NAMES, RC_NOT_SUPPORTED, RC_UNKNOWN,
};
use crate::transport::MAX_DATAGRAM;

pub struct RemoteServer {
    socket: UdpSocket,
}

impl RemoteServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(addr = %socket.local_addr()?, "Remote responder listening");
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Answer requests for `source` until the socket fails
    pub async fn serve(self, source: Arc<dyn RobotSource>) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            let Some(header) = Header::decode(&buf[..len]) else {
                debug!(peer = %peer, len = len, "Dropping short datagram");
                continue;
            };
            let body_end = (HEADER_LEN + header.len as usize).min(len);
            let body = &buf[HEADER_LEN..body_end];

            let response = match handle(source.as_ref(), &header, body).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(peer = %peer, id = header.id, error = %e, "Failed to encode response");
                    continue;
                }
            };
            let response = match fit_datagram(response) {
                Ok(response) => response,
                Err(e) => {
                    warn!(peer = %peer, id = header.id, error = %e, "Failed to encode response");
                    continue;
                }
            };
            let Ok(len) = u16::try_from(response.len()) else {
                continue;
            };

            let mut packet = Vec::with_capacity(HEADER_LEN + response.len());
            packet.extend_from_slice(&header.response(len).encode());
            packet.extend_from_slice(&response);
            if let Err(e) = self.socket.send_to(&packet, peer).await {
                warn!(peer = %peer, error = %e, "Failed to send response");
            }
        }
    }
}

/// Encoded response body for one request
async fn handle(source: &dyn RobotSource, header: &Header, body: &[u8]) -> Result<Vec<u8>> {
    if header.group != GROUP_ROBOT {
        return not_supported(header);
    }
    let encoded = match header.id {
        ID_ECHO => {
            let req: EchoReq = serde_cbor::from_slice(body)?;
            serde_cbor::to_vec(&EchoRsp { r: req.d })?
        }
        ID_RESOURCE_NAMES => {
            let rsp = match source.resource_names().await {
                Ok(names) => ResourceNamesRsp {
                    names,
                    ..Default::default()
                },
                Err(e) => ResourceNamesRsp {
                    rc: RC_UNKNOWN,
                    err: Some(e.to_string()),
                    names: Vec::new(),
                },
            };
            serde_cbor::to_vec(&rsp)?
        }
        ID_FRAME_PARTS => {
            let rsp = match source.frame_system_parts().await {
                Ok(parts) => FramePartsRsp {
                    parts,
                    ..Default::default()
                },
                Err(e) => FramePartsRsp {
                    rc: RC_UNKNOWN,
                    err: Some(e.to_string()),
                    parts: Vec::new(),
                },
            };
            serde_cbor::to_vec(&rsp)?
        }
        _ => return not_supported(header),
    };
    Ok(encoded)
}

/// Replace a body that cannot fit in one datagram with an error the client can report
fn fit_datagram(response: Vec<u8>) -> Result<Vec<u8>> {
    if HEADER_LEN + response.len() <= MAX_DATAGRAM {
        return Ok(response);
    }
    warn!(len = response.len(), limit = MAX_DATAGRAM - HEADER_LEN, "Response too large");
    Ok(serde_cbor::to_vec(&ErrorRsp {
        rc: RC_UNKNOWN,
        err: format!(
            "response too large: {} bytes exceeds {} byte datagram body",
            response.len(),
            MAX_DATAGRAM - HEADER_LEN
        ),
    })?)
}

fn not_supported(header: &Header) -> Result<Vec<u8>> {
    Ok(serde_cbor::to_vec(&ErrorRsp {
        rc: RC_NOT_SUPPORTED,
        err: format!("unsupported command {}/{}", header.group, header.id),
    })?)
}
