//! Async UDP request/response transport

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use crate::protocol::{EchoReq, EchoRsp, Header, GROUP_ROBOT, HEADER_LEN, ID_ECHO, OP_WRITE};

/// Largest datagram the transport sends or accepts (IPv4 UDP payload limit)
pub const MAX_DATAGRAM: usize = 65_507;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot resolve address {0}")]
    Resolve(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("request body too large: {0} bytes")]
    TooLarge(usize),
    #[error("response too short: {0} bytes")]
    ShortResponse(usize),
    #[error("response body truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),
}

pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
    timeout: Duration,
    seq: u8,
}

impl UdpTransport {
    /// Bind an ephemeral socket for talking to `address` ("host:port")
    pub async fn new(address: &str, timeout: Duration) -> Result<Self, TransportError> {
        let target = lookup_host(address)
            .await
            .map_err(|_| TransportError::Resolve(address.to_string()))?
            .next()
            .ok_or_else(|| TransportError::Resolve(address.to_string()))?;
        let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind).await?;

        Ok(Self {
            socket,
            target,
            timeout,
            seq: 0,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }

    /// Send one request and wait for the matching response body
    pub async fn transceive(
        &mut self,
        op: u8,
        group: u16,
        id: u8,
        body: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        let len = u16::try_from(body.len()).map_err(|_| TransportError::TooLarge(body.len()))?;
        if HEADER_LEN + body.len() > MAX_DATAGRAM {
            return Err(TransportError::TooLarge(body.len()));
        }
        let seq = self.next_seq();
        let header = Header::request(op, group, id, len, seq);

        let mut packet = Vec::with_capacity(HEADER_LEN + body.len());
        packet.extend_from_slice(&header.encode());
        packet.extend_from_slice(body);

        trace!(
            target = %self.target,
            op = op,
            group = group,
            id = id,
            seq = seq,
            body_len = body.len(),
            "Sending request"
        );
        self.socket.send_to(&packet, self.target).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let deadline = Instant::now() + self.timeout;
        loop {
            let (received, from) = timeout_at(deadline, self.socket.recv_from(&mut buf))
                .await
                .map_err(|_| TransportError::Timeout(self.timeout))??;
            if from != self.target {
                debug!(from = %from, target = %self.target, "Dropping datagram from unexpected peer");
                continue;
            }

            let response = Header::decode(&buf[..received])
                .ok_or(TransportError::ShortResponse(received))?;
            if response.seq != seq {
                // late answer to a request that already timed out or was cancelled
                debug!(expected = seq, got = response.seq, "Dropping stale response");
                continue;
            }
            debug!(
                op = response.op,
                group = response.group,
                id = response.id,
                seq = response.seq,
                body_len = response.len,
                "Received response"
            );

            let body_end = HEADER_LEN + response.len as usize;
            if body_end > received {
                return Err(TransportError::Truncated {
                    expected: response.len as usize,
                    got: received - HEADER_LEN,
                });
            }
            return Ok(buf[HEADER_LEN..body_end].to_vec());
        }
    }

    /// Echo round-trip; true when the peer answered with the same payload
    pub async fn ping(&mut self) -> Result<bool, TransportError> {
        let body = serde_cbor::to_vec(&EchoReq {
            d: "ping".to_string(),
        })?;
        let response = self.transceive(OP_WRITE, GROUP_ROBOT, ID_ECHO, &body).await?;
        let rsp: EchoRsp = serde_cbor::from_slice(&response)?;
        Ok(rsp.r == "ping")
    }
}
