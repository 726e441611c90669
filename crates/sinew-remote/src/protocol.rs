//! Wire protocol between a parent robot and a remote
//!
//! Every datagram is an 8-byte header followed by a CBOR body:
//!
//! ```text
//! byte 0     op (read/write request, read/write response)
//! byte 1     flags (reserved, zero)
//! bytes 2-3  body length, big-endian
//! bytes 4-5  group, big-endian
//! byte 6     sequence number
//! byte 7     command id
//! ```

use serde::{Deserialize, Serialize};
use sinew_core::{FramePart, ResourceName};

pub const HEADER_LEN: usize = 8;

pub const OP_READ: u8 = 0;
pub const OP_READ_RSP: u8 = 1;
pub const OP_WRITE: u8 = 2;
pub const OP_WRITE_RSP: u8 = 3;

/// Robot query group
pub const GROUP_ROBOT: u16 = 0;

pub const ID_ECHO: u8 = 0;
pub const ID_RESOURCE_NAMES: u8 = 1;
pub const ID_FRAME_PARTS: u8 = 2;

/// Return codes carried in `rc`
pub const RC_OK: i32 = 0;
pub const RC_UNKNOWN: i32 = 1;
pub const RC_NOT_SUPPORTED: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub op: u8,
    pub flags: u8,
    pub len: u16,
    pub group: u16,
    pub seq: u8,
    pub id: u8,
}

impl Header {
    pub fn request(op: u8, group: u16, id: u8, len: u16, seq: u8) -> Self {
        Self {
            op,
            flags: 0,
            len,
            group,
            seq,
            id,
        }
    }

    /// Header answering this request with a body of `len` bytes
    pub fn response(&self, len: u16) -> Self {
        Self {
            op: response_op(self.op),
            len,
            ..*self
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let [len_hi, len_lo] = self.len.to_be_bytes();
        let [group_hi, group_lo] = self.group.to_be_bytes();
        [
            self.op, self.flags, len_hi, len_lo, group_hi, group_lo, self.seq, self.id,
        ]
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            op: data[0],
            flags: data[1],
            len: u16::from_be_bytes([data[2], data[3]]),
            group: u16::from_be_bytes([data[4], data[5]]),
            seq: data[6],
            id: data[7],
        })
    }
}

pub fn response_op(op: u8) -> u8 {
    match op {
        OP_READ => OP_READ_RSP,
        OP_WRITE => OP_WRITE_RSP,
        other => other,
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EchoReq {
    pub d: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EchoRsp {
    pub r: String,
}

/// Body of a read request with no arguments
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EmptyReq {}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResourceNamesRsp {
    #[serde(default)]
    pub rc: i32,
    #[serde(default)]
    pub err: Option<String>,
    #[serde(default)]
    pub names: Vec<ResourceName>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FramePartsRsp {
    #[serde(default)]
    pub rc: i32,
    #[serde(default)]
    pub err: Option<String>,
    #[serde(default)]
    pub parts: Vec<FramePart>,
}

/// Response to a command the responder does not know
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorRsp {
    pub rc: i32,
    pub err: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encoding() {
        let header = Header::request(OP_READ, 0x0102, ID_FRAME_PARTS, 300, 5);
        assert_eq!(header.encode(), [0, 0, 0x01, 0x2c, 0x01, 0x02, 5, 2]);
        assert_eq!(Header::decode(&header.encode()), Some(header));
        assert_eq!(Header::decode(&[0, 0, 0]), None);
    }

    #[test]
    fn test_response_header() {
        let request = Header::request(OP_WRITE, GROUP_ROBOT, ID_ECHO, 4, 9);
        let response = request.response(12);
        assert_eq!(response.op, OP_WRITE_RSP);
        assert_eq!(response.seq, 9);
        assert_eq!(response.id, ID_ECHO);
        assert_eq!(response.len, 12);
    }

    #[test]
    fn test_missing_rc_defaults_to_ok() {
        let body = serde_cbor::to_vec(&EmptyReq {}).unwrap();
        let rsp: ResourceNamesRsp = serde_cbor::from_slice(&body).unwrap();
        assert_eq!(rsp.rc, RC_OK);
        assert!(rsp.names.is_empty());
    }
}
