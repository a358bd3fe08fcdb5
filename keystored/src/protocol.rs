//! Message framing over the daemon's bidirectional byte transport.
//!
//! Each message is `u32 magic`, `u32 type` (REQUEST/REPLY), `u32
//! procedure`, `u32 payload_length`, then that many bytes of
//! [`keystore::wire`]-encoded arguments. A reply additionally carries an
//! `i32 status` as the first item of its payload (`0` success, negative an
//! error code), ahead of any result value.

use std::io::{Cursor, Read, Write};

use keystore::error::{self, Error, Result};
use keystore::wire;

/// Arbitrary but fixed four-byte tag identifying this wire format, the
/// same role a magic number plays in any hand-framed binary protocol.
pub const MAGIC: u32 = 0x4B53_5452;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Reply,
}

impl MessageType {
    fn to_u32(self) -> u32 {
        match self {
            MessageType::Request => 0,
            MessageType::Reply => 1,
        }
    }

    fn from_u32(v: u32) -> Result<MessageType> {
        match v {
            0 => Ok(MessageType::Request),
            1 => Ok(MessageType::Reply),
            other => error::ProtocolSnafu {
                msg: format!("unknown message type {}", other),
            }
            .fail(),
        }
    }
}

/// One protocol procedure. `Reserved` covers every procedure code the
/// protocol defines but that no backend in this crate implements yet;
/// the daemon loop still frames and dispatches it, replying with
/// `NotImplemented` rather than refusing to decode the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    Open,
    Close,
    StatKey,
    GetKey,
    SetKey,
    SetKeys,
    Rename,
    RemoveKey,
    GetChild,
    MonitorKey,
    MonitorKeys,
}

impl Procedure {
    pub fn is_implemented(self) -> bool {
        matches!(
            self,
            Procedure::Open | Procedure::Close | Procedure::GetKey | Procedure::GetChild
        )
    }

    fn to_u32(self) -> u32 {
        match self {
            Procedure::Open => 0,
            Procedure::Close => 1,
            Procedure::StatKey => 2,
            Procedure::GetKey => 3,
            Procedure::SetKey => 4,
            Procedure::SetKeys => 5,
            Procedure::Rename => 6,
            Procedure::RemoveKey => 7,
            Procedure::GetChild => 8,
            Procedure::MonitorKey => 9,
            Procedure::MonitorKeys => 10,
        }
    }

    fn from_u32(v: u32) -> Result<Procedure> {
        Ok(match v {
            0 => Procedure::Open,
            1 => Procedure::Close,
            2 => Procedure::StatKey,
            3 => Procedure::GetKey,
            4 => Procedure::SetKey,
            5 => Procedure::SetKeys,
            6 => Procedure::Rename,
            7 => Procedure::RemoveKey,
            8 => Procedure::GetChild,
            9 => Procedure::MonitorKey,
            10 => Procedure::MonitorKeys,
            other => {
                return error::ProtocolSnafu {
                    msg: format!("unknown procedure code {}", other),
                }
                .fail()
            }
        })
    }
}

/// Status codes carried in a reply's payload, modelled after `errno`-style
/// negative error codes.
pub mod status {
    pub const OK: i32 = 0;
    pub const EBADMSG: i32 = -74;
    pub const ENOSYS: i32 = -38;
    pub const ENOENT: i32 = -2;
}

#[derive(Debug, Clone)]
pub struct Message {
    pub msg_type: MessageType,
    pub procedure: Procedure,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn request(procedure: Procedure, payload: Vec<u8>) -> Message {
        Message {
            msg_type: MessageType::Request,
            procedure,
            payload,
        }
    }

    /// Build a reply whose payload is `status` followed by `body` (empty
    /// on error).
    pub fn reply(procedure: Procedure, status: i32, body: &[u8]) -> Message {
        let mut payload = Vec::with_capacity(4 + body.len());
        wire::write_i32(&mut payload, status).expect("writing to a Vec never fails");
        payload.extend_from_slice(body);
        Message {
            msg_type: MessageType::Reply,
            procedure,
            payload,
        }
    }

    /// The status code of a reply message, read back out of its payload.
    pub fn reply_status(&self) -> Result<i32> {
        let mut cursor = Cursor::new(&self.payload);
        wire::read_i32(&mut cursor)
    }

    pub fn reply_body(&self) -> &[u8] {
        &self.payload[4.min(self.payload.len())..]
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        wire::write_u32(w, MAGIC)?;
        wire::write_u32(w, self.msg_type.to_u32())?;
        wire::write_u32(w, self.procedure.to_u32())?;
        wire::write_u32(w, self.payload.len() as u32)?;
        w.write_all(&self.payload)
            .map_err(|source| Error::Io { source })
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Message> {
        let magic = wire::read_u32(r)?;
        if magic != MAGIC {
            return error::ProtocolSnafu {
                msg: format!("bad magic {:#x}", magic),
            }
            .fail();
        }
        let msg_type = MessageType::from_u32(wire::read_u32(r)?)?;
        let procedure = Procedure::from_u32(wire::read_u32(r)?)?;
        let len = wire::read_u32(r)? as usize;
        let mut payload = vec![0u8; len];
        r.read_exact(&mut payload)
            .map_err(|source| Error::Io { source })?;
        Ok(Message {
            msg_type,
            procedure,
            payload,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_round_trips() {
        let msg = Message::request(Procedure::GetKey, b"payload".to_vec());
        let mut buf = Vec::new();
        msg.write(&mut buf).unwrap();
        let mut cursor = &buf[..];
        let decoded = Message::read(&mut cursor).unwrap();
        assert_eq!(decoded.msg_type, MessageType::Request);
        assert_eq!(decoded.procedure, Procedure::GetKey);
        assert_eq!(decoded.payload, b"payload".to_vec());
    }

    #[test]
    fn reply_status_round_trips() {
        let msg = Message::reply(Procedure::GetKey, status::ENOENT, b"");
        let mut buf = Vec::new();
        msg.write(&mut buf).unwrap();
        let mut cursor = &buf[..];
        let decoded = Message::read(&mut cursor).unwrap();
        assert_eq!(decoded.reply_status().unwrap(), status::ENOENT);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = Vec::new();
        wire::write_u32(&mut buf, 0xDEAD_BEEF).unwrap();
        wire::write_u32(&mut buf, 0).unwrap();
        wire::write_u32(&mut buf, 0).unwrap();
        wire::write_u32(&mut buf, 0).unwrap();
        let mut cursor = &buf[..];
        assert!(Message::read(&mut cursor).is_err());
    }

    #[test]
    fn reserved_procedures_are_not_implemented() {
        assert!(!Procedure::SetKey.is_implemented());
        assert!(!Procedure::MonitorKeys.is_implemented());
        assert!(Procedure::GetKey.is_implemented());
    }
}
