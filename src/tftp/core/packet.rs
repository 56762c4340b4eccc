use std::fmt;
use std::str::FromStr;

use crate::tftp::error::{Error, Result};

/// Largest payload a DATA packet can carry
pub const MAX_DATA_SIZE: usize = 512;
/// Opcode plus block number
pub const HEADER_SIZE: usize = 4;
/// A full DATA packet; anything shorter ends the transfer
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + MAX_DATA_SIZE;

const OP_RRQ: u16 = 1;
const OP_WRQ: u16 = 2;
const OP_DATA: u16 = 3;
const OP_ACK: u16 = 4;
const OP_ERROR: u16 = 5;

/// Transfer mode named in a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    NetAscii,
    Octet,
    Mail,
}

impl Mode {
    /// Name as written on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::NetAscii => "netascii",
            Mode::Octet => "octet",
            Mode::Mail => "mail",
        }
    }

    /// Mail is recognised on the wire but never transferred
    pub fn is_supported(self) -> bool {
        !matches!(self, Mode::Mail)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "netascii" => Ok(Mode::NetAscii),
            "octet" => Ok(Mode::Octet),
            "mail" => Ok(Mode::Mail),
            other => Err(Error::protocol(format!("unknown transfer mode '{}'", other))),
        }
    }
}

/// RFC 1350 error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotDefined,
    FileNotFound,
    AccessViolation,
    DiskFull,
    IllegalOperation,
    UnknownTransferId,
    FileExists,
    NoSuchUser,
    /// Code outside the RFC table, kept verbatim
    Other(u16),
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            ErrorCode::NotDefined => 0,
            ErrorCode::FileNotFound => 1,
            ErrorCode::AccessViolation => 2,
            ErrorCode::DiskFull => 3,
            ErrorCode::IllegalOperation => 4,
            ErrorCode::UnknownTransferId => 5,
            ErrorCode::FileExists => 6,
            ErrorCode::NoSuchUser => 7,
            ErrorCode::Other(code) => code,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::NotDefined | ErrorCode::Other(_) => "Not defined",
            ErrorCode::FileNotFound => "File not found",
            ErrorCode::AccessViolation => "Access violation",
            ErrorCode::DiskFull => "Disk full or allocation exceeded",
            ErrorCode::IllegalOperation => "Illegal TFTP operation",
            ErrorCode::UnknownTransferId => "Unknown transfer ID",
            ErrorCode::FileExists => "File already exists",
            ErrorCode::NoSuchUser => "No such user",
        }
    }
}

impl From<u16> for ErrorCode {
    fn from(code: u16) -> Self {
        match code {
            0 => ErrorCode::NotDefined,
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            3 => ErrorCode::DiskFull,
            4 => ErrorCode::IllegalOperation,
            5 => ErrorCode::UnknownTransferId,
            6 => ErrorCode::FileExists,
            7 => ErrorCode::NoSuchUser,
            other => ErrorCode::Other(other),
        }
    }
}

/// Packet variant without its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    ReadRequest,
    WriteRequest,
    Data,
    Ack,
    Error,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::ReadRequest => "RRQ",
            PacketKind::WriteRequest => "WRQ",
            PacketKind::Data => "DATA",
            PacketKind::Ack => "ACK",
            PacketKind::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A TFTP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    ReadRequest { path: String, mode: Mode },
    WriteRequest { path: String, mode: Mode },
    Data { block: u16, payload: Vec<u8> },
    Ack { block: u16 },
    Error { code: u16, message: String },
}

impl Packet {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Packet::Error {
            code: code.as_u16(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::ReadRequest { .. } => PacketKind::ReadRequest,
            Packet::WriteRequest { .. } => PacketKind::WriteRequest,
            Packet::Data { .. } => PacketKind::Data,
            Packet::Ack { .. } => PacketKind::Ack,
            Packet::Error { .. } => PacketKind::Error,
        }
    }

    /// Encode into a datagram
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(MAX_PACKET_SIZE);

        match self {
            Packet::ReadRequest { path, mode } | Packet::WriteRequest { path, mode } => {
                let opcode = if self.kind() == PacketKind::ReadRequest {
                    OP_RRQ
                } else {
                    OP_WRQ
                };
                buf.extend_from_slice(&opcode.to_be_bytes());
                push_str(&mut buf, path)?;
                push_str(&mut buf, mode.as_str())?;
            }
            Packet::Data { block, payload } => {
                if payload.len() > MAX_DATA_SIZE {
                    return Err(Error::protocol(format!(
                        "DATA payload of {} bytes exceeds {}",
                        payload.len(),
                        MAX_DATA_SIZE
                    )));
                }
                buf.extend_from_slice(&OP_DATA.to_be_bytes());
                buf.extend_from_slice(&block.to_be_bytes());
                buf.extend_from_slice(payload);
            }
            Packet::Ack { block } => {
                buf.extend_from_slice(&OP_ACK.to_be_bytes());
                buf.extend_from_slice(&block.to_be_bytes());
            }
            Packet::Error { code, message } => {
                buf.extend_from_slice(&OP_ERROR.to_be_bytes());
                buf.extend_from_slice(&code.to_be_bytes());
                push_str(&mut buf, message)?;
            }
        }

        Ok(buf)
    }

    /// Decode a received datagram
    pub fn deserialize(buf: &[u8]) -> Result<Packet> {
        if buf.len() < 2 {
            return Err(Error::protocol(format!(
                "datagram of {} byte(s) is too short for an opcode",
                buf.len()
            )));
        }

        let opcode = u16::from_be_bytes([buf[0], buf[1]]);
        let body = &buf[2..];

        match opcode {
            OP_RRQ | OP_WRQ => {
                let (path, rest) = take_str(body, "file name")?;
                let (mode, rest) = take_str(rest, "mode")?;
                if !rest.is_empty() {
                    // Option negotiation is not supported, trailing fields are refused
                    return Err(Error::protocol("unexpected bytes after request mode"));
                }
                let mode = mode.parse()?;
                Ok(if opcode == OP_RRQ {
                    Packet::ReadRequest { path, mode }
                } else {
                    Packet::WriteRequest { path, mode }
                })
            }
            OP_DATA => {
                let block = take_u16(body, "DATA")?;
                let payload = &body[2..];
                if payload.len() > MAX_DATA_SIZE {
                    return Err(Error::protocol(format!(
                        "DATA payload of {} bytes exceeds {}",
                        payload.len(),
                        MAX_DATA_SIZE
                    )));
                }
                Ok(Packet::Data {
                    block,
                    payload: payload.to_vec(),
                })
            }
            OP_ACK => {
                let block = take_u16(body, "ACK")?;
                if body.len() != 2 {
                    return Err(Error::protocol(format!(
                        "ACK must be {} bytes, got {}",
                        HEADER_SIZE,
                        buf.len()
                    )));
                }
                Ok(Packet::Ack { block })
            }
            OP_ERROR => {
                let code = take_u16(body, "ERROR")?;
                let (message, _) = take_str(&body[2..], "error message")?;
                Ok(Packet::Error { code, message })
            }
            other => Err(Error::protocol(format!("unknown opcode {}", other))),
        }
    }
}

fn push_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(Error::protocol(format!("'{}' contains a NUL byte", s.escape_debug())));
    }
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    Ok(())
}

fn take_u16(buf: &[u8], what: &str) -> Result<u16> {
    match buf {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(Error::protocol(format!("{} packet is truncated", what))),
    }
}

fn take_str<'a>(buf: &'a [u8], what: &str) -> Result<(String, &'a [u8])> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::protocol(format!("{} is not NUL-terminated", what)))?;
    let s = String::from_utf8_lossy(&buf[..end]).into_owned();
    Ok((s, &buf[end + 1..]))
}
