//! TFTP core protocol implementation
//!
//! This module contains the core components of the TFTP protocol:
//! - `packet`: Packet serialization and deserialization
//! - `socket`: Socket abstraction and per-transfer endpoint (TID) binding
//! - `retry`: Lock-step retransmission on timeout
//! - `convert`: NetASCII line-ending conversion

mod convert;
mod packet;
mod retry;
mod socket;

#[cfg(test)]
pub(crate) mod mock;

// Public core types
pub use convert::{NetasciiReader, NetasciiWriter};
pub use packet::{ErrorCode, HEADER_SIZE, MAX_DATA_SIZE, MAX_PACKET_SIZE, Mode, Packet, PacketKind};
pub use retry::{Expect, Response, RetryScheduler};
pub use socket::{Bind, Socket, TransportSession, UdpBinder};
