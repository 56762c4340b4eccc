use std::fmt;
use std::io;
use std::net::SocketAddr;

use crate::tftp::client::State;
use crate::tftp::core::Mode;

/// Errors raised by the TFTP engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unexpected packet on the wire
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No valid response after every permitted transmission
    #[error("timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    /// ERROR packet received from the peer
    #[error("server error {code}: {message}")]
    Server { code: u16, message: String },

    /// Local file read or write failure
    #[error("file error: {0}")]
    File(#[source] io::Error),

    #[error("transfer mode '{0}' is not supported")]
    UnsupportedMode(Mode),

    /// Operation called outside of its precondition state
    #[error("{operation} is not allowed in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: State,
    },

    /// Socket failure
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Error::Protocol(reason.into())
    }
}

/// An engine error together with the session context it happened in
#[derive(Debug, thiserror::Error)]
#[error("{kind} (block {block}, peer {})", PeerDisplay(.peer))]
pub struct TransferError {
    pub block: u16,
    pub peer: Option<SocketAddr>,
    #[source]
    pub kind: Error,
}

impl TransferError {
    pub fn kind(&self) -> &Error {
        &self.kind
    }
}

struct PeerDisplay<'a>(&'a Option<SocketAddr>);

impl fmt::Display for PeerDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "{}", addr),
            None => write!(f, "unbound"),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
