use std::fmt;

use crate::tftp::core::MAX_PACKET_SIZE;
use crate::tftp::error::{Error, Result};

/// The nine states of a client transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Init,
    RrqSent,
    WrqSent,
    DataReceived,
    AckSent,
    AckReceived,
    DataSent,
    Exit,
    Error,
}

impl State {
    pub const ALL: [State; 9] = [
        State::Init,
        State::RrqSent,
        State::WrqSent,
        State::DataReceived,
        State::AckSent,
        State::AckReceived,
        State::DataSent,
        State::Exit,
        State::Error,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, State::Exit | State::Error)
    }

    /// Apply `op`, returning the next state
    ///
    /// Fails with `InvalidTransition` when `self` is not one of the
    /// operation's precondition states.
    pub fn transition(self, op: Operation) -> Result<State> {
        use Operation as Op;

        let next = match (self, op) {
            (_, Op::Initialize) => State::Init,
            (_, Op::Fail) => State::Error,
            (State::Init, Op::SendReadRequest) => State::RrqSent,
            (State::Init, Op::SendWriteRequest) => State::WrqSent,
            (State::RrqSent | State::AckSent, Op::ReceiveDataBlock) => State::DataReceived,
            (State::DataReceived, Op::SendAck) => State::AckSent,
            (State::WrqSent | State::DataSent, Op::ReceiveAck) => State::AckReceived,
            (State::AckReceived, Op::SendDataBlock) => State::DataSent,
            (State::DataReceived, Op::GetExit { len })
            | (State::AckReceived, Op::PutExit { len }) => {
                if is_final(len) {
                    State::Exit
                } else {
                    self
                }
            }
            (state, op) => {
                return Err(Error::InvalidTransition {
                    operation: op.name(),
                    state,
                });
            }
        };

        Ok(next)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Init => "INIT",
            State::RrqSent => "RRQ_SENT",
            State::WrqSent => "WRQ_SENT",
            State::DataReceived => "DATA_RECEIVED",
            State::AckSent => "ACK_SENT",
            State::AckReceived => "ACK_RECEIVED",
            State::DataSent => "DATA_SENT",
            State::Exit => "EXIT",
            State::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Step applied to a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    SendReadRequest,
    SendWriteRequest,
    ReceiveDataBlock,
    SendAck,
    ReceiveAck,
    SendDataBlock,
    /// Exit check on a received packet of `len` bytes
    GetExit { len: usize },
    /// Exit check on a sent packet of `len` bytes
    PutExit { len: usize },
    Fail,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::SendReadRequest => "send_read_request",
            Operation::SendWriteRequest => "send_write_request",
            Operation::ReceiveDataBlock => "receive_data_block",
            Operation::SendAck => "send_ack",
            Operation::ReceiveAck => "receive_ack",
            Operation::SendDataBlock => "send_data_block",
            Operation::GetExit { .. } => "can_get_exit",
            Operation::PutExit { .. } => "can_put_exit",
            Operation::Fail => "fail",
        }
    }
}

/// Which way file data flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Get,
    Put,
}

/// A packet shorter than a full DATA packet ends the transfer
pub fn is_final(len: usize) -> bool {
    len < MAX_PACKET_SIZE
}
