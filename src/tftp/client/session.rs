use std::io;
use std::net::SocketAddr;

use super::config::ClientConfig;
use super::state::{Direction, Operation, State, is_final};
use super::stream::{BlockSink, BlockSource};
use crate::tftp::core::{
    Bind, Expect, HEADER_SIZE, Mode, Packet, Response, RetryScheduler, TransportSession, UdpBinder,
};
use crate::tftp::error::{Error, Result, TransferError};

/// A received DATA packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub block: u16,
    pub payload: Vec<u8>,
}

impl DataBlock {
    /// Length of the packet on the wire, header included
    pub fn packet_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    pub fn is_final(&self) -> bool {
        is_final(self.packet_len())
    }
}

/// One download or upload, driven one protocol step at a time
///
/// Every step checks the transition table first; a step called in the wrong
/// state fails with `InvalidTransition` and changes nothing. Any other failure
/// moves the session to `ERROR` and releases its socket. A session in `EXIT`
/// or `ERROR` is reused only after [`initialize`](Self::initialize).
pub struct TransferSession<B: Bind = UdpBinder> {
    binder: B,
    server: SocketAddr,
    scheduler: RetryScheduler,
    transport: Option<TransportSession<B::Socket>>,
    state: State,
    direction: Option<Direction>,
    mode: Mode,
    block: u16,
    last_sent: Vec<u8>,
}

impl TransferSession<UdpBinder> {
    pub fn new(config: &ClientConfig) -> Result<Self, TransferError> {
        Self::with_binder(UdpBinder, config.server_addr(), config.scheduler())
    }
}

impl<B: Bind> TransferSession<B> {
    pub fn with_binder(
        binder: B,
        server: SocketAddr,
        scheduler: RetryScheduler,
    ) -> Result<Self, TransferError> {
        let mut session = Self {
            binder,
            server,
            scheduler,
            transport: None,
            state: State::Init,
            direction: None,
            mode: Mode::Octet,
            block: 0,
            last_sent: Vec::new(),
        };
        session.initialize()?;
        Ok(session)
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Block number of the last DATA or ACK exchanged
    pub fn block(&self) -> u16 {
        self.block
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.transport.as_ref().and_then(|t| t.peer())
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_open())
    }

    /// Start over in `INIT` with a fresh socket
    pub fn initialize(&mut self) -> Result<(), TransferError> {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.state = self.check(Operation::Initialize)?;
        self.direction = None;
        self.mode = Mode::Octet;
        self.block = 0;
        self.last_sent.clear();

        match TransportSession::bind(&self.binder, self.server) {
            Ok(transport) => {
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Send RRQ for `remote`, `INIT` -> `RRQ_SENT`
    pub fn send_read_request(
        &mut self,
        remote: &str,
        mode: Mode,
    ) -> Result<Vec<u8>, TransferError> {
        let next = self.check(Operation::SendReadRequest)?;
        let request = Packet::ReadRequest {
            path: remote.to_string(),
            mode,
        };
        let bytes = self.send_request(request, mode)?;

        log::info!("Requested {} ({}) from {}", remote, mode, self.server);
        self.direction = Some(Direction::Get);
        self.state = next;
        Ok(bytes)
    }

    /// Send WRQ for `remote`, `INIT` -> `WRQ_SENT`
    pub fn send_write_request(
        &mut self,
        remote: &str,
        mode: Mode,
    ) -> Result<Vec<u8>, TransferError> {
        let next = self.check(Operation::SendWriteRequest)?;
        let request = Packet::WriteRequest {
            path: remote.to_string(),
            mode,
        };
        let bytes = self.send_request(request, mode)?;

        log::info!("Offered {} ({}) to {}", remote, mode, self.server);
        self.direction = Some(Direction::Put);
        self.state = next;
        Ok(bytes)
    }

    /// Wait for the next DATA block, `RRQ_SENT | ACK_SENT` -> `DATA_RECEIVED`
    ///
    /// The last request or ACK is retransmitted on every timeout.
    pub fn receive_data_block(&mut self) -> Result<DataBlock, TransferError> {
        let next = self.check(Operation::ReceiveDataBlock)?;
        let expect = Expect::Data(self.block.wrapping_add(1));
        let response = self.await_response(expect)?;

        let Packet::Data { block, payload } = response.packet else {
            return Err(self.fail(Error::protocol("scheduler returned a non-DATA packet")));
        };
        log::debug!("DATA {} received, {} bytes", block, payload.len());
        self.block = block;
        self.state = next;
        Ok(DataBlock { block, payload })
    }

    /// Acknowledge the current block, `DATA_RECEIVED` -> `ACK_SENT`
    pub fn send_ack(&mut self) -> Result<Vec<u8>, TransferError> {
        let next = self.check(Operation::SendAck)?;
        let bytes = self.send_packet(Packet::Ack { block: self.block })?;
        self.state = next;
        Ok(bytes)
    }

    /// Wait for the ACK of the current block, `WRQ_SENT | DATA_SENT` -> `ACK_RECEIVED`
    ///
    /// After a WRQ the expected block is 0.
    pub fn receive_ack(&mut self) -> Result<Vec<u8>, TransferError> {
        let next = self.check(Operation::ReceiveAck)?;
        let response = self.await_response(Expect::Ack(self.block))?;

        log::debug!("ACK {} received", self.block);
        self.state = next;
        Ok(response.bytes)
    }

    /// Read the next block from `source` and send it, `ACK_RECEIVED` -> `DATA_SENT`
    pub fn send_data_block<R: BlockSource + ?Sized>(
        &mut self,
        source: &mut R,
    ) -> Result<Vec<u8>, TransferError> {
        let next = self.check(Operation::SendDataBlock)?;
        let payload = source.read_block().map_err(|e| self.fail(e))?;

        let block = self.block.wrapping_add(1);
        log::debug!("DATA {} sent, {} bytes", block, payload.len());
        let bytes = self.send_packet(Packet::Data { block, payload })?;
        self.block = block;
        self.state = next;
        Ok(bytes)
    }

    /// Exit check on a received packet of `len` bytes, `DATA_RECEIVED` -> `EXIT`
    ///
    /// When it is time to exit the final block is acknowledged before the
    /// socket is released. Otherwise the state is left unchanged.
    pub fn can_get_exit(&mut self, len: usize) -> Result<bool, TransferError> {
        let next = self.check(Operation::GetExit { len })?;
        if next != State::Exit {
            return Ok(false);
        }

        self.send_packet(Packet::Ack { block: self.block })?;
        log::info!("Download finished at block {}", self.block);
        self.finish();
        Ok(true)
    }

    /// Exit check on a sent packet of `len` bytes, `ACK_RECEIVED` -> `EXIT`
    pub fn can_put_exit(&mut self, len: usize) -> Result<bool, TransferError> {
        let next = self.check(Operation::PutExit { len })?;
        if next != State::Exit {
            return Ok(false);
        }

        log::info!("Upload finished at block {}", self.block);
        self.finish();
        Ok(true)
    }

    /// Abandon the transfer: `ERROR`, socket released
    pub fn abort(&mut self, reason: Error) -> TransferError {
        self.fail(reason)
    }

    /// Finish a download started with [`send_read_request`](Self::send_read_request),
    /// `RRQ_SENT` -> `EXIT`
    ///
    /// Every payload goes to `sink`; returns the number of bytes received.
    pub fn get_into<K: BlockSink + ?Sized>(
        &mut self,
        sink: &mut K,
    ) -> Result<u64, TransferError> {
        self.require(State::RrqSent, "get_into")?;
        let mut total = 0u64;

        loop {
            let data = self.receive_data_block()?;
            sink.write_block(&data.payload).map_err(|e| self.fail(e))?;
            total += data.payload.len() as u64;

            if data.is_final() {
                sink.finish().map_err(|e| self.fail(e))?;
            }
            if self.can_get_exit(data.packet_len())? {
                break;
            }
            self.send_ack()?;
        }

        Ok(total)
    }

    /// Finish an upload started with [`send_write_request`](Self::send_write_request),
    /// `WRQ_SENT` -> `EXIT`
    ///
    /// Blocks are read from `source` until it is exhausted; returns the number
    /// of bytes sent.
    pub fn put_from<R: BlockSource + ?Sized>(
        &mut self,
        source: &mut R,
    ) -> Result<u64, TransferError> {
        self.require(State::WrqSent, "put_from")?;
        let mut total = 0u64;

        self.receive_ack()?;
        loop {
            let sent = self.send_data_block(source)?;
            total += (sent.len() - HEADER_SIZE) as u64;

            self.receive_ack()?;
            if self.can_put_exit(sent.len())? {
                break;
            }
        }

        Ok(total)
    }

    fn send_request(&mut self, request: Packet, mode: Mode) -> Result<Vec<u8>, TransferError> {
        if !mode.is_supported() {
            return Err(self.fail(Error::UnsupportedMode(mode)));
        }
        self.mode = mode;
        self.block = 0;
        self.send_packet(request)
    }

    fn send_packet(&mut self, packet: Packet) -> Result<Vec<u8>, TransferError> {
        let sent = packet.serialize().and_then(|bytes| {
            self.transport()?.send(&bytes)?;
            Ok(bytes)
        });
        match sent {
            Ok(bytes) => {
                self.last_sent = bytes.clone();
                Ok(bytes)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn await_response(&mut self, expect: Expect) -> Result<Response, TransferError> {
        let Self {
            transport,
            scheduler,
            last_sent,
            ..
        } = self;
        let result = match transport.as_mut() {
            Some(transport) => scheduler.await_response(transport, &last_sent[..], expect),
            None => Err(closed()),
        };
        result.map_err(|e| self.fail(e))
    }

    fn transport(&self) -> Result<&TransportSession<B::Socket>> {
        self.transport.as_ref().ok_or_else(closed)
    }

    fn require(&self, state: State, operation: &'static str) -> Result<(), TransferError> {
        if self.state == state {
            return Ok(());
        }
        Err(self.context(Error::InvalidTransition {
            operation,
            state: self.state,
        }))
    }

    fn check(&self, op: Operation) -> Result<State, TransferError> {
        self.state.transition(op).map_err(|kind| self.context(kind))
    }

    fn context(&self, kind: Error) -> TransferError {
        TransferError {
            block: self.block,
            peer: self.peer(),
            kind,
        }
    }

    fn finish(&mut self) {
        self.state = State::Exit;
        self.release();
    }

    fn fail(&mut self, kind: Error) -> TransferError {
        let err = self.context(kind);
        log::error!("Transfer failed in state {}: {}", self.state, err);
        self.state = self.state.transition(Operation::Fail).unwrap_or(State::Error);
        self.release();
        err
    }

    fn release(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
    }
}

fn closed() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::NotConnected, "session has no transport"))
}
