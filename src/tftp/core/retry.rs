use std::fmt;
use std::time::{Duration, Instant};

use super::packet::{Packet, PacketKind};
use super::socket::{Socket, TransportSession};
use crate::tftp::error::{Error, Result};

/// Response a sender is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Data(u16),
    Ack(u16),
}

impl Expect {
    pub fn kind(self) -> PacketKind {
        match self {
            Expect::Data(_) => PacketKind::Data,
            Expect::Ack(_) => PacketKind::Ack,
        }
    }

    pub fn block(self) -> u16 {
        match self {
            Expect::Data(block) | Expect::Ack(block) => block,
        }
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.block())
    }
}

/// A matching response and the datagram it came in
#[derive(Debug, Clone)]
pub struct Response {
    pub packet: Packet,
    pub bytes: Vec<u8>,
}

/// Lock-step retransmission: resend the last datagram on every timeout
#[derive(Debug, Clone, Copy)]
pub struct RetryScheduler {
    max_retries: u32,
    timeout: Duration,
}

impl RetryScheduler {
    /// `max_retries` counts every transmission, the original one included
    pub fn new(max_retries: u32, timeout: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            timeout,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn send_and_await<S: Socket>(
        &self,
        transport: &mut TransportSession<S>,
        bytes: &[u8],
        expect: Expect,
    ) -> Result<Response> {
        transport.send(bytes)?;
        self.await_response(transport, bytes, expect)
    }

    /// Wait for `expect` after `last_sent` has already gone out once
    pub fn await_response<S: Socket>(
        &self,
        transport: &mut TransportSession<S>,
        last_sent: &[u8],
        expect: Expect,
    ) -> Result<Response> {
        let mut attempts = 1;
        loop {
            match self.await_once(transport, expect) {
                Err(Error::Timeout { .. }) if attempts < self.max_retries => {
                    attempts += 1;
                    log::warn!(
                        "No {} within {:?}, retransmitting (attempt {}/{})",
                        expect,
                        self.timeout,
                        attempts,
                        self.max_retries
                    );
                    transport.send(last_sent)?;
                }
                Err(Error::Timeout { .. }) => return Err(Error::Timeout { attempts }),
                other => return other,
            }
        }
    }

    fn await_once<S: Socket>(
        &self,
        transport: &mut TransportSession<S>,
        expect: Expect,
    ) -> Result<Response> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let (bytes, _) = transport.receive_until(deadline)?;
            let packet = Packet::deserialize(&bytes)?;

            match (&packet, expect) {
                (Packet::Error { code, message }, _) => {
                    return Err(Error::Server {
                        code: *code,
                        message: message.clone(),
                    });
                }
                (Packet::Data { block, .. }, Expect::Data(want))
                | (Packet::Ack { block }, Expect::Ack(want)) => {
                    if *block == want {
                        return Ok(Response { packet, bytes });
                    }
                    log::warn!(
                        "Discarding stale {} {}, expecting {}",
                        packet.kind(),
                        block,
                        expect
                    );
                }
                _ => {
                    return Err(Error::protocol(format!(
                        "expected {}, received {}",
                        expect,
                        packet.kind()
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tftp::core::mock::{MockBinder, Reply};
    use crate::tftp::core::packet::ErrorCode;
    use std::net::SocketAddr;

    fn server() -> SocketAddr {
        "127.0.0.1:69".parse().unwrap()
    }

    fn tid() -> SocketAddr {
        "127.0.0.1:40001".parse().unwrap()
    }

    fn scheduler() -> RetryScheduler {
        RetryScheduler::new(5, Duration::from_millis(20))
    }

    fn data(block: u16, len: usize) -> Packet {
        Packet::Data {
            block,
            payload: vec![7; len],
        }
    }

    #[test]
    fn test_retransmits_identical_bytes_until_answered() {
        let binder = MockBinder::new();
        binder.push(Reply::Silence);
        binder.push(Reply::Silence);
        binder.push(Reply::packet(tid(), Packet::Ack { block: 3 }));
        let mut transport = TransportSession::bind(&binder, server()).unwrap();

        let sent = data(3, 100).serialize().unwrap();
        let response = scheduler()
            .send_and_await(&mut transport, &sent, Expect::Ack(3))
            .unwrap();
        assert_eq!(response.packet, Packet::Ack { block: 3 });

        let log = binder.sent();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|(bytes, _)| *bytes == sent));
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let binder = MockBinder::new();
        let mut transport = TransportSession::bind(&binder, server()).unwrap();

        let sent = data(1, 512).serialize().unwrap();
        let result = scheduler().send_and_await(&mut transport, &sent, Expect::Ack(1));
        assert!(matches!(result, Err(Error::Timeout { attempts: 5 })));
        assert_eq!(binder.sent().len(), 5);
    }

    #[test]
    fn test_stale_block_is_skipped() {
        let binder = MockBinder::new();
        binder.push(Reply::packet(tid(), data(1, 512)));
        binder.push(Reply::packet(tid(), data(2, 10)));
        let mut transport = TransportSession::bind(&binder, server()).unwrap();

        let response = scheduler()
            .send_and_await(&mut transport, &[0, 4, 0, 1], Expect::Data(2))
            .unwrap();
        assert_eq!(response.packet, data(2, 10));
        assert_eq!(response.bytes.len(), 14);
        assert_eq!(binder.sent().len(), 1);
    }

    #[test]
    fn test_server_error_is_not_retried() {
        let binder = MockBinder::new();
        binder.push(Reply::packet(
            tid(),
            Packet::error(ErrorCode::FileNotFound, "File not found"),
        ));
        let mut transport = TransportSession::bind(&binder, server()).unwrap();

        let result = scheduler().send_and_await(&mut transport, &[0, 1], Expect::Data(1));
        match result {
            Err(Error::Server { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "File not found");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(binder.sent().len(), 1);
    }

    #[test]
    fn test_unexpected_kind_is_a_protocol_error() {
        let binder = MockBinder::new();
        binder.push(Reply::packet(tid(), Packet::Ack { block: 1 }));
        let mut transport = TransportSession::bind(&binder, server()).unwrap();

        let result = scheduler().send_and_await(&mut transport, &[0, 1], Expect::Data(1));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_zero_retries_still_sends_once() {
        let scheduler = RetryScheduler::new(0, Duration::from_millis(1));
        assert_eq!(scheduler.max_retries(), 1);
    }
}
