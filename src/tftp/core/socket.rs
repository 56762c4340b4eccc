use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use super::packet::{ErrorCode, MAX_PACKET_SIZE, Packet};
use crate::tftp::error::{Error, Result};

/// Datagram socket used by a transfer
pub trait Socket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;

    /// Block for at most `timeout` waiting for a datagram
    fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, SocketAddr)>;
}

/// Opens a fresh socket for each transfer
pub trait Bind {
    type Socket: Socket;

    fn bind(&self, server: SocketAddr) -> io::Result<Self::Socket>;
}

impl Socket for UdpSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, SocketAddr)> {
        // A zero read timeout is rejected by the OS
        self.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        UdpSocket::recv_from(self, buf)
    }
}

/// Binds an ephemeral UDP port in the server's address family
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpBinder;

impl Bind for UdpBinder {
    type Socket = UdpSocket;

    fn bind(&self, server: SocketAddr) -> io::Result<UdpSocket> {
        let local = match server.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        UdpSocket::bind(SocketAddr::new(local, 0))
    }
}

/// One transfer's endpoint: the local socket plus the peer TID it is locked to
pub struct TransportSession<S: Socket> {
    socket: Option<S>,
    server: SocketAddr,
    peer: Option<SocketAddr>,
    buf: Vec<u8>,
}

impl<S: Socket> TransportSession<S> {
    pub fn bind<B: Bind<Socket = S>>(binder: &B, server: SocketAddr) -> Result<Self> {
        let socket = binder.bind(server)?;
        Ok(Self::with_socket(socket, server))
    }

    pub fn with_socket(socket: S, server: SocketAddr) -> Self {
        Self {
            socket: Some(socket),
            server,
            peer: None,
            // One spare byte so an oversized datagram is seen as oversized
            buf: vec![0u8; MAX_PACKET_SIZE + 1],
        }
    }

    /// Transfer partner, once the first response has arrived
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Send to the bound peer, or to the server's request port before binding
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let target = self.peer.unwrap_or(self.server);
        self.socket()?.send_to(bytes, target)?;
        Ok(())
    }

    pub fn receive(&mut self, timeout: Duration) -> Result<(Vec<u8>, SocketAddr)> {
        self.receive_until(Instant::now() + timeout)
    }

    /// Wait for a datagram from the transfer partner until `deadline`
    ///
    /// The first datagram binds the partner. Datagrams from any other source
    /// are answered with "unknown transfer ID" and dropped without consuming
    /// more than the remaining time.
    pub fn receive_until(&mut self, deadline: Instant) -> Result<(Vec<u8>, SocketAddr)> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout { attempts: 1 });
            }

            let socket = self.socket.as_ref().ok_or_else(closed)?;
            let (len, from) = match socket.recv_from(&mut self.buf, remaining) {
                Ok(received) => received,
                Err(e) if is_timeout(&e) => return Err(Error::Timeout { attempts: 1 }),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            match self.peer {
                None => {
                    log::debug!("Transfer bound to {}", from);
                    self.peer = Some(from);
                }
                Some(peer) if peer != from => {
                    log::warn!("Discarding datagram from unknown TID {} (peer is {})", from, peer);
                    self.reject_stranger(from);
                    continue;
                }
                Some(_) => {}
            }

            return Ok((self.buf[..len].to_vec(), from));
        }
    }

    /// Release the socket; safe to call more than once
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            log::debug!("Transport to {} closed", self.peer.unwrap_or(self.server));
        }
    }

    fn socket(&self) -> Result<&S> {
        self.socket.as_ref().ok_or_else(closed)
    }

    fn reject_stranger(&self, from: SocketAddr) {
        let reply = Packet::error(
            ErrorCode::UnknownTransferId,
            ErrorCode::UnknownTransferId.default_message(),
        );
        let sent = reply
            .serialize()
            .and_then(|bytes| Ok(self.socket()?.send_to(&bytes, from)?));
        if let Err(e) = sent {
            log::debug!("Could not notify {}: {}", from, e);
        }
    }
}

fn closed() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::NotConnected, "transport is closed"))
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
