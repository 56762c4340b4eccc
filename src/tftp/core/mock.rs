//! Scripted in-memory socket for driving the engine without a network

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use super::packet::Packet;
use super::socket::{Bind, Socket};

pub enum Reply {
    Datagram { from: SocketAddr, bytes: Vec<u8> },
    /// One receive that times out
    Silence,
}

impl Reply {
    pub fn datagram(from: SocketAddr, bytes: Vec<u8>) -> Self {
        Reply::Datagram { from, bytes }
    }

    pub fn packet(from: SocketAddr, packet: Packet) -> Self {
        Reply::Datagram {
            from,
            bytes: packet.serialize().unwrap(),
        }
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    sent: Vec<(Vec<u8>, SocketAddr)>,
    binds: usize,
}

/// Every socket it binds shares one script of replies
#[derive(Clone, Default)]
pub struct MockBinder {
    script: Rc<RefCell<Script>>,
}

impl MockBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Reply) {
        self.script.borrow_mut().replies.push_back(reply);
    }

    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.script.borrow().sent.clone()
    }

    pub fn sent_packets(&self) -> Vec<Packet> {
        self.script
            .borrow()
            .sent
            .iter()
            .map(|(bytes, _)| Packet::deserialize(bytes).unwrap())
            .collect()
    }

    pub fn binds(&self) -> usize {
        self.script.borrow().binds
    }

    pub fn pending(&self) -> usize {
        self.script.borrow().replies.len()
    }
}

impl Bind for MockBinder {
    type Socket = MockSocket;

    fn bind(&self, _server: SocketAddr) -> io::Result<MockSocket> {
        self.script.borrow_mut().binds += 1;
        Ok(MockSocket {
            script: Rc::clone(&self.script),
        })
    }
}

pub struct MockSocket {
    script: Rc<RefCell<Script>>,
}

impl Socket for MockSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.script.borrow_mut().sent.push((buf.to_vec(), addr));
        Ok(buf.len())
    }

    fn recv_from(&self, buf: &mut [u8], _timeout: Duration) -> io::Result<(usize, SocketAddr)> {
        // An exhausted script behaves like a silent network
        match self.script.borrow_mut().replies.pop_front() {
            Some(Reply::Datagram { from, bytes }) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok((len, from))
            }
            Some(Reply::Silence) | None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}
