//! Loopback TFTP server for exercising the client over real sockets

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tftpc::tftp::core::{ErrorCode, MAX_DATA_SIZE, MAX_PACKET_SIZE, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Normal,
    /// Answer every RRQ with an unknown opcode
    BadOpcode,
    /// Accept a WRQ, then never acknowledge DATA
    DropAcks,
    /// Before each DATA after the first, send a forged one from another port
    StrayTid,
}

type Files = Arc<Mutex<HashMap<String, Vec<u8>>>>;
type Log = Arc<Mutex<Vec<Packet>>>;

pub struct TestServer {
    addr: SocketAddr,
    files: Files,
    received: Log,
    stray_received: Log,
    stop: Arc<AtomicBool>,
}

impl TestServer {
    pub fn start(behavior: Behavior) -> Self {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Self {
            addr,
            files: Files::default(),
            received: Log::default(),
            stray_received: Log::default(),
            stop: Arc::new(AtomicBool::new(false)),
        };

        let ctx = Context {
            files: server.files.clone(),
            received: server.received.clone(),
            stray_received: server.stray_received.clone(),
            behavior,
        };
        let stop = server.stop.clone();
        thread::spawn(move || {
            let mut buf = [0u8; MAX_PACKET_SIZE + 1];
            while !stop.load(Ordering::Relaxed) {
                let Ok((len, client)) = listener.recv_from(&mut buf) else {
                    continue;
                };
                let Ok(request) = Packet::deserialize(&buf[..len]) else {
                    continue;
                };
                let ctx = ctx.clone();
                thread::spawn(move || ctx.handle(request, client));
            }
        });

        server
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn insert(&self, name: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_vec());
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }

    /// Every packet the transfer ports received, in order
    pub fn received(&self) -> Vec<Packet> {
        self.received.lock().unwrap().clone()
    }

    pub fn stray_received(&self) -> Vec<Packet> {
        self.stray_received.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[derive(Clone)]
struct Context {
    files: Files,
    received: Log,
    stray_received: Log,
    behavior: Behavior,
}

impl Context {
    fn handle(&self, request: Packet, client: SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();

        match request {
            Packet::ReadRequest { path, .. } => {
                if self.behavior == Behavior::BadOpcode {
                    socket.send_to(&[0, 9, 0, 1], client).unwrap();
                    return;
                }
                let content = self.files.lock().unwrap().get(&path).cloned();
                match content {
                    Some(content) => self.serve_read(&socket, client, &content),
                    None => send(
                        &socket,
                        client,
                        Packet::error(ErrorCode::FileNotFound, "File not found"),
                    ),
                }
            }
            Packet::WriteRequest { path, .. } => self.serve_write(&socket, client, &path),
            _ => {}
        }
    }

    fn serve_read(&self, socket: &UdpSocket, client: SocketAddr, content: &[u8]) {
        let mut blocks: Vec<&[u8]> = content.chunks(MAX_DATA_SIZE).collect();
        if content.len() % MAX_DATA_SIZE == 0 {
            blocks.push(&[]);
        }

        let stray = UdpSocket::bind("127.0.0.1:0").unwrap();
        stray
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();

        for (i, payload) in blocks.iter().enumerate() {
            let block = (i + 1) as u16;
            let data = Packet::Data {
                block,
                payload: payload.to_vec(),
            };

            if self.behavior == Behavior::StrayTid && block > 1 {
                let forged = Packet::Data {
                    block,
                    payload: vec![0xEE; payload.len()],
                };
                send(&stray, client, forged);
                if let Some(reply) = recv(&stray) {
                    self.stray_received.lock().unwrap().push(reply);
                }
            }

            let mut acked = false;
            for _ in 0..5 {
                send(socket, client, data.clone());
                if self.wait_for_ack(socket, block) {
                    acked = true;
                    break;
                }
            }
            if !acked {
                return;
            }
        }
    }

    fn wait_for_ack(&self, socket: &UdpSocket, block: u16) -> bool {
        while let Some(packet) = recv(socket) {
            self.received.lock().unwrap().push(packet.clone());
            match packet {
                Packet::Ack { block: b } if b == block => return true,
                Packet::Error { .. } => return false,
                _ => {}
            }
        }
        false
    }

    fn serve_write(&self, socket: &UdpSocket, client: SocketAddr, path: &str) {
        send(socket, client, Packet::Ack { block: 0 });

        let mut content = Vec::new();
        let mut expected: u16 = 1;
        let mut idle = 0;
        while idle < 10 {
            let Some(packet) = recv(socket) else {
                idle += 1;
                continue;
            };
            idle = 0;
            self.received.lock().unwrap().push(packet.clone());

            if self.behavior == Behavior::DropAcks {
                continue;
            }

            if let Packet::Data { block, payload } = packet {
                if block == expected {
                    content.extend_from_slice(&payload);
                    send(socket, client, Packet::Ack { block });
                    if payload.len() < MAX_DATA_SIZE {
                        self.files
                            .lock()
                            .unwrap()
                            .insert(path.to_string(), content);
                        return;
                    }
                    expected = expected.wrapping_add(1);
                } else if block == expected.wrapping_sub(1) {
                    send(socket, client, Packet::Ack { block });
                }
            }
        }
    }
}

fn send(socket: &UdpSocket, to: SocketAddr, packet: Packet) {
    socket.send_to(&packet.serialize().unwrap(), to).unwrap();
}

fn recv(socket: &UdpSocket) -> Option<Packet> {
    let mut buf = [0u8; MAX_PACKET_SIZE + 1];
    let (len, _) = socket.recv_from(&mut buf).ok()?;
    Packet::deserialize(&buf[..len]).ok()
}
