//! Loopback server and a minimal LSB-first client for integration tests

#![allow(dead_code)]

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use x11core::backend::Host;
use x11core::connection::Listener;
use x11core::server::{serve, Server, ServerConfig};

pub const ROOT: u32 = 0x100;
pub const MAP_NOTIFY: u8 = 19;

/// Start a server on an ephemeral loopback port
pub fn start_server(config: ServerConfig) -> (SocketAddr, Arc<Server>) {
    let listener = Listener::bind_tcp("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("tcp address");
    let server = Arc::new(Server::new(config, Host::headless()));
    let shared = Arc::clone(&server);
    thread::spawn(move || {
        let _ = serve(listener, shared);
    });
    (addr, server)
}

/// The connection-setup reply, split into its fixed header and the rest
pub struct SetupReply {
    pub status: u8,
    pub reason_len: u8,
    pub major: u16,
    pub minor: u16,
    pub body: Vec<u8>,
}

/// Raw protocol client speaking little-endian
pub struct TestClient {
    stream: TcpStream,
    pub setup: SetupReply,
}

impl TestClient {
    pub fn connect(addr: SocketAddr) -> TestClient {
        Self::connect_with_auth(addr, "", &[])
    }

    pub fn connect_with_auth(addr: SocketAddr, name: &str, data: &[u8]) -> TestClient {
        let mut stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("read timeout");

        let mut hello = Vec::new();
        hello.push(b'l');
        hello.push(0);
        hello.write_u16::<LittleEndian>(11).unwrap();
        hello.write_u16::<LittleEndian>(0).unwrap();
        hello.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        hello.write_u16::<LittleEndian>(data.len() as u16).unwrap();
        hello.extend_from_slice(&[0, 0]);
        push_padded(&mut hello, name.as_bytes());
        push_padded(&mut hello, data);
        stream.write_all(&hello).unwrap();

        let mut header = [0u8; 8];
        stream.read_exact(&mut header).unwrap();
        let mut r = Cursor::new(&header[2..]);
        let major = r.read_u16::<LittleEndian>().unwrap();
        let minor = r.read_u16::<LittleEndian>().unwrap();
        let words = r.read_u16::<LittleEndian>().unwrap();
        let mut body = vec![0u8; words as usize * 4];
        stream.read_exact(&mut body).unwrap();

        TestClient {
            stream,
            setup: SetupReply {
                status: header[0],
                reason_len: header[1],
                major,
                minor,
                body,
            },
        }
    }

    /// Resource-id base from the success block
    pub fn id_base(&self) -> u32 {
        Cursor::new(&self.setup.body[4..8])
            .read_u32::<LittleEndian>()
            .unwrap()
    }

    /// Send a request; `body` is padded and the length field filled in
    pub fn send(&mut self, opcode: u8, data: u8, body: &[u8]) {
        let mut body = body.to_vec();
        body.resize(body.len() + (4 - body.len() % 4) % 4, 0);
        let mut packet = vec![opcode, data];
        packet
            .write_u16::<LittleEndian>((1 + body.len() / 4) as u16)
            .unwrap();
        packet.extend_from_slice(&body);
        self.stream.write_all(&packet).unwrap();
    }

    /// Send a request using the BIG-REQUESTS length encoding
    pub fn send_big(&mut self, opcode: u8, data: u8, body: &[u8]) {
        let mut body = body.to_vec();
        body.resize(body.len() + (4 - body.len() % 4) % 4, 0);
        let mut packet = vec![opcode, data, 0, 0];
        packet
            .write_u32::<LittleEndian>((2 + body.len() / 4) as u32)
            .unwrap();
        packet.extend_from_slice(&body);
        self.stream.write_all(&packet).unwrap();
    }

    /// Read one reply, event or error, including any reply payload
    pub fn read_packet(&mut self) -> Vec<u8> {
        let mut packet = vec![0u8; 32];
        self.stream.read_exact(&mut packet).unwrap();
        if packet[0] == 1 {
            let words = u32_at(&packet, 4) as usize;
            let mut extra = vec![0u8; words * 4];
            self.stream.read_exact(&mut extra).unwrap();
            packet.extend_from_slice(&extra);
        }
        packet
    }

    /// Read packets until a reply or error arrives, returning skipped events
    pub fn read_response(&mut self) -> (Vec<u8>, Vec<Vec<u8>>) {
        let mut events = Vec::new();
        loop {
            let packet = self.read_packet();
            if packet[0] <= 1 {
                return (packet, events);
            }
            events.push(packet);
        }
    }

    pub fn intern_atom(&mut self, name: &str) -> u32 {
        let mut body = Vec::new();
        body.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        body.extend_from_slice(&[0, 0]);
        body.extend_from_slice(name.as_bytes());
        self.send(16, 0, &body);
        let (reply, _) = self.read_response();
        assert_eq!(reply[0], 1, "InternAtom failed: {:?}", &reply[..4]);
        u32_at(&reply, 8)
    }

    /// CreateWindow with a single optional event-mask attribute
    pub fn create_window(&mut self, id: u32, parent: u32, width: u16, height: u16, events: u32) {
        let mut body = Vec::new();
        body.write_u32::<LittleEndian>(id).unwrap();
        body.write_u32::<LittleEndian>(parent).unwrap();
        body.write_i16::<LittleEndian>(10).unwrap();
        body.write_i16::<LittleEndian>(10).unwrap();
        body.write_u16::<LittleEndian>(width).unwrap();
        body.write_u16::<LittleEndian>(height).unwrap();
        body.write_u16::<LittleEndian>(0).unwrap();
        body.write_u16::<LittleEndian>(1).unwrap();
        body.write_u32::<LittleEndian>(0).unwrap();
        if events != 0 {
            body.write_u32::<LittleEndian>(0x800).unwrap();
            body.write_u32::<LittleEndian>(events).unwrap();
        } else {
            body.write_u32::<LittleEndian>(0).unwrap();
        }
        self.send(1, 0, &body);
    }

    /// Round-trip a GetInputFocus, returning its reply and the events
    /// that arrived before it
    pub fn sync(&mut self) -> (Vec<u8>, Vec<Vec<u8>>) {
        self.send(43, 0, &[]);
        self.read_response()
    }

    pub fn get_input_focus(&mut self) -> Vec<u8> {
        self.send(43, 0, &[]);
        self.read_response().0
    }

    /// True once the server has closed the socket
    pub fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 1];
        matches!(self.stream.read(&mut buf), Ok(0))
    }
}

pub fn u16_at(bytes: &[u8], at: usize) -> u16 {
    Cursor::new(&bytes[at..at + 2])
        .read_u16::<LittleEndian>()
        .unwrap()
}

pub fn u32_at(bytes: &[u8], at: usize) -> u32 {
    Cursor::new(&bytes[at..at + 4])
        .read_u32::<LittleEndian>()
        .unwrap()
}

pub fn u32s(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    for &v in values {
        out.write_u32::<LittleEndian>(v).unwrap();
    }
    out
}

fn push_padded(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    out.resize(out.len() + (4 - bytes.len() % 4) % 4, 0);
}
