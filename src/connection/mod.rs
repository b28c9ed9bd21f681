//! Connection layer
//!
//! This module handles network connections from X11 clients via TCP and Unix sockets.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

/// TCP port for a display number
pub fn tcp_port(display: u16) -> u16 {
    6000 + display
}

/// Unix socket path for a display number
pub fn unix_socket_path(display: u16) -> String {
    format!("/tmp/.X11-unix/X{}", display)
}

/// Connection type
pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    /// Second handle on the same socket, used as the write half
    pub fn try_clone(&self) -> io::Result<Connection> {
        match self {
            Connection::Tcp(stream) => Ok(Connection::Tcp(stream.try_clone()?)),
            #[cfg(unix)]
            Connection::Unix(stream) => Ok(Connection::Unix(stream.try_clone()?)),
        }
    }

    /// Close both directions. Unblocks a reader parked on the other handle.
    pub fn shutdown(&self) {
        let result = match self {
            Connection::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        if let Err(e) = result {
            if e.kind() != io::ErrorKind::NotConnected {
                log::debug!("shutdown: {}", e);
            }
        }
    }

    /// Human-readable peer description for logs
    pub fn describe_peer(&self) -> String {
        match self {
            Connection::Tcp(stream) => match stream.peer_addr() {
                Ok(addr) => format!("tcp {}", addr),
                Err(_) => "tcp (unknown peer)".to_string(),
            },
            #[cfg(unix)]
            Connection::Unix(stream) => unix_peer(stream),
        }
    }
}

#[cfg(target_os = "linux")]
fn unix_peer(stream: &UnixStream) -> String {
    use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};
    match getsockopt(stream, PeerCredentials) {
        Ok(cred) => format!("unix pid={} uid={}", cred.pid(), cred.uid()),
        Err(e) => format!("unix (credentials unavailable: {})", e),
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn unix_peer(_stream: &UnixStream) -> String {
    "unix".to_string()
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.flush(),
        }
    }
}

/// Connection listener
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    /// Create a TCP listener on all interfaces
    pub fn tcp(port: u16) -> io::Result<Self> {
        Self::bind_tcp(&format!("0.0.0.0:{}", port))
    }

    /// Create a TCP listener on an explicit address (tests use `127.0.0.1:0`)
    pub fn bind_tcp(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Listener::Tcp(listener))
    }

    /// Create a Unix socket listener
    #[cfg(unix)]
    pub fn unix(path: &str) -> io::Result<Self> {
        if let Some(dir) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(dir)?;
        }
        // A stale socket file from a previous run blocks bind
        match std::fs::remove_file(path) {
            Ok(()) => log::debug!("removed stale socket {}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let listener = UnixListener::bind(path)?;
        Ok(Listener::Unix(listener))
    }

    /// Bound TCP address, if this is a TCP listener
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Listener::Unix(_) => None,
        }
    }

    /// Accept a new connection
    pub fn accept(&self) -> io::Result<Connection> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, _) = listener.accept()?;
                // Replies are small and latency-bound
                stream.set_nodelay(true)?;
                Ok(Connection::Tcp(stream))
            }
            #[cfg(unix)]
            Listener::Unix(listener) => {
                let (stream, _) = listener.accept()?;
                Ok(Connection::Unix(stream))
            }
        }
    }
}
