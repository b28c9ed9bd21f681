//! Server listener and connection handling
//!
//! Each accepted connection gets three threads: the receive loop, which only
//! frames requests off the socket, a worker that runs them strictly in
//! arrival order, and a writer that drains the client's outbound queue.
//! The receive loop stalls once [`REQUEST_QUEUE_DEPTH`] requests are
//! waiting, which stops reading from a client that outpaces its worker.

use super::client::ClientConnection;
use super::{Flow, Server, ServerResult};
use crate::connection::{Connection, Listener};
use crate::protocol::*;
use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

/// Framed requests buffered between a connection's receive loop and its
/// worker
pub const REQUEST_QUEUE_DEPTH: usize = 64;

/// Accept connections forever, one thread pair per client
pub fn serve(listener: Listener, server: Arc<Server>) -> ServerResult<()> {
    match listener.local_addr() {
        Some(addr) => log::info!("listening on tcp {}", addr),
        None => log::info!("listening on unix socket"),
    }
    loop {
        let conn = match listener.accept() {
            Ok(conn) => conn,
            Err(e) => {
                log::error!("accept failed: {}", e);
                continue;
            }
        };
        let server = Arc::clone(&server);
        let spawned = thread::Builder::new()
            .name("x11-conn".to_string())
            .spawn(move || {
                let peer = conn.describe_peer();
                if let Err(e) = handle_client(conn, server) {
                    log::error!("{}: {}", peer, e);
                }
            });
        if let Err(e) = spawned {
            log::error!("cannot spawn connection thread: {}", e);
        }
    }
}

/// Run one connection from handshake to close
pub fn handle_client(mut conn: Connection, server: Arc<Server>) -> ServerResult<()> {
    let peer = conn.describe_peer();
    log::info!("connection from {}", peer);

    let setup = SetupRequest::parse(&mut conn)?;
    let byte_order = setup.byte_order;
    log::debug!(
        "{}: protocol {}.{}, auth {:?}",
        peer,
        setup.protocol_major_version,
        setup.protocol_minor_version,
        setup.authorization_protocol_name
    );

    let verdict = if setup.protocol_major_version != PROTOCOL_MAJOR_VERSION {
        Err(format!(
            "Protocol version mismatch: server {}, client {}",
            PROTOCOL_MAJOR_VERSION, setup.protocol_major_version
        ))
    } else {
        server.config().auth.check(
            &setup.authorization_protocol_name,
            &setup.authorization_protocol_data,
        )
    };
    if let Err(reason) = verdict {
        log::info!("{}: rejected: {}", peer, reason);
        return reject(&mut conn, byte_order, reason);
    }

    let client = match server.register_client(byte_order, Box::new(conn.try_clone()?)) {
        Ok(client) => client,
        Err(reason) => {
            log::warn!("{}: rejected: {}", peer, reason);
            return reject(&mut conn, byte_order, reason);
        }
    };
    let client_id = client.client_id();
    let result = run_session(&mut conn, &server, &client, &peer);

    server.unregister_client(client_id);
    conn.shutdown();
    log::info!("client {} disconnected", client_id);
    result
}

/// Answer the handshake with a failure block and hang up
fn reject(conn: &mut Connection, byte_order: ByteOrder, reason: String) -> ServerResult<()> {
    let failed = SetupFailed {
        protocol_major_version: PROTOCOL_MAJOR_VERSION,
        protocol_minor_version: PROTOCOL_MINOR_VERSION,
        reason,
    };
    conn.write_all(&SetupResponse::Failed(failed).encode(byte_order))?;
    conn.flush()?;
    conn.shutdown();
    Ok(())
}

/// Everything after a successful handshake: start the writer, send the
/// setup block, serve requests, then let the writer finish what is queued
fn run_session(
    conn: &mut Connection,
    server: &Arc<Server>,
    client: &Arc<ClientConnection>,
    peer: &str,
) -> ServerResult<()> {
    let client_id = client.client_id();
    let hangup = conn.try_clone()?;
    client.set_disconnect_hook(Box::new(move || hangup.shutdown()));

    let writer = {
        let client = Arc::clone(client);
        let socket = conn.try_clone()?;
        thread::Builder::new()
            .name(format!("x11-writer-{}", client_id))
            .spawn(move || run_writer(&client, &socket))?
    };

    let setup = SetupResponse::Success(server.setup_reply(client_id)).encode(client.byte_order());
    let result: ServerResult<()> = client
        .send_raw(&setup)
        .map_err(Into::into)
        .and_then(|()| {
            log::info!("client {} connected ({})", client_id, peer);
            serve_requests(conn, server, client)
        });

    client.close();
    match writer.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::debug!("client {}: write failed: {}", client_id, e),
        Err(_) => log::error!("client {} writer panicked", client_id),
    }
    result
}

/// Writer: moves queued output onto the socket until the client closes,
/// then shuts the socket so the receive loop stops too
fn run_writer(client: &ClientConnection, socket: &Connection) -> io::Result<()> {
    let result = loop {
        match client.write_queued() {
            Ok(true) => {}
            Ok(false) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    socket.shutdown();
    result
}

/// Bounded hand-off from the receive loop to the worker
fn request_queue() -> (SyncSender<Request>, Receiver<Request>) {
    mpsc::sync_channel(REQUEST_QUEUE_DEPTH)
}

/// Receive loop. Hands each framed request to the worker and goes straight
/// back to the socket.
fn serve_requests(
    conn: &mut Connection,
    server: &Arc<Server>,
    client: &Arc<ClientConnection>,
) -> ServerResult<()> {
    let (tx, rx) = request_queue();
    let worker = {
        let server = Arc::clone(server);
        let client = Arc::clone(client);
        thread::Builder::new()
            .name(format!("x11-client-{}", client.client_id()))
            .spawn(move || run_worker(rx, &server, &client))?
    };

    let byte_order = client.byte_order();
    let received: io::Result<()> = loop {
        match read_request(conn, byte_order, || client.big_requests_enabled()) {
            Ok(Some(request)) => {
                if tx.send(request).is_err() {
                    // Worker already stopped and closed the socket
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(e) if client.is_closed() => {
                log::debug!("client {}: read after close: {}", client.client_id(), e);
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };
    drop(tx);

    let worked = worker
        .join()
        .map_err(|_| format!("client {} worker panicked", client.client_id()))?;
    received?;
    worked?;
    Ok(())
}

/// Request worker: processes requests in order until the queue closes or a
/// request ends the connection. Closing the client lets the writer flush
/// the final error before it shuts the socket.
fn run_worker(
    rx: Receiver<Request>,
    server: &Server,
    client: &Arc<ClientConnection>,
) -> io::Result<()> {
    for request in rx {
        match server.dispatch(client, request) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Close) => {
                client.close();
                return Ok(());
            }
            Err(e) => {
                client.close();
                return Err(e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::TrySendError;

    fn no_operation() -> Request {
        Request {
            opcode: 127,
            data: 0,
            body: WireReader::new(Vec::new(), ByteOrder::LSBFirst),
        }
    }

    #[test]
    fn test_request_queue_is_bounded() {
        let (tx, rx) = request_queue();
        for _ in 0..REQUEST_QUEUE_DEPTH {
            tx.try_send(no_operation()).unwrap();
        }
        assert!(matches!(
            tx.try_send(no_operation()),
            Err(TrySendError::Full(_))
        ));
        rx.recv().unwrap();
        assert!(tx.try_send(no_operation()).is_ok());
    }
}
