//! Client session state
//!
//! A [`ClientConnection`] is shared between the receive loop, the request
//! worker and every other connection that delivers events to it. Output is
//! never written by the thread that produced it: replies, errors and events
//! are encoded into a per-client outbound queue, and the connection's writer
//! thread drains that queue onto the socket with no server lock held. A peer
//! that stops reading can therefore only fill its own queue.
//!
//! Events are produced under the window-tree lock and must not wait, so an
//! event that would push the queue past its limit aborts the connection.
//! Replies and errors are produced by the client's own worker with no lock
//! held and wait for room instead.

use super::events::EventSink;
use crate::protocol::{ByteOrder, Event, Reply, X11Error};
use crate::resources::lock;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Outbound bytes a client may have pending before it is cut off
pub const DEFAULT_QUEUE_LIMIT: usize = 16 * 1024 * 1024;

struct Outbound {
    /// Sequence number of the last processed request
    sequence: u16,
    queue: VecDeque<Vec<u8>>,
    /// Queued plus in-flight bytes
    pending: usize,
    closed: bool,
}

type DisconnectHook = Box<dyn Fn() + Send + Sync>;

/// A connected client as seen by the rest of the server
pub struct ClientConnection {
    client_id: u32,
    byte_order: ByteOrder,
    big_requests: AtomicBool,
    closed: AtomicBool,
    queue_limit: usize,
    state: Mutex<Outbound>,
    /// Signalled when packets are queued or the connection closes
    ready: Condvar,
    /// Signalled when queued bytes reach the socket
    drained: Condvar,
    writer: Mutex<Box<dyn Write + Send>>,
    on_disconnect: Mutex<Option<DisconnectHook>>,
}

impl ClientConnection {
    pub fn new(client_id: u32, byte_order: ByteOrder, writer: Box<dyn Write + Send>) -> Self {
        ClientConnection {
            client_id,
            byte_order,
            big_requests: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            queue_limit: DEFAULT_QUEUE_LIMIT,
            state: Mutex::new(Outbound {
                sequence: 0,
                queue: VecDeque::new(),
                pending: 0,
                closed: false,
            }),
            ready: Condvar::new(),
            drained: Condvar::new(),
            writer: Mutex::new(writer),
            on_disconnect: Mutex::new(None),
        }
    }

    pub fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit;
        self
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn big_requests_enabled(&self) -> bool {
        self.big_requests.load(Ordering::Acquire)
    }

    pub fn enable_big_requests(&self) {
        self.big_requests.store(true, Ordering::Release);
    }

    /// Run `hook` when the connection is aborted, typically to shut the
    /// socket down so both connection threads wake up
    pub fn set_disconnect_hook(&self, hook: DisconnectHook) {
        *lock(&self.on_disconnect) = Some(hook);
    }

    /// Advance the counter for a newly processed request, wrapping at 65536
    pub fn next_sequence(&self) -> u16 {
        let mut state = lock(&self.state);
        state.sequence = state.sequence.wrapping_add(1);
        state.sequence
    }

    pub fn sequence(&self) -> u16 {
        lock(&self.state).sequence
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting output. Packets already queued are still written.
    pub fn close(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        self.closed.store(true, Ordering::Release);
        drop(state);
        self.ready.notify_all();
        self.drained.notify_all();
    }

    /// Drop everything queued and disconnect
    pub fn abort(&self) {
        {
            let mut state = lock(&self.state);
            state.closed = true;
            state.queue.clear();
            state.pending = 0;
            self.closed.store(true, Ordering::Release);
        }
        self.ready.notify_all();
        self.drained.notify_all();
        if let Some(hook) = lock(&self.on_disconnect).as_ref() {
            hook();
        }
    }

    /// Bytes queued or being written
    pub fn pending_bytes(&self) -> usize {
        lock(&self.state).pending
    }

    fn fits(&self, state: &Outbound, len: usize) -> bool {
        state.pending == 0 || state.pending + len <= self.queue_limit
    }

    fn push(&self, mut state: MutexGuard<'_, Outbound>, packet: Vec<u8>) {
        state.pending += packet.len();
        state.queue.push_back(packet);
        drop(state);
        self.ready.notify_one();
    }

    /// Queue a packet, waiting while the queue is over its limit
    fn enqueue(&self, packet: Vec<u8>) -> io::Result<()> {
        let mut state = lock(&self.state);
        loop {
            if state.closed {
                return Err(io::ErrorKind::NotConnected.into());
            }
            if self.fits(&state, packet.len()) {
                break;
            }
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.push(state, packet);
        Ok(())
    }

    pub fn send_raw(&self, packet: &[u8]) -> io::Result<()> {
        self.enqueue(packet.to_vec())
    }

    pub fn send_reply(&self, reply: &Reply, sequence: u16) -> io::Result<()> {
        self.enqueue(reply.encode(sequence))
    }

    /// The error must already carry its sequence number
    pub fn send_error(&self, error: &X11Error) -> io::Result<()> {
        log::debug!("client {}: {}", self.client_id, error);
        self.enqueue(error.encode(self.byte_order))
    }

    /// Block until output is queued, then write all of it. Returns false
    /// once the connection is closed and nothing is left to write.
    pub fn write_queued(&self) -> io::Result<bool> {
        let batch = {
            let mut state = lock(&self.state);
            while state.queue.is_empty() {
                if state.closed {
                    return Ok(false);
                }
                state = self
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            state.queue.drain(..).collect::<Vec<_>>()
        };
        self.write_batch(batch)?;
        Ok(true)
    }

    /// Write whatever is queued without waiting for more
    pub fn flush(&self) -> io::Result<()> {
        let batch = lock(&self.state).queue.drain(..).collect::<Vec<_>>();
        if batch.is_empty() {
            return Ok(());
        }
        self.write_batch(batch)
    }

    fn write_batch(&self, batch: Vec<Vec<u8>>) -> io::Result<()> {
        let written: usize = batch.iter().map(Vec::len).sum();
        let result = {
            let mut writer = lock(&self.writer);
            batch
                .iter()
                .try_for_each(|packet| writer.write_all(packet))
                .and_then(|()| writer.flush())
        };
        {
            let mut state = lock(&self.state);
            state.pending = state.pending.saturating_sub(written);
        }
        self.drained.notify_all();
        if result.is_err() {
            self.close();
        }
        result
    }
}

impl EventSink for ClientConnection {
    fn client_id(&self) -> u32 {
        self.client_id
    }

    /// Events carry the sequence number of the last request processed for
    /// this client, read under the same lock that queues the packet
    fn send_event(&self, event: &Event) -> io::Result<()> {
        let state = lock(&self.state);
        if state.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        let packet = event.encode(state.sequence, self.byte_order);
        if !self.fits(&state, packet.len()) {
            let pending = state.pending;
            drop(state);
            log::warn!(
                "client {}: {} bytes of output pending, disconnecting",
                self.client_id,
                pending
            );
            self.abort();
            return Err(io::ErrorKind::WouldBlock.into());
        }
        self.push(state, packet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Window;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn destroy_notify() -> Event {
        Event::DestroyNotify {
            event: Window::new(5),
            window: Window::new(5),
        }
    }

    #[test]
    fn test_sequence_wraps() {
        let client = ClientConnection::new(1, ByteOrder::LSBFirst, Box::new(io::sink()));
        for _ in 0..65535 {
            client.next_sequence();
        }
        assert_eq!(client.sequence(), 65535);
        assert_eq!(client.next_sequence(), 0);
        assert_eq!(client.next_sequence(), 1);
    }

    #[test]
    fn test_event_carries_last_sequence() {
        let buf = SharedBuf::default();
        let client = ClientConnection::new(1, ByteOrder::LSBFirst, Box::new(buf.clone()));
        client.next_sequence();
        client.next_sequence();
        client.send_event(&destroy_notify()).unwrap();
        // Nothing reaches the socket until the queue is drained
        assert!(buf.0.lock().unwrap().is_empty());
        assert_eq!(client.pending_bytes(), 32);

        client.flush().unwrap();
        let bytes = buf.0.lock().unwrap().clone();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 17);
        assert_eq!(&bytes[2..4], &[2, 0]);
        assert_eq!(client.pending_bytes(), 0);
    }

    #[test]
    fn test_closed_rejects_output() {
        let buf = SharedBuf::default();
        let client = ClientConnection::new(3, ByteOrder::MSBFirst, Box::new(buf.clone()));
        client.close();
        let err = client.send_raw(&[0; 32]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(client.send_event(&destroy_notify()).is_err());
        client.flush().unwrap();
        assert!(buf.0.lock().unwrap().is_empty());
        assert!(!client.big_requests_enabled());
        client.enable_big_requests();
        assert!(client.big_requests_enabled());
    }

    #[test]
    fn test_close_still_drains_queued_output() {
        let buf = SharedBuf::default();
        let client = ClientConnection::new(2, ByteOrder::LSBFirst, Box::new(buf.clone()));
        client.send_raw(&[1; 32]).unwrap();
        client.close();
        assert!(client.write_queued().unwrap());
        assert!(!client.write_queued().unwrap());
        assert_eq!(buf.0.lock().unwrap().len(), 32);
    }

    #[test]
    fn test_event_overflow_aborts_only_that_client() {
        let hung_up = Arc::new(AtomicUsize::new(0));
        let stalled = ClientConnection::new(4, ByteOrder::LSBFirst, Box::new(io::sink()))
            .with_queue_limit(64);
        let seen = Arc::clone(&hung_up);
        stalled.set_disconnect_hook(Box::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let healthy = ClientConnection::new(5, ByteOrder::LSBFirst, Box::new(io::sink()))
            .with_queue_limit(64);

        // Nobody drains the stalled client; the third event does not fit
        stalled.send_event(&destroy_notify()).unwrap();
        stalled.send_event(&destroy_notify()).unwrap();
        let err = stalled.send_event(&destroy_notify()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert!(stalled.is_closed());
        assert_eq!(stalled.pending_bytes(), 0);
        assert_eq!(hung_up.load(Ordering::SeqCst), 1);

        for _ in 0..10 {
            healthy.send_event(&destroy_notify()).unwrap();
            healthy.flush().unwrap();
        }
        assert!(!healthy.is_closed());
    }

    #[test]
    fn test_reply_waits_for_writer_instead_of_failing() {
        let buf = SharedBuf::default();
        let client = Arc::new(
            ClientConnection::new(6, ByteOrder::LSBFirst, Box::new(buf.clone()))
                .with_queue_limit(64),
        );
        client.send_raw(&[0; 64]).unwrap();

        let writer = {
            let client = Arc::clone(&client);
            thread::spawn(move || while client.write_queued().unwrap() {})
        };
        // Over the limit until the writer catches up
        client.send_raw(&[1; 64]).unwrap();
        client.close();
        writer.join().unwrap();
        assert_eq!(buf.0.lock().unwrap().len(), 128);
    }
}
