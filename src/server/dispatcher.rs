//! Opcode dispatch table

use super::client::ClientConnection;
use super::events::ClientRef;
use super::Server;
use crate::protocol::{ByteOrder, Reply, Request, X11Result};
use std::sync::Arc;

/// Everything a handler may touch while processing one request
pub struct RequestContext<'a> {
    pub server: &'a Server,
    pub client: &'a Arc<ClientConnection>,
    pub sequence: u16,
}

impl RequestContext<'_> {
    pub fn byte_order(&self) -> ByteOrder {
        self.client.byte_order()
    }

    /// Empty reply in the client's byte order
    pub fn reply(&self) -> Reply {
        Reply::new(self.byte_order())
    }

    pub fn reply_with_data(&self, data: u8) -> Reply {
        Reply::with_data(self.byte_order(), data)
    }

    /// Send a reply ahead of the one the handler returns, for requests
    /// answered with a series of replies
    pub fn send_extra_reply(&self, reply: &Reply) {
        if let Err(e) = self.client.send_reply(reply, self.sequence) {
            log::debug!("client {}: dropping reply: {}", self.client.client_id(), e);
        }
    }

    /// The client as an event receiver
    pub fn client_ref(&self) -> ClientRef {
        Arc::clone(self.client) as ClientRef
    }
}

/// One request handler. A single handler may serve several opcodes and
/// tells them apart by `request.opcode`.
pub trait RequestHandler: Send + Sync {
    /// Returns the reply to send, if the request has one
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>>;
}

pub struct Dispatcher {
    table: [Option<Arc<dyn RequestHandler>>; 256],
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            table: std::array::from_fn(|_| None),
        }
    }

    /// Install `handler` for each opcode, replacing what was there
    pub fn register(&mut self, handler: Arc<dyn RequestHandler>, opcodes: &[u8]) {
        for &opcode in opcodes {
            if self.table[opcode as usize].is_some() {
                log::warn!("opcode {} registered twice", opcode);
            }
            self.table[opcode as usize] = Some(Arc::clone(&handler));
        }
    }

    pub fn get(&self, opcode: u8) -> Option<&Arc<dyn RequestHandler>> {
        self.table[opcode as usize].as_ref()
    }

    pub fn registered(&self) -> usize {
        self.table.iter().filter(|h| h.is_some()).count()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl RequestHandler for Nop {
        fn handle(&self, _: &RequestContext<'_>, _: &mut Request) -> X11Result<Option<Reply>> {
            Ok(None)
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut dispatcher = Dispatcher::new();
        assert!(dispatcher.get(127).is_none());
        dispatcher.register(Arc::new(Nop), &[1, 127, 255]);
        assert!(dispatcher.get(1).is_some());
        assert!(dispatcher.get(255).is_some());
        assert!(dispatcher.get(2).is_none());
        assert_eq!(dispatcher.registered(), 3);
    }
}
