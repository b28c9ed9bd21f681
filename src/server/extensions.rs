//! Protocol extensions
//!
//! Extensions get sequential major opcodes from 128 at registration and are
//! advertised through QueryExtension. Their requests reach an ordinary
//! [`RequestHandler`] installed on the allocated opcode, which tells minor
//! requests apart by the header data byte.

use super::dispatcher::{RequestContext, RequestHandler};
use crate::protocol::*;

/// First major opcode handed to an extension
pub const FIRST_EXTENSION_OPCODE: u8 = 128;
/// First event code handed to an extension
pub const FIRST_EXTENSION_EVENT: u8 = 64;
/// First error code handed to an extension
pub const FIRST_EXTENSION_ERROR: u8 = 128;

pub const BIG_REQUESTS_NAME: &str = "BIG-REQUESTS";

/// What QueryExtension reports for a registered extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub name: String,
    pub major_opcode: u8,
    /// 0 when the extension defines no events
    pub first_event: u8,
    /// 0 when the extension defines no errors
    pub first_error: u8,
}

pub struct ExtensionRegistry {
    extensions: Vec<ExtensionInfo>,
    next_opcode: u16,
    next_event: u16,
    next_error: u16,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        ExtensionRegistry {
            extensions: Vec::new(),
            next_opcode: FIRST_EXTENSION_OPCODE as u16,
            next_event: FIRST_EXTENSION_EVENT as u16,
            next_error: FIRST_EXTENSION_ERROR as u16,
        }
    }

    /// Allocate codes for `name`. `events` and `errors` are how many codes of
    /// each kind the extension defines.
    pub fn register(&mut self, name: &str, events: u8, errors: u8) -> X11Result<ExtensionInfo> {
        if self.query(name).is_some() {
            return Err(X11Error::bad_access(0));
        }
        let claim = |next: &mut u16, count: u8, limit: u16| -> X11Result<u8> {
            if count == 0 {
                return Ok(0);
            }
            let first = *next;
            if first + count as u16 > limit {
                return Err(X11Error::bad_alloc());
            }
            *next += count as u16;
            Ok(first as u8)
        };
        let major_opcode = claim(&mut self.next_opcode, 1, 256)?;
        let first_event = claim(&mut self.next_event, events, 128)?;
        let first_error = claim(&mut self.next_error, errors, 256)?;

        let info = ExtensionInfo {
            name: name.to_string(),
            major_opcode,
            first_event,
            first_error,
        };
        log::debug!("extension {} at opcode {}", name, major_opcode);
        self.extensions.push(info.clone());
        Ok(info)
    }

    pub fn query(&self, name: &str) -> Option<&ExtensionInfo> {
        self.extensions.iter().find(|e| e.name == name)
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.name.as_str()).collect()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// BIG-REQUESTS: one request, BigReqEnable (minor 0)
pub struct BigRequests;

impl RequestHandler for BigRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        match request.data {
            0 => {
                ctx.client.enable_big_requests();
                log::debug!("client {}: big requests enabled", ctx.client.client_id());
                let mut reply = ctx.reply();
                reply.body.write_u32(MAX_BIG_REQUEST_LENGTH);
                Ok(Some(reply))
            }
            _ => Err(X11Error::bad_request(request.opcode)),
        }
    }
}
