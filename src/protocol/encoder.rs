//! X11 reply encoder
//!
//! Handlers fill a [`Reply`] body; the connection stamps the sequence number
//! and frames it when writing.

use super::codec::WireWriter;
use super::types::ByteOrder;

/// Minimum reply body after the 8-byte header
const REPLY_MIN_BODY: usize = 24;

/// A reply under construction
#[derive(Debug, Clone)]
pub struct Reply {
    /// Byte 1 of the reply header
    pub data: u8,
    /// Bytes following the 8-byte header
    pub body: WireWriter,
}

impl Reply {
    pub fn new(byte_order: ByteOrder) -> Self {
        Reply {
            data: 0,
            body: WireWriter::new(byte_order),
        }
    }

    pub fn with_data(byte_order: ByteOrder, data: u8) -> Self {
        Reply {
            data,
            body: WireWriter::new(byte_order),
        }
    }

    /// Frame the reply: header, body padded to at least 24 bytes and to 4
    pub fn encode(&self, sequence: u16) -> Vec<u8> {
        let body = self.body.as_bytes();
        let mut padded_len = body.len().max(REPLY_MIN_BODY);
        padded_len += super::pad(padded_len);
        let extra_words = ((padded_len - REPLY_MIN_BODY) / 4) as u32;

        let mut w = WireWriter::new(self.body.byte_order());
        w.write_u8(1);
        w.write_u8(self.data);
        w.write_u16(sequence);
        w.write_u32(extra_words);
        w.write_bytes(body);
        w.write_pad(padded_len - body.len());
        w.into_bytes()
    }
}
