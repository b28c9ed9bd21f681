/// X11 protocol implementation
///
/// This module implements the X11 wire protocol: primitive codec, request
/// framing, replies, events, errors and the connection handshake.

pub mod types;
pub mod codec;
pub mod errors;
pub mod events;
pub mod requests;
pub mod setup;
pub mod parser;
pub mod encoder;
pub mod image;

pub use types::*;
pub use codec::*;
pub use errors::*;
pub use events::*;
pub use requests::*;
pub use setup::*;
pub use parser::*;
pub use encoder::*;
pub use image::*;

/// X11 protocol version
pub const PROTOCOL_MAJOR_VERSION: u16 = 11;
pub const PROTOCOL_MINOR_VERSION: u16 = 0;

/// Bytes needed to bring `n` up to a 4-byte boundary
pub fn pad(n: usize) -> usize {
    (4 - (n % 4)) % 4
}

pub fn padded_len(n: usize) -> usize {
    n + pad(n)
}
