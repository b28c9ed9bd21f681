//! X11 request framer
//!
//! Reads one complete request off the stream into an owned buffer so handlers
//! decode from memory and never block on the socket.

use super::codec::WireReader;
use super::types::ByteOrder;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{self, Read};

/// Largest request accepted under BIG-REQUESTS, in 4-byte units
pub const MAX_BIG_REQUEST_LENGTH: u32 = 0x3F_FFFF;

/// A framed request: header fields plus the payload after the header
#[derive(Debug, Clone)]
pub struct Request {
    pub opcode: u8,
    /// Second header byte (minor opcode for extensions, a flag for core requests)
    pub data: u8,
    pub body: WireReader,
}

fn read_u16<R: Read>(reader: &mut R, byte_order: ByteOrder) -> io::Result<u16> {
    match byte_order {
        ByteOrder::LSBFirst => reader.read_u16::<LittleEndian>(),
        ByteOrder::MSBFirst => reader.read_u16::<BigEndian>(),
    }
}

fn read_u32<R: Read>(reader: &mut R, byte_order: ByteOrder) -> io::Result<u32> {
    match byte_order {
        ByteOrder::LSBFirst => reader.read_u32::<LittleEndian>(),
        ByteOrder::MSBFirst => reader.read_u32::<BigEndian>(),
    }
}

/// Read the next request.
///
/// Returns `Ok(None)` when the peer closed the stream between requests. A
/// zero length without BIG-REQUESTS, or an extended length that cannot cover
/// its own header, is `InvalidData`.
///
/// `big_requests` is only consulted once a zero length has arrived, so a
/// flag flipped while this call was blocked on the socket still applies.
pub fn read_request<R: Read>(
    reader: &mut R,
    byte_order: ByteOrder,
    big_requests: impl FnOnce() -> bool,
) -> io::Result<Option<Request>> {
    let opcode = match reader.read_u8() {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let data = reader.read_u8()?;
    let length = read_u16(reader, byte_order)?;

    let payload_len = if length != 0 {
        length as usize * 4 - 4
    } else if big_requests() {
        let extended = read_u32(reader, byte_order)?;
        if !(2..=MAX_BIG_REQUEST_LENGTH).contains(&extended) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("extended request length {} out of range", extended),
            ));
        }
        extended as usize * 4 - 8
    } else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("zero-length request (opcode {})", opcode),
        ));
    };

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    Ok(Some(Request {
        opcode,
        data,
        body: WireReader::new(payload, byte_order),
    }))
}
