//! Wire codec
//!
//! Primitive encoders and decoders for the X11 wire format. Every multi-byte
//! field is read and written in the byte order negotiated at connection setup.
//! `WireReader` is the cursor handlers use over an already-framed payload;
//! `WireWriter` accumulates reply, event and setup bytes.

use super::errors::{X11Error, X11Result};
use super::{pad, ByteOrder};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

/// Cursor over an owned, fully received packet payload
#[derive(Debug, Clone)]
pub struct WireReader {
    buf: Vec<u8>,
    pos: usize,
    byte_order: ByteOrder,
}

impl WireReader {
    pub fn new(buf: Vec<u8>, byte_order: ByteOrder) -> Self {
        WireReader {
            buf,
            pos: 0,
            byte_order,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> X11Result<&[u8]> {
        if self.remaining() < n {
            return Err(X11Error::underrun(n, self.remaining()));
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    pub fn read_u8(&mut self) -> X11Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> X11Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> X11Result<u16> {
        let order = self.byte_order;
        let bytes = self.take(2)?;
        Ok(match order {
            ByteOrder::LSBFirst => LittleEndian::read_u16(bytes),
            ByteOrder::MSBFirst => BigEndian::read_u16(bytes),
        })
    }

    pub fn read_i16(&mut self) -> X11Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> X11Result<u32> {
        let order = self.byte_order;
        let bytes = self.take(4)?;
        Ok(match order {
            ByteOrder::LSBFirst => LittleEndian::read_u32(bytes),
            ByteOrder::MSBFirst => BigEndian::read_u32(bytes),
        })
    }

    pub fn read_i32(&mut self) -> X11Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Skip `n` bytes of padding or unused fields
    pub fn skip(&mut self, n: usize) -> X11Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_bytes(&mut self, n: usize) -> X11Result<Vec<u8>> {
        self.take(n).map(|b| b.to_vec())
    }

    /// Read `n` bytes followed by the 0-3 bytes that pad them to a 4-byte boundary
    pub fn read_padded_bytes(&mut self, n: usize) -> X11Result<Vec<u8>> {
        let bytes = self.read_bytes(n)?;
        // Trailing pad on the last item of a request may be omitted by some clients
        let trailing = pad(n).min(self.remaining());
        self.skip(trailing)?;
        Ok(bytes)
    }

    pub fn read_padded_string(&mut self, n: usize) -> X11Result<String> {
        let bytes = self.read_padded_bytes(n)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a bitmask-selected value list.
    ///
    /// One 4-byte slot is consumed for every set bit, lowest bit first. Bits
    /// outside `known` are a Value error carrying the whole mask.
    pub fn read_value_list(&mut self, mask: u32, known: u32) -> X11Result<Vec<(u32, u32)>> {
        if mask & !known != 0 {
            return Err(X11Error::bad_value(mask));
        }
        let mut values = Vec::with_capacity(mask.count_ones() as usize);
        for shift in 0..32 {
            let bit = 1u32 << shift;
            if mask & bit != 0 {
                values.push((bit, self.read_u32()?));
            }
        }
        Ok(values)
    }
}

/// Growable output buffer in a fixed byte order
#[derive(Debug, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
    byte_order: ByteOrder,
}

impl WireWriter {
    pub fn new(byte_order: ByteOrder) -> Self {
        WireWriter {
            buf: Vec::with_capacity(32),
            byte_order,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut bytes = [0u8; 2];
        match self.byte_order {
            ByteOrder::LSBFirst => LittleEndian::write_u16(&mut bytes, value),
            ByteOrder::MSBFirst => BigEndian::write_u16(&mut bytes, value),
        }
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        match self.byte_order {
            ByteOrder::LSBFirst => LittleEndian::write_u32(&mut bytes, value),
            ByteOrder::MSBFirst => BigEndian::write_u32(&mut bytes, value),
        }
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_pad(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write `bytes` then zero-fill to the next 4-byte boundary
    pub fn write_padded_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.write_pad(pad(bytes.len()));
    }

    pub fn write_padded_string(&mut self, s: &str) {
        self.write_padded_bytes(s.as_bytes());
    }

    /// Zero-fill until the buffer is a multiple of 4 bytes
    pub fn align(&mut self) {
        self.write_pad(pad(self.buf.len()));
    }

    /// Overwrite a 16-bit field written earlier (length placeholders)
    pub fn patch_u16(&mut self, pos: usize, value: u16) {
        let slot = &mut self.buf[pos..pos + 2];
        match self.byte_order {
            ByteOrder::LSBFirst => LittleEndian::write_u16(slot, value),
            ByteOrder::MSBFirst => BigEndian::write_u16(slot, value),
        }
    }

    pub fn patch_u32(&mut self, pos: usize, value: u32) {
        let slot = &mut self.buf[pos..pos + 4];
        match self.byte_order {
            ByteOrder::LSBFirst => LittleEndian::write_u32(slot, value),
            ByteOrder::MSBFirst => BigEndian::write_u32(slot, value),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
