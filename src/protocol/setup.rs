//! X11 connection setup protocol
//!
//! This module handles the initial connection handshake between client and server.

use super::codec::{WireReader, WireWriter};
use super::types::*;
use super::padded_len;
use std::io::{self, Read};

/// Connection setup request from client
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub byte_order: ByteOrder,
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub authorization_protocol_name: String,
    pub authorization_protocol_data: Vec<u8>,
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

impl SetupRequest {
    /// Parse setup request from stream. An unknown order marker is fatal.
    pub fn parse<R: Read>(stream: &mut R) -> io::Result<Self> {
        let mut header = [0u8; 12];
        stream.read_exact(&mut header)?;

        let byte_order = ByteOrder::from_marker(header[0])
            .ok_or_else(|| invalid(format!("bad byte order marker 0x{:02x}", header[0])))?;

        let mut r = WireReader::new(header[2..10].to_vec(), byte_order);
        let short = |e| invalid(format!("setup header: {}", e));
        let protocol_major_version = r.read_u16().map_err(short)?;
        let protocol_minor_version = r.read_u16().map_err(short)?;
        let name_len = r.read_u16().map_err(short)? as usize;
        let data_len = r.read_u16().map_err(short)? as usize;

        let mut rest = vec![0u8; padded_len(name_len) + padded_len(data_len)];
        stream.read_exact(&mut rest)?;

        let authorization_protocol_name =
            String::from_utf8_lossy(&rest[..name_len]).into_owned();
        let data_start = padded_len(name_len);
        let authorization_protocol_data = rest[data_start..data_start + data_len].to_vec();

        Ok(SetupRequest {
            byte_order,
            protocol_major_version,
            protocol_minor_version,
            authorization_protocol_name,
            authorization_protocol_data,
        })
    }
}

/// Setup response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStatus {
    Failed = 0,
    Success = 1,
    Authenticate = 2,
}

/// Pixmap format information
#[derive(Debug, Clone)]
pub struct Format {
    pub depth: u8,
    pub bits_per_pixel: u8,
    pub scanline_pad: u8,
}

impl Format {
    fn encode(&self, w: &mut WireWriter) {
        w.write_u8(self.depth);
        w.write_u8(self.bits_per_pixel);
        w.write_u8(self.scanline_pad);
        w.write_pad(5);
    }
}

/// Visual type information
#[derive(Debug, Clone)]
pub struct VisualType {
    pub visual_id: VisualID,
    pub class: u8,
    pub bits_per_rgb_value: u8,
    pub colormap_entries: u16,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

impl VisualType {
    fn encode(&self, w: &mut WireWriter) {
        w.write_u32(self.visual_id.get());
        w.write_u8(self.class);
        w.write_u8(self.bits_per_rgb_value);
        w.write_u16(self.colormap_entries);
        w.write_u32(self.red_mask);
        w.write_u32(self.green_mask);
        w.write_u32(self.blue_mask);
        w.write_pad(4);
    }
}

/// Depth information
#[derive(Debug, Clone)]
pub struct Depth {
    pub depth: u8,
    pub visuals: Vec<VisualType>,
}

impl Depth {
    fn encode(&self, w: &mut WireWriter) {
        w.write_u8(self.depth);
        w.write_pad(1);
        w.write_u16(self.visuals.len() as u16);
        w.write_pad(4);
        for visual in &self.visuals {
            visual.encode(w);
        }
    }
}

/// Screen information
#[derive(Debug, Clone)]
pub struct Screen {
    pub root: Window,
    pub default_colormap: Colormap,
    pub white_pixel: u32,
    pub black_pixel: u32,
    pub current_input_masks: u32,
    pub width_in_pixels: u16,
    pub height_in_pixels: u16,
    pub width_in_millimeters: u16,
    pub height_in_millimeters: u16,
    pub min_installed_maps: u16,
    pub max_installed_maps: u16,
    pub root_visual: VisualID,
    pub backing_stores: u8,
    pub save_unders: bool,
    pub root_depth: u8,
    pub allowed_depths: Vec<Depth>,
}

impl Screen {
    fn encode(&self, w: &mut WireWriter) {
        w.write_u32(self.root.get());
        w.write_u32(self.default_colormap.get());
        w.write_u32(self.white_pixel);
        w.write_u32(self.black_pixel);
        w.write_u32(self.current_input_masks);
        w.write_u16(self.width_in_pixels);
        w.write_u16(self.height_in_pixels);
        w.write_u16(self.width_in_millimeters);
        w.write_u16(self.height_in_millimeters);
        w.write_u16(self.min_installed_maps);
        w.write_u16(self.max_installed_maps);
        w.write_u32(self.root_visual.get());
        w.write_u8(self.backing_stores);
        w.write_bool(self.save_unders);
        w.write_u8(self.root_depth);
        w.write_u8(self.allowed_depths.len() as u8);
        for depth in &self.allowed_depths {
            depth.encode(w);
        }
    }
}

/// Setup reply (success case)
#[derive(Debug, Clone)]
pub struct SetupSuccess {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub release_number: u32,
    pub resource_id_base: u32,
    pub resource_id_mask: u32,
    pub motion_buffer_size: u32,
    pub maximum_request_length: u16,
    pub image_byte_order: ByteOrder,
    pub bitmap_format_bit_order: ByteOrder,
    pub bitmap_format_scanline_unit: u8,
    pub bitmap_format_scanline_pad: u8,
    pub min_keycode: u8,
    pub max_keycode: u8,
    pub vendor: String,
    pub pixmap_formats: Vec<Format>,
    pub roots: Vec<Screen>,
}

impl SetupSuccess {
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let mut w = WireWriter::new(byte_order);
        w.write_u8(SetupStatus::Success as u8);
        w.write_pad(1);
        w.write_u16(self.protocol_major_version);
        w.write_u16(self.protocol_minor_version);
        let length_pos = w.len();
        w.write_u16(0);

        w.write_u32(self.release_number);
        w.write_u32(self.resource_id_base);
        w.write_u32(self.resource_id_mask);
        w.write_u32(self.motion_buffer_size);
        w.write_u16(self.vendor.len() as u16);
        w.write_u16(self.maximum_request_length);
        w.write_u8(self.roots.len() as u8);
        w.write_u8(self.pixmap_formats.len() as u8);
        w.write_u8(self.image_byte_order as u8);
        w.write_u8(self.bitmap_format_bit_order as u8);
        w.write_u8(self.bitmap_format_scanline_unit);
        w.write_u8(self.bitmap_format_scanline_pad);
        w.write_u8(self.min_keycode);
        w.write_u8(self.max_keycode);
        w.write_pad(4);
        w.write_padded_string(&self.vendor);

        for format in &self.pixmap_formats {
            format.encode(&mut w);
        }
        for screen in &self.roots {
            screen.encode(&mut w);
        }

        // Length counts 4-byte units after the first 8 bytes
        let words = ((w.len() - 8) / 4) as u16;
        w.patch_u16(length_pos, words);
        w.into_bytes()
    }
}

/// Setup failed response
#[derive(Debug, Clone)]
pub struct SetupFailed {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub reason: String,
}

impl SetupFailed {
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let mut w = WireWriter::new(byte_order);
        w.write_u8(SetupStatus::Failed as u8);
        w.write_u8(self.reason.len() as u8);
        w.write_u16(self.protocol_major_version);
        w.write_u16(self.protocol_minor_version);
        w.write_u16((padded_len(self.reason.len()) / 4) as u16);
        w.write_padded_string(&self.reason);
        w.into_bytes()
    }
}

/// Setup response
#[derive(Debug, Clone)]
pub enum SetupResponse {
    Success(SetupSuccess),
    Failed(SetupFailed),
}

impl SetupResponse {
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        match self {
            SetupResponse::Success(success) => success.encode(byte_order),
            SetupResponse::Failed(failed) => failed.encode(byte_order),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_with_auth() {
        let mut bytes = vec![b'B', 0, 0, 11, 0, 0, 0, 18, 0, 16, 0, 0];
        bytes.extend_from_slice(b"MIT-MAGIC-COOKIE-1\0\0");
        bytes.extend_from_slice(&[7u8; 16]);
        let req = SetupRequest::parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(req.byte_order, ByteOrder::MSBFirst);
        assert_eq!(req.protocol_major_version, 11);
        assert_eq!(req.authorization_protocol_name, "MIT-MAGIC-COOKIE-1");
        assert_eq!(req.authorization_protocol_data, vec![7u8; 16]);
    }

    #[test]
    fn test_bad_marker_rejected() {
        let bytes = vec![b'X', 0, 11, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = SetupRequest::parse(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_failed_reply_layout() {
        let failed = SetupFailed {
            protocol_major_version: 11,
            protocol_minor_version: 0,
            reason: "Unknown auth FOO".to_string(),
        };
        let bytes = failed.encode(ByteOrder::LSBFirst);
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[1], 16);
        assert_eq!(&bytes[2..4], &[11, 0]);
        assert_eq!(&bytes[6..8], &[4, 0]);
        assert_eq!(bytes.len(), 8 + 16);
        assert_eq!(&bytes[8..], b"Unknown auth FOO");
    }
}
