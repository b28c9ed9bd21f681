//! X11 protocol error codes and error handling

use super::codec::WireWriter;
use super::types::ByteOrder;
use std::fmt;

/// X11 error codes as defined in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Request = 1,
    Value = 2,
    Window = 3,
    Pixmap = 4,
    Atom = 5,
    Cursor = 6,
    Font = 7,
    Match = 8,
    Drawable = 9,
    Access = 10,
    Alloc = 11,
    Colormap = 12,
    GContext = 13,
    IDChoice = 14,
    Name = 15,
    Length = 16,
    Implementation = 17,
}

impl ErrorCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(ErrorCode::Request),
            2 => Some(ErrorCode::Value),
            3 => Some(ErrorCode::Window),
            4 => Some(ErrorCode::Pixmap),
            5 => Some(ErrorCode::Atom),
            6 => Some(ErrorCode::Cursor),
            7 => Some(ErrorCode::Font),
            8 => Some(ErrorCode::Match),
            9 => Some(ErrorCode::Drawable),
            10 => Some(ErrorCode::Access),
            11 => Some(ErrorCode::Alloc),
            12 => Some(ErrorCode::Colormap),
            13 => Some(ErrorCode::GContext),
            14 => Some(ErrorCode::IDChoice),
            15 => Some(ErrorCode::Name),
            16 => Some(ErrorCode::Length),
            17 => Some(ErrorCode::Implementation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Request => "Request: bad request code",
            ErrorCode::Value => "Value: integer parameter out of range",
            ErrorCode::Window => "Window: invalid Window parameter",
            ErrorCode::Pixmap => "Pixmap: invalid Pixmap parameter",
            ErrorCode::Atom => "Atom: invalid Atom parameter",
            ErrorCode::Cursor => "Cursor: invalid Cursor parameter",
            ErrorCode::Font => "Font: invalid Font parameter",
            ErrorCode::Match => "Match: parameter mismatch",
            ErrorCode::Drawable => "Drawable: invalid Drawable parameter",
            ErrorCode::Access => "Access: attempt to access private resource",
            ErrorCode::Alloc => "Alloc: insufficient resources",
            ErrorCode::Colormap => "Colormap: invalid Colormap parameter",
            ErrorCode::GContext => "GContext: invalid GC parameter",
            ErrorCode::IDChoice => "IDChoice: invalid resource ID for this connection",
            ErrorCode::Name => "Name: font or color name doesn't exist",
            ErrorCode::Length => "Length: request length incorrect",
            ErrorCode::Implementation => "Implementation: server implementation error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// X11 error packet
///
/// Handlers build errors with only the code and the bad value; the dispatcher
/// fills in sequence and opcodes with [`X11Error::stamp`] before sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11Error {
    pub code: ErrorCode,
    pub sequence: u16,
    pub bad_value: u32,
    pub minor_opcode: u16,
    pub major_opcode: u8,
    /// The connection cannot continue after this error (payload underrun)
    pub fatal: bool,
}

impl X11Error {
    pub fn new(code: ErrorCode, bad_value: u32) -> Self {
        X11Error {
            code,
            sequence: 0,
            bad_value,
            minor_opcode: 0,
            major_opcode: 0,
            fatal: false,
        }
    }

    /// Attach the failing request's sequence number and opcodes
    pub fn stamp(mut self, sequence: u16, major_opcode: u8, minor_opcode: u16) -> Self {
        self.sequence = sequence;
        self.major_opcode = major_opcode;
        self.minor_opcode = minor_opcode;
        self
    }

    /// Encode error to wire format (32 bytes)
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let mut w = WireWriter::new(byte_order);
        w.write_u8(0); // Error reply type
        w.write_u8(self.code as u8);
        w.write_u16(self.sequence);
        w.write_u32(self.bad_value);
        w.write_u16(self.minor_opcode);
        w.write_u8(self.major_opcode);
        w.write_pad(21);
        w.into_bytes()
    }
}

impl fmt::Display for X11Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X11 Error: {} (sequence: {}, value: 0x{:08x}, major: {}, minor: {})",
            self.code, self.sequence, self.bad_value, self.major_opcode, self.minor_opcode
        )
    }
}

impl std::error::Error for X11Error {}

/// Result type for X11 operations
pub type X11Result<T> = Result<T, X11Error>;

/// Helper functions to create common errors
impl X11Error {
    pub fn bad_request(opcode: u8) -> Self {
        X11Error::new(ErrorCode::Request, opcode as u32)
    }

    pub fn bad_value(value: u32) -> Self {
        X11Error::new(ErrorCode::Value, value)
    }

    pub fn bad_window(window: u32) -> Self {
        X11Error::new(ErrorCode::Window, window)
    }

    pub fn bad_pixmap(pixmap: u32) -> Self {
        X11Error::new(ErrorCode::Pixmap, pixmap)
    }

    pub fn bad_atom(atom: u32) -> Self {
        X11Error::new(ErrorCode::Atom, atom)
    }

    pub fn bad_font(font: u32) -> Self {
        X11Error::new(ErrorCode::Font, font)
    }

    pub fn bad_drawable(drawable: u32) -> Self {
        X11Error::new(ErrorCode::Drawable, drawable)
    }

    pub fn bad_gc(gc: u32) -> Self {
        X11Error::new(ErrorCode::GContext, gc)
    }

    pub fn bad_colormap(colormap: u32) -> Self {
        X11Error::new(ErrorCode::Colormap, colormap)
    }

    pub fn bad_match(value: u32) -> Self {
        X11Error::new(ErrorCode::Match, value)
    }

    pub fn bad_access(value: u32) -> Self {
        X11Error::new(ErrorCode::Access, value)
    }

    pub fn bad_alloc() -> Self {
        X11Error::new(ErrorCode::Alloc, 0)
    }

    pub fn bad_id_choice(id: u32) -> Self {
        X11Error::new(ErrorCode::IDChoice, id)
    }

    pub fn bad_name() -> Self {
        X11Error::new(ErrorCode::Name, 0)
    }

    pub fn bad_length(value: u32) -> Self {
        X11Error::new(ErrorCode::Length, value)
    }

    pub fn implementation_error() -> Self {
        X11Error::new(ErrorCode::Implementation, 0)
    }

    /// A handler read past the end of its framed payload
    pub fn underrun(wanted: usize, available: usize) -> Self {
        let mut err = X11Error::new(ErrorCode::Length, (wanted - available) as u32);
        err.fatal = true;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_layout_lsb() {
        let err = X11Error::bad_window(0x00200001).stamp(0x1234, 8, 0);
        let bytes = err.encode(ByteOrder::LSBFirst);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[1], ErrorCode::Window as u8);
        assert_eq!(&bytes[2..4], &[0x34, 0x12]);
        assert_eq!(&bytes[4..8], &[0x01, 0x00, 0x20, 0x00]);
        assert_eq!(&bytes[8..10], &[0, 0]);
        assert_eq!(bytes[10], 8);
        assert!(bytes[11..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_error_layout_msb_with_minor() {
        let err = X11Error::bad_value(7).stamp(2, 130, 5);
        let bytes = err.encode(ByteOrder::MSBFirst);
        assert_eq!(&bytes[2..4], &[0, 2]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 7]);
        assert_eq!(&bytes[8..10], &[0, 5]);
        assert_eq!(bytes[10], 130);
    }

    #[test]
    fn test_from_u8_covers_all_codes() {
        for code in 1..=17u8 {
            assert_eq!(ErrorCode::from_u8(code).map(|c| c as u8), Some(code));
        }
        assert!(ErrorCode::from_u8(0).is_none());
        assert!(ErrorCode::from_u8(18).is_none());
    }
}
