//! X11 protocol events
//!
//! Events are sent from the server to clients to notify them of state changes.
//! Every event is a fixed 32-byte frame; the sequence number of the receiving
//! connection is stamped in at encode time.

use super::codec::WireWriter;
use super::types::*;

/// Event type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    FocusIn = 9,
    FocusOut = 10,
    Expose = 12,
    NoExpose = 14,
    CreateNotify = 16,
    DestroyNotify = 17,
    UnmapNotify = 18,
    MapNotify = 19,
    ReparentNotify = 21,
    ConfigureNotify = 22,
    PropertyNotify = 28,
    SelectionClear = 29,
    SelectionRequest = 30,
    SelectionNotify = 31,
}

/// PropertyNotify state
pub const PROPERTY_NEW_VALUE: u8 = 0;
pub const PROPERTY_DELETED: u8 = 1;

/// Focus event detail and mode values
pub const NOTIFY_NONLINEAR: u8 = 3;
pub const NOTIFY_NORMAL: u8 = 0;

/// An event raised by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FocusIn {
        detail: u8,
        event: Window,
        mode: u8,
    },
    FocusOut {
        detail: u8,
        event: Window,
        mode: u8,
    },
    Expose {
        window: Window,
        area: Rectangle,
        count: u16,
    },
    /// A CopyArea or CopyPlane exposed nothing
    NoExpose {
        drawable: XID,
        major_opcode: u8,
        minor_opcode: u16,
    },
    CreateNotify {
        parent: Window,
        window: Window,
        geometry: Rectangle,
        border_width: u16,
        override_redirect: bool,
    },
    DestroyNotify {
        event: Window,
        window: Window,
    },
    UnmapNotify {
        event: Window,
        window: Window,
        from_configure: bool,
    },
    MapNotify {
        event: Window,
        window: Window,
        override_redirect: bool,
    },
    ReparentNotify {
        event: Window,
        window: Window,
        parent: Window,
        x: i16,
        y: i16,
        override_redirect: bool,
    },
    ConfigureNotify {
        event: Window,
        window: Window,
        above_sibling: Window,
        geometry: Rectangle,
        border_width: u16,
        override_redirect: bool,
    },
    PropertyNotify {
        window: Window,
        atom: Atom,
        time: Timestamp,
        state: u8,
    },
    SelectionClear {
        time: Timestamp,
        owner: Window,
        selection: Atom,
    },
    SelectionRequest {
        time: Timestamp,
        owner: Window,
        requestor: Window,
        selection: Atom,
        target: Atom,
        property: Atom,
    },
    SelectionNotify {
        time: Timestamp,
        requestor: Window,
        selection: Atom,
        target: Atom,
        property: Atom,
    },
}

impl Event {
    /// Get the event type code
    pub fn event_type(&self) -> EventType {
        match self {
            Event::FocusIn { .. } => EventType::FocusIn,
            Event::FocusOut { .. } => EventType::FocusOut,
            Event::Expose { .. } => EventType::Expose,
            Event::NoExpose { .. } => EventType::NoExpose,
            Event::CreateNotify { .. } => EventType::CreateNotify,
            Event::DestroyNotify { .. } => EventType::DestroyNotify,
            Event::UnmapNotify { .. } => EventType::UnmapNotify,
            Event::MapNotify { .. } => EventType::MapNotify,
            Event::ReparentNotify { .. } => EventType::ReparentNotify,
            Event::ConfigureNotify { .. } => EventType::ConfigureNotify,
            Event::PropertyNotify { .. } => EventType::PropertyNotify,
            Event::SelectionClear { .. } => EventType::SelectionClear,
            Event::SelectionRequest { .. } => EventType::SelectionRequest,
            Event::SelectionNotify { .. } => EventType::SelectionNotify,
        }
    }

    /// Encode event to wire format (32 bytes)
    pub fn encode(&self, sequence: u16, byte_order: ByteOrder) -> Vec<u8> {
        let mut w = WireWriter::new(byte_order);
        w.write_u8(self.event_type() as u8);

        match self {
            Event::FocusIn {
                detail,
                event,
                mode,
            }
            | Event::FocusOut {
                detail,
                event,
                mode,
            } => {
                w.write_u8(*detail);
                w.write_u16(sequence);
                w.write_u32(event.get());
                w.write_u8(*mode);
            }
            Event::Expose {
                window,
                area,
                count,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(window.get());
                w.write_u16(area.x as u16);
                w.write_u16(area.y as u16);
                w.write_u16(area.width);
                w.write_u16(area.height);
                w.write_u16(*count);
            }
            Event::NoExpose {
                drawable,
                major_opcode,
                minor_opcode,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(drawable.get());
                w.write_u16(*minor_opcode);
                w.write_u8(*major_opcode);
            }
            Event::CreateNotify {
                parent,
                window,
                geometry,
                border_width,
                override_redirect,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(parent.get());
                w.write_u32(window.get());
                write_geometry(&mut w, geometry, *border_width);
                w.write_bool(*override_redirect);
            }
            Event::DestroyNotify { event, window } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(event.get());
                w.write_u32(window.get());
            }
            Event::UnmapNotify {
                event,
                window,
                from_configure,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(event.get());
                w.write_u32(window.get());
                w.write_bool(*from_configure);
            }
            Event::MapNotify {
                event,
                window,
                override_redirect,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(event.get());
                w.write_u32(window.get());
                w.write_bool(*override_redirect);
            }
            Event::ReparentNotify {
                event,
                window,
                parent,
                x,
                y,
                override_redirect,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(event.get());
                w.write_u32(window.get());
                w.write_u32(parent.get());
                w.write_i16(*x);
                w.write_i16(*y);
                w.write_bool(*override_redirect);
            }
            Event::ConfigureNotify {
                event,
                window,
                above_sibling,
                geometry,
                border_width,
                override_redirect,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(event.get());
                w.write_u32(window.get());
                w.write_u32(above_sibling.get());
                write_geometry(&mut w, geometry, *border_width);
                w.write_bool(*override_redirect);
            }
            Event::PropertyNotify {
                window,
                atom,
                time,
                state,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(window.get());
                w.write_u32(atom.get());
                w.write_u32(time.get());
                w.write_u8(*state);
            }
            Event::SelectionClear {
                time,
                owner,
                selection,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(time.get());
                w.write_u32(owner.get());
                w.write_u32(selection.get());
            }
            Event::SelectionRequest {
                time,
                owner,
                requestor,
                selection,
                target,
                property,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(time.get());
                w.write_u32(owner.get());
                w.write_u32(requestor.get());
                w.write_u32(selection.get());
                w.write_u32(target.get());
                w.write_u32(property.get());
            }
            Event::SelectionNotify {
                time,
                requestor,
                selection,
                target,
                property,
            } => {
                w.write_u8(0);
                w.write_u16(sequence);
                w.write_u32(time.get());
                w.write_u32(requestor.get());
                w.write_u32(selection.get());
                w.write_u32(target.get());
                w.write_u32(property.get());
            }
        }

        let used = w.len();
        w.write_pad(32 - used);
        w.into_bytes()
    }
}

fn write_geometry(w: &mut WireWriter, geometry: &Rectangle, border_width: u16) {
    w.write_i16(geometry.x);
    w.write_i16(geometry.y);
    w.write_u16(geometry.width);
    w.write_u16(geometry.height);
    w.write_u16(border_width);
}
