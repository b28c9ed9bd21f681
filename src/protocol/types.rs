//! Core X11 protocol types
//!
//! These types represent the fundamental data types used in the X11 protocol.
//! They are kept minimal and close to the wire protocol for efficiency.

use std::fmt;

/// X11 resource ID - used for windows, pixmaps, graphics contexts, etc.
/// Ids are chosen by clients; the server only checks collisions.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XID(pub u32);

impl XID {
    pub const NONE: XID = XID(0);

    pub fn new(id: u32) -> Self {
        XID(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for XID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

macro_rules! define_resource_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub XID);

        impl $name {
            pub const NONE: $name = $name(XID::NONE);

            pub fn new(id: u32) -> Self {
                $name(XID::new(id))
            }

            pub fn id(&self) -> XID {
                self.0
            }

            pub fn get(&self) -> u32 {
                self.0 .0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_resource_id!(
    /// Window ID
    Window
);
define_resource_id!(
    /// Pixmap ID
    Pixmap
);
define_resource_id!(
    /// Graphics Context ID
    GContext
);
define_resource_id!(
    /// Colormap ID
    Colormap
);
define_resource_id!(
    /// Font ID
    Font
);

/// Atom - interned string identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl Atom {
    pub const NONE: Atom = Atom(0);
    pub const PRIMARY: Atom = Atom(1);
    pub const SECONDARY: Atom = Atom(2);
    pub const ATOM: Atom = Atom(4);
    pub const CARDINAL: Atom = Atom(6);
    pub const INTEGER: Atom = Atom(19);
    pub const STRING: Atom = Atom(31);
    pub const WINDOW: Atom = Atom(33);
    pub const WM_NAME: Atom = Atom(39);
    pub const WM_CLASS: Atom = Atom(67);
    pub const WM_TRANSIENT_FOR: Atom = Atom(68);

    /// First user-defined atom ID
    pub const FIRST_USER_ATOM: u32 = 69;

    pub fn new(id: u32) -> Self {
        Atom(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Visual ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualID(pub u32);

impl VisualID {
    pub fn new(id: u32) -> Self {
        VisualID(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Timestamp (milliseconds since server start)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub const CURRENT_TIME: Timestamp = Timestamp(0);

    pub fn new(ms: u32) -> Self {
        Timestamp(ms)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rectangle {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Rectangle {
    pub fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Rectangle {
            x,
            y,
            width,
            height,
        }
    }

    /// Grow by `n` pixels on every side (inner bounds to outer bounds)
    pub fn expand(&self, n: u16) -> Rectangle {
        Rectangle {
            x: self.x.saturating_sub(n as i16),
            y: self.y.saturating_sub(n as i16),
            width: self.width.saturating_add(n.saturating_mul(2)),
            height: self.height.saturating_add(n.saturating_mul(2)),
        }
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        let (ax2, ay2) = (self.x as i32 + self.width as i32, self.y as i32 + self.height as i32);
        let (bx2, by2) = (other.x as i32 + other.width as i32, other.y as i32 + other.height as i32);
        (self.x as i32) < bx2 && (other.x as i32) < ax2 && (self.y as i32) < by2 && (other.y as i32) < ay2
    }
}

/// Point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub fn new(x: i16, y: i16) -> Self {
        Point { x, y }
    }
}

/// Line segment from (x1, y1) to (x2, y2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Segment {
    pub x1: i16,
    pub y1: i16,
    pub x2: i16,
    pub y2: i16,
}

/// Window class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    CopyFromParent = 0,
    InputOutput = 1,
    InputOnly = 2,
}

impl WindowClass {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(WindowClass::CopyFromParent),
            1 => Some(WindowClass::InputOutput),
            2 => Some(WindowClass::InputOnly),
            _ => None,
        }
    }
}

/// Map state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    Unmapped = 0,
    Unviewable = 1,
    Viewable = 2,
}

/// Stack mode for ConfigureWindow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Above = 0,
    Below = 1,
    TopIf = 2,
    BottomIf = 3,
    Opposite = 4,
}

impl StackMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(StackMode::Above),
            1 => Some(StackMode::Below),
            2 => Some(StackMode::TopIf),
            3 => Some(StackMode::BottomIf),
            4 => Some(StackMode::Opposite),
            _ => None,
        }
    }
}

/// Event masks
pub mod event_mask {
    pub const NO_EVENT: u32 = 0;
    pub const KEY_PRESS: u32 = 1 << 0;
    pub const KEY_RELEASE: u32 = 1 << 1;
    pub const BUTTON_PRESS: u32 = 1 << 2;
    pub const BUTTON_RELEASE: u32 = 1 << 3;
    pub const ENTER_WINDOW: u32 = 1 << 4;
    pub const LEAVE_WINDOW: u32 = 1 << 5;
    pub const POINTER_MOTION: u32 = 1 << 6;
    pub const POINTER_MOTION_HINT: u32 = 1 << 7;
    pub const BUTTON1_MOTION: u32 = 1 << 8;
    pub const BUTTON2_MOTION: u32 = 1 << 9;
    pub const BUTTON3_MOTION: u32 = 1 << 10;
    pub const BUTTON4_MOTION: u32 = 1 << 11;
    pub const BUTTON5_MOTION: u32 = 1 << 12;
    pub const BUTTON_MOTION: u32 = 1 << 13;
    pub const KEYMAP_STATE: u32 = 1 << 14;
    pub const EXPOSURE: u32 = 1 << 15;
    pub const VISIBILITY_CHANGE: u32 = 1 << 16;
    pub const STRUCTURE_NOTIFY: u32 = 1 << 17;
    pub const RESIZE_REDIRECT: u32 = 1 << 18;
    pub const SUBSTRUCTURE_NOTIFY: u32 = 1 << 19;
    pub const SUBSTRUCTURE_REDIRECT: u32 = 1 << 20;
    pub const FOCUS_CHANGE: u32 = 1 << 21;
    pub const PROPERTY_CHANGE: u32 = 1 << 22;
    pub const COLORMAP_CHANGE: u32 = 1 << 23;
    pub const OWNER_GRAB_BUTTON: u32 = 1 << 24;

    /// Every defined bit; anything else in a SET_OF_EVENT is a Value error
    pub const ALL: u32 = (1 << 25) - 1;

    /// Bits that at most one client may select on a given window
    pub const EXCLUSIVE: u32 = SUBSTRUCTURE_REDIRECT | RESIZE_REDIRECT | BUTTON_PRESS;
}

/// Byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LSBFirst = 0,
    MSBFirst = 1,
}

impl ByteOrder {
    /// Decode the order marker that opens a connection ('B' or 'l')
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'B' => Some(ByteOrder::MSBFirst),
            b'l' => Some(ByteOrder::LSBFirst),
            _ => None,
        }
    }

    pub fn marker(&self) -> u8 {
        match self {
            ByteOrder::MSBFirst => b'B',
            ByteOrder::LSBFirst => b'l',
        }
    }
}
