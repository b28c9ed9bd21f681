//! Graphics contexts
//!
//! A GC carries 23 independently settable attributes. CreateGC and ChangeGC
//! send a bitmask-selected subset; [`GC_ATTRIBUTES`] lists the decoder for
//! each bit in wire order.

use crate::protocol::*;
use std::sync::Mutex;

macro_rules! wire_enum {
    ($(#[$doc:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn from_u32(value: u32) -> X11Result<Self> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => Err(X11Error::bad_value(value)),
                }
            }
        }
    };
}

wire_enum!(
    /// Raster operation
    GCFunction {
        Clear = 0,
        And = 1,
        AndReverse = 2,
        Copy = 3,
        AndInverted = 4,
        NoOp = 5,
        Xor = 6,
        Or = 7,
        Nor = 8,
        Equiv = 9,
        Invert = 10,
        OrReverse = 11,
        CopyInverted = 12,
        OrInverted = 13,
        Nand = 14,
        Set = 15,
    }
);

wire_enum!(LineStyle { Solid = 0, OnOffDash = 1, DoubleDash = 2 });
wire_enum!(CapStyle { NotLast = 0, Butt = 1, Round = 2, Projecting = 3 });
wire_enum!(JoinStyle { Miter = 0, Round = 1, Bevel = 2 });
wire_enum!(FillStyle { Solid = 0, Tiled = 1, Stippled = 2, OpaqueStippled = 3 });
wire_enum!(FillRule { EvenOdd = 0, Winding = 1 });
wire_enum!(SubwindowMode { ClipByChildren = 0, IncludeInferiors = 1 });
wire_enum!(ArcMode { Chord = 0, PieSlice = 1 });

/// Every defined GC attribute bit
pub const GC_ALL: u32 = (1 << 23) - 1;

pub const GC_TILE: u32 = 1 << 10;
pub const GC_STIPPLE: u32 = 1 << 11;
pub const GC_FONT: u32 = 1 << 14;
pub const GC_CLIP_MASK: u32 = 1 << 19;

/// Attribute values of one GC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcValues {
    pub function: GCFunction,
    pub plane_mask: u32,
    pub foreground: u32,
    pub background: u32,
    pub line_width: u16,
    pub line_style: LineStyle,
    pub cap_style: CapStyle,
    pub join_style: JoinStyle,
    pub fill_style: FillStyle,
    pub fill_rule: FillRule,
    pub tile: Pixmap,
    pub stipple: Pixmap,
    pub tile_stipple_x_origin: i16,
    pub tile_stipple_y_origin: i16,
    pub font: Font,
    pub subwindow_mode: SubwindowMode,
    pub graphics_exposures: bool,
    pub clip_x_origin: i16,
    pub clip_y_origin: i16,
    pub clip_mask: Pixmap,
    pub dash_offset: u16,
    pub dashes: u8,
    pub arc_mode: ArcMode,
    /// Set by SetClipRectangles, relative to the clip origin. Setting a clip
    /// mask clears it.
    pub clip_rectangles: Option<Vec<Rectangle>>,
}

impl Default for GcValues {
    fn default() -> Self {
        GcValues {
            function: GCFunction::Copy,
            plane_mask: u32::MAX,
            foreground: 0,
            background: 1,
            line_width: 0,
            line_style: LineStyle::Solid,
            cap_style: CapStyle::Butt,
            join_style: JoinStyle::Miter,
            fill_style: FillStyle::Solid,
            fill_rule: FillRule::EvenOdd,
            tile: Pixmap::NONE,
            stipple: Pixmap::NONE,
            tile_stipple_x_origin: 0,
            tile_stipple_y_origin: 0,
            font: Font::NONE,
            subwindow_mode: SubwindowMode::ClipByChildren,
            graphics_exposures: true,
            clip_x_origin: 0,
            clip_y_origin: 0,
            clip_mask: Pixmap::NONE,
            dash_offset: 0,
            dashes: 4,
            arc_mode: ArcMode::PieSlice,
            clip_rectangles: None,
        }
    }
}

type Setter = fn(&mut GcValues, u32) -> X11Result<()>;

fn set_bool(value: u32) -> X11Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(X11Error::bad_value(value)),
    }
}

/// Decoder per attribute bit, indexed by bit position
pub const GC_ATTRIBUTES: [(u32, Setter); 23] = [
    (1 << 0, |gc, v| {
        gc.function = GCFunction::from_u32(v)?;
        Ok(())
    }),
    (1 << 1, |gc, v| {
        gc.plane_mask = v;
        Ok(())
    }),
    (1 << 2, |gc, v| {
        gc.foreground = v;
        Ok(())
    }),
    (1 << 3, |gc, v| {
        gc.background = v;
        Ok(())
    }),
    (1 << 4, |gc, v| {
        gc.line_width = v as u16;
        Ok(())
    }),
    (1 << 5, |gc, v| {
        gc.line_style = LineStyle::from_u32(v)?;
        Ok(())
    }),
    (1 << 6, |gc, v| {
        gc.cap_style = CapStyle::from_u32(v)?;
        Ok(())
    }),
    (1 << 7, |gc, v| {
        gc.join_style = JoinStyle::from_u32(v)?;
        Ok(())
    }),
    (1 << 8, |gc, v| {
        gc.fill_style = FillStyle::from_u32(v)?;
        Ok(())
    }),
    (1 << 9, |gc, v| {
        gc.fill_rule = FillRule::from_u32(v)?;
        Ok(())
    }),
    (GC_TILE, |gc, v| {
        gc.tile = Pixmap::new(v);
        Ok(())
    }),
    (GC_STIPPLE, |gc, v| {
        gc.stipple = Pixmap::new(v);
        Ok(())
    }),
    (1 << 12, |gc, v| {
        gc.tile_stipple_x_origin = v as i16;
        Ok(())
    }),
    (1 << 13, |gc, v| {
        gc.tile_stipple_y_origin = v as i16;
        Ok(())
    }),
    (GC_FONT, |gc, v| {
        gc.font = Font::new(v);
        Ok(())
    }),
    (1 << 15, |gc, v| {
        gc.subwindow_mode = SubwindowMode::from_u32(v)?;
        Ok(())
    }),
    (1 << 16, |gc, v| {
        gc.graphics_exposures = set_bool(v)?;
        Ok(())
    }),
    (1 << 17, |gc, v| {
        gc.clip_x_origin = v as i16;
        Ok(())
    }),
    (1 << 18, |gc, v| {
        gc.clip_y_origin = v as i16;
        Ok(())
    }),
    (GC_CLIP_MASK, |gc, v| {
        gc.clip_mask = Pixmap::new(v);
        gc.clip_rectangles = None;
        Ok(())
    }),
    (1 << 20, |gc, v| {
        gc.dash_offset = v as u16;
        Ok(())
    }),
    (1 << 21, |gc, v| {
        if v == 0 || v > 0xFF {
            return Err(X11Error::bad_value(v));
        }
        gc.dashes = v as u8;
        Ok(())
    }),
    (1 << 22, |gc, v| {
        gc.arc_mode = ArcMode::from_u32(v)?;
        Ok(())
    }),
];

impl GcValues {
    /// Apply decoded (bit, value) pairs in ascending bit order.
    ///
    /// On error `self` may be partially updated; callers stage on a copy.
    pub fn apply(&mut self, values: &[(u32, u32)]) -> X11Result<()> {
        for &(bit, value) in values {
            let index = bit.trailing_zeros() as usize;
            let (expected, setter) = GC_ATTRIBUTES
                .get(index)
                .copied()
                .ok_or_else(|| X11Error::bad_value(bit))?;
            debug_assert_eq!(expected, bit);
            setter(self, value)?;
        }
        Ok(())
    }

    /// Copy the attributes selected by `mask` from `src`
    pub fn copy_from(&mut self, src: &GcValues, mask: u32) {
        let dst = self;
        macro_rules! copy_bits {
            ($($bit:expr => $field:ident),+ $(,)?) => {
                $(if mask & $bit != 0 { dst.$field = src.$field; })+
            };
        }
        copy_bits!(
            1 << 0 => function,
            1 << 1 => plane_mask,
            1 << 2 => foreground,
            1 << 3 => background,
            1 << 4 => line_width,
            1 << 5 => line_style,
            1 << 6 => cap_style,
            1 << 7 => join_style,
            1 << 8 => fill_style,
            1 << 9 => fill_rule,
            GC_TILE => tile,
            GC_STIPPLE => stipple,
            1 << 12 => tile_stipple_x_origin,
            1 << 13 => tile_stipple_y_origin,
            GC_FONT => font,
            1 << 15 => subwindow_mode,
            1 << 16 => graphics_exposures,
            1 << 17 => clip_x_origin,
            1 << 18 => clip_y_origin,
            GC_CLIP_MASK => clip_mask,
            1 << 20 => dash_offset,
            1 << 21 => dashes,
            1 << 22 => arc_mode,
        );
        if mask & GC_CLIP_MASK != 0 {
            dst.clip_rectangles = src.clip_rectangles.clone();
        }
    }

    /// Replace the clip with a rectangle list
    pub fn set_clip_rectangles(&mut self, x_origin: i16, y_origin: i16, rects: Vec<Rectangle>) {
        self.clip_x_origin = x_origin;
        self.clip_y_origin = y_origin;
        self.clip_mask = Pixmap::NONE;
        self.clip_rectangles = Some(rects);
    }

    /// Clip rectangles moved into drawable coordinates
    pub fn clip_in_drawable(&self) -> Option<Vec<Rectangle>> {
        self.clip_rectangles.as_ref().map(|rects| {
            rects
                .iter()
                .map(|r| {
                    Rectangle::new(
                        r.x.saturating_add(self.clip_x_origin),
                        r.y.saturating_add(self.clip_y_origin),
                        r.width,
                        r.height,
                    )
                })
                .collect()
        })
    }
}

/// Server-side graphics context
#[derive(Debug)]
pub struct GraphicsContext {
    /// Depth of the drawable it was created for; CopyGC requires a match
    pub depth: u8,
    pub values: Mutex<GcValues>,
}

impl GraphicsContext {
    pub fn new(depth: u8, values: GcValues) -> Self {
        GraphicsContext {
            depth,
            values: Mutex::new(values),
        }
    }
}
