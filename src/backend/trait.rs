//! Host collaborator traits
//!
//! The server core never rasterizes, measures glyphs or resolves color names
//! itself. It calls out to these traits, which a host display (or the null
//! implementations in `backend::null`) provides.

use crate::protocol::*;
use std::error::Error;
use std::sync::Arc;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// GC state a rasterizer needs for one drawing request. Enumerated GC
/// attributes keep their wire values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawState {
    /// Raster operation, 0 (Clear) to 15 (Set); 3 is Copy
    pub function: u8,
    pub plane_mask: u32,
    pub foreground: u32,
    pub background: u32,
    /// 0 requests thin lines
    pub line_width: u16,
    pub line_style: u8,
    pub cap_style: u8,
    pub join_style: u8,
    pub fill_style: u8,
    pub fill_rule: u8,
    pub font: Option<FontHandle>,
    /// Clip rectangles in drawable coordinates; `None` draws everywhere
    pub clip: Option<Vec<Rectangle>>,
}

impl DrawState {
    /// Copy with a solid pixel, no clipping
    pub fn solid(foreground: u32) -> Self {
        DrawState {
            function: 3,
            plane_mask: u32::MAX,
            foreground,
            background: 0,
            line_width: 0,
            line_style: 0,
            cap_style: 1,
            join_style: 0,
            fill_style: 0,
            fill_rule: 0,
            font: None,
            clip: None,
        }
    }

    /// Whether (x, y) survives the clip list
    pub fn clip_allows(&self, x: i32, y: i32) -> bool {
        match &self.clip {
            None => true,
            Some(rects) => rects.iter().any(|r| {
                x >= r.x as i32
                    && y >= r.y as i32
                    && x < r.x as i32 + r.width as i32
                    && y < r.y as i32 + r.height as i32
            }),
        }
    }

    /// Combine a source pixel with the destination under the raster
    /// operation and plane mask
    pub fn combine(&self, src: u32, dst: u32) -> u32 {
        let value = match self.function {
            0 => 0,
            1 => src & dst,
            2 => src & !dst,
            3 => src,
            4 => !src & dst,
            5 => dst,
            6 => src ^ dst,
            7 => src | dst,
            8 => !(src | dst),
            9 => !src ^ dst,
            10 => !dst,
            11 => src | !dst,
            12 => !src,
            13 => !src | dst,
            14 => !(src & dst),
            _ => u32::MAX,
        };
        (value & self.plane_mask) | (dst & !self.plane_mask)
    }
}

/// A run of text positioned at its baseline origin
#[derive(Debug, Clone, Copy)]
pub struct TextRun<'a> {
    pub origin: Point,
    /// 8-bit strings are widened; 16-bit strings are byte1 * 256 + byte2
    pub text: &'a [u16],
    /// Extents as measured by the font provider
    pub bounds: TextBounds,
}

/// Rasterizer for one drawable. Hosts implement this for their pixmap
/// surfaces and on-screen windows; the server only decodes requests and
/// hands over geometry in drawable coordinates.
pub trait DrawTarget {
    fn size(&self) -> (u16, u16);

    fn fill_rectangles(&mut self, state: &DrawState, rects: &[Rectangle]);

    /// Outline each rectangle
    fn draw_rectangles(&mut self, state: &DrawState, rects: &[Rectangle]);

    fn draw_points(&mut self, state: &DrawState, points: &[Point]);

    fn draw_segments(&mut self, state: &DrawState, segments: &[Segment]);

    /// Connected lines through `points`, in absolute coordinates
    fn draw_lines(&mut self, state: &DrawState, points: &[Point]);

    fn fill_polygon(&mut self, state: &DrawState, points: &[Point]);

    /// Draw glyphs in the foreground. `image` first fills the run's
    /// ascent-to-descent box with the background, as ImageText does.
    fn draw_text(&mut self, state: &DrawState, run: &TextRun<'_>, image: bool);

    /// Write `area.width * area.height` pixels, row-major
    fn put_pixels(&mut self, state: &DrawState, area: Rectangle, pixels: &[u32]);

    /// Read pixels row-major. Anything outside the target reads as 0.
    fn get_pixels(&self, area: Rectangle) -> Vec<u32>;
}

/// Off-screen pixel storage backing a pixmap
pub trait Surface: Send {
    /// Borrow the rasterizer. Must be paired with [`Surface::unlock`].
    fn lock(&mut self) -> &mut dyn DrawTarget;
    fn unlock(&mut self);
    fn size(&self) -> (u16, u16);
}

/// Opaque font handle issued by a [`FontProvider`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontHandle(pub usize);

/// Per-glyph metrics in the layout of an X11 CHARINFO
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharInfo {
    pub left_side_bearing: i16,
    pub right_side_bearing: i16,
    pub character_width: i16,
    pub ascent: i16,
    pub descent: i16,
    pub attributes: u16,
}

/// Whole-font metrics reported by QueryFont
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    pub min_bounds: CharInfo,
    pub max_bounds: CharInfo,
    pub min_char: u16,
    pub max_char: u16,
    pub default_char: u16,
    pub font_ascent: i16,
    pub font_descent: i16,
    /// 0 = left-to-right
    pub draw_direction: u8,
}

/// Extents of a measured string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextBounds {
    pub font_ascent: i16,
    pub font_descent: i16,
    pub overall_ascent: i16,
    pub overall_descent: i16,
    pub overall_width: i32,
    pub overall_left: i32,
    pub overall_right: i32,
}

/// Font name resolution and glyph metrics
pub trait FontProvider: Send + Sync {
    fn open(&self, name: &str) -> Option<FontHandle>;
    fn describe(&self, font: FontHandle) -> FontMetrics;
    fn metrics(&self, font: FontHandle, text: &[u16]) -> TextBounds;
    /// Font names matching an XLFD-style pattern (`*` and `?` wildcards)
    fn list(&self, pattern: &str, max_names: usize) -> Vec<String>;

    /// Directories or catalogues fonts are served from
    fn path(&self) -> Vec<String> {
        Vec::new()
    }
}

/// 16-bit-per-channel color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl Rgb {
    /// Pack into a 24-bit TrueColor pixel
    pub fn to_pixel(&self) -> u32 {
        ((self.red as u32 >> 8) << 16) | ((self.green as u32 >> 8) << 8) | (self.blue as u32 >> 8)
    }

    /// Unpack a TrueColor pixel, widening each channel to 16 bits
    pub fn from_pixel(pixel: u32) -> Self {
        let widen = |c: u32| ((c & 0xFF) as u16) * 0x101;
        Rgb {
            red: widen(pixel >> 16),
            green: widen(pixel >> 8),
            blue: widen(pixel),
        }
    }

    /// The color a TrueColor visual can actually show
    pub fn quantize(&self) -> Self {
        Rgb::from_pixel(self.to_pixel())
    }
}

/// Color-name database
pub trait ColorLookup: Send + Sync {
    fn by_name(&self, name: &str) -> Option<Rgb>;
}

/// The display mirroring the window tree.
///
/// These callbacks are the non-masked channel: the host sees every map,
/// geometry and content change regardless of client event selection.
pub trait HostDisplay: Send + Sync {
    /// A window became viewable. Returns true if a host surface was attached
    /// synchronously, which makes the window visible and exposes it.
    fn on_window_mapped(&self, window: Window) -> bool;

    fn on_window_unmapped(&self, _window: Window) {}

    fn on_content_changed(&self, window: Window, area: Rectangle);

    fn on_geometry_changed(&self, window: Window, geometry: Rectangle, border_width: u16);

    /// Run `draw` against the window's on-screen pixels. Returns false if the
    /// host keeps no pixels for the window, in which case the drawing is
    /// only reported through [`HostDisplay::on_content_changed`].
    fn draw_window(&self, _window: Window, _draw: &mut dyn FnMut(&mut dyn DrawTarget)) -> bool {
        false
    }

    /// Allocate pixel storage for a pixmap
    fn create_surface(&self, width: u16, height: u16, depth: u8) -> BackendResult<Box<dyn Surface>>;
}

/// Bundle of host collaborators handed to the server at construction
#[derive(Clone)]
pub struct Host {
    pub display: Arc<dyn HostDisplay>,
    pub fonts: Arc<dyn FontProvider>,
    pub colors: Arc<dyn ColorLookup>,
}

impl Host {
    /// In-memory collaborators with no real display
    pub fn headless() -> Self {
        Host {
            display: Arc::new(super::null::NullDisplay::new()),
            fonts: Arc::new(super::null::FixedFont),
            colors: Arc::new(super::null::NamedColors),
        }
    }
}
