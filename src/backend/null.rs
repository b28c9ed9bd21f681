//! Null host - minimal collaborators for headless operation and tests
//!
//! Nothing is shown anywhere. Surfaces are plain memory, there is one fixed
//! 6x13 font, and colors come from a small built-in name table.

use super::*;
use crate::protocol::*;

/// Heap-backed pixmap storage with a simple software rasterizer.
///
/// Lines are Bresenham, stamped with a square brush when wider than one
/// pixel. Glyphs have no outlines here: each non-blank character cell is
/// drawn as a solid block.
pub struct MemorySurface {
    pixels: Vec<u32>,
    width: u16,
    height: u16,
    locked: bool,
}

impl MemorySurface {
    pub fn new(width: u16, height: u16) -> Self {
        MemorySurface {
            pixels: vec![0; width as usize * height as usize],
            width,
            height,
            locked: false,
        }
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn plot(&mut self, state: &DrawState, x: i32, y: i32, pixel: u32) {
        if !state.clip_allows(x, y) {
            return;
        }
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = state.combine(pixel, self.pixels[i]);
        }
    }

    fn fill_area(&mut self, state: &DrawState, x: i32, y: i32, w: i32, h: i32, pixel: u32) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w).min(self.width as i32);
        let y1 = (y + h).min(self.height as i32);
        for row in y0..y1 {
            for col in x0..x1 {
                self.plot(state, col, row, pixel);
            }
        }
    }

    fn brush(&mut self, state: &DrawState, x: i32, y: i32) {
        let width = state.line_width as i32;
        if width <= 1 {
            self.plot(state, x, y, state.foreground);
        } else {
            let half = width / 2;
            self.fill_area(state, x - half, y - half, width, width, state.foreground);
        }
    }

    fn line(&mut self, state: &DrawState, from: Point, to: Point) {
        let (mut x, mut y) = (from.x as i32, from.y as i32);
        let (x1, y1) = (to.x as i32, to.y as i32);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.brush(state, x, y);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

impl DrawTarget for MemorySurface {
    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn fill_rectangles(&mut self, state: &DrawState, rects: &[Rectangle]) {
        for r in rects {
            let (x, y) = (r.x as i32, r.y as i32);
            self.fill_area(state, x, y, r.width as i32, r.height as i32, state.foreground);
        }
    }

    fn draw_rectangles(&mut self, state: &DrawState, rects: &[Rectangle]) {
        for r in rects {
            let right = r.x.saturating_add(r.width as i16);
            let bottom = r.y.saturating_add(r.height as i16);
            self.draw_lines(
                state,
                &[
                    Point::new(r.x, r.y),
                    Point::new(right, r.y),
                    Point::new(right, bottom),
                    Point::new(r.x, bottom),
                    Point::new(r.x, r.y),
                ],
            );
        }
    }

    fn draw_points(&mut self, state: &DrawState, points: &[Point]) {
        for p in points {
            self.plot(state, p.x as i32, p.y as i32, state.foreground);
        }
    }

    fn draw_segments(&mut self, state: &DrawState, segments: &[Segment]) {
        for s in segments {
            self.line(state, Point::new(s.x1, s.y1), Point::new(s.x2, s.y2));
        }
    }

    fn draw_lines(&mut self, state: &DrawState, points: &[Point]) {
        if let [only] = points {
            self.brush(state, only.x as i32, only.y as i32);
        }
        for pair in points.windows(2) {
            self.line(state, pair[0], pair[1]);
        }
    }

    fn fill_polygon(&mut self, state: &DrawState, points: &[Point]) {
        if points.len() < 3 {
            return;
        }
        let min_y = points.iter().map(|p| p.y as i32).min().unwrap_or(0).max(0);
        let max_y = points
            .iter()
            .map(|p| p.y as i32)
            .max()
            .unwrap_or(0)
            .min(self.height as i32);
        let winding_rule = state.fill_rule == 1;
        let mut crossings: Vec<(f64, i32)> = Vec::new();
        for row in min_y..max_y {
            let sample = row as f64 + 0.5;
            crossings.clear();
            for (i, a) in points.iter().enumerate() {
                let b = points[(i + 1) % points.len()];
                let (ay, by) = (a.y as f64, b.y as f64);
                if (ay <= sample) != (by <= sample) {
                    let t = (sample - ay) / (by - ay);
                    let x = a.x as f64 + t * (b.x as f64 - a.x as f64);
                    crossings.push((x, if by > ay { 1 } else { -1 }));
                }
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                let inside = if winding_rule { winding != 0 } else { winding % 2 != 0 };
                if inside {
                    let start = (pair[0].0 - 0.5).ceil() as i32;
                    let end = (pair[1].0 - 0.5).ceil() as i32;
                    self.fill_area(state, start, row, end - start, 1, state.foreground);
                }
            }
        }
    }

    fn draw_text(&mut self, state: &DrawState, run: &TextRun<'_>, image: bool) {
        let ascent = run.bounds.font_ascent as i32;
        let descent = run.bounds.font_descent as i32;
        let (x, y) = (run.origin.x as i32, run.origin.y as i32);
        let copy;
        let state = if image {
            copy = DrawState {
                function: 3,
                ..state.clone()
            };
            self.fill_area(
                &copy,
                x,
                y - ascent,
                run.bounds.overall_width,
                ascent + descent,
                copy.background,
            );
            &copy
        } else {
            state
        };
        if run.text.is_empty() {
            return;
        }
        let cell = run.bounds.overall_width / run.text.len() as i32;
        for (i, &ch) in run.text.iter().enumerate() {
            if ch != b' ' as u16 {
                let left = x + i as i32 * cell;
                self.fill_area(state, left + 1, y - ascent + 2, cell - 2, ascent - 2, state.foreground);
            }
        }
    }

    fn put_pixels(&mut self, state: &DrawState, area: Rectangle, pixels: &[u32]) {
        let width = area.width as usize;
        for (i, &pixel) in pixels.iter().enumerate().take(width * area.height as usize) {
            let x = area.x as i32 + (i % width) as i32;
            let y = area.y as i32 + (i / width) as i32;
            self.plot(state, x, y, pixel);
        }
    }

    fn get_pixels(&self, area: Rectangle) -> Vec<u32> {
        let mut out = Vec::with_capacity(area.width as usize * area.height as usize);
        for row in 0..area.height as i32 {
            for col in 0..area.width as i32 {
                let pixel = self
                    .index(area.x as i32 + col, area.y as i32 + row)
                    .map_or(0, |i| self.pixels[i]);
                out.push(pixel);
            }
        }
        out
    }
}

impl Surface for MemorySurface {
    fn lock(&mut self) -> &mut dyn DrawTarget {
        debug_assert!(!self.locked, "surface locked twice");
        self.locked = true;
        self
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }
}

/// Display with no windows of its own. Every map attaches immediately.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl NullDisplay {
    pub fn new() -> Self {
        NullDisplay
    }
}

impl HostDisplay for NullDisplay {
    fn on_window_mapped(&self, window: Window) -> bool {
        log::trace!("null display: map {}", window);
        true
    }

    fn on_content_changed(&self, _window: Window, _area: Rectangle) {}

    fn on_geometry_changed(&self, _window: Window, _geometry: Rectangle, _border_width: u16) {}

    fn create_surface(&self, width: u16, height: u16, _depth: u8) -> BackendResult<Box<dyn Surface>> {
        Ok(Box::new(MemorySurface::new(width, height)))
    }
}

const FIXED_WIDTH: i16 = 6;
const FIXED_ASCENT: i16 = 11;
const FIXED_DESCENT: i16 = 2;

const FONT_NAMES: &[&str] = &[
    "fixed",
    "cursor",
    "6x13",
    "-misc-fixed-medium-r-semicondensed--13-120-75-75-c-60-iso8859-1",
];

/// Single monospace font answering to a handful of common names
#[derive(Debug, Default)]
pub struct FixedFont;

impl FontProvider for FixedFont {
    fn open(&self, name: &str) -> Option<FontHandle> {
        let lower = name.to_ascii_lowercase();
        FONT_NAMES
            .iter()
            .any(|known| glob_match(&lower, known))
            .then_some(FontHandle(0))
    }

    fn describe(&self, _font: FontHandle) -> FontMetrics {
        let glyph = CharInfo {
            left_side_bearing: 0,
            right_side_bearing: FIXED_WIDTH,
            character_width: FIXED_WIDTH,
            ascent: FIXED_ASCENT,
            descent: FIXED_DESCENT,
            attributes: 0,
        };
        FontMetrics {
            min_bounds: glyph,
            max_bounds: glyph,
            min_char: 0x20,
            max_char: 0xFF,
            default_char: 0x20,
            font_ascent: FIXED_ASCENT,
            font_descent: FIXED_DESCENT,
            draw_direction: 0,
        }
    }

    fn metrics(&self, _font: FontHandle, text: &[u16]) -> TextBounds {
        let width = FIXED_WIDTH as i32 * text.len() as i32;
        let (ascent, descent) = if text.is_empty() {
            (0, 0)
        } else {
            (FIXED_ASCENT, FIXED_DESCENT)
        };
        TextBounds {
            font_ascent: FIXED_ASCENT,
            font_descent: FIXED_DESCENT,
            overall_ascent: ascent,
            overall_descent: descent,
            overall_width: width,
            overall_left: 0,
            overall_right: width,
        }
    }

    fn list(&self, pattern: &str, max_names: usize) -> Vec<String> {
        let pattern = pattern.to_ascii_lowercase();
        FONT_NAMES
            .iter()
            .filter(|name| glob_match(&pattern, name))
            .take(max_names)
            .map(|name| name.to_string())
            .collect()
    }

    fn path(&self) -> Vec<String> {
        vec!["built-ins".to_string()]
    }
}

/// Match `*` (any run) and `?` (any single char) against `name`
fn glob_match(pattern: &str, name: &str) -> bool {
    let p = pattern.as_bytes();
    let n = name.as_bytes();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ni < n.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == b'*')
}

/// Small subset of rgb.txt
#[derive(Debug, Default)]
pub struct NamedColors;

const COLOR_TABLE: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("red", (255, 0, 0)),
    ("green", (0, 255, 0)),
    ("blue", (0, 0, 255)),
    ("yellow", (255, 255, 0)),
    ("cyan", (0, 255, 255)),
    ("magenta", (255, 0, 255)),
    ("gray", (190, 190, 190)),
    ("grey", (190, 190, 190)),
    ("darkgray", (169, 169, 169)),
    ("lightgray", (211, 211, 211)),
    ("orange", (255, 165, 0)),
    ("navy", (0, 0, 128)),
    ("steelblue", (70, 130, 180)),
    ("forestgreen", (34, 139, 34)),
];

impl ColorLookup for NamedColors {
    fn by_name(&self, name: &str) -> Option<Rgb> {
        // Names are case-insensitive and ignore spaces ("Steel Blue")
        let key: String = name
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        COLOR_TABLE
            .iter()
            .find(|(color, _)| *color == key)
            .map(|(_, (r, g, b))| Rgb {
                red: *r as u16 * 0x101,
                green: *g as u16 * 0x101,
                blue: *b as u16 * 0x101,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", "fixed"));
        assert!(glob_match("-misc-fixed-*", FONT_NAMES[3]));
        assert!(glob_match("6x1?", "6x13"));
        assert!(!glob_match("6x1?", "6x130"));
        assert!(!glob_match("helvetica", "fixed"));
    }

    #[test]
    fn test_fixed_font_metrics() {
        let font = FixedFont.open("FIXED").unwrap();
        let bounds = FixedFont.metrics(font, &[b'a' as u16; 5]);
        assert_eq!(bounds.overall_width, 30);
        assert_eq!(bounds.overall_ascent, FIXED_ASCENT);
        assert!(FixedFont.open("nonexistent").is_none());
        assert_eq!(FixedFont.list("*", 2).len(), 2);
    }

    #[test]
    fn test_named_colors() {
        let rgb = NamedColors.by_name("Steel Blue").unwrap();
        assert_eq!(rgb.to_pixel(), 0x4682B4);
        assert!(NamedColors.by_name("no-such-color").is_none());
    }

    #[test]
    fn test_memory_surface_lock() {
        let mut surface = MemorySurface::new(3, 2);
        {
            let target = surface.lock();
            target.fill_rectangles(&DrawState::solid(0xABCDEF), &[Rectangle::new(0, 0, 3, 2)]);
        }
        surface.unlock();
        assert_eq!(Surface::size(&surface), (3, 2));
        assert!(surface.pixels().iter().all(|&p| p == 0xABCDEF));
    }

    #[test]
    fn test_fill_clips_to_surface() {
        let mut surface = MemorySurface::new(4, 3);
        surface.fill_rectangles(&DrawState::solid(7), &[Rectangle::new(-1, 1, 3, 10)]);
        assert_eq!(surface.pixels(), &[0, 0, 0, 0, 7, 7, 0, 0, 7, 7, 0, 0]);
    }

    #[test]
    fn test_clip_rectangles_limit_drawing() {
        let mut surface = MemorySurface::new(4, 4);
        let state = DrawState {
            clip: Some(vec![Rectangle::new(1, 1, 2, 2)]),
            ..DrawState::solid(1)
        };
        surface.fill_rectangles(&state, &[Rectangle::new(0, 0, 4, 4)]);
        assert_eq!(surface.pixels().iter().filter(|&&p| p == 1).count(), 4);
        assert_eq!(surface.get_pixels(Rectangle::new(1, 1, 2, 1)), vec![1, 1]);
        assert_eq!(surface.get_pixels(Rectangle::new(0, 0, 1, 1)), vec![0]);
    }

    #[test]
    fn test_lines_and_segments() {
        let mut surface = MemorySurface::new(5, 5);
        let state = DrawState::solid(9);
        surface.draw_lines(&state, &[Point::new(0, 0), Point::new(4, 0), Point::new(4, 4)]);
        assert_eq!(surface.get_pixels(Rectangle::new(0, 0, 5, 1)), vec![9; 5]);
        assert_eq!(surface.get_pixels(Rectangle::new(4, 0, 1, 5)), vec![9; 5]);
        surface.draw_segments(
            &state,
            &[Segment {
                x1: 0,
                y1: 4,
                x2: 2,
                y2: 2,
            }],
        );
        assert_eq!(surface.get_pixels(Rectangle::new(1, 3, 1, 1)), vec![9]);
        assert_eq!(surface.get_pixels(Rectangle::new(1, 1, 1, 1)), vec![0]);
    }

    #[test]
    fn test_rectangle_outline_is_one_larger() {
        let mut surface = MemorySurface::new(4, 4);
        surface.draw_rectangles(&DrawState::solid(2), &[Rectangle::new(0, 0, 2, 2)]);
        let drawn = surface.pixels().iter().filter(|&&p| p == 2).count();
        // 3x3 outline has 8 pixels; the center stays empty
        assert_eq!(drawn, 8);
        assert_eq!(surface.get_pixels(Rectangle::new(1, 1, 1, 1)), vec![0]);
    }

    #[test]
    fn test_fill_polygon_rules() {
        let mut surface = MemorySurface::new(4, 4);
        let square = [Point::new(0, 0), Point::new(4, 0), Point::new(4, 4), Point::new(0, 4)];
        surface.fill_polygon(&DrawState::solid(3), &square);
        assert!(surface.pixels().iter().all(|&p| p == 3));

        // A square traced twice cancels out under even-odd but not winding
        let twice: Vec<Point> = square.iter().chain(square.iter()).copied().collect();
        let mut even_odd = MemorySurface::new(4, 4);
        even_odd.fill_polygon(&DrawState::solid(3), &twice);
        assert!(even_odd.pixels().iter().all(|&p| p == 0));
        let mut winding = MemorySurface::new(4, 4);
        let state = DrawState {
            fill_rule: 1,
            ..DrawState::solid(3)
        };
        winding.fill_polygon(&state, &twice);
        assert!(winding.pixels().iter().all(|&p| p == 3));
    }

    #[test]
    fn test_image_text_paints_background_box() {
        let mut surface = MemorySurface::new(20, 16);
        let font = FixedFont.open("fixed").unwrap();
        let text = [b'a' as u16, b' ' as u16];
        let run = TextRun {
            origin: Point::new(0, 11),
            text: &text,
            bounds: FixedFont.metrics(font, &text),
        };
        let state = DrawState {
            background: 5,
            function: 6,
            ..DrawState::solid(8)
        };
        surface.draw_text(&state, &run, true);
        // Cell of the blank character is background only
        assert_eq!(surface.get_pixels(Rectangle::new(8, 5, 1, 1)), vec![5]);
        assert_eq!(surface.get_pixels(Rectangle::new(2, 5, 1, 1)), vec![8]);
        assert_eq!(surface.get_pixels(Rectangle::new(12, 5, 1, 1)), vec![0]);
    }
}
