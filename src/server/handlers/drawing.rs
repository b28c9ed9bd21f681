//! Drawing requests
//!
//! Geometry is decoded in full, the drawable and GC are resolved, and the
//! work goes to the host's [`DrawTarget`]: a pixmap's surface, or the
//! window's on-screen pixels when the host keeps them. Drawing into a
//! window is also reported to the host as damage.

use super::core_opcode;
use crate::backend::{DrawState, DrawTarget, FontHandle, Surface, TextBounds, TextRun};
use crate::protocol::*;
use crate::resources::{lock, DrawableKind, GcValues, GraphicsContext, PixmapInfo};
use crate::server::dispatcher::{RequestContext, RequestHandler};
use crate::server::events::send_to;
use crate::server::Server;
use std::sync::Arc;

pub struct DrawingRequests;

impl RequestHandler for DrawingRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let server = ctx.server;
        let opcode = core_opcode(request)?;
        let data = request.data;
        let body = &mut request.body;
        match opcode {
            RequestOpcode::PolyPoint | RequestOpcode::PolyLine => {
                let drawable = XID::new(body.read_u32()?);
                let gc = XID::new(body.read_u32()?);
                let points = read_path(body, data)?;
                let (dest, _, state) = prepare(server, drawable, gc)?;
                let area = dest.damage(points.iter().map(|p| (p.x as i32, p.y as i32)), &state);
                dest.paint(server, area, |target| {
                    if opcode == RequestOpcode::PolyPoint {
                        target.draw_points(&state, &points);
                    } else {
                        target.draw_lines(&state, &points);
                    }
                })?;
                Ok(None)
            }
            RequestOpcode::PolySegment => {
                let drawable = XID::new(body.read_u32()?);
                let gc = XID::new(body.read_u32()?);
                let segments = read_segments(body)?;
                let (dest, _, state) = prepare(server, drawable, gc)?;
                let ends = segments.iter().flat_map(|s| {
                    [(s.x1 as i32, s.y1 as i32), (s.x2 as i32, s.y2 as i32)]
                });
                let area = dest.damage(ends, &state);
                dest.paint(server, area, |target| target.draw_segments(&state, &segments))?;
                Ok(None)
            }
            RequestOpcode::PolyRectangle | RequestOpcode::PolyFillRectangle => {
                let drawable = XID::new(body.read_u32()?);
                let gc = XID::new(body.read_u32()?);
                let rects = read_rectangles(body)?;
                let (dest, _, state) = prepare(server, drawable, gc)?;
                let filled = opcode == RequestOpcode::PolyFillRectangle;
                // Outlines cover one more pixel right and down than fills
                let extra = if filled { 0 } else { 1 };
                let corners = rects.iter().flat_map(|r| {
                    let (x, y) = (r.x as i32, r.y as i32);
                    [(x, y), (x + r.width as i32 - 1 + extra, y + r.height as i32 - 1 + extra)]
                });
                let area = dest.damage(corners, &state);
                dest.paint(server, area, |target| {
                    if filled {
                        target.fill_rectangles(&state, &rects);
                    } else {
                        target.draw_rectangles(&state, &rects);
                    }
                })?;
                Ok(None)
            }
            RequestOpcode::FillPoly => {
                let drawable = XID::new(body.read_u32()?);
                let gc = XID::new(body.read_u32()?);
                // Complex, Nonconvex or Convex; only a rasterizer hint
                let shape = body.read_u8()?;
                let mode = body.read_u8()?;
                body.skip(2)?;
                if shape > 2 {
                    return Err(X11Error::bad_value(shape as u32));
                }
                let points = read_path(body, mode)?;
                let (dest, _, state) = prepare(server, drawable, gc)?;
                let area = dest.damage(points.iter().map(|p| (p.x as i32, p.y as i32)), &state);
                dest.paint(server, area, |target| target.fill_polygon(&state, &points))?;
                Ok(None)
            }
            RequestOpcode::PutImage => {
                let drawable = XID::new(body.read_u32()?);
                let gc = XID::new(body.read_u32()?);
                let width = body.read_u16()?;
                let height = body.read_u16()?;
                let dst_x = body.read_i16()?;
                let dst_y = body.read_i16()?;
                let left_pad = body.read_u8()?;
                let depth = body.read_u8()?;
                body.skip(2)?;
                let rest = body.remaining();
                let image = body.read_bytes(rest)?;

                let format = ImageFormat::from_u8(data).ok_or(X11Error::bad_value(data as u32))?;
                let (dest, _, state) = prepare(server, drawable, gc)?;
                match format {
                    ImageFormat::Bitmap if depth != 1 => return Err(X11Error::bad_match(0)),
                    ImageFormat::XYPixmap | ImageFormat::ZPixmap if depth != dest.depth => {
                        return Err(X11Error::bad_match(0));
                    }
                    ImageFormat::ZPixmap if left_pad != 0 => return Err(X11Error::bad_match(0)),
                    _ => {}
                }
                let mut pixels = decode_image(format, depth, width, height, left_pad, &image)?;
                if format == ImageFormat::Bitmap {
                    for pixel in pixels.iter_mut() {
                        *pixel = if *pixel != 0 { state.foreground } else { state.background };
                    }
                }
                let area = Rectangle::new(dst_x, dst_y, width, height);
                let damage = dest.damage(corners_of(&area), &DrawState::solid(0));
                dest.paint(server, damage, |target| target.put_pixels(&state, area, &pixels))?;
                Ok(None)
            }
            RequestOpcode::GetImage => {
                let drawable = XID::new(body.read_u32()?);
                let x = body.read_i16()?;
                let y = body.read_i16()?;
                let width = body.read_u16()?;
                let height = body.read_u16()?;
                let plane_mask = body.read_u32()?;
                let format = match ImageFormat::from_u8(data) {
                    Some(format @ (ImageFormat::XYPixmap | ImageFormat::ZPixmap)) => format,
                    _ => return Err(X11Error::bad_value(data as u32)),
                };

                let dest = Destination::resolve(server, drawable)?;
                if let Target::Window(window) = dest.target {
                    if !server.tree().is_viewable(window) {
                        return Err(X11Error::bad_match(drawable.get()));
                    }
                }
                let area = Rectangle::new(x, y, width, height);
                if !dest.contains(&area) {
                    return Err(X11Error::bad_match(drawable.get()));
                }
                let pixels = dest.read(server, area);

                let mut reply = ctx.reply_with_data(dest.depth);
                reply.body.write_u32(dest.visual.get());
                reply.body.write_pad(20);
                let bytes = encode_image(format, dest.depth, width, height, &pixels, plane_mask);
                reply.body.write_padded_bytes(&bytes);
                Ok(Some(reply))
            }
            RequestOpcode::CopyArea | RequestOpcode::CopyPlane => {
                let src = XID::new(body.read_u32()?);
                let dst = XID::new(body.read_u32()?);
                let gc = XID::new(body.read_u32()?);
                let src_x = body.read_i16()?;
                let src_y = body.read_i16()?;
                let dst_x = body.read_i16()?;
                let dst_y = body.read_i16()?;
                let width = body.read_u16()?;
                let height = body.read_u16()?;
                let bit_plane = if opcode == RequestOpcode::CopyPlane {
                    Some(body.read_u32()?)
                } else {
                    None
                };

                let source = Destination::resolve(server, src)?;
                let (dest, values, state) = prepare(server, dst, gc)?;
                match bit_plane {
                    Some(plane) => {
                        let valid = plane.count_ones() == 1 && plane & depth_mask(source.depth) != 0;
                        if !valid {
                            return Err(X11Error::bad_value(plane));
                        }
                    }
                    None if source.depth != dest.depth => {
                        return Err(X11Error::bad_match(src.get()));
                    }
                    None => {}
                }

                // Only the part of the source inside its drawable is copied
                let requested = Rectangle::new(src_x, src_y, width, height);
                if let Some(visible) = source.clip(&requested) {
                    let mut pixels = source.read(server, visible);
                    if let Some(plane) = bit_plane {
                        for pixel in pixels.iter_mut() {
                            *pixel = if *pixel & plane != 0 { state.foreground } else { state.background };
                        }
                    }
                    let area = Rectangle::new(
                        clamp_i16(dst_x as i32 + visible.x as i32 - src_x as i32),
                        clamp_i16(dst_y as i32 + visible.y as i32 - src_y as i32),
                        visible.width,
                        visible.height,
                    );
                    let damage = dest.damage(corners_of(&area), &DrawState::solid(0));
                    dest.paint(server, damage, |target| target.put_pixels(&state, area, &pixels))?;
                }

                // Regions of the source that were unavailable are not
                // tracked, so there is never a GraphicsExpose to report
                if values.graphics_exposures {
                    send_to(
                        &ctx.client_ref(),
                        &Event::NoExpose {
                            drawable: dst,
                            major_opcode: opcode as u8,
                            minor_opcode: 0,
                        },
                    );
                }
                Ok(None)
            }
            RequestOpcode::PolyText8 | RequestOpcode::PolyText16 => {
                let drawable = XID::new(body.read_u32()?);
                let gc = XID::new(body.read_u32()?);
                let x = body.read_i16()?;
                let y = body.read_i16()?;
                let wide = opcode == RequestOpcode::PolyText16;
                let items = read_text_items(body, wide)?;

                let (dest, context, mut state) = prepare_text(server, drawable, gc)?;
                let start_font = state.font;
                let mut runs = Vec::new();
                let mut pen = x as i32;
                for item in items {
                    match item {
                        TextItem::Font(font) => {
                            let handle = server.resources().fonts.get(font)?.handle;
                            lock(&context.values).font = Font(font);
                            runs.push(Run::Font(handle));
                            state.font = Some(handle);
                        }
                        TextItem::Text { delta, chars } => {
                            pen += delta as i32;
                            let handle = state.font.ok_or(X11Error::bad_font(0))?;
                            let bounds = server.host().fonts.metrics(handle, &chars);
                            let origin = Point::new(clamp_i16(pen), y);
                            pen += bounds.overall_width;
                            runs.push(Run::Text(origin, chars, bounds));
                        }
                    }
                }
                let damage = text_damage(&dest, &state, &runs);
                dest.paint(server, damage, |target| {
                    state.font = start_font;
                    for run in &runs {
                        match run {
                            Run::Font(handle) => state.font = Some(*handle),
                            Run::Text(origin, chars, bounds) => {
                                let run = TextRun {
                                    origin: *origin,
                                    text: chars,
                                    bounds: *bounds,
                                };
                                target.draw_text(&state, &run, false);
                            }
                        }
                    }
                })?;
                Ok(None)
            }
            RequestOpcode::ImageText8 | RequestOpcode::ImageText16 => {
                let drawable = XID::new(body.read_u32()?);
                let gc = XID::new(body.read_u32()?);
                let x = body.read_i16()?;
                let y = body.read_i16()?;
                let count = data as usize;
                let chars = if opcode == RequestOpcode::ImageText16 {
                    wide_chars(&body.read_padded_bytes(count * 2)?)
                } else {
                    body.read_padded_bytes(count)?
                        .into_iter()
                        .map(u16::from)
                        .collect()
                };

                let (dest, _, state) = prepare_text(server, drawable, gc)?;
                let handle = state.font.ok_or(X11Error::bad_font(0))?;
                let bounds = server.host().fonts.metrics(handle, &chars);
                let runs = [Run::Text(Point::new(x, y), chars, bounds)];
                let damage = text_damage(&dest, &state, &runs);
                dest.paint(server, damage, |target| {
                    if let Run::Text(origin, chars, bounds) = &runs[0] {
                        let run = TextRun {
                            origin: *origin,
                            text: chars,
                            bounds: *bounds,
                        };
                        target.draw_text(&state, &run, true);
                    }
                })?;
                Ok(None)
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}

enum Target {
    Pixmap(Arc<PixmapInfo>),
    Window(Window),
}

/// A resolved drawable
struct Destination {
    target: Target,
    width: u16,
    height: u16,
    depth: u8,
    /// Window visual; pixmaps have none
    visual: VisualID,
}

impl Destination {
    fn resolve(server: &Server, drawable: XID) -> X11Result<Self> {
        let resources = server.resources();
        match resources.drawable(drawable)? {
            DrawableKind::Pixmap => {
                let pixmap = resources.pixmaps.get(drawable)?;
                Ok(Destination {
                    width: pixmap.width,
                    height: pixmap.height,
                    depth: pixmap.depth,
                    visual: VisualID::new(0),
                    target: Target::Pixmap(pixmap),
                })
            }
            DrawableKind::Window => {
                let window = Window(drawable);
                let st = server.tree().lock();
                let node = st.node(window)?;
                if node.class == WindowClass::InputOnly {
                    return Err(X11Error::bad_match(drawable.get()));
                }
                Ok(Destination {
                    width: node.geometry.width,
                    height: node.geometry.height,
                    depth: node.depth,
                    visual: node.visual,
                    target: Target::Window(window),
                })
            }
        }
    }

    fn contains(&self, area: &Rectangle) -> bool {
        area.x >= 0
            && area.y >= 0
            && area.x as i32 + area.width as i32 <= self.width as i32
            && area.y as i32 + area.height as i32 <= self.height as i32
    }

    /// The part of `area` inside the drawable
    fn clip(&self, area: &Rectangle) -> Option<Rectangle> {
        let x0 = (area.x as i32).max(0);
        let y0 = (area.y as i32).max(0);
        let x1 = (area.x as i32 + area.width as i32).min(self.width as i32);
        let y1 = (area.y as i32 + area.height as i32).min(self.height as i32);
        (x1 > x0 && y1 > y0)
            .then(|| Rectangle::new(x0 as i16, y0 as i16, (x1 - x0) as u16, (y1 - y0) as u16))
    }

    /// Bounding box of `points`, widened for the line width and clipped to
    /// the drawable. `None` when nothing inside the drawable can change.
    fn damage(&self, points: impl IntoIterator<Item = (i32, i32)>, state: &DrawState) -> Option<Rectangle> {
        let mut points = points.into_iter();
        let (x, y) = points.next()?;
        let (mut x0, mut y0, mut x1, mut y1) = (x, y, x, y);
        for (x, y) in points {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
        let margin = state.line_width as i32 / 2 + 1;
        let x0 = (x0 - margin).max(0);
        let y0 = (y0 - margin).max(0);
        let x1 = (x1 + margin + 1).min(self.width as i32);
        let y1 = (y1 + margin + 1).min(self.height as i32);
        (x1 > x0 && y1 > y0)
            .then(|| Rectangle::new(x0 as i16, y0 as i16, (x1 - x0) as u16, (y1 - y0) as u16))
    }

    /// Run `draw` against the drawable's pixels and report `damage`
    fn paint(
        &self,
        server: &Server,
        damage: Option<Rectangle>,
        mut draw: impl FnMut(&mut dyn DrawTarget),
    ) -> X11Result<()> {
        match &self.target {
            Target::Pixmap(pixmap) => {
                let mut surface = lock(&pixmap.surface);
                draw(surface.lock());
                surface.unlock();
            }
            Target::Window(window) => {
                server.host().display.draw_window(*window, &mut draw);
                if let Some(area) = damage {
                    server.tree().content_changed(*window, &[area])?;
                }
            }
        }
        Ok(())
    }

    /// Pixels of `area`, row-major. Windows whose host keeps no pixels read
    /// as zero.
    fn read(&self, server: &Server, area: Rectangle) -> Vec<u32> {
        match &self.target {
            Target::Pixmap(pixmap) => {
                let mut surface = lock(&pixmap.surface);
                let pixels = surface.lock().get_pixels(area);
                surface.unlock();
                pixels
            }
            Target::Window(window) => {
                let mut pixels = None;
                server
                    .host()
                    .display
                    .draw_window(*window, &mut |target| pixels = Some(target.get_pixels(area)));
                pixels.unwrap_or_else(|| vec![0; area.width as usize * area.height as usize])
            }
        }
    }
}

/// Resolve drawable then GC, check their depths agree, and snapshot the GC
fn prepare(
    server: &Server,
    drawable: XID,
    gc: XID,
) -> X11Result<(Destination, GcValues, DrawState)> {
    let (dest, context, state) = prepare_gc(server, drawable, gc)?;
    let values = lock(&context.values).clone();
    Ok((dest, values, state))
}

fn prepare_gc(
    server: &Server,
    drawable: XID,
    gc: XID,
) -> X11Result<(Destination, Arc<GraphicsContext>, DrawState)> {
    let dest = Destination::resolve(server, drawable)?;
    let context = server.resources().gcs.get(gc)?;
    if context.depth != dest.depth {
        return Err(X11Error::bad_match(gc.get()));
    }
    let state = draw_state(server, &lock(&context.values));
    Ok((dest, context, state))
}

/// Like [`prepare`], but text needs a font: a GC without one falls back to
/// the server's default font
fn prepare_text(
    server: &Server,
    drawable: XID,
    gc: XID,
) -> X11Result<(Destination, Arc<GraphicsContext>, DrawState)> {
    let (dest, context, mut state) = prepare_gc(server, drawable, gc)?;
    if state.font.is_none() {
        state.font = server.host().fonts.open(DEFAULT_FONT);
    }
    Ok((dest, context, state))
}

const DEFAULT_FONT: &str = "fixed";

/// The rasterizer's view of a GC
fn draw_state(server: &Server, values: &GcValues) -> DrawState {
    let font = server
        .resources()
        .fonts
        .get(values.font.id())
        .ok()
        .map(|font| font.handle);
    DrawState {
        function: values.function as u8,
        plane_mask: values.plane_mask,
        foreground: values.foreground,
        background: values.background,
        line_width: values.line_width,
        line_style: values.line_style as u8,
        cap_style: values.cap_style as u8,
        join_style: values.join_style as u8,
        fill_style: values.fill_style as u8,
        fill_rule: values.fill_rule as u8,
        font,
        clip: values.clip_in_drawable(),
    }
}

fn corners_of(area: &Rectangle) -> [(i32, i32); 2] {
    let (x, y) = (area.x as i32, area.y as i32);
    [(x, y), (x + area.width as i32 - 1, y + area.height as i32 - 1)]
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Points in absolute coordinates. Mode 1 (Previous) makes each point
/// relative to the one before it.
fn read_path(body: &mut WireReader, mode: u8) -> X11Result<Vec<Point>> {
    if mode > 1 {
        return Err(X11Error::bad_value(mode as u32));
    }
    let mut points: Vec<Point> = Vec::with_capacity(body.remaining() / 4);
    while body.remaining() >= 4 {
        let mut point = Point::new(body.read_i16()?, body.read_i16()?);
        if mode == 1 {
            if let Some(prev) = points.last() {
                point = Point::new(prev.x.wrapping_add(point.x), prev.y.wrapping_add(point.y));
            }
        }
        points.push(point);
    }
    Ok(points)
}

fn read_segments(body: &mut WireReader) -> X11Result<Vec<Segment>> {
    if body.remaining() % 8 != 0 {
        return Err(X11Error::bad_length(body.remaining() as u32));
    }
    let mut segments = Vec::with_capacity(body.remaining() / 8);
    while body.remaining() >= 8 {
        segments.push(Segment {
            x1: body.read_i16()?,
            y1: body.read_i16()?,
            x2: body.read_i16()?,
            y2: body.read_i16()?,
        });
    }
    Ok(segments)
}

/// A LISTofRECTANGLE filling the rest of the request
pub(super) fn read_rectangles(body: &mut WireReader) -> X11Result<Vec<Rectangle>> {
    if body.remaining() % 8 != 0 {
        return Err(X11Error::bad_length(body.remaining() as u32));
    }
    let mut rects = Vec::with_capacity(body.remaining() / 8);
    while body.remaining() >= 8 {
        let x = body.read_i16()?;
        let y = body.read_i16()?;
        let width = body.read_u16()?;
        let height = body.read_u16()?;
        rects.push(Rectangle::new(x, y, width, height));
    }
    Ok(rects)
}

#[derive(Debug, PartialEq, Eq)]
enum TextItem {
    /// Switch the GC font before the items that follow
    Font(XID),
    Text { delta: i8, chars: Vec<u16> },
}

/// A decoded text run, ready for the rasterizer
enum Run {
    Font(FontHandle),
    Text(Point, Vec<u16>, TextBounds),
}

/// Length byte 255 marks a font change, the font id following big-endian
const FONT_SHIFT: u8 = 255;

/// PolyText items. Two or fewer trailing bytes are request padding; a
/// delta-only item there would move the pen and draw nothing anyway.
fn read_text_items(body: &mut WireReader, wide: bool) -> X11Result<Vec<TextItem>> {
    let mut items = Vec::new();
    while body.remaining() > 2 {
        let len = body.read_u8()?;
        if len == FONT_SHIFT {
            let bytes = body.read_bytes(4)?;
            items.push(TextItem::Font(XID::new(u32::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]))));
            continue;
        }
        let delta = body.read_u8()? as i8;
        let chars = if wide {
            wide_chars(&body.read_bytes(len as usize * 2)?)
        } else {
            body.read_bytes(len as usize)?.into_iter().map(u16::from).collect()
        };
        items.push(TextItem::Text { delta, chars });
    }
    let rest = body.remaining();
    body.skip(rest)?;
    Ok(items)
}

/// CHAR2B strings are always byte1 then byte2
fn wide_chars(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect()
}

fn text_damage(dest: &Destination, state: &DrawState, runs: &[Run]) -> Option<Rectangle> {
    let corners = runs.iter().filter_map(|run| match run {
        Run::Text(origin, _, bounds) => Some((origin, bounds)),
        Run::Font(_) => None,
    });
    let points = corners.flat_map(|(origin, bounds)| {
        let (x, y) = (origin.x as i32, origin.y as i32);
        [
            (x, y - bounds.font_ascent as i32),
            (x + bounds.overall_width, y + bounds.font_descent as i32),
        ]
    });
    dest.damage(points, state)
}
