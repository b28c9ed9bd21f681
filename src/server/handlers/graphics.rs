use super::core_opcode;
use crate::protocol::*;
use crate::resources::{
    lock, DrawableKind, GcValues, GraphicsContext, PixmapInfo, GC_ALL, GC_CLIP_MASK, GC_FONT,
    GC_STIPPLE, GC_TILE,
};
use crate::server::dispatcher::{RequestContext, RequestHandler};
use crate::server::{Server, ROOT_DEPTH};
use std::sync::Mutex;

/// Largest cursor QueryBestSize admits
const MAX_CURSOR_SIZE: u16 = 64;

pub struct GraphicsRequests;

impl RequestHandler for GraphicsRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let server = ctx.server;
        let resources = server.resources();
        let opcode = core_opcode(request)?;
        let data = request.data;
        let body = &mut request.body;
        match opcode {
            RequestOpcode::CreatePixmap => {
                let id = XID::new(body.read_u32()?);
                let drawable = XID::new(body.read_u32()?);
                let width = body.read_u16()?;
                let height = body.read_u16()?;

                drawable_depth(server, drawable)?;
                if width == 0 || height == 0 {
                    return Err(X11Error::bad_value(0));
                }
                let depth = data;
                if depth != 1 && depth != ROOT_DEPTH {
                    return Err(X11Error::bad_value(depth as u32));
                }
                let surface = server
                    .host()
                    .display
                    .create_surface(width, height, depth)
                    .map_err(|e| {
                        log::warn!("pixmap {} ({}x{}): {}", id, width, height, e);
                        X11Error::bad_alloc()
                    })?;
                resources.create_pixmap(
                    id,
                    PixmapInfo {
                        depth,
                        width,
                        height,
                        surface: Mutex::new(surface),
                    },
                )?;
                Ok(None)
            }
            RequestOpcode::FreePixmap => {
                resources.free_pixmap(XID::new(body.read_u32()?))?;
                Ok(None)
            }
            RequestOpcode::CreateGC => {
                let id = XID::new(body.read_u32()?);
                let drawable = XID::new(body.read_u32()?);
                let mask = body.read_u32()?;
                let values = body.read_value_list(mask, GC_ALL)?;

                let depth = drawable_depth(server, drawable)?;
                check_gc_resources(server, &values)?;
                let mut gc_values = GcValues::default();
                gc_values.apply(&values)?;
                resources.create(&resources.gcs, id, GraphicsContext::new(depth, gc_values))?;
                Ok(None)
            }
            RequestOpcode::ChangeGC => {
                let id = XID::new(body.read_u32()?);
                let mask = body.read_u32()?;
                let values = body.read_value_list(mask, GC_ALL)?;

                let gc = resources.gcs.get(id)?;
                check_gc_resources(server, &values)?;
                let mut current = lock(&gc.values);
                let mut staged = current.clone();
                staged.apply(&values)?;
                *current = staged;
                Ok(None)
            }
            RequestOpcode::CopyGC => {
                let src = XID::new(body.read_u32()?);
                let dst = XID::new(body.read_u32()?);
                let mask = body.read_u32()?;
                if mask & !GC_ALL != 0 {
                    return Err(X11Error::bad_value(mask));
                }
                let src_gc = resources.gcs.get(src)?;
                let dst_gc = resources.gcs.get(dst)?;
                if src_gc.depth != dst_gc.depth {
                    return Err(X11Error::bad_match(dst.get()));
                }
                let source = lock(&src_gc.values).clone();
                lock(&dst_gc.values).copy_from(&source, mask);
                Ok(None)
            }
            RequestOpcode::FreeGC => {
                let id = XID::new(body.read_u32()?);
                resources.destroy(&resources.gcs, id)?;
                Ok(None)
            }
            RequestOpcode::SetClipRectangles => {
                let id = XID::new(body.read_u32()?);
                let x_origin = body.read_i16()?;
                let y_origin = body.read_i16()?;
                let rects = super::drawing::read_rectangles(body)?;
                // 0 UnSorted, 1 YSorted, 2 YXSorted, 3 YXBanded
                if data > 3 {
                    return Err(X11Error::bad_value(data as u32));
                }
                let gc = resources.gcs.get(id)?;
                lock(&gc.values).set_clip_rectangles(x_origin, y_origin, rects);
                Ok(None)
            }
            RequestOpcode::QueryBestSize => {
                let drawable = XID::new(body.read_u32()?);
                let width = body.read_u16()?;
                let height = body.read_u16()?;
                // 0 Cursor, 1 Tile, 2 Stipple
                if data > 2 {
                    return Err(X11Error::bad_value(data as u32));
                }
                if resources.drawable(drawable)? == DrawableKind::Window
                    && data != 0
                    && server.tree().class(Window(drawable))? == WindowClass::InputOnly
                {
                    return Err(X11Error::bad_match(drawable.get()));
                }
                // Any size works for tiles and stipples; cursors are capped
                let (width, height) = if data == 0 {
                    (width.min(MAX_CURSOR_SIZE), height.min(MAX_CURSOR_SIZE))
                } else {
                    (width, height)
                };
                let mut reply = ctx.reply();
                reply.body.write_u16(width);
                reply.body.write_u16(height);
                Ok(Some(reply))
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}

/// Depth of any drawable, via the id index
pub(super) fn drawable_depth(server: &Server, drawable: XID) -> X11Result<u8> {
    let resources = server.resources();
    match resources.drawable(drawable)? {
        DrawableKind::Window => server.tree().depth(Window(drawable)),
        DrawableKind::Pixmap => Ok(resources.pixmaps.get(drawable)?.depth),
    }
}

/// Pixmaps and fonts named by a GC value list must exist
fn check_gc_resources(server: &Server, values: &[(u32, u32)]) -> X11Result<()> {
    let resources = server.resources();
    for &(bit, value) in values {
        match bit {
            GC_TILE | GC_STIPPLE => {
                resources.pixmaps.get(XID::new(value))?;
            }
            GC_CLIP_MASK if value != 0 => {
                resources.pixmaps.get(XID::new(value))?;
            }
            GC_FONT => {
                resources.fonts.get(XID::new(value))?;
            }
            _ => {}
        }
    }
    Ok(())
}
