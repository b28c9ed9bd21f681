use super::{capped, core_opcode, read_counted_string};
use crate::backend::Rgb;
use crate::protocol::*;
use crate::resources::ColormapInfo;
use crate::server::dispatcher::{RequestContext, RequestHandler};
use crate::server::{DEFAULT_COLORMAP, ROOT_VISUAL};

pub struct ColorRequests;

impl RequestHandler for ColorRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let server = ctx.server;
        let resources = server.resources();
        let colormaps = &resources.colormaps;
        let opcode = core_opcode(request)?;
        let alloc = request.data;
        let body = &mut request.body;
        match opcode {
            RequestOpcode::CreateColormap => {
                let id = XID::new(body.read_u32()?);
                let window = Window::new(body.read_u32()?);
                let visual = VisualID::new(body.read_u32()?);
                if alloc > 1 {
                    return Err(X11Error::bad_value(alloc as u32));
                }
                if !server.tree().exists(window) {
                    return Err(X11Error::bad_window(window.get()));
                }
                // TrueColor maps are read-only, so AllocAll is a mismatch
                if visual != ROOT_VISUAL || alloc == 1 {
                    return Err(X11Error::bad_match(visual.get()));
                }
                resources.create(colormaps, id, ColormapInfo { visual, window })?;
                Ok(None)
            }
            RequestOpcode::FreeColormap => {
                let id = XID::new(body.read_u32()?);
                colormaps.get(id)?;
                if id != DEFAULT_COLORMAP.id() {
                    resources.destroy(colormaps, id)?;
                }
                Ok(None)
            }
            RequestOpcode::AllocColor => {
                let cmap = XID::new(body.read_u32()?);
                let requested = Rgb {
                    red: body.read_u16()?,
                    green: body.read_u16()?,
                    blue: body.read_u16()?,
                };
                body.skip(2)?;
                colormaps.get(cmap)?;

                let actual = requested.quantize();
                let mut reply = ctx.reply();
                write_rgb(&mut reply.body, &actual);
                reply.body.write_pad(2);
                reply.body.write_u32(actual.to_pixel());
                Ok(Some(reply))
            }
            RequestOpcode::AllocNamedColor | RequestOpcode::LookupColor => {
                let cmap = XID::new(body.read_u32()?);
                let name = read_counted_string(body)?;
                colormaps.get(cmap)?;
                let exact = server
                    .host()
                    .colors
                    .by_name(&name)
                    .ok_or_else(X11Error::bad_name)?;
                let visual = exact.quantize();

                let mut reply = ctx.reply();
                if opcode == RequestOpcode::AllocNamedColor {
                    reply.body.write_u32(visual.to_pixel());
                }
                write_rgb(&mut reply.body, &exact);
                write_rgb(&mut reply.body, &visual);
                Ok(Some(reply))
            }
            RequestOpcode::QueryColors => {
                let cmap = XID::new(body.read_u32()?);
                let mut pixels = Vec::with_capacity(body.remaining() / 4);
                while body.remaining() >= 4 {
                    pixels.push(body.read_u32()?);
                }
                colormaps.get(cmap)?;
                if let Some(bad) = pixels.iter().find(|p| **p > 0x00FF_FFFF) {
                    return Err(X11Error::bad_value(*bad));
                }
                let pixels = capped(&pixels);

                let mut reply = ctx.reply();
                let w = &mut reply.body;
                w.write_u16(pixels.len() as u16);
                w.write_pad(22);
                for &pixel in pixels {
                    write_rgb(w, &Rgb::from_pixel(pixel));
                    w.write_pad(2);
                }
                Ok(Some(reply))
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}

fn write_rgb(w: &mut WireWriter, rgb: &Rgb) {
    w.write_u16(rgb.red);
    w.write_u16(rgb.green);
    w.write_u16(rgb.blue);
}
