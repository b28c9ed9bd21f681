use super::{capped, core_opcode, read_counted_string, write_str_list};
use crate::backend::{CharInfo, FontHandle, FontMetrics};
use crate::protocol::*;
use crate::resources::{lock, OpenFont};
use crate::server::dispatcher::{RequestContext, RequestHandler};
use crate::server::Server;

pub struct FontRequests;

impl RequestHandler for FontRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let server = ctx.server;
        let fonts = &server.host().fonts;
        let opcode = core_opcode(request)?;
        let odd_length = request.data != 0;
        let body = &mut request.body;
        match opcode {
            RequestOpcode::OpenFont => {
                let id = XID::new(body.read_u32()?);
                let name = read_counted_string(body)?;
                let handle = fonts.open(&name).ok_or_else(X11Error::bad_name)?;
                log::debug!("font {} opened as {}", name, id);
                let resources = server.resources();
                resources.create(&resources.fonts, id, OpenFont { name, handle })?;
                Ok(None)
            }
            RequestOpcode::CloseFont => {
                let id = XID::new(body.read_u32()?);
                let resources = server.resources();
                resources.destroy(&resources.fonts, id)?;
                Ok(None)
            }
            RequestOpcode::QueryFont => {
                let handle = resolve_fontable(server, body.read_u32()?)?;
                let metrics = fonts.describe(handle);

                let mut reply = ctx.reply();
                let w = &mut reply.body;
                write_font_info(w, &metrics);
                // No per-char table: every glyph uses max_bounds
                w.write_u32(0);
                Ok(Some(reply))
            }
            RequestOpcode::QueryTextExtents => {
                let handle = resolve_fontable(server, body.read_u32()?)?;
                let mut count = body.remaining() / 2;
                if odd_length {
                    count = count.checked_sub(1).ok_or(X11Error::bad_length(0))?;
                }
                let bytes = body.read_bytes(count * 2)?;
                let rest = body.remaining();
                body.skip(rest)?;
                let text: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();

                let metrics = fonts.describe(handle);
                let bounds = fonts.metrics(handle, &text);
                let mut reply = ctx.reply_with_data(metrics.draw_direction);
                let w = &mut reply.body;
                w.write_i16(bounds.font_ascent);
                w.write_i16(bounds.font_descent);
                w.write_i16(bounds.overall_ascent);
                w.write_i16(bounds.overall_descent);
                w.write_i32(bounds.overall_width);
                w.write_i32(bounds.overall_left);
                w.write_i32(bounds.overall_right);
                w.write_pad(4);
                Ok(Some(reply))
            }
            RequestOpcode::ListFonts => {
                let max_names = body.read_u16()? as usize;
                let len = body.read_u16()? as usize;
                let pattern = body.read_padded_string(len)?;
                let names = fonts.list(&pattern, max_names);

                let mut reply = ctx.reply();
                let w = &mut reply.body;
                w.write_u16(names.len() as u16);
                w.write_pad(22);
                write_str_list(w, names.iter().map(String::as_str));
                Ok(Some(reply))
            }
            RequestOpcode::ListFontsWithInfo => {
                let max_names = body.read_u16()? as usize;
                let len = body.read_u16()? as usize;
                let pattern = body.read_padded_string(len)?;
                let names = fonts.list(&pattern, max_names);

                // One reply per font, then a terminating reply with an
                // empty name
                for (i, name) in names.iter().enumerate() {
                    let Some(handle) = fonts.open(name) else {
                        log::warn!("listed font {} does not open", name);
                        continue;
                    };
                    let name = &name.as_bytes()[..name.len().min(255)];
                    let mut reply = ctx.reply_with_data(name.len() as u8);
                    let w = &mut reply.body;
                    write_font_info(w, &fonts.describe(handle));
                    w.write_u32((names.len() - i - 1) as u32);
                    w.write_padded_bytes(name);
                    ctx.send_extra_reply(&reply);
                }
                let mut last = ctx.reply();
                last.body.write_pad(52);
                Ok(Some(last))
            }
            RequestOpcode::GetFontPath => {
                let path = fonts.path();
                let path = capped(&path);
                let mut reply = ctx.reply();
                let w = &mut reply.body;
                w.write_u16(path.len() as u16);
                w.write_pad(22);
                write_str_list(w, path.iter().map(String::as_str));
                Ok(Some(reply))
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}

/// A FONTABLE is a font id or a GC whose font is used
fn resolve_fontable(server: &Server, id: u32) -> X11Result<FontHandle> {
    let resources = server.resources();
    if let Ok(font) = resources.fonts.get(XID::new(id)) {
        return Ok(font.handle);
    }
    let gc = resources
        .gcs
        .get(XID::new(id))
        .map_err(|_| X11Error::bad_font(id))?;
    let font = lock(&gc.values).font;
    Ok(resources.fonts.get(font.id())?.handle)
}

/// The header QueryFont and ListFontsWithInfo share, up to the properties
fn write_font_info(w: &mut WireWriter, metrics: &FontMetrics) {
    write_char_info(w, &metrics.min_bounds);
    w.write_pad(4);
    write_char_info(w, &metrics.max_bounds);
    w.write_pad(4);
    w.write_u16(metrics.min_char);
    w.write_u16(metrics.max_char);
    w.write_u16(metrics.default_char);
    w.write_u16(0); // no font properties
    w.write_u8(metrics.draw_direction);
    w.write_u8(0); // min byte1
    w.write_u8(0); // max byte1
    w.write_bool(true);
    w.write_i16(metrics.font_ascent);
    w.write_i16(metrics.font_descent);
}

fn write_char_info(w: &mut WireWriter, info: &CharInfo) {
    w.write_i16(info.left_side_bearing);
    w.write_i16(info.right_side_bearing);
    w.write_i16(info.character_width);
    w.write_i16(info.ascent);
    w.write_i16(info.descent);
    w.write_u16(info.attributes);
}
