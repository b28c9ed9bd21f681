use super::core_opcode;
use crate::protocol::*;
use crate::server::dispatcher::{RequestContext, RequestHandler};
use crate::server::keymap::{self, KEYCODES_PER_MODIFIER, KEYSYMS_PER_KEYCODE};
use crate::server::POINTER_ROOT;

pub struct InputRequests;

impl RequestHandler for InputRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let server = ctx.server;
        let opcode = core_opcode(request)?;
        let revert_to = request.data;
        let body = &mut request.body;
        match opcode {
            RequestOpcode::SetInputFocus => {
                let focus = Window::new(body.read_u32()?);
                let time = body.read_u32()?;
                if revert_to > 2 {
                    return Err(X11Error::bad_value(revert_to as u32));
                }
                if focus != Window::NONE && focus != POINTER_ROOT {
                    if !server.tree().exists(focus) {
                        return Err(X11Error::bad_window(focus.get()));
                    }
                    if !server.tree().is_viewable(focus) {
                        return Err(X11Error::bad_match(focus.get()));
                    }
                }
                server.set_focus(focus, revert_to, server.resolve_time(time));
                Ok(None)
            }
            RequestOpcode::GetInputFocus => {
                let focus = server.focus();
                let mut reply = ctx.reply_with_data(focus.revert_to);
                reply.body.write_u32(focus.window.get());
                Ok(Some(reply))
            }
            RequestOpcode::QueryPointer => {
                let window = Window::new(body.read_u32()?);
                // There is no pointer device; it rests at the root origin
                // with no buttons held
                let (x, y) = server.tree().root_origin(window)?;
                let mut reply = ctx.reply_with_data(1); // same screen
                let w = &mut reply.body;
                w.write_u32(server.tree().root().get());
                w.write_u32(Window::NONE.get()); // child
                w.write_i16(0);
                w.write_i16(0);
                w.write_i16((-x).clamp(i16::MIN as i32, i16::MAX as i32) as i16);
                w.write_i16((-y).clamp(i16::MIN as i32, i16::MAX as i32) as i16);
                w.write_u16(0); // key and button mask
                w.write_pad(6);
                Ok(Some(reply))
            }
            RequestOpcode::GetKeyboardMapping => {
                let first = body.read_u8()?;
                let count = body.read_u8()?;
                body.skip(2)?;
                let keysyms = keymap::keyboard_mapping(first, count)?;
                let mut reply = ctx.reply_with_data(KEYSYMS_PER_KEYCODE);
                let w = &mut reply.body;
                w.write_pad(24);
                for keysym in keysyms {
                    w.write_u32(keysym);
                }
                Ok(Some(reply))
            }
            RequestOpcode::GetModifierMapping => {
                let mut reply = ctx.reply_with_data(KEYCODES_PER_MODIFIER);
                let w = &mut reply.body;
                w.write_pad(24);
                for keycode in keymap::modifier_mapping() {
                    w.write_u8(keycode);
                }
                Ok(Some(reply))
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}
