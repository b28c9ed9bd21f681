use super::{capped, core_opcode};
use crate::protocol::*;
use crate::resources::DrawableKind;
use crate::server::dispatcher::{RequestContext, RequestHandler};
use crate::server::window::{cw, config, ConfigureValues, CreateWindowParams};
use crate::server::{Server, DEFAULT_COLORMAP, ROOT_WINDOW};

pub struct WindowRequests;

impl RequestHandler for WindowRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let server = ctx.server;
        let opcode = core_opcode(request)?;
        let data = request.data;
        let body = &mut request.body;
        match opcode {
            RequestOpcode::CreateWindow => {
                let id = Window::new(body.read_u32()?);
                let parent = Window::new(body.read_u32()?);
                let geometry = Rectangle::new(
                    body.read_i16()?,
                    body.read_i16()?,
                    body.read_u16()?,
                    body.read_u16()?,
                );
                let border_width = body.read_u16()?;
                let class = body.read_u16()?;
                let visual = VisualID::new(body.read_u32()?);
                let mask = body.read_u32()?;
                let values = body.read_value_list(mask, cw::ALL)?;

                let class = WindowClass::from_u16(class).ok_or(X11Error::bad_value(class as u32))?;
                check_attribute_resources(server, &values)?;

                let params = CreateWindowParams {
                    id,
                    parent,
                    depth: data,
                    class,
                    visual,
                    geometry,
                    border_width,
                    values,
                };
                let resources = server.resources();
                resources.claim_window(id)?;
                if let Err(e) = server.tree().create_window(params, &ctx.client_ref()) {
                    resources.release(id.id());
                    return Err(e);
                }
                Ok(None)
            }
            RequestOpcode::ChangeWindowAttributes => {
                let window = Window::new(body.read_u32()?);
                let mask = body.read_u32()?;
                let values = body.read_value_list(mask, cw::ALL)?;
                check_attribute_resources(server, &values)?;
                server
                    .tree()
                    .change_attributes(window, &values, &ctx.client_ref())?;
                Ok(None)
            }
            RequestOpcode::GetWindowAttributes => {
                let window = Window::new(body.read_u32()?);
                let info = server.tree().window_info(window, ctx.client.client_id())?;
                let attrs = &info.attributes;

                let mut reply = ctx.reply_with_data(attrs.backing_store);
                let w = &mut reply.body;
                w.write_u32(info.visual.get());
                w.write_u16(info.class as u16);
                w.write_u8(attrs.bit_gravity);
                w.write_u8(attrs.win_gravity);
                w.write_u32(attrs.backing_planes);
                w.write_u32(attrs.backing_pixel);
                w.write_bool(attrs.save_under);
                w.write_bool(attrs.colormap == DEFAULT_COLORMAP);
                w.write_u8(info.map_state as u8);
                w.write_bool(attrs.override_redirect);
                w.write_u32(attrs.colormap.get());
                w.write_u32(info.all_event_masks);
                w.write_u32(info.your_event_mask);
                w.write_u16(attrs.do_not_propagate_mask);
                w.write_pad(2);
                Ok(Some(reply))
            }
            RequestOpcode::DestroyWindow => {
                let window = Window::new(body.read_u32()?);
                let parent = server.tree().parent(window);
                let destroyed = server.tree().destroy_window(window)?;
                server.windows_destroyed(parent, &destroyed);
                Ok(None)
            }
            RequestOpcode::DestroySubwindows => {
                let window = Window::new(body.read_u32()?);
                let destroyed = server.tree().destroy_subwindows(window)?;
                server.windows_destroyed(Some(window), &destroyed);
                Ok(None)
            }
            RequestOpcode::ReparentWindow => {
                let window = Window::new(body.read_u32()?);
                let parent = Window::new(body.read_u32()?);
                let x = body.read_i16()?;
                let y = body.read_i16()?;
                server.tree().reparent_window(window, parent, x, y)?;
                Ok(None)
            }
            RequestOpcode::MapWindow => {
                server.tree().map_window(Window::new(body.read_u32()?))?;
                Ok(None)
            }
            RequestOpcode::MapSubwindows => {
                server.tree().map_subwindows(Window::new(body.read_u32()?))?;
                Ok(None)
            }
            RequestOpcode::UnmapWindow => {
                server.tree().unmap_window(Window::new(body.read_u32()?))?;
                Ok(None)
            }
            RequestOpcode::UnmapSubwindows => {
                server.tree().unmap_subwindows(Window::new(body.read_u32()?))?;
                Ok(None)
            }
            RequestOpcode::ConfigureWindow => {
                let window = Window::new(body.read_u32()?);
                let mask = body.read_u16()? as u32;
                body.skip(2)?;
                let values = body.read_value_list(mask, config::ALL)?;
                let cfg = ConfigureValues::from_value_list(&values)?;
                server.tree().configure_window(window, &cfg)?;
                Ok(None)
            }
            RequestOpcode::GetGeometry => {
                let drawable = XID::new(body.read_u32()?);
                let (depth, geometry, border_width) =
                    match server.resources().drawable(drawable)? {
                        DrawableKind::Window => {
                            let g = server.tree().geometry(Window(drawable))?;
                            (g.depth, g.geometry, g.border_width)
                        }
                        DrawableKind::Pixmap => {
                            let p = server.resources().pixmaps.get(drawable)?;
                            (p.depth, Rectangle::new(0, 0, p.width, p.height), 0)
                        }
                    };
                let mut reply = ctx.reply_with_data(depth);
                let w = &mut reply.body;
                w.write_u32(ROOT_WINDOW.get());
                w.write_i16(geometry.x);
                w.write_i16(geometry.y);
                w.write_u16(geometry.width);
                w.write_u16(geometry.height);
                w.write_u16(border_width);
                w.write_pad(10);
                Ok(Some(reply))
            }
            RequestOpcode::QueryTree => {
                let window = Window::new(body.read_u32()?);
                let (parent, children) = server.tree().query_tree(window)?;
                let children = capped(&children);
                let mut reply = ctx.reply();
                let w = &mut reply.body;
                w.write_u32(ROOT_WINDOW.get());
                w.write_u32(parent.get());
                w.write_u16(children.len() as u16);
                w.write_pad(14);
                for child in children {
                    w.write_u32(child.get());
                }
                Ok(Some(reply))
            }
            RequestOpcode::ClearArea => {
                let window = Window::new(body.read_u32()?);
                let area = Rectangle::new(
                    body.read_i16()?,
                    body.read_i16()?,
                    body.read_u16()?,
                    body.read_u16()?,
                );
                server.tree().clear_area(window, area, data != 0)?;
                Ok(None)
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}

/// Resources named by a window attribute list must exist
fn check_attribute_resources(server: &Server, values: &[(u32, u32)]) -> X11Result<()> {
    let resources = server.resources();
    for &(bit, value) in values {
        match bit {
            // 0 = None, 1 = ParentRelative
            cw::BACK_PIXMAP if value > 1 => {
                resources.pixmaps.get(XID::new(value))?;
            }
            // 0 = CopyFromParent
            cw::BORDER_PIXMAP if value != 0 => {
                resources.pixmaps.get(XID::new(value))?;
            }
            cw::COLORMAP if value != 0 => {
                resources.colormaps.get(XID::new(value))?;
            }
            _ => {}
        }
    }
    Ok(())
}
