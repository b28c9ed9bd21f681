use super::{capped, core_opcode};
use crate::protocol::*;
use crate::server::dispatcher::{RequestContext, RequestHandler};
use crate::server::property::{PropertyMode, ANY_PROPERTY_TYPE};

pub struct PropertyRequests;

impl RequestHandler for PropertyRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let server = ctx.server;
        let opcode = core_opcode(request)?;
        let data = request.data;
        let body = &mut request.body;
        match opcode {
            RequestOpcode::ChangeProperty => {
                let window = Window::new(body.read_u32()?);
                let property = Atom::new(body.read_u32()?);
                let type_ = Atom::new(body.read_u32()?);
                let format = body.read_u8()?;
                body.skip(3)?;
                let length = body.read_u32()?;
                if !matches!(format, 8 | 16 | 32) {
                    return Err(X11Error::bad_value(format as u32));
                }
                let size = (length as usize)
                    .checked_mul(format as usize / 8)
                    .ok_or(X11Error::bad_length(length))?;
                let value = body.read_padded_bytes(size)?;

                let mode = PropertyMode::from_u8(data)?;
                server.atoms().validate(property)?;
                server.atoms().validate(type_)?;
                server.tree().change_property(
                    window,
                    property,
                    type_,
                    format,
                    mode,
                    value,
                    server.timestamp(),
                )?;
                Ok(None)
            }
            RequestOpcode::DeleteProperty => {
                let window = Window::new(body.read_u32()?);
                let property = Atom::new(body.read_u32()?);
                server.atoms().validate(property)?;
                server
                    .tree()
                    .delete_property(window, property, server.timestamp())?;
                Ok(None)
            }
            RequestOpcode::GetProperty => {
                let window = Window::new(body.read_u32()?);
                let property = Atom::new(body.read_u32()?);
                let type_ = Atom::new(body.read_u32()?);
                let long_offset = body.read_u32()?;
                let long_length = body.read_u32()?;

                server.atoms().validate(property)?;
                if type_ != ANY_PROPERTY_TYPE {
                    server.atoms().validate(type_)?;
                }
                let read = server.tree().get_property(
                    window,
                    property,
                    type_,
                    long_offset,
                    long_length,
                    data != 0,
                    server.timestamp(),
                )?;

                let mut reply = ctx.reply_with_data(read.format);
                let w = &mut reply.body;
                w.write_u32(read.type_.get());
                w.write_u32(read.bytes_after);
                w.write_u32(read.value_len());
                w.write_pad(12);
                w.write_padded_bytes(&read.value);
                Ok(Some(reply))
            }
            RequestOpcode::ListProperties => {
                let window = Window::new(body.read_u32()?);
                let atoms = server.tree().list_properties(window)?;
                let atoms = capped(&atoms);
                let mut reply = ctx.reply();
                let w = &mut reply.body;
                w.write_u16(atoms.len() as u16);
                w.write_pad(22);
                for atom in atoms {
                    w.write_u32(atom.get());
                }
                Ok(Some(reply))
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}
