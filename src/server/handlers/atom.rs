use super::{core_opcode, read_counted_string};
use crate::protocol::*;
use crate::server::dispatcher::{RequestContext, RequestHandler};

pub struct AtomRequests;

impl RequestHandler for AtomRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let opcode = core_opcode(request)?;
        let only_if_exists = request.data != 0;
        let body = &mut request.body;
        match opcode {
            RequestOpcode::InternAtom => {
                let name = read_counted_string(body)?;
                let atom = ctx.server.atoms().intern(&name, only_if_exists)?;
                let mut reply = ctx.reply();
                reply.body.write_u32(atom.get());
                Ok(Some(reply))
            }
            RequestOpcode::GetAtomName => {
                let atom = Atom::new(body.read_u32()?);
                let name = ctx.server.atoms().name(atom)?;
                let mut reply = ctx.reply();
                reply.body.write_u16(name.len() as u16);
                reply.body.write_pad(22);
                reply.body.write_padded_string(&name);
                Ok(Some(reply))
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}
