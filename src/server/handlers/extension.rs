use super::{core_opcode, read_counted_string, write_str_list};
use crate::protocol::*;
use crate::server::dispatcher::{RequestContext, RequestHandler};

pub struct ExtensionRequests;

impl RequestHandler for ExtensionRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let extensions = ctx.server.extensions();
        let opcode = core_opcode(request)?;
        match opcode {
            RequestOpcode::QueryExtension => {
                let name = read_counted_string(&mut request.body)?;
                let info = extensions.query(&name);
                log::debug!("QueryExtension {}: {}", name, info.is_some());

                let mut reply = ctx.reply();
                let w = &mut reply.body;
                match info {
                    Some(info) => {
                        w.write_bool(true);
                        w.write_u8(info.major_opcode);
                        w.write_u8(info.first_event);
                        w.write_u8(info.first_error);
                    }
                    None => w.write_pad(4),
                }
                Ok(Some(reply))
            }
            RequestOpcode::ListExtensions => {
                let names = extensions.names();
                let mut reply = ctx.reply_with_data(names.len() as u8);
                reply.body.write_pad(24);
                write_str_list(&mut reply.body, names);
                Ok(Some(reply))
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}
