use super::core_opcode;
use crate::protocol::*;
use crate::server::dispatcher::{RequestContext, RequestHandler};
use crate::server::events::send_to;
use crate::server::selection::OwnerChange;

pub struct SelectionRequests;

impl RequestHandler for SelectionRequests {
    fn handle(&self, ctx: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let server = ctx.server;
        let tree = server.tree();
        let opcode = core_opcode(request)?;
        let body = &mut request.body;
        match opcode {
            RequestOpcode::SetSelectionOwner => {
                let owner = Window::new(body.read_u32()?);
                let selection = Atom::new(body.read_u32()?);
                let time = body.read_u32()?;

                if owner != Window::NONE && !tree.exists(owner) {
                    return Err(X11Error::bad_window(owner.get()));
                }
                server.atoms().validate(selection)?;

                let time = server.resolve_time(time);
                match server
                    .selections()
                    .set_owner(selection, owner, time, server.timestamp())
                {
                    OwnerChange::Changed {
                        previous: Some(previous),
                    } => tree.send_to_owner(
                        previous,
                        &Event::SelectionClear {
                            time,
                            owner: previous,
                            selection,
                        },
                    ),
                    OwnerChange::Changed { previous: None } => {}
                    OwnerChange::Ignored => {
                        log::debug!("stale SetSelectionOwner for atom {} ignored", selection.get());
                    }
                }
                Ok(None)
            }
            RequestOpcode::GetSelectionOwner => {
                let selection = Atom::new(body.read_u32()?);
                server.atoms().validate(selection)?;
                let mut reply = ctx.reply();
                reply
                    .body
                    .write_u32(server.selections().owner(selection).get());
                Ok(Some(reply))
            }
            RequestOpcode::ConvertSelection => {
                let requestor = Window::new(body.read_u32()?);
                let selection = Atom::new(body.read_u32()?);
                let target = Atom::new(body.read_u32()?);
                let property = Atom::new(body.read_u32()?);
                let time = Timestamp(body.read_u32()?);

                if !tree.exists(requestor) {
                    return Err(X11Error::bad_window(requestor.get()));
                }
                server.atoms().validate(selection)?;
                server.atoms().validate(target)?;
                if property != Atom::NONE {
                    server.atoms().validate(property)?;
                }

                let owner = server.selections().owner(selection);
                match tree.owner(owner).filter(|_| owner != Window::NONE) {
                    Some(owner_client) => send_to(
                        &owner_client,
                        &Event::SelectionRequest {
                            time,
                            owner,
                            requestor,
                            selection,
                            target,
                            property,
                        },
                    ),
                    None => tree.send_to_owner(
                        requestor,
                        &Event::SelectionNotify {
                            time,
                            requestor,
                            selection,
                            target,
                            property: Atom::NONE,
                        },
                    ),
                }
                Ok(None)
            }
            _ => Err(X11Error::bad_request(opcode as u8)),
        }
    }
}
