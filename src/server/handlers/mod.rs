//! Core protocol request handlers
//!
//! Each handler type serves one family of opcodes and matches on the opcode
//! to decode the request body. Decoding always finishes before any state is
//! touched, so a truncated request changes nothing.

mod atom;
mod color;
mod drawing;
mod extension;
mod font;
mod graphics;
mod input;
mod property;
mod selection;
mod window;

use super::dispatcher::{Dispatcher, RequestContext, RequestHandler};
use crate::protocol::*;
use std::sync::Arc;

/// Install every core request handler
pub fn register_core(dispatcher: &mut Dispatcher) {
    use RequestOpcode::*;

    let families: [(Arc<dyn RequestHandler>, &[RequestOpcode]); 11] = [
        (
            Arc::new(window::WindowRequests),
            &[
                CreateWindow,
                ChangeWindowAttributes,
                GetWindowAttributes,
                DestroyWindow,
                DestroySubwindows,
                ReparentWindow,
                MapWindow,
                MapSubwindows,
                UnmapWindow,
                UnmapSubwindows,
                ConfigureWindow,
                GetGeometry,
                QueryTree,
                ClearArea,
            ],
        ),
        (Arc::new(atom::AtomRequests), &[InternAtom, GetAtomName]),
        (
            Arc::new(property::PropertyRequests),
            &[ChangeProperty, DeleteProperty, GetProperty, ListProperties],
        ),
        (
            Arc::new(selection::SelectionRequests),
            &[SetSelectionOwner, GetSelectionOwner, ConvertSelection],
        ),
        (
            Arc::new(input::InputRequests),
            &[
                QueryPointer,
                SetInputFocus,
                GetInputFocus,
                GetKeyboardMapping,
                GetModifierMapping,
            ],
        ),
        (
            Arc::new(font::FontRequests),
            &[
                OpenFont,
                CloseFont,
                QueryFont,
                QueryTextExtents,
                ListFonts,
                ListFontsWithInfo,
                GetFontPath,
            ],
        ),
        (
            Arc::new(graphics::GraphicsRequests),
            &[
                CreatePixmap,
                FreePixmap,
                CreateGC,
                ChangeGC,
                CopyGC,
                SetClipRectangles,
                FreeGC,
                QueryBestSize,
            ],
        ),
        (
            Arc::new(drawing::DrawingRequests),
            &[
                CopyArea,
                CopyPlane,
                PolyPoint,
                PolyLine,
                PolySegment,
                PolyRectangle,
                FillPoly,
                PolyFillRectangle,
                PutImage,
                GetImage,
                PolyText8,
                PolyText16,
                ImageText8,
                ImageText16,
            ],
        ),
        (
            Arc::new(color::ColorRequests),
            &[
                CreateColormap,
                FreeColormap,
                AllocColor,
                AllocNamedColor,
                QueryColors,
                LookupColor,
            ],
        ),
        (
            Arc::new(extension::ExtensionRequests),
            &[QueryExtension, ListExtensions],
        ),
        (Arc::new(NoOperationRequest), &[NoOperation]),
    ];

    for (handler, opcodes) in families {
        let opcodes: Vec<u8> = opcodes.iter().map(|op| *op as u8).collect();
        dispatcher.register(handler, &opcodes);
    }
}

/// The opcode a handler was installed for. Every registered opcode is a
/// core opcode, so this only fails on a misrouted request.
fn core_opcode(request: &Request) -> X11Result<RequestOpcode> {
    RequestOpcode::from_u8(request.opcode).ok_or(X11Error::bad_request(request.opcode))
}

/// A counted string: u16 length, 2 pad bytes, then the padded bytes
fn read_counted_string(body: &mut WireReader) -> X11Result<String> {
    let len = body.read_u16()? as usize;
    body.skip(2)?;
    body.read_padded_string(len)
}

/// The prefix of `items` a CARD16 count can describe. Longer lists are
/// truncated so the count and the entries that follow agree.
fn capped<T>(items: &[T]) -> &[T] {
    &items[..items.len().min(u16::MAX as usize)]
}

/// Write a LISTofSTR (length-prefixed, unpadded entries) and pad the total
fn write_str_list<'a>(w: &mut WireWriter, names: impl IntoIterator<Item = &'a str>) {
    for name in names {
        let bytes = &name.as_bytes()[..name.len().min(255)];
        w.write_u8(bytes.len() as u8);
        w.write_bytes(bytes);
    }
    w.align();
}

/// NoOperation may carry any amount of padding
struct NoOperationRequest;

impl RequestHandler for NoOperationRequest {
    fn handle(&self, _: &RequestContext<'_>, request: &mut Request) -> X11Result<Option<Reply>> {
        let rest = request.body.remaining();
        request.body.skip(rest)?;
        Ok(None)
    }
}
