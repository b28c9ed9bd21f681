//! X11 server context
//!
//! [`Server`] is the explicit context every connection shares: the window
//! tree, the resource registries, the atom and selection tables, the
//! extension registry and the opcode dispatcher. It is built once and handed
//! to each connection behind an `Arc`.

pub mod atoms;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod extensions;
pub mod handlers;
pub mod keymap;
pub mod listener;
pub mod property;
pub mod selection;
pub mod window;

pub use client::ClientConnection;
pub use config::{ScreenConfig, ServerConfig};
pub use listener::serve;

use crate::backend::Host;
use crate::protocol::*;
use crate::resources::{lock, ColormapInfo, Resources};
use atoms::AtomTable;
use dispatcher::{Dispatcher, RequestContext, RequestHandler};
use extensions::{ExtensionInfo, ExtensionRegistry, FIRST_EXTENSION_OPCODE};
use selection::SelectionManager;
use std::collections::HashMap;
use std::error::Error;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use window::WindowTree;

/// Connection-level failure: framing, I/O, or a rejected handshake
pub type ServerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub const ROOT_WINDOW: Window = Window(XID(0x100));
pub const DEFAULT_COLORMAP: Colormap = Colormap(XID(0x20));
pub const ROOT_VISUAL: VisualID = VisualID(0x21);
pub const ROOT_DEPTH: u8 = 24;
pub const WHITE_PIXEL: u32 = 0x00FF_FFFF;
pub const BLACK_PIXEL: u32 = 0;

/// Low bits a client may vary within its resource-id range
pub const RESOURCE_ID_MASK: u32 = 0x001F_FFFF;
const RESOURCE_ID_SHIFT: u32 = 21;
/// Live connections at once; index 0 belongs to the server
pub const MAX_CLIENTS: u32 = u32::MAX >> RESOURCE_ID_SHIFT;
const MOTION_BUFFER_SIZE: u32 = 256;
/// Largest request without BIG-REQUESTS, in 4-byte units
const MAX_REQUEST_LENGTH: u16 = 0xFFFF;
const TRUE_COLOR: u8 = 4;

/// GetInputFocus value meaning "whatever window the pointer is in"
pub const POINTER_ROOT: Window = Window(XID(1));

/// Input focus and the rule for where it goes when the window disappears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusState {
    pub window: Window,
    /// 0 = None, 1 = PointerRoot, 2 = Parent
    pub revert_to: u8,
    pub time: Timestamp,
}

/// What the connection does after a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

pub struct Server {
    config: ServerConfig,
    host: Host,
    started: Instant,
    tree: WindowTree,
    resources: Resources,
    atoms: AtomTable,
    selections: SelectionManager,
    extensions: ExtensionRegistry,
    dispatcher: Dispatcher,
    focus: Mutex<FocusState>,
    clients: Mutex<HashMap<u32, Arc<ClientConnection>>>,
    next_client_id: AtomicU32,
}

impl Server {
    pub fn new(config: ServerConfig, host: Host) -> Self {
        let screen = config.screen;
        let tree = WindowTree::new(
            ROOT_WINDOW,
            (screen.width, screen.height),
            ROOT_DEPTH,
            ROOT_VISUAL,
            DEFAULT_COLORMAP,
            Arc::clone(&host.display),
        );

        let resources = Resources::new();
        let root_entries = resources.claim_window(ROOT_WINDOW).and_then(|()| {
            resources.create(
                &resources.colormaps,
                DEFAULT_COLORMAP.id(),
                ColormapInfo {
                    visual: ROOT_VISUAL,
                    window: ROOT_WINDOW,
                },
            )
        });
        if let Err(e) = root_entries {
            log::error!("registering root resources: {}", e);
        }

        let mut dispatcher = Dispatcher::new();
        handlers::register_core(&mut dispatcher);

        let mut server = Server {
            config,
            host,
            started: Instant::now(),
            tree,
            resources,
            atoms: AtomTable::new(),
            selections: SelectionManager::new(),
            extensions: ExtensionRegistry::new(),
            dispatcher,
            focus: Mutex::new(FocusState {
                window: POINTER_ROOT,
                revert_to: 1,
                time: Timestamp(0),
            }),
            clients: Mutex::new(HashMap::new()),
            next_client_id: AtomicU32::new(1),
        };

        if let Err(e) = server.register_extension(
            extensions::BIG_REQUESTS_NAME,
            Arc::new(extensions::BigRequests),
            0,
            0,
        ) {
            log::error!("registering {}: {}", extensions::BIG_REQUESTS_NAME, e);
        }
        server
    }

    /// Allocate codes for an extension and route its opcode to `handler`
    pub fn register_extension(
        &mut self,
        name: &str,
        handler: Arc<dyn RequestHandler>,
        events: u8,
        errors: u8,
    ) -> X11Result<ExtensionInfo> {
        let info = self.extensions.register(name, events, errors)?;
        self.dispatcher.register(handler, &[info.major_opcode]);
        Ok(info)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn tree(&self) -> &WindowTree {
        &self.tree
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    pub fn selections(&self) -> &SelectionManager {
        &self.selections
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Milliseconds since the server started, wrapping at 2^32
    pub fn timestamp(&self) -> Timestamp {
        Timestamp(self.started.elapsed().as_millis() as u32)
    }

    /// CurrentTime (0) means now
    pub fn resolve_time(&self, time: u32) -> Timestamp {
        match Timestamp(time) {
            Timestamp::CURRENT_TIME => self.timestamp(),
            t => t,
        }
    }

    pub fn focus(&self) -> FocusState {
        *lock(&self.focus)
    }

    /// Move the input focus, sending FocusOut and FocusIn to the windows
    /// involved. A `time` older than the last focus change, or in the
    /// future, leaves the focus as it was.
    pub fn set_focus(&self, window: Window, revert_to: u8, time: Timestamp) {
        let previous = {
            let mut focus = lock(&self.focus);
            if time < focus.time || time > self.timestamp() {
                return;
            }
            let previous = focus.window;
            *focus = FocusState {
                window,
                revert_to,
                time,
            };
            previous
        };
        if previous == window {
            return;
        }
        let is_window = |w: Window| w != Window::NONE && w != POINTER_ROOT;
        if is_window(previous) {
            self.tree.deliver(
                previous,
                &Event::FocusOut {
                    detail: NOTIFY_NONLINEAR,
                    event: previous,
                    mode: NOTIFY_NORMAL,
                },
                event_mask::FOCUS_CHANGE,
            );
        }
        if is_window(window) {
            self.tree.deliver(
                window,
                &Event::FocusIn {
                    detail: NOTIFY_NONLINEAR,
                    event: window,
                    mode: NOTIFY_NORMAL,
                },
                event_mask::FOCUS_CHANGE,
            );
        }
    }

    /// Bookkeeping after windows left the tree. `parent` is the surviving
    /// parent of the topmost destroyed window.
    pub fn windows_destroyed(&self, parent: Option<Window>, destroyed: &[Window]) {
        if destroyed.is_empty() {
            return;
        }
        self.resources.forget_windows(destroyed);
        self.selections.forget_windows(destroyed);

        let mut focus = lock(&self.focus);
        if destroyed.contains(&focus.window) {
            focus.window = match focus.revert_to {
                1 => POINTER_ROOT,
                2 => parent.unwrap_or(Window::NONE),
                _ => Window::NONE,
            };
            focus.revert_to = 0;
            focus.time = self.timestamp();
        }
    }

    /// Add a connection to the connection set.
    ///
    /// Client indexes fill the bits above [`RESOURCE_ID_MASK`], so at most
    /// [`MAX_CLIENTS`] connections can be live. Indexes are handed out in
    /// rotation and a disconnected client's index becomes free again.
    pub fn register_client(
        &self,
        byte_order: ByteOrder,
        writer: Box<dyn Write + Send>,
    ) -> Result<Arc<ClientConnection>, String> {
        let mut clients = lock(&self.clients);
        let start = self.next_client_id.load(Ordering::Relaxed);
        let client_id = (0..MAX_CLIENTS)
            .map(|offset| (start - 1 + offset) % MAX_CLIENTS + 1)
            .find(|id| !clients.contains_key(id))
            .ok_or_else(|| "Maximum number of clients reached".to_string())?;
        self.next_client_id
            .store(client_id % MAX_CLIENTS + 1, Ordering::Relaxed);

        let client = Arc::new(
            ClientConnection::new(client_id, byte_order, writer)
                .with_queue_limit(self.config.client_queue_limit),
        );
        clients.insert(client_id, Arc::clone(&client));
        Ok(client)
    }

    /// Remove a closed connection and its event selections. Windows it
    /// created stay in the tree.
    pub fn unregister_client(&self, client_id: u32) {
        if let Some(client) = lock(&self.clients).remove(&client_id) {
            client.close();
        }
        self.tree.remove_client(client_id);
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }

    /// The connection-setup success block for `client_id`
    pub fn setup_reply(&self, client_id: u32) -> SetupSuccess {
        let screen = self.config.screen;
        let root_masks = self
            .tree
            .window_info(ROOT_WINDOW, 0)
            .map(|info| info.all_event_masks)
            .unwrap_or(0);
        SetupSuccess {
            protocol_major_version: PROTOCOL_MAJOR_VERSION,
            protocol_minor_version: PROTOCOL_MINOR_VERSION,
            release_number: self.config.release_number,
            resource_id_base: client_id << RESOURCE_ID_SHIFT,
            resource_id_mask: RESOURCE_ID_MASK,
            motion_buffer_size: MOTION_BUFFER_SIZE,
            maximum_request_length: MAX_REQUEST_LENGTH,
            image_byte_order: ByteOrder::LSBFirst,
            bitmap_format_bit_order: ByteOrder::LSBFirst,
            bitmap_format_scanline_unit: 32,
            bitmap_format_scanline_pad: 32,
            min_keycode: keymap::MIN_KEYCODE,
            max_keycode: keymap::MAX_KEYCODE,
            vendor: self.config.vendor.clone(),
            pixmap_formats: vec![
                Format {
                    depth: 1,
                    bits_per_pixel: 1,
                    scanline_pad: 32,
                },
                Format {
                    depth: ROOT_DEPTH,
                    bits_per_pixel: 32,
                    scanline_pad: 32,
                },
            ],
            roots: vec![Screen {
                root: ROOT_WINDOW,
                default_colormap: DEFAULT_COLORMAP,
                white_pixel: WHITE_PIXEL,
                black_pixel: BLACK_PIXEL,
                current_input_masks: root_masks,
                width_in_pixels: screen.width,
                height_in_pixels: screen.height,
                width_in_millimeters: screen.width_mm,
                height_in_millimeters: screen.height_mm,
                min_installed_maps: 1,
                max_installed_maps: 1,
                root_visual: ROOT_VISUAL,
                backing_stores: 0,
                save_unders: false,
                root_depth: ROOT_DEPTH,
                allowed_depths: vec![
                    Depth {
                        depth: ROOT_DEPTH,
                        visuals: vec![VisualType {
                            visual_id: ROOT_VISUAL,
                            class: TRUE_COLOR,
                            bits_per_rgb_value: 8,
                            colormap_entries: 256,
                            red_mask: 0x00FF_0000,
                            green_mask: 0x0000_FF00,
                            blue_mask: 0x0000_00FF,
                        }],
                    },
                    Depth {
                        depth: 1,
                        visuals: Vec::new(),
                    },
                ],
            }],
        }
    }

    /// Process one framed request for `client`.
    ///
    /// The sequence counter advances whether or not a handler exists.
    /// Protocol errors are sent in place of the reply; an `Err` here means
    /// the connection itself failed.
    pub fn dispatch(&self, client: &Arc<ClientConnection>, mut request: Request) -> io::Result<Flow> {
        let sequence = client.next_sequence();
        let opcode = request.opcode;
        let minor = if opcode >= FIRST_EXTENSION_OPCODE {
            request.data as u16
        } else {
            0
        };

        let Some(handler) = self.dispatcher.get(opcode) else {
            log::warn!(
                "client {}: unknown opcode {} (seq {})",
                client.client_id(),
                opcode,
                sequence
            );
            if self.config.strict_opcodes {
                client.send_error(&X11Error::bad_request(opcode).stamp(sequence, opcode, minor))?;
                return Ok(Flow::Close);
            }
            return Ok(Flow::Continue);
        };

        log::debug!(
            "client {}: seq {} {}",
            client.client_id(),
            sequence,
            RequestOpcode::from_u8(opcode).map_or("extension", |op| op.as_str())
        );

        let ctx = RequestContext {
            server: self,
            client,
            sequence,
        };
        match handler.handle(&ctx, &mut request) {
            Ok(reply) => {
                if request.body.remaining() > 0 {
                    log::warn!(
                        "client {}: opcode {} left {} bytes unread",
                        client.client_id(),
                        opcode,
                        request.body.remaining()
                    );
                }
                if let Some(reply) = reply {
                    client.send_reply(&reply, sequence)?;
                }
                Ok(Flow::Continue)
            }
            Err(error) => {
                let fatal = error.fatal;
                client.send_error(&error.stamp(sequence, opcode, minor))?;
                Ok(if fatal { Flow::Close } else { Flow::Continue })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::MemorySurface;
    use crate::backend::{BackendResult, DrawTarget, HostDisplay, Surface};
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<StdMutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn take(&self) -> Vec<u8> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    /// Write out what the client has queued and return it
    fn drain(client: &ClientConnection, out: &SharedBuf) -> Vec<u8> {
        client.flush().unwrap();
        out.take()
    }

    fn request(opcode: u8, data: u8, body: Vec<u8>) -> Request {
        Request {
            opcode,
            data,
            body: WireReader::new(body, ByteOrder::LSBFirst),
        }
    }

    fn server_with_client() -> (Server, Arc<ClientConnection>, SharedBuf) {
        let server = Server::new(ServerConfig::default(), Host::headless());
        let out = SharedBuf::default();
        let client = server
            .register_client(ByteOrder::LSBFirst, Box::new(out.clone()))
            .unwrap();
        (server, client, out)
    }

    #[test]
    fn test_setup_reply_ids() {
        let (server, client, _) = server_with_client();
        let setup = server.setup_reply(client.client_id());
        assert_eq!(setup.resource_id_base, 0x200000);
        assert_eq!(setup.resource_id_mask, 0x1FFFFF);
        assert_eq!(setup.roots[0].root, ROOT_WINDOW);
        assert_eq!(setup.vendor, "x11core");
        assert_eq!(server.extensions().query("BIG-REQUESTS").unwrap().major_opcode, 128);
    }

    #[test]
    fn test_error_in_place_of_reply() {
        let (server, client, out) = server_with_client();
        // MapWindow on a window that does not exist
        let flow = server
            .dispatch(&client, request(8, 0, 0x0020_0005u32.to_le_bytes().to_vec()))
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        let bytes = drain(&client, &out);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[1], ErrorCode::Window as u8);
        assert_eq!(&bytes[2..4], &[1, 0]);
        assert_eq!(&bytes[4..8], &0x0020_0005u32.to_le_bytes());
        assert_eq!(bytes[10], 8);
    }

    #[test]
    fn test_unknown_opcode_advances_sequence() {
        let (server, client, out) = server_with_client();
        assert_eq!(server.dispatch(&client, request(6, 0, vec![])).unwrap(), Flow::Continue);
        assert!(drain(&client, &out).is_empty());
        // GetInputFocus
        server.dispatch(&client, request(43, 0, vec![])).unwrap();
        let bytes = drain(&client, &out);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[2..4], &[2, 0]);
    }

    #[test]
    fn test_strict_mode_closes() {
        let config = ServerConfig {
            strict_opcodes: true,
            ..ServerConfig::default()
        };
        let server = Server::new(config, Host::headless());
        let out = SharedBuf::default();
        let client = server
            .register_client(ByteOrder::LSBFirst, Box::new(out.clone()))
            .unwrap();
        assert_eq!(server.dispatch(&client, request(6, 0, vec![])).unwrap(), Flow::Close);
        assert_eq!(drain(&client, &out)[1], ErrorCode::Request as u8);
    }

    #[test]
    fn test_underrun_is_fatal_length_error() {
        let (server, client, out) = server_with_client();
        // CreateWindow with a truncated body
        let flow = server.dispatch(&client, request(1, 0, vec![0; 8])).unwrap();
        assert_eq!(flow, Flow::Close);
        assert_eq!(drain(&client, &out)[1], ErrorCode::Length as u8);
    }

    #[test]
    fn test_unregister_drops_subscriptions() {
        let (server, client, _) = server_with_client();
        server
            .tree()
            .change_attributes(
                ROOT_WINDOW,
                &[(window::cw::EVENT_MASK, event_mask::SUBSTRUCTURE_REDIRECT)],
                &(Arc::clone(&client) as events::ClientRef),
            )
            .unwrap();
        assert_eq!(server.client_count(), 1);
        server.unregister_client(client.client_id());
        assert_eq!(server.client_count(), 0);
        assert!(client.is_closed());
        let info = server.tree().window_info(ROOT_WINDOW, 0).unwrap();
        assert_eq!(info.all_event_masks, 0);
    }

    #[test]
    fn test_client_indexes_are_reused() {
        let server = Server::new(ServerConfig::default(), Host::headless());
        let register = || server.register_client(ByteOrder::LSBFirst, Box::new(io::sink()));
        let clients: Vec<_> = (0..MAX_CLIENTS).map(|_| register().unwrap()).collect();
        assert_eq!(MAX_CLIENTS, 2047);
        assert_eq!(clients.last().unwrap().client_id(), 2047);
        assert_eq!(
            server.setup_reply(2047).resource_id_base,
            0xFFE0_0000,
            "last index still fits in 32 bits"
        );
        assert_eq!(
            register().err().as_deref(),
            Some("Maximum number of clients reached")
        );

        server.unregister_client(5);
        let reused = register().unwrap();
        assert_eq!(reused.client_id(), 5);
        assert_eq!(server.setup_reply(5).resource_id_base, 5 << 21);
        assert!(register().is_err());
    }

    /// Host that keeps pixels for the root window only
    #[derive(Default)]
    struct ScreenHost {
        screen: StdMutex<Option<MemorySurface>>,
        damage: StdMutex<Vec<Rectangle>>,
    }

    impl HostDisplay for ScreenHost {
        fn on_window_mapped(&self, _window: Window) -> bool {
            true
        }

        fn on_content_changed(&self, _window: Window, area: Rectangle) {
            self.damage.lock().unwrap().push(area);
        }

        fn on_geometry_changed(&self, _window: Window, _geometry: Rectangle, _bw: u16) {}

        fn draw_window(&self, window: Window, draw: &mut dyn FnMut(&mut dyn DrawTarget)) -> bool {
            if window != ROOT_WINDOW {
                return false;
            }
            let mut screen = self.screen.lock().unwrap();
            draw(screen.get_or_insert_with(|| MemorySurface::new(64, 64)));
            true
        }

        fn create_surface(&self, w: u16, h: u16, _depth: u8) -> BackendResult<Box<dyn Surface>> {
            Ok(Box::new(MemorySurface::new(w, h)))
        }
    }

    #[test]
    fn test_window_drawing_goes_through_host() {
        let display = Arc::new(ScreenHost::default());
        let host = Host {
            display: Arc::clone(&display) as Arc<dyn HostDisplay>,
            ..Host::headless()
        };
        let config = ServerConfig {
            screen: ScreenConfig::with_size(64, 64),
            ..ServerConfig::default()
        };
        let server = Server::new(config, host);
        let out = SharedBuf::default();
        let client = server
            .register_client(ByteOrder::LSBFirst, Box::new(out.clone()))
            .unwrap();
        let words = |values: &[u32]| -> Vec<u8> {
            values.iter().flat_map(|v| v.to_le_bytes()).collect()
        };

        // CreateGC with a green foreground, then fill (2, 2, 3, 3) on the root
        let gc = 0x0020_0001;
        server
            .dispatch(&client, request(55, 0, words(&[gc, ROOT_WINDOW.get(), 1 << 2, 0x00FF00])))
            .unwrap();
        let mut fill = words(&[ROOT_WINDOW.get(), gc]);
        fill.extend_from_slice(&[2, 0, 2, 0, 3, 0, 3, 0]);
        server.dispatch(&client, request(70, 0, fill)).unwrap();
        assert!(drain(&client, &out).is_empty(), "no errors");

        {
            let screen = display.screen.lock().unwrap();
            let pixels = screen.as_ref().expect("root drawn").pixels();
            assert_eq!(pixels[2 * 64 + 2], 0x00FF00);
            assert_eq!(pixels[4 * 64 + 4], 0x00FF00);
            assert_eq!(pixels[5 * 64 + 5], 0);
        }
        let damage = display.damage.lock().unwrap().clone();
        assert!(damage.iter().any(|d| d.intersects(&Rectangle::new(2, 2, 3, 3))));

        // GetImage reads the host's pixels back
        let mut get = words(&[ROOT_WINDOW.get()]);
        get.extend_from_slice(&[3, 0, 3, 0, 1, 0, 1, 0]);
        get.extend_from_slice(&words(&[u32::MAX]));
        server.dispatch(&client, request(73, 2, get)).unwrap();
        let bytes = drain(&client, &out);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1], ROOT_DEPTH);
        assert_eq!(&bytes[32..36], &0x00FF00u32.to_le_bytes());
    }

    #[test]
    fn test_focus_reverts_on_destroy() {
        let (server, _, _) = server_with_client();
        let w = Window::new(0x200000);
        server.set_focus(w, 2, server.timestamp());
        assert_eq!(server.focus().window, w);
        server.windows_destroyed(Some(ROOT_WINDOW), &[w]);
        let focus = server.focus();
        assert_eq!(focus.window, ROOT_WINDOW);
        assert_eq!(focus.revert_to, 0);
    }
}
