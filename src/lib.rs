//! x11core - the engine of an X11 display server
//!
//! Wire codec, window tree, event routing and request dispatch. Pixel
//! storage, fonts, colors and the real display are supplied by the embedder
//! through the traits in [`backend`].

pub mod backend;
pub mod connection;
pub mod protocol;
pub mod resources;
pub mod security;
pub mod server;

pub use backend::Host;
pub use protocol::{Atom, GContext, Pixmap, Window};
pub use server::{serve, Server, ServerConfig};

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
