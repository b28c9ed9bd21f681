//! Host collaborators
//!
//! Traits the server calls out to for pixel storage, fonts, colors and the
//! display that mirrors the window tree, plus null implementations.

mod r#trait;
pub use r#trait::*;

pub mod null;
