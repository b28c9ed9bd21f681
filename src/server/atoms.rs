//! Atom table
//!
//! Bidirectional name/id intern table. The 68 predefined atoms occupy ids
//! 1..=68; interned names get increasing ids after that and are never freed.

use crate::protocol::*;
use crate::resources::lock;
use std::collections::HashMap;
use std::sync::Mutex;

/// Predefined atom names, id = index + 1
pub const PREDEFINED_ATOMS: [&str; 68] = [
    "PRIMARY",
    "SECONDARY",
    "ARC",
    "ATOM",
    "BITMAP",
    "CARDINAL",
    "COLORMAP",
    "CURSOR",
    "CUT_BUFFER0",
    "CUT_BUFFER1",
    "CUT_BUFFER2",
    "CUT_BUFFER3",
    "CUT_BUFFER4",
    "CUT_BUFFER5",
    "CUT_BUFFER6",
    "CUT_BUFFER7",
    "DRAWABLE",
    "FONT",
    "INTEGER",
    "PIXMAP",
    "POINT",
    "RECTANGLE",
    "RESOURCE_MANAGER",
    "RGB_COLOR_MAP",
    "RGB_BEST_MAP",
    "RGB_BLUE_MAP",
    "RGB_DEFAULT_MAP",
    "RGB_GRAY_MAP",
    "RGB_GREEN_MAP",
    "RGB_RED_MAP",
    "STRING",
    "VISUALID",
    "WINDOW",
    "WM_COMMAND",
    "WM_HINTS",
    "WM_CLIENT_MACHINE",
    "WM_ICON_NAME",
    "WM_ICON_SIZE",
    "WM_NAME",
    "WM_NORMAL_HINTS",
    "WM_SIZE_HINTS",
    "WM_ZOOM_HINTS",
    "MIN_SPACE",
    "NORM_SPACE",
    "MAX_SPACE",
    "END_SPACE",
    "SUPERSCRIPT_X",
    "SUPERSCRIPT_Y",
    "SUBSCRIPT_X",
    "SUBSCRIPT_Y",
    "UNDERLINE_POSITION",
    "UNDERLINE_THICKNESS",
    "STRIKEOUT_ASCENT",
    "STRIKEOUT_DESCENT",
    "ITALIC_ANGLE",
    "X_HEIGHT",
    "QUAD_WIDTH",
    "WEIGHT",
    "POINT_SIZE",
    "RESOLUTION",
    "COPYRIGHT",
    "NOTICE",
    "FONT_NAME",
    "FAMILY_NAME",
    "FULL_NAME",
    "CAP_HEIGHT",
    "WM_CLASS",
    "WM_TRANSIENT_FOR",
];

struct AtomState {
    by_name: HashMap<String, Atom>,
    names: Vec<String>,
}

pub struct AtomTable {
    state: Mutex<AtomState>,
}

impl AtomTable {
    pub fn new() -> Self {
        let names: Vec<String> = PREDEFINED_ATOMS.iter().map(|s| s.to_string()).collect();
        let by_name = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), Atom::new(i as u32 + 1)))
            .collect();
        AtomTable {
            state: Mutex::new(AtomState { by_name, names }),
        }
    }

    /// Look up or create an atom. With `only_if_exists`, a missing name
    /// yields `Atom::NONE` instead of a new atom.
    pub fn intern(&self, name: &str, only_if_exists: bool) -> X11Result<Atom> {
        if name.is_empty() {
            return Err(X11Error::bad_value(0));
        }
        let mut state = lock(&self.state);
        if let Some(atom) = state.by_name.get(name) {
            return Ok(*atom);
        }
        if only_if_exists {
            return Ok(Atom::NONE);
        }
        let id = state.names.len() as u32 + 1;
        if id > 0x1FFF_FFFF {
            return Err(X11Error::bad_alloc());
        }
        let atom = Atom::new(id);
        state.names.push(name.to_string());
        state.by_name.insert(name.to_string(), atom);
        Ok(atom)
    }

    pub fn name(&self, atom: Atom) -> X11Result<String> {
        let state = lock(&self.state);
        atom.get()
            .checked_sub(1)
            .and_then(|index| state.names.get(index as usize))
            .cloned()
            .ok_or_else(|| X11Error::bad_atom(atom.get()))
    }

    /// Atom must name an existing entry
    pub fn validate(&self, atom: Atom) -> X11Result<()> {
        let count = lock(&self.state).names.len() as u32;
        if atom.get() == 0 || atom.get() > count {
            return Err(X11Error::bad_atom(atom.get()));
        }
        Ok(())
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}
