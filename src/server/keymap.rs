//! Built-in US keyboard layout
//!
//! Keycodes follow the evdev numbering most X servers use. Each keycode
//! carries two keysyms, unshifted then shifted; unassigned codes are
//! NoSymbol.

use crate::protocol::*;

pub const MIN_KEYCODE: u8 = 8;
pub const MAX_KEYCODE: u8 = 255;
pub const KEYSYMS_PER_KEYCODE: u8 = 2;
pub const KEYCODES_PER_MODIFIER: u8 = 2;

const NO_SYMBOL: u32 = 0;

/// (keycode, unshifted, shifted)
const LAYOUT: &[(u8, u32, u32)] = &[
    (9, 0xFF1B, 0xFF1B), // Escape
    (10, 0x31, 0x21),
    (11, 0x32, 0x40),
    (12, 0x33, 0x23),
    (13, 0x34, 0x24),
    (14, 0x35, 0x25),
    (15, 0x36, 0x5E),
    (16, 0x37, 0x26),
    (17, 0x38, 0x2A),
    (18, 0x39, 0x28),
    (19, 0x30, 0x29),
    (20, 0x2D, 0x5F),
    (21, 0x3D, 0x2B),
    (22, 0xFF08, 0xFF08), // BackSpace
    (23, 0xFF09, 0xFE20), // Tab, ISO_Left_Tab
    (24, 0x71, 0x51),
    (25, 0x77, 0x57),
    (26, 0x65, 0x45),
    (27, 0x72, 0x52),
    (28, 0x74, 0x54),
    (29, 0x79, 0x59),
    (30, 0x75, 0x55),
    (31, 0x69, 0x49),
    (32, 0x6F, 0x4F),
    (33, 0x70, 0x50),
    (34, 0x5B, 0x7B),
    (35, 0x5D, 0x7D),
    (36, 0xFF0D, 0xFF0D), // Return
    (37, 0xFFE3, 0xFFE3), // Control_L
    (38, 0x61, 0x41),
    (39, 0x73, 0x53),
    (40, 0x64, 0x44),
    (41, 0x66, 0x46),
    (42, 0x67, 0x47),
    (43, 0x68, 0x48),
    (44, 0x6A, 0x4A),
    (45, 0x6B, 0x4B),
    (46, 0x6C, 0x4C),
    (47, 0x3B, 0x3A),
    (48, 0x27, 0x22),
    (49, 0x60, 0x7E),
    (50, 0xFFE1, 0xFFE1), // Shift_L
    (51, 0x5C, 0x7C),
    (52, 0x7A, 0x5A),
    (53, 0x78, 0x58),
    (54, 0x63, 0x43),
    (55, 0x76, 0x56),
    (56, 0x62, 0x42),
    (57, 0x6E, 0x4E),
    (58, 0x6D, 0x4D),
    (59, 0x2C, 0x3C),
    (60, 0x2E, 0x3E),
    (61, 0x2F, 0x3F),
    (62, 0xFFE2, 0xFFE2), // Shift_R
    (64, 0xFFE9, 0xFFE9), // Alt_L
    (65, 0x20, 0x20),
    (66, 0xFFE5, 0xFFE5), // Caps_Lock
    (105, 0xFFE4, 0xFFE4), // Control_R
    (108, 0xFFEA, 0xFFEA), // Alt_R
    (110, 0xFF50, 0xFF50), // Home
    (111, 0xFF52, 0xFF52), // Up
    (113, 0xFF51, 0xFF51), // Left
    (114, 0xFF53, 0xFF53), // Right
    (115, 0xFF57, 0xFF57), // End
    (116, 0xFF54, 0xFF54), // Down
    (119, 0xFFFF, 0xFFFF), // Delete
];

/// Keycodes per modifier, Shift through Mod5; 0 is unused
const MODIFIERS: [[u8; KEYCODES_PER_MODIFIER as usize]; 8] = [
    [50, 62],  // Shift
    [66, 0],   // Lock
    [37, 105], // Control
    [64, 108], // Mod1
    [0, 0],
    [0, 0],
    [0, 0],
    [0, 0],
];

/// Keysyms for `count` keycodes from `first`, [`KEYSYMS_PER_KEYCODE`] each
pub fn keyboard_mapping(first: u8, count: u8) -> X11Result<Vec<u32>> {
    let last = first as u32 + count as u32;
    if first < MIN_KEYCODE || count == 0 || last - 1 > MAX_KEYCODE as u32 {
        return Err(X11Error::bad_value(if first < MIN_KEYCODE {
            first as u32
        } else {
            count as u32
        }));
    }
    let mut keysyms = vec![NO_SYMBOL; count as usize * KEYSYMS_PER_KEYCODE as usize];
    for &(code, plain, shifted) in LAYOUT {
        if (first as u32..last).contains(&(code as u32)) {
            let at = (code - first) as usize * KEYSYMS_PER_KEYCODE as usize;
            keysyms[at] = plain;
            keysyms[at + 1] = shifted;
        }
    }
    Ok(keysyms)
}

/// The modifier map in GetModifierMapping order
pub fn modifier_mapping() -> impl Iterator<Item = u8> {
    MODIFIERS.into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_have_shifted_capitals() {
        let keysyms = keyboard_mapping(38, 1).unwrap();
        assert_eq!(keysyms, vec![0x61, 0x41]);
        let all = keyboard_mapping(MIN_KEYCODE, MAX_KEYCODE - MIN_KEYCODE + 1).unwrap();
        assert_eq!(all.len(), 248 * 2);
        // Keycode 8 has no symbol; 9 is Escape
        assert_eq!(&all[..4], &[0, 0, 0xFF1B, 0xFF1B]);
    }

    #[test]
    fn test_range_checks() {
        assert!(keyboard_mapping(7, 1).is_err());
        assert!(keyboard_mapping(8, 0).is_err());
        assert!(keyboard_mapping(255, 1).is_ok());
        assert!(keyboard_mapping(250, 7).is_err());
    }

    #[test]
    fn test_modifier_map_shape() {
        let map: Vec<u8> = modifier_mapping().collect();
        assert_eq!(map.len(), 16);
        assert_eq!(&map[..4], &[50, 62, 66, 0]);
    }
}
