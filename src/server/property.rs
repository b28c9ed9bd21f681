//! Window properties
//!
//! Each window owns a [`PropertyStore`] keyed by atom. Values are raw bytes
//! tagged with a type atom and an element width of 8, 16 or 32 bits.

use crate::protocol::*;
use std::collections::BTreeMap;

/// ChangeProperty mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyMode {
    Replace = 0,
    Prepend = 1,
    Append = 2,
}

impl PropertyMode {
    pub fn from_u8(value: u8) -> X11Result<Self> {
        match value {
            0 => Ok(PropertyMode::Replace),
            1 => Ok(PropertyMode::Prepend),
            2 => Ok(PropertyMode::Append),
            _ => Err(X11Error::bad_value(value as u32)),
        }
    }
}

/// Stored property value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub type_: Atom,
    pub format: u8,
    pub data: Vec<u8>,
}

/// Result of a GetProperty read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRead {
    /// Stored type, or NONE when the property does not exist
    pub type_: Atom,
    pub format: u8,
    pub bytes_after: u32,
    pub value: Vec<u8>,
    /// The read removed the property
    pub deleted: bool,
}

impl PropertyRead {
    fn missing() -> Self {
        PropertyRead {
            type_: Atom::NONE,
            format: 0,
            bytes_after: 0,
            value: Vec::new(),
            deleted: false,
        }
    }

    /// Length of `value` in format units
    pub fn value_len(&self) -> u32 {
        match self.format {
            8 | 16 | 32 => (self.value.len() / (self.format as usize / 8)) as u32,
            _ => 0,
        }
    }
}

/// GetProperty's "any type" wildcard
pub const ANY_PROPERTY_TYPE: Atom = Atom::NONE;

#[derive(Debug, Default)]
pub struct PropertyStore {
    props: BTreeMap<Atom, Property>,
}

impl PropertyStore {
    pub fn new() -> Self {
        PropertyStore::default()
    }

    /// Replace, prepend or append data. An existing property with a different
    /// type or format is a Match error in every mode.
    pub fn change(
        &mut self,
        atom: Atom,
        type_: Atom,
        format: u8,
        mode: PropertyMode,
        data: Vec<u8>,
    ) -> X11Result<()> {
        if !matches!(format, 8 | 16 | 32) {
            return Err(X11Error::bad_value(format as u32));
        }
        match self.props.get_mut(&atom) {
            Some(existing) => {
                if existing.type_ != type_ || existing.format != format {
                    return Err(X11Error::bad_match(atom.get()));
                }
                match mode {
                    PropertyMode::Replace => existing.data = data,
                    PropertyMode::Prepend => {
                        let mut merged = data;
                        merged.extend_from_slice(&existing.data);
                        existing.data = merged;
                    }
                    PropertyMode::Append => existing.data.extend_from_slice(&data),
                }
            }
            None => {
                self.props.insert(
                    atom,
                    Property {
                        type_,
                        format,
                        data,
                    },
                );
            }
        }
        Ok(())
    }

    /// Remove a property, reporting whether it existed
    pub fn delete(&mut self, atom: Atom) -> bool {
        self.props.remove(&atom).is_some()
    }

    pub fn get_raw(&self, atom: Atom) -> Option<&Property> {
        self.props.get(&atom)
    }

    /// GetProperty semantics: `offset` and `length` are in 4-byte units, a
    /// type mismatch returns only the stored type, format and size, and
    /// `delete` applies only when the read reached the end.
    pub fn read(
        &mut self,
        atom: Atom,
        type_: Atom,
        offset: u32,
        length: u32,
        delete: bool,
    ) -> X11Result<PropertyRead> {
        let prop = match self.props.get(&atom) {
            Some(p) => p,
            None => return Ok(PropertyRead::missing()),
        };

        let size = prop.data.len();
        if type_ != ANY_PROPERTY_TYPE && type_ != prop.type_ {
            return Ok(PropertyRead {
                type_: prop.type_,
                format: prop.format,
                bytes_after: size as u32,
                value: Vec::new(),
                deleted: false,
            });
        }

        let start = offset as usize * 4;
        if start > size {
            return Err(X11Error::bad_value(offset));
        }
        let take = (size - start).min(length as usize * 4);
        let bytes_after = size - (start + take);
        let mut result = PropertyRead {
            type_: prop.type_,
            format: prop.format,
            bytes_after: bytes_after as u32,
            value: prop.data[start..start + take].to_vec(),
            deleted: false,
        };

        if delete && bytes_after == 0 {
            self.props.remove(&atom);
            result.deleted = true;
        }
        Ok(result)
    }

    /// Property atoms in ascending order
    pub fn list(&self) -> Vec<Atom> {
        self.props.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}
