//! Selection ownership
//!
//! Per selection atom: the owning window and the time of the last successful
//! claim. A claim older than the stored time, or from the future, is ignored.

use crate::protocol::*;
use crate::resources::lock;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SelectionOwner {
    owner: Window,
    time: Timestamp,
}

/// What a SetSelectionOwner did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerChange {
    /// Timestamp check failed; nothing changed
    Ignored,
    /// Ownership recorded; `previous` must be sent SelectionClear
    Changed { previous: Option<Window> },
}

#[derive(Default)]
pub struct SelectionManager {
    owners: Mutex<HashMap<Atom, SelectionOwner>>,
}

impl SelectionManager {
    pub fn new() -> Self {
        SelectionManager::default()
    }

    /// Claim (or with `Window::NONE`, release) a selection at `time`, already
    /// resolved from CurrentTime by the caller.
    pub fn set_owner(
        &self,
        selection: Atom,
        owner: Window,
        time: Timestamp,
        now: Timestamp,
    ) -> OwnerChange {
        let mut owners = lock(&self.owners);
        let current = owners.get(&selection).copied();
        let last_time = current.map_or(Timestamp(0), |c| c.time);
        if time < last_time || time > now {
            return OwnerChange::Ignored;
        }

        let previous = current
            .map(|c| c.owner)
            .filter(|prev| *prev != Window::NONE && *prev != owner);

        if owner == Window::NONE {
            // Releasing keeps the last claim time so stale claims stay rejected
            owners.insert(
                selection,
                SelectionOwner {
                    owner,
                    time: last_time,
                },
            );
        } else {
            owners.insert(selection, SelectionOwner { owner, time });
        }
        OwnerChange::Changed { previous }
    }

    pub fn owner(&self, selection: Atom) -> Window {
        lock(&self.owners)
            .get(&selection)
            .map_or(Window::NONE, |c| c.owner)
    }

    /// Drop ownership held by destroyed windows
    pub fn forget_windows(&self, windows: &[Window]) {
        let mut owners = lock(&self.owners);
        for entry in owners.values_mut() {
            if windows.contains(&entry.owner) {
                entry.owner = Window::NONE;
            }
        }
    }
}
