//! Event routing
//!
//! Each window keeps one [`Subscriptions`] list: the event mask every client
//! selected on it. An event reaches a subscriber when the subscriber's mask
//! contains every bit the event requires.

use crate::protocol::*;
use std::io;
use std::sync::Arc;

/// Anything that can receive events on behalf of a client
pub trait EventSink: Send + Sync {
    fn client_id(&self) -> u32;
    fn send_event(&self, event: &Event) -> io::Result<()>;
}

pub type ClientRef = Arc<dyn EventSink>;

/// Deliver to one sink, logging rather than propagating a dead peer
pub fn send_to(client: &ClientRef, event: &Event) {
    if let Err(e) = client.send_event(event) {
        log::debug!(
            "dropping {:?} for client {}: {}",
            event.event_type(),
            client.client_id(),
            e
        );
    }
}

struct Subscription {
    client: ClientRef,
    mask: u32,
}

/// Per-window event selections, at most one per client
#[derive(Default)]
pub struct Subscriptions {
    entries: Vec<Subscription>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Subscriptions::default()
    }

    /// Set `client`'s mask. A zero mask removes the subscription.
    ///
    /// Fails with Access if the mask claims an exclusive bit another client
    /// already holds on this window.
    pub fn select(&mut self, client: &ClientRef, mask: u32) -> X11Result<()> {
        let id = client.client_id();
        let exclusive = mask & event_mask::EXCLUSIVE;
        if exclusive != 0 {
            let taken = self
                .entries
                .iter()
                .filter(|s| s.client.client_id() != id)
                .any(|s| s.mask & exclusive != 0);
            if taken {
                return Err(X11Error::bad_access(mask));
            }
        }

        match self.entries.iter().position(|s| s.client.client_id() == id) {
            Some(index) if mask == 0 => {
                self.entries.remove(index);
            }
            Some(index) => self.entries[index].mask = mask,
            None if mask == 0 => {}
            None => self.entries.push(Subscription {
                client: Arc::clone(client),
                mask,
            }),
        }
        Ok(())
    }

    pub fn mask_for(&self, client_id: u32) -> u32 {
        self.entries
            .iter()
            .find(|s| s.client.client_id() == client_id)
            .map_or(0, |s| s.mask)
    }

    /// Union of every client's mask
    pub fn all_masks(&self) -> u32 {
        self.entries.iter().fold(0, |acc, s| acc | s.mask)
    }

    pub fn remove_client(&mut self, client_id: u32) {
        self.entries.retain(|s| s.client.client_id() != client_id);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Send `event` to every subscriber whose mask covers `required`.
    /// Returns the number of clients it was sent to.
    pub fn deliver(&self, event: &Event, required: u32) -> usize {
        let mut delivered = 0;
        for sub in &self.entries {
            if sub.mask & required == required {
                send_to(&sub.client, event);
                delivered += 1;
            }
        }
        delivered
    }
}
