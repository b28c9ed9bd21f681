//! Window tree
//!
//! All windows live in one map guarded by a single lock, so a parent and its
//! children are always updated together. A child holds its parent's id; the
//! parent owns the ordered child list (index 0 is the bottom of the stack).
//!
//! Events raised by a mutation are delivered while the lock is still held,
//! so no reader observes a half-applied change. Host callbacks run after the
//! lock is released.

use super::events::{send_to, ClientRef, Subscriptions};
use super::property::{PropertyMode, PropertyRead, PropertyStore};
use crate::backend::HostDisplay;
use crate::protocol::*;
use crate::resources::lock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Window flag: MapWindow was requested
pub const MAPPED: u8 = 0x01;
/// Window flag: the host has a surface attached and showing it
pub const VISIBLE: u8 = 0x02;

/// Window attribute value-list bits
pub mod cw {
    pub const BACK_PIXMAP: u32 = 1 << 0;
    pub const BACK_PIXEL: u32 = 1 << 1;
    pub const BORDER_PIXMAP: u32 = 1 << 2;
    pub const BORDER_PIXEL: u32 = 1 << 3;
    pub const BIT_GRAVITY: u32 = 1 << 4;
    pub const WIN_GRAVITY: u32 = 1 << 5;
    pub const BACKING_STORE: u32 = 1 << 6;
    pub const BACKING_PLANES: u32 = 1 << 7;
    pub const BACKING_PIXEL: u32 = 1 << 8;
    pub const OVERRIDE_REDIRECT: u32 = 1 << 9;
    pub const SAVE_UNDER: u32 = 1 << 10;
    pub const EVENT_MASK: u32 = 1 << 11;
    pub const DONT_PROPAGATE: u32 = 1 << 12;
    pub const COLORMAP: u32 = 1 << 13;
    pub const CURSOR: u32 = 1 << 14;
    pub const ALL: u32 = (1 << 15) - 1;
}

/// ConfigureWindow value-list bits
pub mod config {
    pub const X: u32 = 1 << 0;
    pub const Y: u32 = 1 << 1;
    pub const WIDTH: u32 = 1 << 2;
    pub const HEIGHT: u32 = 1 << 3;
    pub const BORDER_WIDTH: u32 = 1 << 4;
    pub const SIBLING: u32 = 1 << 5;
    pub const STACK_MODE: u32 = 1 << 6;
    pub const ALL: u32 = (1 << 7) - 1;
}

/// Settable window attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowAttributes {
    /// 0 = None, 1 = ParentRelative, otherwise a pixmap
    pub background_pixmap: u32,
    pub background_pixel: Option<u32>,
    /// 0 = CopyFromParent, otherwise a pixmap
    pub border_pixmap: u32,
    pub border_pixel: Option<u32>,
    pub bit_gravity: u8,
    pub win_gravity: u8,
    pub backing_store: u8,
    pub backing_planes: u32,
    pub backing_pixel: u32,
    pub override_redirect: bool,
    pub save_under: bool,
    pub do_not_propagate_mask: u16,
    pub colormap: Colormap,
    pub cursor: u32,
}

impl WindowAttributes {
    fn inherit(colormap: Colormap) -> Self {
        WindowAttributes {
            background_pixmap: 0,
            background_pixel: None,
            border_pixmap: 0,
            border_pixel: None,
            bit_gravity: 0,
            win_gravity: 1,
            backing_store: 0,
            backing_planes: u32::MAX,
            backing_pixel: 0,
            override_redirect: false,
            save_under: false,
            do_not_propagate_mask: 0,
            colormap,
            cursor: 0,
        }
    }
}

fn ranged(value: u32, max: u32) -> X11Result<u8> {
    if value > max {
        return Err(X11Error::bad_value(value));
    }
    Ok(value as u8)
}

type AttributeSetter = fn(&mut WindowAttributes, u32) -> X11Result<()>;

/// Attribute decoders in bit order. The event-mask slot is handled by the
/// tree since it updates the caller's subscription rather than the window.
const WINDOW_ATTRIBUTES: [(u32, AttributeSetter); 15] = [
    (cw::BACK_PIXMAP, |a, v| {
        a.background_pixmap = v;
        a.background_pixel = None;
        Ok(())
    }),
    (cw::BACK_PIXEL, |a, v| {
        a.background_pixel = Some(v);
        Ok(())
    }),
    (cw::BORDER_PIXMAP, |a, v| {
        a.border_pixmap = v;
        a.border_pixel = None;
        Ok(())
    }),
    (cw::BORDER_PIXEL, |a, v| {
        a.border_pixel = Some(v);
        Ok(())
    }),
    (cw::BIT_GRAVITY, |a, v| {
        a.bit_gravity = ranged(v, 10)?;
        Ok(())
    }),
    (cw::WIN_GRAVITY, |a, v| {
        a.win_gravity = ranged(v, 10)?;
        Ok(())
    }),
    (cw::BACKING_STORE, |a, v| {
        a.backing_store = ranged(v, 2)?;
        Ok(())
    }),
    (cw::BACKING_PLANES, |a, v| {
        a.backing_planes = v;
        Ok(())
    }),
    (cw::BACKING_PIXEL, |a, v| {
        a.backing_pixel = v;
        Ok(())
    }),
    (cw::OVERRIDE_REDIRECT, |a, v| {
        a.override_redirect = ranged(v, 1)? != 0;
        Ok(())
    }),
    (cw::SAVE_UNDER, |a, v| {
        a.save_under = ranged(v, 1)? != 0;
        Ok(())
    }),
    (cw::EVENT_MASK, |_, _| Ok(())),
    (cw::DONT_PROPAGATE, |a, v| {
        if v & !event_mask::ALL != 0 {
            return Err(X11Error::bad_value(v));
        }
        a.do_not_propagate_mask = v as u16;
        Ok(())
    }),
    (cw::COLORMAP, |a, v| {
        // CopyFromParent keeps the inherited map
        if v != 0 {
            a.colormap = Colormap::new(v);
        }
        Ok(())
    }),
    (cw::CURSOR, |a, v| {
        a.cursor = v;
        Ok(())
    }),
];

/// One node of the tree
pub struct WindowNode {
    pub id: Window,
    pub parent: Option<Window>,
    /// Bottom to top
    pub children: Vec<Window>,
    /// Outer corner relative to the parent, inner size
    pub geometry: Rectangle,
    pub border_width: u16,
    pub depth: u8,
    pub class: WindowClass,
    pub visual: VisualID,
    pub flags: u8,
    pub attributes: WindowAttributes,
    pub properties: PropertyStore,
    pub subscriptions: Subscriptions,
    /// Client that created the window; receives unmasked selection events
    pub owner: Option<ClientRef>,
}

impl WindowNode {
    pub fn is_mapped(&self) -> bool {
        self.flags & MAPPED != 0
    }

    pub fn is_visible(&self) -> bool {
        self.flags & VISIBLE != 0
    }

    /// Drawable area, excluding the border
    pub fn inner_bounds(&self) -> Rectangle {
        let bw = self.border_width as i16;
        Rectangle::new(
            self.geometry.x.saturating_add(bw),
            self.geometry.y.saturating_add(bw),
            self.geometry.width,
            self.geometry.height,
        )
    }

    /// Area including the border
    pub fn outer_bounds(&self) -> Rectangle {
        self.inner_bounds().expand(self.border_width)
    }
}

/// Decoded ConfigureWindow values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureValues {
    pub x: Option<i16>,
    pub y: Option<i16>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub border_width: Option<u16>,
    pub sibling: Option<Window>,
    pub stack_mode: Option<StackMode>,
}

impl ConfigureValues {
    pub fn from_value_list(values: &[(u32, u32)]) -> X11Result<Self> {
        let mut cfg = ConfigureValues::default();
        for &(bit, v) in values {
            match bit {
                config::X => cfg.x = Some(v as i16),
                config::Y => cfg.y = Some(v as i16),
                config::WIDTH | config::HEIGHT if v as u16 == 0 => {
                    return Err(X11Error::bad_value(v));
                }
                config::WIDTH => cfg.width = Some(v as u16),
                config::HEIGHT => cfg.height = Some(v as u16),
                config::BORDER_WIDTH => cfg.border_width = Some(v as u16),
                config::SIBLING => cfg.sibling = Some(Window::new(v)),
                config::STACK_MODE => {
                    cfg.stack_mode = Some(StackMode::from_u32(v).ok_or(X11Error::bad_value(v))?)
                }
                _ => return Err(X11Error::bad_value(bit)),
            }
        }
        if cfg.sibling.is_some() && cfg.stack_mode.is_none() {
            return Err(X11Error::bad_match(0));
        }
        Ok(cfg)
    }
}

/// CreateWindow arguments
#[derive(Debug, Clone)]
pub struct CreateWindowParams {
    pub id: Window,
    pub parent: Window,
    /// 0 copies the parent's depth
    pub depth: u8,
    pub class: WindowClass,
    /// 0 copies the parent's visual
    pub visual: VisualID,
    pub geometry: Rectangle,
    pub border_width: u16,
    pub values: Vec<(u32, u32)>,
}

/// Snapshot for GetWindowAttributes
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub visual: VisualID,
    pub class: WindowClass,
    pub attributes: WindowAttributes,
    pub map_state: MapState,
    pub all_event_masks: u32,
    pub your_event_mask: u32,
}

/// GetGeometry result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub geometry: Rectangle,
    pub border_width: u16,
    pub depth: u8,
}

enum HostNotice {
    Mapped(Window),
    Unmapped(Window),
    Geometry(Window, Rectangle, u16),
    Content(Window, Rectangle),
}

/// Everything guarded by the tree lock
pub struct TreeState {
    nodes: HashMap<Window, WindowNode>,
}

impl TreeState {
    pub fn node(&self, window: Window) -> X11Result<&WindowNode> {
        self.nodes
            .get(&window)
            .ok_or_else(|| X11Error::bad_window(window.get()))
    }

    fn node_mut(&mut self, window: Window) -> X11Result<&mut WindowNode> {
        self.nodes
            .get_mut(&window)
            .ok_or_else(|| X11Error::bad_window(window.get()))
    }

    /// Deliver to the subscribers of one window
    pub fn deliver(&self, window: Window, event: &Event, required: u32) {
        if let Some(node) = self.nodes.get(&window) {
            node.subscriptions.deliver(event, required);
        }
    }

    /// StructureNotify on the window, SubstructureNotify on its parent.
    /// `make` builds the event for a given receiving window.
    fn structure_event(&self, window: Window, make: impl Fn(Window) -> Event) {
        self.deliver(window, &make(window), event_mask::STRUCTURE_NOTIFY);
        if let Some(parent) = self.nodes.get(&window).and_then(|n| n.parent) {
            self.deliver(parent, &make(parent), event_mask::SUBSTRUCTURE_NOTIFY);
        }
    }

    /// Mapped, and every ancestor mapped
    pub fn is_viewable(&self, window: Window) -> bool {
        let mut current = Some(window);
        while let Some(id) = current {
            match self.nodes.get(&id) {
                Some(node) if node.is_mapped() => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn map_state(&self, window: Window) -> MapState {
        match self.nodes.get(&window) {
            Some(node) if node.is_mapped() => {
                if self.is_viewable(window) {
                    MapState::Viewable
                } else {
                    MapState::Unviewable
                }
            }
            _ => MapState::Unmapped,
        }
    }

    /// The sibling directly below in stacking order, or NONE at the bottom
    pub fn sibling_below(&self, window: Window) -> Window {
        let siblings = match self.nodes.get(&window).and_then(|n| n.parent) {
            Some(parent) => &self.nodes[&parent].children,
            None => return Window::NONE,
        };
        match siblings.iter().position(|w| *w == window) {
            Some(index) if index > 0 => siblings[index - 1],
            _ => Window::NONE,
        }
    }

    /// `window` is `ancestor` or lies below it
    pub fn is_inferior_or_self(&self, ancestor: Window, window: Window) -> bool {
        let mut current = Some(window);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// `window` and every mapped descendant reachable through mapped windows
    fn mapped_subtree(&self, window: Window) -> Vec<Window> {
        let mut out = vec![window];
        let mut i = 0;
        while i < out.len() {
            if let Some(node) = self.nodes.get(&out[i]) {
                out.extend(
                    node.children
                        .iter()
                        .filter(|c| self.nodes.get(c).is_some_and(|n| n.is_mapped())),
                );
            }
            i += 1;
        }
        out
    }

    fn map_locked(&mut self, window: Window, notices: &mut Vec<HostNotice>) -> X11Result<()> {
        let node = self.node_mut(window)?;
        if node.is_mapped() {
            return Ok(());
        }
        node.flags |= MAPPED;
        let override_redirect = node.attributes.override_redirect;
        self.structure_event(window, |event| Event::MapNotify {
            event,
            window,
            override_redirect,
        });
        if self.is_viewable(window) {
            notices.extend(
                self.mapped_subtree(window)
                    .into_iter()
                    .map(HostNotice::Mapped),
            );
        }
        Ok(())
    }

    fn unmap_locked(&mut self, window: Window, notices: &mut Vec<HostNotice>) -> X11Result<()> {
        if !self.node(window)?.is_mapped() {
            return Ok(());
        }
        let shown = if self.is_viewable(window) {
            self.mapped_subtree(window)
        } else {
            Vec::new()
        };
        self.node_mut(window)?.flags &= !MAPPED;
        self.structure_event(window, |event| Event::UnmapNotify {
            event,
            window,
            from_configure: false,
        });
        for id in shown {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.flags &= !VISIBLE;
            }
            notices.push(HostNotice::Unmapped(id));
        }
        Ok(())
    }

    /// Post-order teardown: children first, then notify, then unlink
    fn destroy_locked(
        &mut self,
        window: Window,
        destroyed: &mut Vec<Window>,
        notices: &mut Vec<HostNotice>,
    ) {
        let children = match self.nodes.get(&window) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children.into_iter().rev() {
            self.destroy_locked(child, destroyed, notices);
        }

        self.structure_event(window, |event| Event::DestroyNotify { event, window });

        if let Some(node) = self.nodes.remove(&window) {
            if node.is_visible() {
                notices.push(HostNotice::Unmapped(window));
            }
            if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
                parent.children.retain(|c| *c != window);
            }
        }
        destroyed.push(window);
    }

    /// Upper occludes lower: upper is stacked higher, both outer rectangles
    /// overlap, and upper is mapped
    fn occludes(&self, siblings: &[Window], upper: Window, lower: Window) -> bool {
        let index = |w: Window| siblings.iter().position(|s| *s == w);
        let (Some(u), Some(l)) = (index(upper), index(lower)) else {
            return false;
        };
        let (Some(up), Some(low)) = (self.nodes.get(&upper), self.nodes.get(&lower)) else {
            return false;
        };
        u > l && up.is_mapped() && up.outer_bounds().intersects(&low.outer_bounds())
    }

    /// Apply a stack mode. Returns true if the order changed.
    fn restack(&mut self, window: Window, mode: StackMode, sibling: Option<Window>) -> bool {
        let Some(parent) = self.nodes.get(&window).and_then(|n| n.parent) else {
            return false;
        };
        let siblings = self.nodes[&parent].children.clone();
        let others: Vec<Window> = siblings.iter().copied().filter(|s| *s != window).collect();
        let any_above = || others.iter().any(|s| self.occludes(&siblings, *s, window));
        let any_below = || others.iter().any(|s| self.occludes(&siblings, window, *s));

        enum Place {
            Top,
            Bottom,
            Above(Window),
            Below(Window),
        }
        let place = match (mode, sibling) {
            (StackMode::Above, None) => Some(Place::Top),
            (StackMode::Above, Some(s)) => Some(Place::Above(s)),
            (StackMode::Below, None) => Some(Place::Bottom),
            (StackMode::Below, Some(s)) => Some(Place::Below(s)),
            (StackMode::TopIf, Some(s)) => self.occludes(&siblings, s, window).then_some(Place::Top),
            (StackMode::TopIf, None) => any_above().then_some(Place::Top),
            (StackMode::BottomIf, Some(s)) => {
                self.occludes(&siblings, window, s).then_some(Place::Bottom)
            }
            (StackMode::BottomIf, None) => any_below().then_some(Place::Bottom),
            (StackMode::Opposite, Some(s)) => {
                if self.occludes(&siblings, s, window) {
                    Some(Place::Top)
                } else if self.occludes(&siblings, window, s) {
                    Some(Place::Bottom)
                } else {
                    None
                }
            }
            (StackMode::Opposite, None) => {
                if any_above() {
                    Some(Place::Top)
                } else if any_below() {
                    Some(Place::Bottom)
                } else {
                    None
                }
            }
        };
        let Some(place) = place else {
            return false;
        };

        let mut order = others;
        let at = match place {
            Place::Top => order.len(),
            Place::Bottom => 0,
            Place::Above(s) => order.iter().position(|w| *w == s).map_or(order.len(), |i| i + 1),
            Place::Below(s) => order.iter().position(|w| *w == s).unwrap_or(0),
        };
        order.insert(at, window);
        let changed = order != siblings;
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children = order;
        }
        changed
    }
}

/// The window hierarchy rooted at the screen's root window
pub struct WindowTree {
    root: Window,
    state: Mutex<TreeState>,
    host: Arc<dyn HostDisplay>,
}

impl WindowTree {
    pub fn new(
        root: Window,
        size: (u16, u16),
        depth: u8,
        visual: VisualID,
        colormap: Colormap,
        host: Arc<dyn HostDisplay>,
    ) -> Self {
        let mut attributes = WindowAttributes::inherit(colormap);
        attributes.background_pixel = Some(0);
        let node = WindowNode {
            id: root,
            parent: None,
            children: Vec::new(),
            geometry: Rectangle::new(0, 0, size.0, size.1),
            border_width: 0,
            depth,
            class: WindowClass::InputOutput,
            visual,
            flags: MAPPED | VISIBLE,
            attributes,
            properties: PropertyStore::new(),
            subscriptions: Subscriptions::new(),
            owner: None,
        };
        let mut nodes = HashMap::new();
        nodes.insert(root, node);
        WindowTree {
            root,
            state: Mutex::new(TreeState { nodes }),
            host,
        }
    }

    pub fn root(&self) -> Window {
        self.root
    }

    /// Lock the whole tree. Callers must not hold it across host callbacks.
    pub fn lock(&self) -> MutexGuard<'_, TreeState> {
        lock(&self.state)
    }

    fn flush_host(&self, notices: Vec<HostNotice>) {
        for notice in notices {
            match notice {
                HostNotice::Mapped(window) => {
                    if self.host.on_window_mapped(window) {
                        self.set_visible(window, true);
                    }
                }
                HostNotice::Unmapped(window) => self.host.on_window_unmapped(window),
                HostNotice::Geometry(window, geometry, border_width) => {
                    self.host.on_geometry_changed(window, geometry, border_width)
                }
                HostNotice::Content(window, area) => self.host.on_content_changed(window, area),
            }
        }
    }

    pub fn exists(&self, window: Window) -> bool {
        self.lock().nodes.contains_key(&window)
    }

    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Host attach/detach. Attaching a viewable window exposes it.
    pub fn set_visible(&self, window: Window, visible: bool) {
        let mut st = self.lock();
        let viewable = st.is_viewable(window);
        let Some(node) = st.nodes.get_mut(&window) else {
            return;
        };
        if !visible {
            node.flags &= !VISIBLE;
            return;
        }
        if !viewable || node.is_visible() {
            return;
        }
        node.flags |= VISIBLE;
        if node.class == WindowClass::InputOnly {
            return;
        }
        let area = Rectangle::new(0, 0, node.geometry.width, node.geometry.height);
        node.subscriptions.deliver(
            &Event::Expose {
                window,
                area,
                count: 0,
            },
            event_mask::EXPOSURE,
        );
    }

    pub fn create_window(&self, params: CreateWindowParams, owner: &ClientRef) -> X11Result<()> {
        let mut st = self.lock();
        if st.nodes.contains_key(&params.id) {
            return Err(X11Error::bad_id_choice(params.id.get()));
        }
        let parent = st.node(params.parent)?;
        if params.geometry.width == 0 || params.geometry.height == 0 {
            return Err(X11Error::bad_value(0));
        }

        let class = match params.class {
            WindowClass::CopyFromParent => parent.class,
            class => class,
        };
        let (depth, visual) = match class {
            WindowClass::InputOnly => {
                if params.border_width != 0 || params.depth != 0 {
                    return Err(X11Error::bad_match(params.id.get()));
                }
                (0, parent.visual)
            }
            _ => {
                if parent.class == WindowClass::InputOnly {
                    return Err(X11Error::bad_match(params.id.get()));
                }
                let depth = if params.depth == 0 { parent.depth } else { params.depth };
                let visual = if params.visual.get() == 0 {
                    parent.visual
                } else {
                    params.visual
                };
                if depth != parent.depth || visual != parent.visual {
                    return Err(X11Error::bad_match(params.id.get()));
                }
                (depth, visual)
            }
        };

        let mut node = WindowNode {
            id: params.id,
            parent: Some(params.parent),
            children: Vec::new(),
            geometry: params.geometry,
            border_width: params.border_width,
            depth,
            class,
            visual,
            flags: 0,
            attributes: WindowAttributes::inherit(parent.attributes.colormap),
            properties: PropertyStore::new(),
            subscriptions: Subscriptions::new(),
            owner: Some(Arc::clone(owner)),
        };
        apply_attributes(&mut node, &params.values, owner)?;

        let override_redirect = node.attributes.override_redirect;
        st.nodes.insert(params.id, node);
        st.node_mut(params.parent)?.children.push(params.id);

        st.deliver(
            params.parent,
            &Event::CreateNotify {
                parent: params.parent,
                window: params.id,
                geometry: params.geometry,
                border_width: params.border_width,
                override_redirect,
            },
            event_mask::SUBSTRUCTURE_NOTIFY,
        );
        Ok(())
    }

    pub fn change_attributes(
        &self,
        window: Window,
        values: &[(u32, u32)],
        client: &ClientRef,
    ) -> X11Result<()> {
        let mut st = self.lock();
        let node = st.node_mut(window)?;
        apply_attributes(node, values, client)
    }

    pub fn window_info(&self, window: Window, client_id: u32) -> X11Result<WindowInfo> {
        let st = self.lock();
        let node = st.node(window)?;
        Ok(WindowInfo {
            visual: node.visual,
            class: node.class,
            attributes: node.attributes.clone(),
            map_state: st.map_state(window),
            all_event_masks: node.subscriptions.all_masks(),
            your_event_mask: node.subscriptions.mask_for(client_id),
        })
    }

    /// Destroy a window and its subtree. Returns every destroyed id, children
    /// first. Destroying the root does nothing.
    pub fn destroy_window(&self, window: Window) -> X11Result<Vec<Window>> {
        let mut notices = Vec::new();
        let mut destroyed = Vec::new();
        {
            let mut st = self.lock();
            st.node(window)?;
            if window == self.root {
                return Ok(destroyed);
            }
            st.unmap_locked(window, &mut notices)?;
            st.destroy_locked(window, &mut destroyed, &mut notices);
        }
        self.flush_host(notices);
        Ok(destroyed)
    }

    pub fn destroy_subwindows(&self, window: Window) -> X11Result<Vec<Window>> {
        let mut notices = Vec::new();
        let mut destroyed = Vec::new();
        {
            let mut st = self.lock();
            let children = st.node(window)?.children.clone();
            for child in children {
                st.unmap_locked(child, &mut notices)?;
                st.destroy_locked(child, &mut destroyed, &mut notices);
            }
        }
        self.flush_host(notices);
        Ok(destroyed)
    }

    pub fn map_window(&self, window: Window) -> X11Result<()> {
        let mut notices = Vec::new();
        self.lock().map_locked(window, &mut notices)?;
        self.flush_host(notices);
        Ok(())
    }

    /// Map unmapped children, top of the stack first
    pub fn map_subwindows(&self, window: Window) -> X11Result<()> {
        let mut notices = Vec::new();
        {
            let mut st = self.lock();
            let children = st.node(window)?.children.clone();
            for child in children.into_iter().rev() {
                st.map_locked(child, &mut notices)?;
            }
        }
        self.flush_host(notices);
        Ok(())
    }

    pub fn unmap_window(&self, window: Window) -> X11Result<()> {
        if window == self.root {
            return self.lock().node(window).map(|_| ());
        }
        let mut notices = Vec::new();
        self.lock().unmap_locked(window, &mut notices)?;
        self.flush_host(notices);
        Ok(())
    }

    /// Unmap mapped children, bottom of the stack first
    pub fn unmap_subwindows(&self, window: Window) -> X11Result<()> {
        let mut notices = Vec::new();
        {
            let mut st = self.lock();
            let children = st.node(window)?.children.clone();
            for child in children {
                st.unmap_locked(child, &mut notices)?;
            }
        }
        self.flush_host(notices);
        Ok(())
    }

    pub fn configure_window(&self, window: Window, cfg: &ConfigureValues) -> X11Result<()> {
        let mut notices = Vec::new();
        {
            let mut st = self.lock();
            let node = st.node(window)?;
            if window == self.root {
                return Ok(());
            }
            if node.class == WindowClass::InputOnly && cfg.border_width.is_some_and(|bw| bw != 0) {
                return Err(X11Error::bad_match(window.get()));
            }
            if let Some(sibling) = cfg.sibling {
                let sib = st.node(sibling)?;
                if sibling == window || sib.parent != node.parent {
                    return Err(X11Error::bad_match(sibling.get()));
                }
            }

            let old_geometry = node.geometry;
            let old_border = node.border_width;
            let new_geometry = Rectangle::new(
                cfg.x.unwrap_or(old_geometry.x),
                cfg.y.unwrap_or(old_geometry.y),
                cfg.width.unwrap_or(old_geometry.width),
                cfg.height.unwrap_or(old_geometry.height),
            );
            let new_border = cfg.border_width.unwrap_or(old_border);

            let node = st.node_mut(window)?;
            node.geometry = new_geometry;
            node.border_width = new_border;
            let override_redirect = node.attributes.override_redirect;
            let visible = node.is_visible();

            let geometry_changed = new_geometry != old_geometry || new_border != old_border;
            let restacked = match cfg.stack_mode {
                Some(mode) => st.restack(window, mode, cfg.sibling),
                None => false,
            };

            if geometry_changed || restacked {
                let above_sibling = st.sibling_below(window);
                st.structure_event(window, |event| Event::ConfigureNotify {
                    event,
                    window,
                    above_sibling,
                    geometry: new_geometry,
                    border_width: new_border,
                    override_redirect,
                });
            }
            if geometry_changed {
                notices.push(HostNotice::Geometry(window, new_geometry, new_border));
            }
            let resized = new_geometry.width != old_geometry.width
                || new_geometry.height != old_geometry.height;
            if resized && visible {
                st.deliver(
                    window,
                    &Event::Expose {
                        window,
                        area: Rectangle::new(0, 0, new_geometry.width, new_geometry.height),
                        count: 0,
                    },
                    event_mask::EXPOSURE,
                );
            }
        }
        self.flush_host(notices);
        Ok(())
    }

    pub fn reparent_window(&self, window: Window, new_parent: Window, x: i16, y: i16) -> X11Result<()> {
        let mut notices = Vec::new();
        {
            let mut st = self.lock();
            let node = st.node(window)?;
            let target = st.node(new_parent)?;
            if window == self.root || st.is_inferior_or_self(window, new_parent) {
                return Err(X11Error::bad_match(window.get()));
            }
            if target.class == WindowClass::InputOnly && node.class != WindowClass::InputOnly {
                return Err(X11Error::bad_match(new_parent.get()));
            }
            let was_mapped = node.is_mapped();
            let override_redirect = node.attributes.override_redirect;

            st.unmap_locked(window, &mut notices)?;

            let old_parent = st.node(window)?.parent.unwrap_or(self.root);
            st.node_mut(old_parent)?.children.retain(|c| *c != window);
            st.node_mut(new_parent)?.children.push(window);
            let node = st.node_mut(window)?;
            node.parent = Some(new_parent);
            node.geometry.x = x;
            node.geometry.y = y;

            let make = |event| Event::ReparentNotify {
                event,
                window,
                parent: new_parent,
                x,
                y,
                override_redirect,
            };
            st.deliver(window, &make(window), event_mask::STRUCTURE_NOTIFY);
            st.deliver(old_parent, &make(old_parent), event_mask::SUBSTRUCTURE_NOTIFY);
            if new_parent != old_parent {
                st.deliver(new_parent, &make(new_parent), event_mask::SUBSTRUCTURE_NOTIFY);
            }

            if was_mapped {
                st.map_locked(window, &mut notices)?;
            }
        }
        self.flush_host(notices);
        Ok(())
    }

    pub fn geometry(&self, window: Window) -> X11Result<WindowGeometry> {
        let st = self.lock();
        let node = st.node(window)?;
        Ok(WindowGeometry {
            geometry: node.geometry,
            border_width: node.border_width,
            depth: node.depth,
        })
    }

    /// Parent (NONE for the root) and children bottom to top
    pub fn query_tree(&self, window: Window) -> X11Result<(Window, Vec<Window>)> {
        let st = self.lock();
        let node = st.node(window)?;
        Ok((node.parent.unwrap_or(Window::NONE), node.children.clone()))
    }

    /// Where the window's inner origin sits on the root
    pub fn root_origin(&self, window: Window) -> X11Result<(i32, i32)> {
        let st = self.lock();
        let mut node = st.node(window)?;
        let (mut x, mut y) = (0, 0);
        loop {
            let inner = node.inner_bounds();
            x += inner.x as i32;
            y += inner.y as i32;
            match node.parent {
                Some(parent) => node = st.node(parent)?,
                None => return Ok((x, y)),
            }
        }
    }

    pub fn parent(&self, window: Window) -> Option<Window> {
        self.lock().nodes.get(&window).and_then(|n| n.parent)
    }

    pub fn is_viewable(&self, window: Window) -> bool {
        self.lock().is_viewable(window)
    }

    pub fn class(&self, window: Window) -> X11Result<WindowClass> {
        Ok(self.lock().node(window)?.class)
    }

    pub fn depth(&self, window: Window) -> X11Result<u8> {
        Ok(self.lock().node(window)?.depth)
    }

    /// The client that created `window`
    pub fn owner(&self, window: Window) -> Option<ClientRef> {
        self.lock().nodes.get(&window).and_then(|n| n.owner.clone())
    }

    /// Deliver a masked event to one window's subscribers
    pub fn deliver(&self, window: Window, event: &Event, required: u32) {
        self.lock().deliver(window, event, required);
    }

    /// Send an unmasked event to the window's creator, if still connected
    pub fn send_to_owner(&self, window: Window, event: &Event) {
        if let Some(owner) = self.owner(window) {
            send_to(&owner, event);
        }
    }

    /// Drop a disconnected client's selections and creator links
    pub fn remove_client(&self, client_id: u32) {
        let mut st = self.lock();
        for node in st.nodes.values_mut() {
            node.subscriptions.remove_client(client_id);
            if node.owner.as_ref().is_some_and(|o| o.client_id() == client_id) {
                node.owner = None;
            }
        }
    }

    /// Clear an area to the background. A zero width or height extends to
    /// the window edge.
    pub fn clear_area(&self, window: Window, area: Rectangle, exposures: bool) -> X11Result<()> {
        let mut notices = Vec::new();
        {
            let st = self.lock();
            let node = st.node(window)?;
            if node.class == WindowClass::InputOnly {
                return Err(X11Error::bad_match(window.get()));
            }
            let (w, h) = (node.geometry.width as i32, node.geometry.height as i32);
            let x0 = (area.x as i32).clamp(0, w);
            let y0 = (area.y as i32).clamp(0, h);
            let x1 = if area.width == 0 { w } else { (area.x as i32 + area.width as i32).clamp(0, w) };
            let y1 = if area.height == 0 { h } else { (area.y as i32 + area.height as i32).clamp(0, h) };
            if x1 <= x0 || y1 <= y0 {
                return Ok(());
            }
            let cleared = Rectangle::new(x0 as i16, y0 as i16, (x1 - x0) as u16, (y1 - y0) as u16);
            notices.push(HostNotice::Content(window, cleared));
            if exposures && node.is_visible() {
                node.subscriptions.deliver(
                    &Event::Expose {
                        window,
                        area: cleared,
                        count: 0,
                    },
                    event_mask::EXPOSURE,
                );
            }
        }
        self.flush_host(notices);
        Ok(())
    }

    /// Report drawing into a window to the host
    pub fn content_changed(&self, window: Window, areas: &[Rectangle]) -> X11Result<()> {
        {
            let st = self.lock();
            if st.node(window)?.class == WindowClass::InputOnly {
                return Err(X11Error::bad_match(window.get()));
            }
        }
        self.flush_host(
            areas
                .iter()
                .map(|area| HostNotice::Content(window, *area))
                .collect(),
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn change_property(
        &self,
        window: Window,
        atom: Atom,
        type_: Atom,
        format: u8,
        mode: PropertyMode,
        data: Vec<u8>,
        time: Timestamp,
    ) -> X11Result<()> {
        let mut st = self.lock();
        let node = st.node_mut(window)?;
        node.properties.change(atom, type_, format, mode, data)?;
        node.subscriptions.deliver(
            &Event::PropertyNotify {
                window,
                atom,
                time,
                state: PROPERTY_NEW_VALUE,
            },
            event_mask::PROPERTY_CHANGE,
        );
        Ok(())
    }

    pub fn delete_property(&self, window: Window, atom: Atom, time: Timestamp) -> X11Result<()> {
        let mut st = self.lock();
        let node = st.node_mut(window)?;
        if node.properties.delete(atom) {
            node.subscriptions.deliver(
                &Event::PropertyNotify {
                    window,
                    atom,
                    time,
                    state: PROPERTY_DELETED,
                },
                event_mask::PROPERTY_CHANGE,
            );
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_property(
        &self,
        window: Window,
        atom: Atom,
        type_: Atom,
        offset: u32,
        length: u32,
        delete: bool,
        time: Timestamp,
    ) -> X11Result<PropertyRead> {
        let mut st = self.lock();
        let node = st.node_mut(window)?;
        let read = node.properties.read(atom, type_, offset, length, delete)?;
        if read.deleted {
            node.subscriptions.deliver(
                &Event::PropertyNotify {
                    window,
                    atom,
                    time,
                    state: PROPERTY_DELETED,
                },
                event_mask::PROPERTY_CHANGE,
            );
        }
        Ok(read)
    }

    pub fn list_properties(&self, window: Window) -> X11Result<Vec<Atom>> {
        Ok(self.lock().node(window)?.properties.list())
    }
}

/// Apply a window attribute value list. The event-mask entry updates the
/// caller's subscription; nothing changes unless every entry is valid.
fn apply_attributes(node: &mut WindowNode, values: &[(u32, u32)], client: &ClientRef) -> X11Result<()> {
    let mut staged = node.attributes.clone();
    let mut event_mask = None;
    for &(bit, value) in values {
        if bit == cw::EVENT_MASK {
            if value & !event_mask::ALL != 0 {
                return Err(X11Error::bad_value(value));
            }
            event_mask = Some(value);
            continue;
        }
        let (_, setter) = WINDOW_ATTRIBUTES[bit.trailing_zeros() as usize];
        setter(&mut staged, value)?;
    }
    if node.class == WindowClass::InputOnly
        && values
            .iter()
            .any(|(bit, _)| bit & (cw::BACK_PIXMAP | cw::BACK_PIXEL | cw::BORDER_PIXMAP | cw::BORDER_PIXEL | cw::COLORMAP) != 0)
    {
        return Err(X11Error::bad_match(node.id.get()));
    }
    if let Some(mask) = event_mask {
        node.subscriptions.select(client, mask)?;
    }
    node.attributes = staged;
    Ok(())
}
