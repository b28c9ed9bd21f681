//! Resource registries
//!
//! Each resource kind lives in its own [`Registry`], mapping a client-chosen
//! id to a shared server object. On top of those, [`Resources`] keeps one
//! server-wide index from id to kind: an id names at most one resource of any
//! kind, and a request taking "any drawable" needs one lookup.

mod gc;
pub use gc::*;

use crate::backend::{FontHandle, Surface};
use crate::protocol::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Which typed error a failed lookup produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Window,
    Pixmap,
    GContext,
    Colormap,
    Font,
    Drawable,
}

impl ResourceKind {
    pub fn not_found(&self, id: XID) -> X11Error {
        let id = id.get();
        match self {
            ResourceKind::Window => X11Error::bad_window(id),
            ResourceKind::Pixmap => X11Error::bad_pixmap(id),
            ResourceKind::GContext => X11Error::bad_gc(id),
            ResourceKind::Colormap => X11Error::bad_colormap(id),
            ResourceKind::Font => X11Error::bad_font(id),
            ResourceKind::Drawable => X11Error::bad_drawable(id),
        }
    }
}

/// Lock a mutex, recovering the guard if a panicking holder poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Id-to-object map for one resource kind
pub struct Registry<T> {
    kind: ResourceKind,
    entries: Mutex<HashMap<XID, Arc<T>>>,
}

impl<T> Registry<T> {
    pub fn new(kind: ResourceKind) -> Self {
        Registry {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a new object. Fails with IDChoice if the id is already live.
    pub fn create(&self, id: XID, value: T) -> X11Result<Arc<T>> {
        let mut entries = lock(&self.entries);
        if entries.contains_key(&id) {
            return Err(X11Error::bad_id_choice(id.get()));
        }
        let value = Arc::new(value);
        entries.insert(id, Arc::clone(&value));
        Ok(value)
    }

    pub fn get(&self, id: XID) -> X11Result<Arc<T>> {
        lock(&self.entries)
            .get(&id)
            .cloned()
            .ok_or_else(|| self.kind.not_found(id))
    }

    pub fn contains(&self, id: XID) -> bool {
        lock(&self.entries).contains_key(&id)
    }

    /// Remove an object. Removing an absent id is not an error.
    pub fn destroy(&self, id: XID) -> Option<Arc<T>> {
        lock(&self.entries).remove(&id)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

/// What a drawable id names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawableKind {
    Window,
    Pixmap,
}

/// Off-screen drawable
pub struct PixmapInfo {
    pub depth: u8,
    pub width: u16,
    pub height: u16,
    pub surface: Mutex<Box<dyn Surface>>,
}

/// Colormap bound to a visual. TrueColor maps need no cell storage.
#[derive(Debug, Clone)]
pub struct ColormapInfo {
    pub visual: VisualID,
    pub window: Window,
}

/// Font opened through the host font provider
#[derive(Debug, Clone)]
pub struct OpenFont {
    pub name: String,
    pub handle: FontHandle,
}

/// Every per-kind registry the server keeps, plus the id index shared by
/// all of them. Windows live in the window tree and appear here only in the
/// index.
pub struct Resources {
    ids: Mutex<HashMap<XID, ResourceKind>>,
    pub pixmaps: Registry<PixmapInfo>,
    pub gcs: Registry<GraphicsContext>,
    pub colormaps: Registry<ColormapInfo>,
    pub fonts: Registry<OpenFont>,
}

impl Resources {
    pub fn new() -> Self {
        Resources {
            ids: Mutex::new(HashMap::new()),
            pixmaps: Registry::new(ResourceKind::Pixmap),
            gcs: Registry::new(ResourceKind::GContext),
            colormaps: Registry::new(ResourceKind::Colormap),
            fonts: Registry::new(ResourceKind::Font),
        }
    }

    /// Reserve `id` for a resource of `kind`. Fails with IDChoice if any
    /// resource already uses it.
    pub fn claim(&self, id: XID, kind: ResourceKind) -> X11Result<()> {
        let mut ids = lock(&self.ids);
        if ids.contains_key(&id) {
            return Err(X11Error::bad_id_choice(id.get()));
        }
        ids.insert(id, kind);
        Ok(())
    }

    /// Give `id` back to the index
    pub fn release(&self, id: XID) -> Option<ResourceKind> {
        lock(&self.ids).remove(&id)
    }

    pub fn kind_of(&self, id: XID) -> Option<ResourceKind> {
        lock(&self.ids).get(&id).copied()
    }

    /// Number of live ids of every kind
    pub fn id_count(&self) -> usize {
        lock(&self.ids).len()
    }

    /// Resolve an id that must name a window or a pixmap
    pub fn drawable(&self, id: XID) -> X11Result<DrawableKind> {
        match self.kind_of(id) {
            Some(ResourceKind::Window) => Ok(DrawableKind::Window),
            Some(ResourceKind::Pixmap) => Ok(DrawableKind::Pixmap),
            _ => Err(X11Error::bad_drawable(id.get())),
        }
    }

    /// Claim `id` in the index and insert into `registry`
    pub fn create<T>(&self, registry: &Registry<T>, id: XID, value: T) -> X11Result<Arc<T>> {
        self.claim(id, registry.kind())?;
        registry.create(id, value).inspect_err(|_| {
            self.release(id);
        })
    }

    /// Remove `id` from `registry` and the index. Fails with the registry's
    /// error if the id does not name a resource of that kind.
    pub fn destroy<T>(&self, registry: &Registry<T>, id: XID) -> X11Result<Arc<T>> {
        let value = registry.destroy(id).ok_or_else(|| registry.kind().not_found(id))?;
        if self.release(id).is_none() {
            log::warn!("{:?} {} was missing from the id index", registry.kind(), id);
        }
        Ok(value)
    }

    pub fn create_pixmap(&self, id: XID, info: PixmapInfo) -> X11Result<()> {
        self.create(&self.pixmaps, id, info).map(|_| ())
    }

    pub fn free_pixmap(&self, id: XID) -> X11Result<()> {
        self.destroy(&self.pixmaps, id).map(|_| ())
    }

    /// Reserve the id of a window about to enter the tree
    pub fn claim_window(&self, window: Window) -> X11Result<()> {
        self.claim(window.id(), ResourceKind::Window)
    }

    /// Release the ids of destroyed windows
    pub fn forget_windows(&self, windows: &[Window]) {
        for window in windows {
            if self.release(window.id()).is_none() {
                log::warn!("window {} was missing from the id index", window);
            }
        }
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::MemorySurface;

    fn pixmap(w: u16, h: u16) -> PixmapInfo {
        PixmapInfo {
            depth: 24,
            width: w,
            height: h,
            surface: Mutex::new(Box::new(MemorySurface::new(w, h))),
        }
    }

    #[test]
    fn test_create_collision_is_id_choice() {
        let reg: Registry<u32> = Registry::new(ResourceKind::Font);
        reg.create(XID(7), 1).unwrap();
        let err = reg.create(XID(7), 2).unwrap_err();
        assert_eq!(err.code, ErrorCode::IDChoice);
        assert_eq!(err.bad_value, 7);
        assert_eq!(*reg.get(XID(7)).unwrap(), 1);
    }

    #[test]
    fn test_destroy_is_idempotent_and_id_reusable() {
        let reg: Registry<&str> = Registry::new(ResourceKind::GContext);
        reg.create(XID(9), "a").unwrap();
        assert!(reg.destroy(XID(9)).is_some());
        assert!(reg.destroy(XID(9)).is_none());
        assert_eq!(reg.get(XID(9)).unwrap_err().code, ErrorCode::GContext);
        reg.create(XID(9), "b").unwrap();
        assert_eq!(*reg.get(XID(9)).unwrap(), "b");
    }

    #[test]
    fn test_pixmap_is_a_drawable() {
        let res = Resources::new();
        res.create_pixmap(XID(0x200001), pixmap(4, 4)).unwrap();
        assert_eq!(res.drawable(XID(0x200001)).unwrap(), DrawableKind::Pixmap);

        // An id held by a window leaves no half-created pixmap
        res.claim_window(Window::new(0x200002)).unwrap();
        assert!(res.create_pixmap(XID(0x200002), pixmap(1, 1)).is_err());
        assert!(!res.pixmaps.contains(XID(0x200002)));
        assert_eq!(res.drawable(XID(0x200002)).unwrap(), DrawableKind::Window);

        res.free_pixmap(XID(0x200001)).unwrap();
        assert_eq!(
            res.drawable(XID(0x200001)).unwrap_err().code,
            ErrorCode::Drawable
        );
        assert_eq!(
            res.free_pixmap(XID(0x200001)).unwrap_err().code,
            ErrorCode::Pixmap
        );
    }

    #[test]
    fn test_id_is_unique_across_kinds() {
        let res = Resources::new();
        let id = XID(0x200010);
        res.claim_window(Window(id)).unwrap();
        let err = res
            .create(&res.gcs, id, GraphicsContext::new(24, GcValues::default()))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::IDChoice);
        assert_eq!(err.bad_value, id.get());
        let err = res
            .create(
                &res.colormaps,
                id,
                ColormapInfo {
                    visual: VisualID(0x21),
                    window: Window::new(0x100),
                },
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::IDChoice);
        assert!(res.gcs.is_empty());
        assert!(res.colormaps.is_empty());
        assert_eq!(res.kind_of(id), Some(ResourceKind::Window));

        // A GC id is not a drawable, and freeing it as a pixmap fails
        let gc = XID(0x200011);
        res.create(&res.gcs, gc, GraphicsContext::new(24, GcValues::default()))
            .unwrap();
        assert_eq!(res.drawable(gc).unwrap_err().code, ErrorCode::Drawable);
        assert_eq!(res.free_pixmap(gc).unwrap_err().code, ErrorCode::Pixmap);
        assert_eq!(res.kind_of(gc), Some(ResourceKind::GContext));

        res.forget_windows(&[Window(id)]);
        res.destroy(&res.gcs, gc).unwrap();
        assert_eq!(res.id_count(), 0);
        res.create(&res.gcs, id, GraphicsContext::new(24, GcValues::default()))
            .unwrap();
    }

    #[test]
    fn test_concurrent_create_single_winner() {
        let res = Arc::new(Resources::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let res = Arc::clone(&res);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        res.create_pixmap(XID(42), pixmap(1, 1)).is_ok()
                    } else {
                        res.claim_window(Window::new(42)).is_ok()
                    }
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
    }
}
