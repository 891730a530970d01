//! Tracks which column filter editor is open and dismisses it when the pointer
//! goes down outside of the editor's region.

use tracing::trace;

/// A rectangle in screen cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Region {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, column: u16, row: u16) -> bool {
        column >= self.x
            && row >= self.y
            && (column as u32) < self.x as u32 + self.width as u32
            && (row as u32) < self.y as u32 + self.height as u32
    }
}

/// Source of pointer-down events. Subscribed only while an editor is open.
pub trait PointerCapture {
    fn subscribe(&mut self);
    fn unsubscribe(&mut self);
}

impl<T: PointerCapture + ?Sized> PointerCapture for Box<T> {
    fn subscribe(&mut self) {
        (**self).subscribe()
    }

    fn unsubscribe(&mut self) {
        (**self).unsubscribe()
    }
}

/// For callers that deliver pointer events unconditionally.
#[derive(Debug, Default)]
pub struct NoCapture;

impl PointerCapture for NoCapture {
    fn subscribe(&mut self) {}
    fn unsubscribe(&mut self) {}
}

/// At most one editor is active. Dropping the editor releases the
/// subscription.
#[derive(Debug)]
pub struct FilterEditor<C: PointerCapture> {
    active: Option<String>,
    region: Option<Region>,
    capture: C,
    subscribed: bool,
}

impl<C: PointerCapture> FilterEditor<C> {
    pub fn new(capture: C) -> Self {
        Self {
            active: None,
            region: None,
            capture,
            subscribed: false,
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Open the editor for `id`, replacing any editor already open.
    pub fn open(&mut self, id: impl Into<String>) {
        let id = id.into();
        trace!("Open filter editor {id}");
        self.active = Some(id);
        self.region = None;
        if !self.subscribed {
            self.capture.subscribe();
            self.subscribed = true;
        }
    }

    pub fn close(&mut self) {
        if let Some(id) = self.active.take() {
            trace!("Close filter editor {id}");
        }
        self.region = None;
        if self.subscribed {
            self.capture.unsubscribe();
            self.subscribed = false;
        }
    }

    /// Register the area the open editor occupies. Ignored while closed.
    pub fn register_region(&mut self, region: Region) {
        if self.active.is_some() {
            self.region = Some(region);
        }
    }

    pub fn region(&self) -> Option<Region> {
        self.region
    }

    /// Returns true when the pointer-down dismissed the editor.
    pub fn pointer_down(&mut self, column: u16, row: u16) -> bool {
        if self.active.is_none() {
            return false;
        }
        match self.region {
            Some(region) if region.contains(column, row) => false,
            _ => {
                self.close();
                true
            }
        }
    }
}

impl<C: PointerCapture> Drop for FilterEditor<C> {
    fn drop(&mut self) {
        if self.subscribed {
            self.capture.unsubscribe();
        }
    }
}
