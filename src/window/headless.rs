//! In-memory window system.
//!
//! `HeadlessWindows` keeps windows as plain records and queues the messages
//! sent to them. It backs the headless binary and the tests. The handle is
//! cheap to clone; clones share the same windows, so one clone can be moved
//! into the orchestrator while another inspects what happened.

use super::{Geometry, WindowId, WindowMessage, WindowSystem};
use crate::error::{Error, Result};
use crate::store::WindowPlacement;
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// One simulated window.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWindow {
    pub tab_id: String,
    pub geometry: Geometry,
    pub minimized: bool,
    /// Messages delivered and not yet taken.
    pub inbox: Vec<WindowMessage>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    created: usize,
    focused: Option<WindowId>,
    windows: BTreeMap<WindowId, HeadlessWindow>,
}

impl Inner {
    fn window_mut(&mut self, id: WindowId) -> Result<&mut HeadlessWindow> {
        self.windows
            .get_mut(&id)
            .ok_or_else(|| Error::Window(format!("{} no longer exists", id)))
    }
}

/// Shared handle to a set of simulated windows.
#[derive(Debug, Clone, Default)]
pub struct HeadlessWindows {
    inner: Arc<Mutex<Inner>>,
}

impl HeadlessWindows {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of a live window.
    pub fn window(&self, id: WindowId) -> Option<HeadlessWindow> {
        self.lock().windows.get(&id).cloned()
    }

    /// Ids of all live windows, in creation order.
    pub fn live(&self) -> Vec<WindowId> {
        self.lock().windows.keys().copied().collect()
    }

    /// Number of windows ever created.
    pub fn created_count(&self) -> usize {
        self.lock().created
    }

    /// The most recently focused window, if still alive.
    pub fn focused(&self) -> Option<WindowId> {
        let inner = self.lock();
        inner.focused.filter(|id| inner.windows.contains_key(id))
    }

    /// Remove and return the messages queued for `id`.
    pub fn take_messages(&self, id: WindowId) -> Vec<WindowMessage> {
        self.lock()
            .windows
            .get_mut(&id)
            .map(|w| std::mem::take(&mut w.inbox))
            .unwrap_or_default()
    }

    /// Simulate the user moving or resizing a window.
    pub fn set_geometry(&self, id: WindowId, geometry: Geometry) {
        if let Some(window) = self.lock().windows.get_mut(&id) {
            window.geometry = geometry;
        }
    }

    /// Simulate a window vanishing without its close event ever firing.
    pub fn destroy_silently(&self, id: WindowId) {
        self.lock().windows.remove(&id);
    }
}

impl WindowSystem for HeadlessWindows {
    fn create(&mut self, tab_id: &str, placement: &WindowPlacement) -> Result<WindowId> {
        let mut inner = self.lock();
        inner.next_id += 1;
        inner.created += 1;
        let id = WindowId(inner.next_id);
        inner.windows.insert(
            id,
            HeadlessWindow {
                tab_id: tab_id.to_string(),
                geometry: Geometry::of(placement),
                minimized: false,
                inbox: Vec::new(),
            },
        );
        inner.focused = Some(id);
        debug!("Headless {} created for tab {}", id, tab_id);
        Ok(id)
    }

    fn is_alive(&self, window: WindowId) -> bool {
        self.lock().windows.contains_key(&window)
    }

    fn focus(&mut self, window: WindowId) -> Result<()> {
        let mut inner = self.lock();
        inner.window_mut(window)?.minimized = false;
        inner.focused = Some(window);
        Ok(())
    }

    fn minimize(&mut self, window: WindowId) -> Result<()> {
        self.lock().window_mut(window)?.minimized = true;
        Ok(())
    }

    fn geometry(&self, window: WindowId) -> Option<Geometry> {
        self.lock().windows.get(&window).map(|w| w.geometry)
    }

    fn close(&mut self, window: WindowId) -> Result<()> {
        let mut inner = self.lock();
        inner
            .windows
            .remove(&window)
            .map(|_| ())
            .ok_or_else(|| Error::Window(format!("{} no longer exists", window)))
    }

    fn send(&mut self, window: WindowId, message: WindowMessage) -> Result<()> {
        self.lock().window_mut(window)?.inbox.push(message);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{normalize_tab, Layout, Tab};
    use time::OffsetDateTime;

    fn placement() -> WindowPlacement {
        normalize_tab(Tab::draft(Layout::Single), OffsetDateTime::now_utc()).window
    }

    #[test]
    fn test_clones_share_windows() {
        let mut windows = HeadlessWindows::new();
        let observer = windows.clone();
        let id = windows.create("tab-a", &placement()).unwrap();

        assert!(observer.is_alive(id));
        assert_eq!(observer.window(id).unwrap().tab_id, "tab-a");
        assert_eq!(observer.focused(), Some(id));
    }

    #[test]
    fn test_dead_window_rejects_calls() {
        let mut windows = HeadlessWindows::new();
        let id = windows.create("tab-a", &placement()).unwrap();
        windows.destroy_silently(id);

        assert!(!windows.is_alive(id));
        assert!(windows.focus(id).is_err());
        assert!(windows.close(id).is_err());
        assert!(windows.geometry(id).is_none());
        assert!(windows
            .send(id, WindowMessage::Tab(crate::sync::TabEvent::deleted("tab-a")))
            .is_err());
    }

    #[test]
    fn test_focus_restores_minimized() {
        let mut windows = HeadlessWindows::new();
        let id = windows.create("tab-a", &placement()).unwrap();
        windows.minimize(id).unwrap();
        assert!(windows.window(id).unwrap().minimized);

        windows.focus(id).unwrap();
        assert!(!windows.window(id).unwrap().minimized);
    }

    #[test]
    fn test_take_messages_drains_inbox() {
        let mut windows = HeadlessWindows::new();
        let id = windows.create("tab-a", &placement()).unwrap();
        let event = crate::sync::TabEvent::renamed("tab-b", "Groceries");
        windows.send(id, WindowMessage::Tab(event.clone())).unwrap();

        assert_eq!(windows.take_messages(id), vec![WindowMessage::Tab(event)]);
        assert!(windows.take_messages(id).is_empty());
    }
}
