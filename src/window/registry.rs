//! Tab-to-window registry.
//!
//! Maps each tab id to at most one live window, creates and focuses windows
//! on request, and writes geometry changes back to the store. Stale entries
//! (windows destroyed without a close event) are detected with
//! [`WindowSystem::is_alive`] and discarded on the next lookup.

use super::{Geometry, WindowId, WindowMessage, WindowSystem};
use crate::error::{Error, Result};
use crate::store::{DurableStore, Tab, WindowState};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Result of [`WindowRegistry::open_or_focus`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedWindow {
    pub window: WindowId,
    /// `false` when an existing window was focused instead.
    pub created: bool,
    pub tab: Tab,
}

/// One-to-one mapping from tab id to live window.
#[derive(Debug)]
pub struct WindowRegistry<W> {
    windows: W,
    by_tab: HashMap<String, WindowId>,
}

impl<W: WindowSystem> WindowRegistry<W> {
    pub fn new(windows: W) -> Self {
        Self {
            windows,
            by_tab: HashMap::new(),
        }
    }

    pub fn windows(&self) -> &W {
        &self.windows
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// The live window showing `tab_id`, if any.
    pub fn window_for(&self, tab_id: &str) -> Option<WindowId> {
        self.by_tab
            .get(tab_id)
            .copied()
            .filter(|w| self.windows.is_alive(*w))
    }

    /// The tab shown in `window`, if it is registered.
    pub fn tab_for(&self, window: WindowId) -> Option<String> {
        self.by_tab
            .iter()
            .find(|(_, w)| **w == window)
            .map(|(tab_id, _)| tab_id.clone())
    }

    /// All registered windows that are still alive.
    pub fn live_windows(&self) -> Vec<WindowId> {
        let mut live: Vec<WindowId> = self
            .by_tab
            .values()
            .copied()
            .filter(|w| self.windows.is_alive(*w))
            .collect();
        live.sort();
        live
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Opening
    // ─────────────────────────────────────────────────────────────────────────

    /// Focus the window already showing `tab_id`, or create one.
    ///
    /// A new window is placed from the tab's stored placement, receives the
    /// tab via [`WindowMessage::Initialize`], and the tab is persisted with
    /// `window.state = open` so it is restored at next launch.
    pub fn open_or_focus(&mut self, store: &mut DurableStore, tab_id: &str) -> Result<OpenedWindow> {
        if let Some(&window) = self.by_tab.get(tab_id) {
            if self.windows.is_alive(window) {
                self.windows.focus(window)?;
                let tab = store
                    .tab(tab_id)
                    .ok_or_else(|| Error::TabNotFound(tab_id.to_string()))?;
                debug!("Focused existing {} for tab {}", window, tab_id);
                return Ok(OpenedWindow {
                    window,
                    created: false,
                    tab,
                });
            }
            warn!("Discarding stale {} registered for tab {}", window, tab_id);
            self.by_tab.remove(tab_id);
        }

        let stored = store
            .tab(tab_id)
            .ok_or_else(|| Error::TabNotFound(tab_id.to_string()))?;
        let window = self.windows.create(&stored.id, &stored.window)?;
        self.by_tab.insert(stored.id.clone(), window);

        let tab = match store.update_window_placement(tab_id, |w| w.state = WindowState::Open) {
            Ok(tab) => tab,
            Err(e) => {
                warn!("Could not record open state for tab {}: {}", tab_id, e);
                let mut tab = stored;
                tab.window.state = WindowState::Open;
                tab
            }
        };

        self.send(window, WindowMessage::Initialize(Box::new(tab.clone())));
        info!("Opened {} for tab {}", window, tab_id);
        Ok(OpenedWindow {
            window,
            created: true,
            tab,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Window Events
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist new geometry after `window` was moved.
    pub fn on_moved(
        &mut self,
        store: &mut DurableStore,
        window: WindowId,
        geometry: Geometry,
    ) -> Result<Option<Tab>> {
        self.record_geometry(store, window, geometry)
    }

    /// Persist new geometry after `window` was resized.
    pub fn on_resized(
        &mut self,
        store: &mut DurableStore,
        window: WindowId,
        geometry: Geometry,
    ) -> Result<Option<Tab>> {
        self.record_geometry(store, window, geometry)
    }

    fn record_geometry(
        &mut self,
        store: &mut DurableStore,
        window: WindowId,
        geometry: Geometry,
    ) -> Result<Option<Tab>> {
        let Some(tab_id) = self.tab_for(window) else {
            debug!("Geometry change from unregistered {}", window);
            return Ok(None);
        };
        // Re-read so a concurrent content save is not overwritten.
        store
            .update_window_placement(&tab_id, |w| geometry.apply_to(w))
            .map(Some)
    }

    /// Handle a window that is closing.
    ///
    /// `final_geometry` must be captured by the caller before the window is
    /// destroyed; afterwards it is no longer available.
    pub fn on_closed(
        &mut self,
        store: &mut DurableStore,
        window: WindowId,
        final_geometry: Option<Geometry>,
    ) -> Result<Option<Tab>> {
        let Some(tab_id) = self.tab_for(window) else {
            debug!("Close event from unregistered {}", window);
            return Ok(None);
        };
        self.by_tab.remove(&tab_id);

        let result = store.update_window_placement(&tab_id, |w| {
            if let Some(geometry) = final_geometry {
                geometry.apply_to(w);
            }
            w.state = WindowState::Closed;
        });

        match result {
            Ok(tab) => {
                info!("Closed {} for tab {}", window, tab_id);
                Ok(Some(tab))
            }
            // The tab was deleted while its window was closing.
            Err(Error::TabNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Window Requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Close `window`, capturing its final geometry first.
    pub fn close(&mut self, store: &mut DurableStore, window: WindowId) -> Result<Option<Tab>> {
        let final_geometry = self.windows.geometry(window);
        if self.windows.is_alive(window) {
            self.windows.close(window)?;
        }
        self.on_closed(store, window, final_geometry)
    }

    pub fn minimize(&mut self, window: WindowId) -> Result<()> {
        self.windows.minimize(window)
    }

    /// Forget the window of a deleted tab and destroy it without persisting.
    pub fn discard_tab(&mut self, tab_id: &str) -> Option<WindowId> {
        let window = self.by_tab.remove(tab_id)?;
        if self.windows.is_alive(window) {
            if let Err(e) = self.windows.close(window) {
                warn!("Failed to close {} of deleted tab {}: {}", window, tab_id, e);
            }
        }
        Some(window)
    }

    /// Deliver `message` to `window` if it is still alive.
    ///
    /// Returns whether the message was handed to the window. Dead windows are
    /// unregistered instead of producing an error.
    pub fn send(&mut self, window: WindowId, message: WindowMessage) -> bool {
        if !self.windows.is_alive(window) {
            self.by_tab.retain(|_, w| *w != window);
            debug!("Skipping message to dead {}", window);
            return false;
        }
        match self.windows.send(window, message) {
            Ok(()) => true,
            Err(e) => {
                debug!("Message to {} dropped: {}", window, e);
                false
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{document_path, Layout};
    use crate::window::HeadlessWindows;
    use tempfile::TempDir;

    struct TestEnv {
        _temp_dir: TempDir,
        store: DurableStore,
        windows: HeadlessWindows,
        registry: WindowRegistry<HeadlessWindows>,
    }

    impl TestEnv {
        fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let store = DurableStore::open(document_path(temp_dir.path()));
            let windows = HeadlessWindows::new();
            let registry = WindowRegistry::new(windows.clone());
            Self {
                _temp_dir: temp_dir,
                store,
                windows,
                registry,
            }
        }

        fn add_tab(&mut self, layout: Layout) -> Tab {
            self.store.add_or_update_tab(Tab::draft(layout)).unwrap()
        }
    }

    #[test]
    fn test_open_twice_yields_same_window() {
        let mut env = TestEnv::new();
        let tab = env.add_tab(Layout::Single);

        let first = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();
        let second = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.window, second.window);
        assert_eq!(env.windows.created_count(), 1);
    }

    #[test]
    fn test_open_marks_tab_open_and_initializes_window() {
        let mut env = TestEnv::new();
        let tab = env.add_tab(Layout::FourSquare);

        let opened = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();

        assert!(env.store.tab(&tab.id).unwrap().is_open());
        let messages = env.windows.take_messages(opened.window);
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], WindowMessage::Initialize(t) if t.id == tab.id));
        assert_eq!(env.windows.window(opened.window).unwrap().geometry.width, 600);
    }

    #[test]
    fn test_stale_handle_is_replaced() {
        let mut env = TestEnv::new();
        let tab = env.add_tab(Layout::Single);
        let first = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();

        env.windows.destroy_silently(first.window);
        let second = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();

        assert!(second.created);
        assert_ne!(first.window, second.window);
        assert_eq!(env.registry.window_for(&tab.id), Some(second.window));
    }

    #[test]
    fn test_open_unknown_tab_is_not_found() {
        let mut env = TestEnv::new();
        assert!(matches!(
            env.registry.open_or_focus(&mut env.store, "tab-nope"),
            Err(Error::TabNotFound(_))
        ));
        assert_eq!(env.windows.created_count(), 0);
    }

    #[test]
    fn test_move_persists_geometry_without_clobbering_content() {
        let mut env = TestEnv::new();
        let tab = env.add_tab(Layout::Single);
        let opened = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();

        // Content saved after the window opened.
        let mut edited = env.store.tab(&tab.id).unwrap();
        edited.notes[0].content = "fresh".to_string();
        env.store.add_or_update_tab(edited).unwrap();

        let geometry = Geometry {
            x: 300,
            y: 250,
            width: 420,
            height: 380,
            is_maximized: false,
        };
        let updated = env
            .registry
            .on_moved(&mut env.store, opened.window, geometry)
            .unwrap()
            .unwrap();

        assert_eq!(Geometry::of(&updated.window), geometry);
        assert_eq!(updated.notes[0].content, "fresh");
        assert!(updated.is_open());
    }

    #[test]
    fn test_close_captures_final_geometry() {
        let mut env = TestEnv::new();
        let tab = env.add_tab(Layout::Single);
        let opened = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();
        let geometry = Geometry {
            x: 10,
            y: 20,
            width: 800,
            height: 500,
            is_maximized: true,
        };
        env.windows.set_geometry(opened.window, geometry);

        let closed = env.registry.close(&mut env.store, opened.window).unwrap().unwrap();

        assert_eq!(closed.window.state, WindowState::Closed);
        assert_eq!(Geometry::of(&closed.window), geometry);
        assert!(env.registry.window_for(&tab.id).is_none());
        assert!(!env.windows.is_alive(opened.window));
    }

    #[test]
    fn test_close_event_for_deleted_tab_is_quiet() {
        let mut env = TestEnv::new();
        let tab = env.add_tab(Layout::Single);
        let opened = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();
        env.store.remove_tab(&tab.id).unwrap();

        let result = env.registry.on_closed(&mut env.store, opened.window, None);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_send_to_dead_window_is_skipped() {
        let mut env = TestEnv::new();
        let tab = env.add_tab(Layout::Single);
        let opened = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();
        env.windows.destroy_silently(opened.window);

        let delivered = env.registry.send(
            opened.window,
            WindowMessage::Tab(crate::sync::TabEvent::deleted("tab-x")),
        );
        assert!(!delivered);
        assert!(env.registry.live_windows().is_empty());
    }

    #[test]
    fn test_discard_tab_closes_window() {
        let mut env = TestEnv::new();
        let tab = env.add_tab(Layout::Single);
        let opened = env.registry.open_or_focus(&mut env.store, &tab.id).unwrap();

        assert_eq!(env.registry.discard_tab(&tab.id), Some(opened.window));
        assert!(!env.windows.is_alive(opened.window));
        assert_eq!(env.registry.discard_tab(&tab.id), None);
    }
}
