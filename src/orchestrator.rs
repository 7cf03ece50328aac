//! The orchestrating event loop.
//!
//! One thread owns the [`DurableStore`] and the [`WindowRegistry`]. Windows
//! never touch either directly: they hold a [`StoreClient`] and send
//! requests over a channel, which serializes every read and write in
//! submission order. Requests that change shared tab metadata are fanned
//! out to the other windows through [`broadcast`].

use crate::error::{Error, Result};
use crate::store::{
    DurableStore, GlobalSettings, JournalEntry, Layout, SettingsPatch, Tab, TabDraft,
};
use crate::sync::{broadcast, TabEvent};
use crate::window::{Geometry, OpenedWindow, WindowId, WindowRegistry, WindowSystem};
use log::{debug, info, warn};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Reply<T> = Sender<T>;

/// Messages accepted by the event loop.
#[derive(Debug)]
enum Request {
    // Store reads
    GetGlobalSettings(Reply<GlobalSettings>),
    GetAllTabs(Reply<Vec<Tab>>),
    GetTab(String, Reply<Option<Tab>>),

    // Store writes
    UpdateGlobalSettings(SettingsPatch, Reply<Result<GlobalSettings>>),
    AddOrUpdateTab(Box<TabDraft>, Reply<Result<Tab>>),
    RemoveTab {
        tab_id: String,
        origin: Option<WindowId>,
        reply: Reply<Result<bool>>,
    },
    AddJournalEntry {
        journal: String,
        mood: String,
        reply: Reply<Result<JournalEntry>>,
    },

    // Window lifecycle
    OpenOrFocus(String, Reply<Result<OpenedWindow>>),
    CreateTab(Layout, Reply<Result<OpenedWindow>>),
    CloseWindow(WindowId, Reply<Result<()>>),
    MinimizeWindow(WindowId, Reply<Result<()>>),

    // Notifications from windows
    WindowMoved(WindowId, Geometry),
    WindowResized(WindowId, Geometry),
    WindowClosed(WindowId, Option<Geometry>),
    NameChanged {
        tab_id: String,
        new_name: String,
        origin: WindowId,
    },

    Shutdown,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of the store and the window registry.
pub struct Orchestrator<W> {
    store: DurableStore,
    registry: WindowRegistry<W>,
}

impl<W: WindowSystem> Orchestrator<W> {
    pub fn new(store: DurableStore, windows: W) -> Self {
        Self {
            store,
            registry: WindowRegistry::new(windows),
        }
    }

    pub fn store(&self) -> &DurableStore {
        &self.store
    }

    /// Open the initial window(s) for this launch.
    ///
    /// - First launch ever: create a default tab, open it, then record that
    ///   the first launch happened.
    /// - No tabs: create a default tab and open it.
    /// - Otherwise: reopen the first tab whose window was open when the app
    ///   last ran, or the first tab if none was.
    pub fn startup(&mut self) -> Result<OpenedWindow> {
        let (document, first_launch_ever) = self.store.initialize();

        if first_launch_ever {
            info!("First launch, creating a welcome tab");
            let opened = self.create_tab(Layout::Single)?;
            let recorded = self.store.update_global_settings(SettingsPatch {
                first_launch_ever: Some(false),
                ..SettingsPatch::default()
            });
            if let Err(e) = recorded {
                warn!("Could not record first launch: {}", e);
            }
            return Ok(opened);
        }

        let reopen = document
            .tabs
            .iter()
            .find(|t| t.is_open())
            .or_else(|| document.tabs.first());

        match reopen {
            Some(tab) => {
                info!("Restoring tab {}", tab.id);
                self.registry.open_or_focus(&mut self.store, &tab.id)
            }
            None => {
                info!("No tabs found, creating a default tab");
                self.create_tab(Layout::Single)
            }
        }
    }

    fn create_tab(&mut self, layout: Layout) -> Result<OpenedWindow> {
        let tab = self.store.add_or_update_tab(Tab::draft(layout))?;
        self.registry.open_or_focus(&mut self.store, &tab.id)
    }

    fn remove_tab(&mut self, tab_id: &str, origin: Option<WindowId>) -> Result<bool> {
        let removed = self.store.remove_tab(tab_id)?;
        if removed {
            self.registry.discard_tab(tab_id);
            broadcast(&mut self.registry, &TabEvent::deleted(tab_id), origin);
        }
        Ok(removed)
    }

    /// Handle one request. Returns `false` once the loop should stop.
    fn handle(&mut self, request: Request) -> bool {
        // A dropped reply receiver means the caller gave up waiting; the
        // request has still been applied.
        match request {
            Request::GetGlobalSettings(reply) => {
                let _ = reply.send(self.store.global_settings());
            }
            Request::GetAllTabs(reply) => {
                let _ = reply.send(self.store.all_tabs());
            }
            Request::GetTab(id, reply) => {
                let _ = reply.send(self.store.tab(&id));
            }
            Request::UpdateGlobalSettings(patch, reply) => {
                let _ = reply.send(self.store.update_global_settings(patch));
            }
            Request::AddOrUpdateTab(draft, reply) => {
                let _ = reply.send(self.store.add_or_update_tab(*draft));
            }
            Request::RemoveTab {
                tab_id,
                origin,
                reply,
            } => {
                let _ = reply.send(self.remove_tab(&tab_id, origin));
            }
            Request::AddJournalEntry {
                journal,
                mood,
                reply,
            } => {
                let _ = reply.send(self.store.add_journal_entry(&journal, &mood));
            }
            Request::OpenOrFocus(tab_id, reply) => {
                let _ = reply.send(self.registry.open_or_focus(&mut self.store, &tab_id));
            }
            Request::CreateTab(layout, reply) => {
                let _ = reply.send(self.create_tab(layout));
            }
            Request::CloseWindow(window, reply) => {
                let result = self.registry.close(&mut self.store, window).map(|_| ());
                let _ = reply.send(result);
            }
            Request::MinimizeWindow(window, reply) => {
                let _ = reply.send(self.registry.minimize(window));
            }
            Request::WindowMoved(window, geometry) => {
                if let Err(e) = self.registry.on_moved(&mut self.store, window, geometry) {
                    warn!("Failed to save position of {}: {}", window, e);
                }
            }
            Request::WindowResized(window, geometry) => {
                if let Err(e) = self.registry.on_resized(&mut self.store, window, geometry) {
                    warn!("Failed to save size of {}: {}", window, e);
                }
            }
            Request::WindowClosed(window, geometry) => {
                if let Err(e) = self.registry.on_closed(&mut self.store, window, geometry) {
                    warn!("Failed to record close of {}: {}", window, e);
                }
            }
            Request::NameChanged {
                tab_id,
                new_name,
                origin,
            } => {
                broadcast(
                    &mut self.registry,
                    &TabEvent::renamed(tab_id, new_name),
                    Some(origin),
                );
            }
            Request::Shutdown => return false,
        }
        true
    }

    /// Process requests until shutdown or until every client is dropped.
    fn run(mut self, requests: Receiver<Request>) {
        debug!("Orchestrator loop started");
        while let Ok(request) = requests.recv() {
            if !self.handle(request) {
                break;
            }
        }
        info!("Orchestrator stopped");
    }
}

impl<W: WindowSystem + Send + 'static> Orchestrator<W> {
    /// Move the orchestrator onto its own thread.
    pub fn spawn(self) -> Result<OrchestratorHandle> {
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("gd-notes-orchestrator".to_string())
            .spawn(move || self.run(rx))?;
        Ok(OrchestratorHandle {
            client: StoreClient { requests: tx },
            thread,
        })
    }
}

/// Owner handle of a running orchestrator thread.
pub struct OrchestratorHandle {
    client: StoreClient,
    thread: JoinHandle<()>,
}

impl OrchestratorHandle {
    pub fn client(&self) -> StoreClient {
        self.client.clone()
    }

    /// Stop the loop after all previously submitted requests and wait for it.
    pub fn shutdown(self) {
        if self.client.requests.send(Request::Shutdown).is_err() {
            debug!("Orchestrator already stopped");
        }
        if self.thread.join().is_err() {
            warn!("Orchestrator thread panicked");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// A window's connection to the orchestrator.
///
/// Requests from one client are applied in the order they were sent.
#[derive(Debug, Clone)]
pub struct StoreClient {
    requests: Sender<Request>,
}

impl StoreClient {
    fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (tx, rx) = mpsc::channel();
        self.requests
            .send(request(tx))
            .map_err(|_| Error::Disconnected)?;
        rx.recv().map_err(|_| Error::Disconnected)
    }

    fn call_timeout<T>(
        &self,
        timeout: Duration,
        request: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T> {
        let (tx, rx) = mpsc::channel();
        self.requests
            .send(request(tx))
            .map_err(|_| Error::Disconnected)?;
        rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => Error::Timeout,
            RecvTimeoutError::Disconnected => Error::Disconnected,
        })
    }

    fn notify(&self, request: Request) {
        if self.requests.send(request).is_err() {
            debug!("Notification dropped; orchestrator is gone");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Store reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn global_settings(&self) -> Result<GlobalSettings> {
        self.call(Request::GetGlobalSettings)
    }

    pub fn all_tabs(&self) -> Result<Vec<Tab>> {
        self.call(Request::GetAllTabs)
    }

    pub fn tab(&self, tab_id: &str) -> Result<Option<Tab>> {
        self.call(|reply| Request::GetTab(tab_id.to_string(), reply))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Store writes
    // ─────────────────────────────────────────────────────────────────────────

    pub fn update_global_settings(&self, patch: SettingsPatch) -> Result<GlobalSettings> {
        self.call(|reply| Request::UpdateGlobalSettings(patch, reply))?
    }

    pub fn add_or_update_tab(&self, tab: impl Into<TabDraft>) -> Result<Tab> {
        let draft = Box::new(tab.into());
        self.call(|reply| Request::AddOrUpdateTab(draft, reply))?
    }

    /// [`add_or_update_tab`](Self::add_or_update_tab) that gives up waiting
    /// after `timeout`. The write may still be applied later.
    pub fn add_or_update_tab_timeout(
        &self,
        tab: impl Into<TabDraft>,
        timeout: Duration,
    ) -> Result<Tab> {
        let draft = Box::new(tab.into());
        self.call_timeout(timeout, |reply| Request::AddOrUpdateTab(draft, reply))?
    }

    /// Delete a tab, close its window, and tell every window but `origin`.
    pub fn remove_tab(&self, tab_id: &str, origin: Option<WindowId>) -> Result<bool> {
        self.call(|reply| Request::RemoveTab {
            tab_id: tab_id.to_string(),
            origin,
            reply,
        })?
    }

    pub fn add_journal_entry(&self, journal: &str, mood: &str) -> Result<JournalEntry> {
        self.call(|reply| Request::AddJournalEntry {
            journal: journal.to_string(),
            mood: mood.to_string(),
            reply,
        })?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Window lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    pub fn open_or_focus(&self, tab_id: &str) -> Result<OpenedWindow> {
        self.call(|reply| Request::OpenOrFocus(tab_id.to_string(), reply))?
    }

    /// Create a new empty tab with `layout` and open its window.
    pub fn create_tab(&self, layout: Layout) -> Result<OpenedWindow> {
        self.call(|reply| Request::CreateTab(layout, reply))?
    }

    pub fn close_window(&self, window: WindowId) -> Result<()> {
        self.call(|reply| Request::CloseWindow(window, reply))?
    }

    pub fn minimize_window(&self, window: WindowId) -> Result<()> {
        self.call(|reply| Request::MinimizeWindow(window, reply))?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notifications (fire-and-forget)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn window_moved(&self, window: WindowId, geometry: Geometry) {
        self.notify(Request::WindowMoved(window, geometry));
    }

    pub fn window_resized(&self, window: WindowId, geometry: Geometry) {
        self.notify(Request::WindowResized(window, geometry));
    }

    /// Report that `window` is closing; `final_geometry` is captured before
    /// the window is destroyed.
    pub fn window_closed(&self, window: WindowId, final_geometry: Option<Geometry>) {
        self.notify(Request::WindowClosed(window, final_geometry));
    }

    /// Report a tab name change made in `origin`.
    pub fn report_name_change(&self, tab_id: &str, new_name: &str, origin: WindowId) {
        self.notify(Request::NameChanged {
            tab_id: tab_id.to_string(),
            new_name: new_name.to_string(),
            origin,
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{document_path, Theme, WindowState};
    use crate::window::{HeadlessWindows, WindowMessage};
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct TestEnv {
        _temp_dir: TempDir,
        path: PathBuf,
        windows: HeadlessWindows,
    }

    impl TestEnv {
        fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let path = document_path(temp_dir.path());
            Self {
                _temp_dir: temp_dir,
                path,
                windows: HeadlessWindows::new(),
            }
        }

        fn orchestrator(&self) -> Orchestrator<HeadlessWindows> {
            Orchestrator::new(DurableStore::open(&self.path), self.windows.clone())
        }
    }

    #[test]
    fn test_first_launch_creates_tab_and_clears_flag() {
        let env = TestEnv::new();
        let mut orchestrator = env.orchestrator();

        let opened = orchestrator.startup().unwrap();

        assert!(opened.created);
        assert_eq!(orchestrator.store().all_tabs().len(), 1);
        assert!(!orchestrator.store().global_settings().first_launch_ever);
        assert!(env.windows.is_alive(opened.window));
    }

    #[test]
    fn test_second_launch_reopens_open_tab() {
        let env = TestEnv::new();
        let second_id;
        {
            let mut orchestrator = env.orchestrator();
            let first = orchestrator.startup().unwrap();
            let second = orchestrator.create_tab(Layout::FourSquare).unwrap();
            second_id = second.tab.id.clone();
            orchestrator
                .registry
                .close(&mut orchestrator.store, first.window)
                .unwrap();
        }

        let windows = HeadlessWindows::new();
        let mut orchestrator = Orchestrator::new(DurableStore::open(&env.path), windows);
        let opened = orchestrator.startup().unwrap();
        assert_eq!(opened.tab.id, second_id);
    }

    #[test]
    fn test_launch_without_open_tabs_uses_first() {
        let env = TestEnv::new();
        let first_id;
        {
            let mut orchestrator = env.orchestrator();
            let first = orchestrator.startup().unwrap();
            first_id = first.tab.id.clone();
            orchestrator
                .registry
                .close(&mut orchestrator.store, first.window)
                .unwrap();
            assert_eq!(
                orchestrator.store().tab(&first_id).unwrap().window.state,
                WindowState::Closed
            );
        }

        let mut orchestrator = Orchestrator::new(DurableStore::open(&env.path), HeadlessWindows::new());
        assert_eq!(orchestrator.startup().unwrap().tab.id, first_id);
    }

    #[test]
    fn test_launch_with_no_tabs_creates_one() {
        let env = TestEnv::new();
        {
            let mut orchestrator = env.orchestrator();
            let opened = orchestrator.startup().unwrap();
            orchestrator.remove_tab(&opened.tab.id, None).unwrap();
        }
        let mut orchestrator = Orchestrator::new(DurableStore::open(&env.path), HeadlessWindows::new());
        let opened = orchestrator.startup().unwrap();
        assert!(opened.created);
        assert_eq!(orchestrator.store().all_tabs().len(), 1);
    }

    #[test]
    fn test_client_round_trip() {
        let env = TestEnv::new();
        let handle = env.orchestrator().spawn().unwrap();
        let client = handle.client();

        let settings = client
            .update_global_settings(SettingsPatch {
                theme: Some(Theme::Dark),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(client.global_settings().unwrap().theme, Theme::Dark);

        let opened = client.create_tab(Layout::FourSquare).unwrap();
        assert_eq!(client.tab(&opened.tab.id).unwrap().unwrap().notes.len(), 4);
        assert_eq!(client.all_tabs().unwrap().len(), 1);

        handle.shutdown();
        assert!(matches!(client.all_tabs(), Err(Error::Disconnected)));
    }

    #[test]
    fn test_open_twice_through_client() {
        let env = TestEnv::new();
        let handle = env.orchestrator().spawn().unwrap();
        let client = handle.client();

        let opened = client.create_tab(Layout::Single).unwrap();
        let again = client.open_or_focus(&opened.tab.id).unwrap();
        assert_eq!(opened.window, again.window);
        assert_eq!(env.windows.created_count(), 1);
        handle.shutdown();
    }

    #[test]
    fn test_remove_tab_closes_window_and_notifies_others() {
        let env = TestEnv::new();
        let handle = env.orchestrator().spawn().unwrap();
        let client = handle.client();

        let a = client.create_tab(Layout::Single).unwrap();
        let b = client.create_tab(Layout::Single).unwrap();
        let c = client.create_tab(Layout::Single).unwrap();
        for w in [a.window, b.window, c.window] {
            env.windows.take_messages(w);
        }

        assert!(client.remove_tab(&b.tab.id, Some(a.window)).unwrap());
        assert!(!client.remove_tab(&b.tab.id, Some(a.window)).unwrap());

        assert!(!env.windows.is_alive(b.window));
        assert!(env.windows.take_messages(a.window).is_empty());
        assert_eq!(
            env.windows.take_messages(c.window),
            vec![WindowMessage::Tab(TabEvent::deleted(b.tab.id.clone()))]
        );
        assert!(client.tab(&b.tab.id).unwrap().is_none());
        handle.shutdown();
    }

    #[test]
    fn test_name_change_is_broadcast_to_others() {
        let env = TestEnv::new();
        let handle = env.orchestrator().spawn().unwrap();
        let client = handle.client();
        let a = client.create_tab(Layout::Single).unwrap();
        let b = client.create_tab(Layout::Single).unwrap();
        env.windows.take_messages(a.window);
        env.windows.take_messages(b.window);

        client.report_name_change(&a.tab.id, "Shopping list", a.window);
        // A round trip guarantees the notification was processed.
        client.all_tabs().unwrap();

        assert!(env.windows.take_messages(a.window).is_empty());
        assert_eq!(
            env.windows.take_messages(b.window),
            vec![WindowMessage::Tab(TabEvent::renamed(
                a.tab.id.clone(),
                "Shopping list"
            ))]
        );
        handle.shutdown();
    }

    #[test]
    fn test_window_events_persist_geometry() {
        let env = TestEnv::new();
        let handle = env.orchestrator().spawn().unwrap();
        let client = handle.client();
        let opened = client.create_tab(Layout::Single).unwrap();

        let geometry = Geometry {
            x: 42,
            y: 24,
            width: 500,
            height: 450,
            is_maximized: false,
        };
        client.window_moved(opened.window, geometry);
        let tab = client.tab(&opened.tab.id).unwrap().unwrap();
        assert_eq!(Geometry::of(&tab.window), geometry);

        client.minimize_window(opened.window).unwrap();
        assert!(env.windows.window(opened.window).unwrap().minimized);

        client.close_window(opened.window).unwrap();
        let tab = client.tab(&opened.tab.id).unwrap().unwrap();
        assert_eq!(tab.window.state, WindowState::Closed);
        handle.shutdown();
    }

    #[test]
    fn test_journal_entry_through_client() {
        let env = TestEnv::new();
        let handle = env.orchestrator().spawn().unwrap();
        let entry = handle.client().add_journal_entry("long day", "tired").unwrap();
        assert_eq!(entry.journal, "long day");
        handle.shutdown();
    }
}
