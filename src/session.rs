//! Per-window editing session.
//!
//! A `NoteSession` is what lives inside one window: its own copy of the tab
//! being edited, the window's tab picker ([`TabDirectory`]), a
//! [`SaveController`] deciding when to write, and the [`StoreClient`] used
//! for the actual writes.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::orchestrator::StoreClient;
use crate::save::{SaveController, SaveState, SaveTicket, SaveTrigger};
use crate::store::{derive_name, truncate_name, Appearance, Tab, TabDraft};
use crate::sync::TabDirectory;
use crate::window::{OpenedWindow, WindowId, WindowMessage};
use log::{debug, warn};
use std::time::{Duration, Instant};

pub struct NoteSession {
    client: StoreClient,
    window: WindowId,
    tab: Tab,
    directory: TabDirectory,
    save: SaveController,
    flush_timeout: Duration,
}

impl NoteSession {
    /// Start a session for a window the orchestrator just opened.
    pub fn open(
        client: StoreClient,
        opened: &OpenedWindow,
        config: &AppConfig,
        now: Instant,
    ) -> Result<Self> {
        let tabs = client.all_tabs()?;
        Ok(Self {
            directory: TabDirectory::new(&tabs),
            client,
            window: opened.window,
            tab: opened.tab.clone(),
            save: SaveController::from_config(config, now),
            flush_timeout: config.shutdown_flush_timeout(),
        })
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn tab(&self) -> &Tab {
        &self.tab
    }

    pub fn directory(&self) -> &TabDirectory {
        &self.directory
    }

    pub fn save_state(&self) -> SaveState {
        self.save.state()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Editing
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the content of note `index`.
    pub fn edit_note(&mut self, index: usize, content: &str, now: Instant) -> Result<()> {
        let note = self.tab.notes.get_mut(index).ok_or_else(|| {
            Error::InvalidTab(format!(
                "note {} does not exist in a {}-note tab",
                index,
                self.tab.layout.note_count()
            ))
        })?;
        if note.content == content {
            return Ok(());
        }
        note.content = content.to_string();
        self.save.edit(now);
        if index == 0 {
            self.refresh_name();
        }
        Ok(())
    }

    /// Give the tab an explicit name, turning off automatic naming.
    ///
    /// An empty name switches automatic naming back on.
    pub fn rename(&mut self, name: &str, now: Instant) {
        let name = truncate_name(name);
        if name.is_empty() {
            self.tab.name_is_custom = false;
            self.refresh_name();
        } else {
            self.tab.name_is_custom = true;
            self.set_name(name);
        }
        self.save.edit(now);
    }

    /// Change colors or fonts.
    pub fn update_appearance<F>(&mut self, update: F, now: Instant)
    where
        F: FnOnce(&mut Appearance),
    {
        update(&mut self.tab.appearance);
        self.save.edit(now);
    }

    fn refresh_name(&mut self) {
        if self.tab.name_is_custom {
            return;
        }
        let derived = self
            .tab
            .notes
            .first()
            .and_then(|n| derive_name(&n.content))
            .unwrap_or_else(|| self.tab.layout.default_name().to_string());
        self.set_name(derived);
    }

    fn set_name(&mut self, name: String) {
        if self.tab.name == name {
            return;
        }
        debug!("Tab {} renamed to '{}'", self.tab.id, name);
        self.tab.name = name;
        self.directory.upsert(&self.tab);
        self.client
            .report_name_change(&self.tab.id, &self.tab.name, self.window);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Saving
    // ─────────────────────────────────────────────────────────────────────────

    /// Drive the debounce and autosave timers. Returns the outcome of a save
    /// if one was due.
    pub fn tick(&mut self, now: Instant) -> Option<Result<Tab>> {
        let ticket = self.save.poll(now)?;
        Some(self.perform(ticket, None, now))
    }

    /// The window lost focus: save any pending edits now.
    pub fn blur(&mut self, now: Instant) -> Option<Result<Tab>> {
        let ticket = self.save.force(SaveTrigger::Blur)?;
        Some(self.perform(ticket, None, now))
    }

    /// The window is about to be destroyed.
    ///
    /// Pending edits are flushed, but the wait for confirmation is bounded:
    /// if the store does not answer in time the window closes anyway.
    pub fn unload(mut self, now: Instant) -> Result<()> {
        let Some(ticket) = self.save.force(SaveTrigger::Unload) else {
            return Ok(());
        };
        let timeout = self.flush_timeout;
        match self.perform(ticket, Some(timeout), now) {
            Ok(_) => Ok(()),
            Err(Error::Timeout) => {
                warn!(
                    "Final save of tab {} not confirmed within {:?}; closing anyway",
                    self.tab.id, timeout
                );
                Err(Error::Timeout)
            }
            Err(e) => Err(e),
        }
    }

    /// Flush, then ask the orchestrator to close this window.
    pub fn close(self, now: Instant) -> Result<()> {
        let client = self.client.clone();
        let window = self.window;
        if let Err(e) = self.unload(now) {
            warn!("Closing {} with unsaved changes: {}", window, e);
        }
        client.close_window(window)
    }

    /// Delete this session's tab; the orchestrator closes the window.
    pub fn delete_tab(self) -> Result<bool> {
        self.client.remove_tab(&self.tab.id, Some(self.window))
    }

    fn perform(
        &mut self,
        ticket: SaveTicket,
        timeout: Option<Duration>,
        now: Instant,
    ) -> Result<Tab> {
        // Placement is recorded by the orchestrator as the window moves; a
        // content save leaves the stored one alone.
        let mut draft = TabDraft::from(self.tab.clone());
        draft.window = None;
        let result = match timeout {
            Some(timeout) => self.client.add_or_update_tab_timeout(draft, timeout),
            None => self.client.add_or_update_tab(draft),
        };
        self.save.finish(ticket, result.is_ok(), now);
        match &result {
            Ok(saved) => self.tab = saved.clone(),
            Err(e) => warn!("Saving tab {} failed: {}", self.tab.id, e),
        }
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Incoming Messages
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a message delivered to this window. Returns whether local state
    /// changed.
    pub fn handle_message(&mut self, message: WindowMessage) -> bool {
        match message {
            WindowMessage::Initialize(tab) => {
                if tab.id != self.tab.id || self.save.is_dirty() {
                    return false;
                }
                let changed = *tab != self.tab;
                self.tab = *tab;
                changed
            }
            WindowMessage::Tab(event) => self.directory.apply(&event),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
