//! Cross-window metadata synchronization.
//!
//! When one window renames or deletes a tab, every other open window needs
//! to update its tab picker without re-reading the store. The orchestrator
//! fans a [`TabEvent`] out with [`broadcast`]; each window applies it to its
//! [`TabDirectory`]. Delivery is fire-and-forget and applying an event is
//! idempotent, so duplicates and reordering between different tabs are
//! harmless.

use crate::store::{Layout, Tab};
use crate::window::{WindowId, WindowMessage, WindowRegistry, WindowSystem};
use log::debug;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// A metadata change to one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TabEvent {
    #[serde(rename_all = "camelCase")]
    TabRenamed { tab_id: String, new_name: String },
    #[serde(rename_all = "camelCase")]
    TabDeleted { tab_id: String },
}

impl TabEvent {
    pub fn renamed(tab_id: impl Into<String>, new_name: impl Into<String>) -> Self {
        TabEvent::TabRenamed {
            tab_id: tab_id.into(),
            new_name: new_name.into(),
        }
    }

    pub fn deleted(tab_id: impl Into<String>) -> Self {
        TabEvent::TabDeleted {
            tab_id: tab_id.into(),
        }
    }

    pub fn tab_id(&self) -> &str {
        match self {
            TabEvent::TabRenamed { tab_id, .. } | TabEvent::TabDeleted { tab_id } => tab_id,
        }
    }
}

/// Send `event` to every live registered window except `exclude`.
///
/// Returns the number of windows the event was handed to. Windows that die
/// mid-broadcast are skipped by the registry's liveness check.
pub fn broadcast<W: WindowSystem>(
    registry: &mut WindowRegistry<W>,
    event: &TabEvent,
    exclude: Option<WindowId>,
) -> usize {
    let mut delivered = 0;
    for window in registry.live_windows() {
        if Some(window) == exclude {
            continue;
        }
        if registry.send(window, WindowMessage::Tab(event.clone())) {
            delivered += 1;
        }
    }
    debug!(
        "Broadcast {:?} for tab {} to {} window(s)",
        event,
        event.tab_id(),
        delivered
    );
    delivered
}

// ─────────────────────────────────────────────────────────────────────────────
// Receiving Side
// ─────────────────────────────────────────────────────────────────────────────

/// What a window's tab picker knows about one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSummary {
    pub id: String,
    pub name: String,
    pub layout: Layout,
}

impl From<&Tab> for TabSummary {
    fn from(tab: &Tab) -> Self {
        Self {
            id: tab.id.clone(),
            name: tab.name.clone(),
            layout: tab.layout,
        }
    }
}

/// A window's local list of known tabs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabDirectory {
    entries: Vec<TabSummary>,
}

impl TabDirectory {
    pub fn new(tabs: &[Tab]) -> Self {
        Self {
            entries: tabs.iter().map(TabSummary::from).collect(),
        }
    }

    pub fn entries(&self) -> &[TabSummary] {
        &self.entries
    }

    pub fn get(&self, tab_id: &str) -> Option<&TabSummary> {
        self.entries.iter().find(|e| e.id == tab_id)
    }

    pub fn name(&self, tab_id: &str) -> Option<&str> {
        self.get(tab_id).map(|e| e.name.as_str())
    }

    /// Record a tab this window created or changed itself.
    pub fn upsert(&mut self, tab: &Tab) {
        let summary = TabSummary::from(tab);
        match self.entries.iter_mut().find(|e| e.id == tab.id) {
            Some(entry) => *entry = summary,
            None => self.entries.push(summary),
        }
    }

    /// Apply an event from another window. Returns whether anything changed.
    pub fn apply(&mut self, event: &TabEvent) -> bool {
        match event {
            TabEvent::TabRenamed { tab_id, new_name } => {
                match self.entries.iter_mut().find(|e| &e.id == tab_id) {
                    Some(entry) if &entry.name != new_name => {
                        entry.name = new_name.clone();
                        true
                    }
                    _ => false,
                }
            }
            TabEvent::TabDeleted { tab_id } => {
                let before = self.entries.len();
                self.entries.retain(|e| &e.id != tab_id);
                self.entries.len() != before
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
