//! The durable store: sole owner of the shared document.
//!
//! `DurableStore` holds the in-memory cache of the document and is the only
//! code that writes the file. Every mutation is applied to a copy of the
//! cache, the copy is written atomically, and only then does it replace the
//! cache; a failed write leaves both disk and cache at the last good state.
//! Reads hand out owned copies, never references into the cache.

use super::document::{
    AppDocument, GlobalSettings, JournalEntry, SettingsPatch, Tab, TabDraft, WindowPlacement,
};
use super::normalize::{normalize_tab, sanitize_settings};
use super::persistence::{load_document, quarantine_corrupt, save_document};
use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

/// Smallest step between two write stamps.
const STAMP_STEP: Duration = Duration::microseconds(1);

/// Owner of the on-disk document and its in-memory cache.
#[derive(Debug)]
pub struct DurableStore {
    path: PathBuf,
    cache: AppDocument,
    first_launch_ever: bool,
    last_stamp: OffsetDateTime,
}

impl DurableStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Initialization
    // ─────────────────────────────────────────────────────────────────────────

    /// Open the document at `path`, creating or repairing it as needed.
    ///
    /// This never fails: a missing document is created, an unreadable one is
    /// moved aside and replaced by a fresh default, and a document missing
    /// newer fields is filled in and written back once. If even the initial
    /// write fails, the store keeps running on its in-memory copy.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let now = OffsetDateTime::now_utc();

        let (cache, first_launch_ever, needs_write) = match load_document(&path, now) {
            Ok(Some(loaded)) => (loaded.document, loaded.first_launch_ever, loaded.changed),
            Ok(None) => {
                info!("No document at {}, creating a new one", path.display());
                (AppDocument::new(now), true, true)
            }
            Err(e) => {
                warn!(
                    "Document at {} is unreadable ({}); starting from an empty document",
                    path.display(),
                    e
                );
                match quarantine_corrupt(&path, now) {
                    Some(moved) => warn!("Previous document kept at {}", moved.display()),
                    None => warn!("Previous document could not be preserved; its notes are lost"),
                }
                (AppDocument::new(now), true, true)
            }
        };

        if needs_write {
            match save_document(&path, &cache) {
                Ok(()) => debug!("Initial document written to {}", path.display()),
                Err(e) => warn!("Failed to write initial document: {}", e),
            }
        }

        Self {
            path,
            cache,
            first_launch_ever,
            last_stamp: now,
        }
    }

    /// A copy of the document and whether this is the first launch ever.
    ///
    /// The flag reflects the document as it was found on disk, before any
    /// migration ran.
    pub fn initialize(&self) -> (AppDocument, bool) {
        (self.cache.clone(), self.first_launch_ever)
    }

    /// Path of the document on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn global_settings(&self) -> GlobalSettings {
        self.cache.global_settings.clone()
    }

    pub fn all_tabs(&self) -> Vec<Tab> {
        self.cache.tabs.clone()
    }

    pub fn tab(&self, id: &str) -> Option<Tab> {
        self.cache.tab(id).cloned()
    }

    pub fn journals(&self) -> Vec<JournalEntry> {
        self.cache.journals.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge `patch` into the global settings and persist.
    ///
    /// `lastOpened` is always set to the time of the call.
    pub fn update_global_settings(&mut self, patch: SettingsPatch) -> Result<GlobalSettings> {
        let stamp = self.stamp();
        let mut doc = self.cache.clone();
        doc.global_settings.apply(patch);
        doc.global_settings.last_opened = stamp;
        sanitize_settings(&mut doc.global_settings);

        self.commit(doc)?;
        debug!("Global settings updated");
        Ok(self.cache.global_settings.clone())
    }

    /// Normalize `tab`, insert or replace it by id, and persist.
    ///
    /// An update may be partial: fields it leaves out keep their stored
    /// values, and the stored layout always wins over the one sent.
    ///
    /// An existing tab keeps its original `created` timestamp. `modified` is
    /// set to a fresh write stamp, as is `lastModified` of every note whose
    /// content differs from the stored version.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidTab`: the tab has no id
    /// - `Error::DocumentSave`: the write failed; nothing was changed
    pub fn add_or_update_tab(&mut self, tab: impl Into<TabDraft>) -> Result<Tab> {
        let draft = tab.into();
        if draft.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            return Err(Error::InvalidTab("missing id".to_string()));
        }

        let draft = match draft.id.as_deref().and_then(|id| self.cache.tab(id)) {
            Some(existing) => draft.over(existing.clone()),
            None => draft,
        };

        let stamp = self.stamp();
        let mut tab = normalize_tab(draft, stamp);
        let mut doc = self.cache.clone();

        match doc.tab_index(&tab.id) {
            Some(index) => {
                let existing = &doc.tabs[index];
                merge_with_existing(&mut tab, existing, stamp);
                doc.tabs[index] = tab.clone();
                self.commit(doc)?;
                debug!("Updated tab: {}", tab.id);
            }
            None => {
                tab.metadata.modified = stamp.max(tab.metadata.created);
                doc.tabs.push(tab.clone());
                self.commit(doc)?;
                info!("Added new tab: {}", tab.id);
            }
        }

        Ok(tab)
    }

    /// Re-read a tab, let `update` change its window placement, and persist.
    ///
    /// Reading the current record first keeps unrelated concurrent changes
    /// (content, appearance) intact.
    pub fn update_window_placement<F>(&mut self, id: &str, update: F) -> Result<Tab>
    where
        F: FnOnce(&mut WindowPlacement),
    {
        let mut tab = self
            .tab(id)
            .ok_or_else(|| Error::TabNotFound(id.to_string()))?;
        update(&mut tab.window);
        self.add_or_update_tab(tab)
    }

    /// Remove a tab. Returns whether a record was actually removed.
    pub fn remove_tab(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.cache.tab_index(id) else {
            warn!("Tab not found for removal: {}", id);
            return Ok(false);
        };

        let mut doc = self.cache.clone();
        doc.tabs.remove(index);
        self.commit(doc)?;
        info!("Removed tab: {}", id);
        Ok(true)
    }

    /// Append a journal entry stamped with the current time.
    pub fn add_journal_entry(&mut self, journal: &str, mood: &str) -> Result<JournalEntry> {
        let stamp = self.stamp();
        let entry = JournalEntry {
            timestamp: stamp.format(&Rfc3339).map_err(|e| Error::DocumentSave {
                path: self.path.clone(),
                source: Box::new(e),
            })?,
            journal: journal.to_string(),
            mood: mood.to_string(),
        };

        let mut doc = self.cache.clone();
        doc.journals.push(entry.clone());
        self.commit(doc)?;
        Ok(entry)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Write `doc` and, only on success, make it the cache.
    fn commit(&mut self, doc: AppDocument) -> Result<()> {
        if let Err(e) = save_document(&self.path, &doc) {
            warn!("Write failed, keeping last saved state: {}", e);
            return Err(e);
        }
        self.cache = doc;
        Ok(())
    }

    /// A strictly increasing timestamp for this process.
    fn stamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        self.last_stamp = if now > self.last_stamp {
            now
        } else {
            self.last_stamp + STAMP_STEP
        };
        self.last_stamp
    }
}

/// Carry over what an update must not lose from the stored version.
fn merge_with_existing(tab: &mut Tab, existing: &Tab, stamp: OffsetDateTime) {
    tab.metadata.created = existing.metadata.created;
    tab.metadata.modified = stamp.max(existing.metadata.modified + STAMP_STEP);

    for (index, note) in tab.notes.iter_mut().enumerate() {
        let Some(old) = existing.notes.get(index).filter(|old| old.id == note.id) else {
            continue;
        };
        note.metadata.created = old.metadata.created;
        if note.content != old.content {
            note.metadata.last_modified = stamp
                .max(old.metadata.last_modified + STAMP_STEP)
                .max(note.metadata.created + STAMP_STEP);
        } else {
            note.metadata.last_modified = note.metadata.last_modified.max(note.metadata.created);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
