//! Normalization of possibly-incomplete records.
//!
//! Every function here fills absent fields with documented defaults without
//! discarding present ones, and clamps values to valid ranges. All of them
//! are idempotent: normalizing a normalized record (converted back into a
//! draft) with the same `now` yields the identical record.

use super::document::{
    new_tab_id, note_id, AppDocument, Appearance, AppearanceDraft, ColorLevel, DocumentDraft,
    GlobalSettings, Layout, Note, NoteDraft, NoteMetadata, SettingsPatch, Tab, TabDraft,
    TabMetadata, WindowDraft, WindowPlacement, DEFAULT_BACKGROUND, DEFAULT_COLOR_THEME,
    DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_TEXT_COLOR, DEFAULT_WINDOW_POSITION,
    SCHEMA_VERSION,
};
use super::naming::{derive_name, truncate_name};
use log::{debug, warn};
use std::collections::HashSet;
use time::OffsetDateTime;

// ─────────────────────────────────────────────────────────────────────────────
// Validation Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum allowed font size.
pub const MIN_FONT_SIZE: f64 = 8.0;
/// Maximum allowed font size.
pub const MAX_FONT_SIZE: f64 = 72.0;
/// Minimum window dimension.
pub const MIN_WINDOW_SIZE: u32 = 200;
/// Maximum window dimension.
pub const MAX_WINDOW_SIZE: u32 = 10000;

fn sanitize_font_size(size: Option<f64>, fallback: f64) -> f64 {
    match size {
        Some(s) if s.is_finite() => s.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE),
        _ => fallback,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tabs
// ─────────────────────────────────────────────────────────────────────────────

/// Turn a tab draft into a schema-complete tab.
///
/// Missing timestamps are filled with `now`; present ones are kept. The
/// `notes` sequence is padded with empty notes or truncated to the count the
/// layout requires.
pub fn normalize_tab(draft: TabDraft, now: OffsetDateTime) -> Tab {
    let layout = draft.layout.unwrap_or_default();
    let notes = normalize_notes(draft.notes.unwrap_or_default(), layout, now);

    let name_is_custom = draft.name_is_custom.unwrap_or(false);
    let name = match non_empty(draft.name) {
        Some(name) => truncate_name(&name),
        None => notes
            .first()
            .and_then(|n| derive_name(&n.content))
            .unwrap_or_else(|| layout.default_name().to_string()),
    };

    let metadata = draft.metadata.unwrap_or_default();
    let created = metadata.created.unwrap_or(now);
    let modified = metadata.modified.unwrap_or(now).max(created);

    Tab {
        id: non_empty(draft.id).unwrap_or_else(new_tab_id),
        layout,
        name,
        name_is_custom,
        window: normalize_window(draft.window.unwrap_or_default(), layout),
        appearance: normalize_appearance(draft.appearance.unwrap_or_default(), layout),
        notes,
        metadata: TabMetadata { created, modified },
    }
}

fn normalize_notes(drafts: Vec<NoteDraft>, layout: Layout, now: OffsetDateTime) -> Vec<Note> {
    let required = layout.note_count();
    if drafts.len() > required {
        debug!(
            "Truncating {} notes to {} for {:?} layout",
            drafts.len(),
            required,
            layout
        );
    }

    let mut notes: Vec<Note> = drafts
        .into_iter()
        .take(required)
        .enumerate()
        .map(|(i, draft)| normalize_note(draft, i, now))
        .collect();

    for i in notes.len()..required {
        notes.push(Note::empty(i, now));
    }
    notes
}

fn normalize_note(draft: NoteDraft, index: usize, now: OffsetDateTime) -> Note {
    let metadata = draft.metadata.unwrap_or_default();
    let created = metadata.created.unwrap_or(now);
    let last_modified = metadata.last_modified.unwrap_or(created).max(created);
    Note {
        id: non_empty(draft.id).unwrap_or_else(|| note_id(index)),
        content: draft.content.unwrap_or_default(),
        metadata: NoteMetadata {
            created,
            last_modified,
        },
    }
}

fn normalize_window(draft: WindowDraft, layout: Layout) -> WindowPlacement {
    let extent = layout.default_window_extent();
    WindowPlacement {
        x: draft.x.unwrap_or(DEFAULT_WINDOW_POSITION),
        y: draft.y.unwrap_or(DEFAULT_WINDOW_POSITION),
        width: draft
            .width
            .unwrap_or(extent)
            .clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE),
        height: draft
            .height
            .unwrap_or(extent)
            .clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE),
        is_maximized: draft.is_maximized.unwrap_or(false),
        state: draft.state.unwrap_or_default(),
    }
}

fn normalize_appearance(draft: AppearanceDraft, layout: Layout) -> Appearance {
    let mut color_level = draft.color_level.unwrap_or_default();
    // Rainbow needs four panes.
    if color_level.is_rainbow() && layout != Layout::FourSquare {
        color_level = ColorLevel::default();
    }

    Appearance {
        background_color: non_empty(draft.background_color)
            .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string()),
        text_color: non_empty(draft.text_color).unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
        font_family: non_empty(draft.font_family)
            .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
        font_size: sanitize_font_size(draft.font_size, DEFAULT_FONT_SIZE),
        is_dark_mode: draft.is_dark_mode.unwrap_or(false),
        color_theme: non_empty(draft.color_theme)
            .unwrap_or_else(|| DEFAULT_COLOR_THEME.to_string()),
        color_level,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings & Document
// ─────────────────────────────────────────────────────────────────────────────

/// Fill global settings from what was found on disk.
///
/// A document with no settings object at all is treated as a first launch;
/// one whose settings predate the `firstLaunchEver` flag is not.
pub fn normalize_settings(patch: Option<SettingsPatch>, now: OffsetDateTime) -> GlobalSettings {
    let mut settings = GlobalSettings::new(now);
    if let Some(patch) = patch {
        settings.first_launch_ever = false;
        settings.apply(patch);
    }
    sanitize_settings(&mut settings);
    settings
}

/// Clamp and repair settings values in place.
pub fn sanitize_settings(settings: &mut GlobalSettings) {
    settings.default_font_size =
        sanitize_font_size(Some(settings.default_font_size), DEFAULT_FONT_SIZE);
    if settings.default_font_family.trim().is_empty() {
        settings.default_font_family = DEFAULT_FONT_FAMILY.to_string();
    }
    if settings.default_color_theme.trim().is_empty() {
        settings.default_color_theme = DEFAULT_COLOR_THEME.to_string();
    }
}

/// Normalize a whole document draft.
///
/// Tabs sharing an id with an earlier tab are dropped so ids stay unique.
pub fn normalize_document(draft: DocumentDraft, now: OffsetDateTime) -> AppDocument {
    let mut seen = HashSet::new();
    let mut tabs = Vec::with_capacity(draft.tabs.len());
    for tab_draft in draft.tabs {
        let tab = normalize_tab(tab_draft, now);
        if seen.insert(tab.id.clone()) {
            tabs.push(tab);
        } else {
            warn!("Dropping duplicate tab id '{}' from document", tab.id);
        }
    }

    AppDocument {
        version: SCHEMA_VERSION,
        global_settings: normalize_settings(draft.global_settings, now),
        tabs,
        journals: draft.journals,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
