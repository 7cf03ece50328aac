//! Persisted data model for GD Notes
//!
//! This module defines the `AppDocument` root and every record nested in it,
//! with serde support for the pretty-printed JSON document on disk. Each
//! schema-complete type has a `*Draft` counterpart whose fields are all
//! optional; drafts are what arrives from disk or from a window, and
//! [`normalize`](super::normalize) turns them into complete records.

use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 2;

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default font family for new tabs and global settings.
pub const DEFAULT_FONT_FAMILY: &str = "'Open Sans', sans-serif";
/// Default font size in pixels.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;
/// Default color theme name.
pub const DEFAULT_COLOR_THEME: &str = "default";
/// Default note background.
pub const DEFAULT_BACKGROUND: &str = "#ffffff";
/// Default note text color.
pub const DEFAULT_TEXT_COLOR: &str = "#000000";
/// Default window position on both axes.
pub const DEFAULT_WINDOW_POSITION: i32 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Theme
// ─────────────────────────────────────────────────────────────────────────────

/// Global light/dark theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

// ─────────────────────────────────────────────────────────────────────────────
// Color Level
// ─────────────────────────────────────────────────────────────────────────────

/// Color intensity of a tab, or the four-color rainbow mode.
///
/// Serialized as a plain integer: `0..=3` for an intensity index and `-1`
/// for rainbow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorLevel {
    Intensity(u8),
    Rainbow,
}

impl ColorLevel {
    /// Highest intensity index.
    pub const MAX_INTENSITY: u8 = 3;

    /// Integer used on disk for rainbow mode.
    const RAINBOW_RAW: i64 = -1;

    /// Build a level from its on-disk integer, clamping out-of-range intensities.
    pub fn from_raw(raw: i64) -> Self {
        if raw == Self::RAINBOW_RAW {
            ColorLevel::Rainbow
        } else {
            ColorLevel::Intensity(raw.clamp(0, Self::MAX_INTENSITY as i64) as u8)
        }
    }

    fn from_float(raw: f64) -> Self {
        if raw.is_finite() {
            Self::from_raw(raw.round() as i64)
        } else {
            Self::default()
        }
    }

    /// The on-disk integer for this level.
    pub fn to_raw(self) -> i64 {
        match self {
            ColorLevel::Intensity(level) => level as i64,
            ColorLevel::Rainbow => Self::RAINBOW_RAW,
        }
    }

    pub fn is_rainbow(self) -> bool {
        matches!(self, ColorLevel::Rainbow)
    }
}

impl Default for ColorLevel {
    fn default() -> Self {
        ColorLevel::Intensity(1)
    }
}

impl Serialize for ColorLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_raw())
    }
}

impl<'de> Deserialize<'de> for ColorLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Hand-edited documents may carry `1.0` or `"1"`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        let level = match Raw::deserialize(deserializer)? {
            Raw::Int(raw) => ColorLevel::from_raw(raw),
            Raw::Float(raw) => ColorLevel::from_float(raw),
            Raw::Text(text) => match text.trim().parse::<f64>() {
                Ok(raw) => ColorLevel::from_float(raw),
                Err(_) => {
                    warn!("Unreadable color level {:?}, using default", text);
                    ColorLevel::default()
                }
            },
        };
        Ok(level)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Global Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Application-wide preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub default_font_family: String,
    pub default_font_size: f64,
    pub theme: Theme,
    pub default_color_theme: String,
    pub default_color_level: ColorLevel,
    pub first_launch_ever: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_opened: OffsetDateTime,
}

impl GlobalSettings {
    /// Settings for a brand-new document.
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            default_font_family: DEFAULT_FONT_FAMILY.to_string(),
            default_font_size: DEFAULT_FONT_SIZE,
            theme: Theme::default(),
            default_color_theme: DEFAULT_COLOR_THEME.to_string(),
            default_color_level: ColorLevel::default(),
            first_launch_ever: true,
            last_opened: now,
        }
    }

    /// Merge every field present in `patch` into these settings.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(family) = patch.default_font_family {
            self.default_font_family = family;
        }
        if let Some(size) = patch.default_font_size {
            self.default_font_size = size;
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(color_theme) = patch.default_color_theme {
            self.default_color_theme = color_theme;
        }
        if let Some(level) = patch.default_color_level {
            self.default_color_level = level;
        }
        if let Some(first) = patch.first_launch_ever {
            self.first_launch_ever = first;
        }
        if let Some(opened) = patch.last_opened {
            self.last_opened = opened;
        }
    }
}

/// Partial global settings, used both for `updateGlobalSettings` and for
/// reading settings written by older versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_color_theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_color_level: Option<ColorLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_launch_ever: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_opened: Option<OffsetDateTime>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Layout & Window
// ─────────────────────────────────────────────────────────────────────────────

/// Shape of a tab: one editable area or four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Layout {
    #[default]
    #[serde(rename = "single")]
    Single,
    #[serde(rename = "four-square")]
    FourSquare,
}

impl Layout {
    /// Number of note slots this layout holds.
    pub fn note_count(self) -> usize {
        match self {
            Layout::Single => 1,
            Layout::FourSquare => 4,
        }
    }

    /// Name used when no content is available to derive one from.
    pub fn default_name(self) -> &'static str {
        match self {
            Layout::Single => "Single Note",
            Layout::FourSquare => "Four Square",
        }
    }

    /// Default window edge length in pixels.
    pub fn default_window_extent(self) -> u32 {
        match self {
            Layout::Single => 400,
            Layout::FourSquare => 600,
        }
    }
}

/// Whether a tab's window was showing when last seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Open,
    #[default]
    Closed,
}

/// Last known placement and visibility of a tab's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowPlacement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_maximized: bool,
    pub state: WindowState,
}

// ─────────────────────────────────────────────────────────────────────────────
// Appearance
// ─────────────────────────────────────────────────────────────────────────────

/// Per-tab colors and fonts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    pub background_color: String,
    pub text_color: String,
    pub font_family: String,
    pub font_size: f64,
    pub is_dark_mode: bool,
    pub color_theme: String,
    pub color_level: ColorLevel,
}

// ─────────────────────────────────────────────────────────────────────────────
// Notes & Tabs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMetadata {
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
}

/// One editable area of a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    /// Rich text as serialized markup.
    pub content: String,
    pub metadata: NoteMetadata,
}

impl Note {
    /// An empty note in slot `index`.
    pub fn empty(index: usize, now: OffsetDateTime) -> Self {
        Self {
            id: note_id(index),
            content: String::new(),
            metadata: NoteMetadata {
                created: now,
                last_modified: now,
            },
        }
    }
}

/// Stable id of the note in slot `index`.
pub fn note_id(index: usize) -> String {
    format!("note-{}", index + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabMetadata {
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
}

/// One user-visible note or note group; the unit of window association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    pub layout: Layout,
    pub name: String,
    /// Set when the user named the tab explicitly; suppresses auto-naming.
    #[serde(default)]
    pub name_is_custom: bool,
    pub window: WindowPlacement,
    pub appearance: Appearance,
    pub notes: Vec<Note>,
    pub metadata: TabMetadata,
}

impl Tab {
    /// A fresh, empty tab record ready to be normalized and stored.
    pub fn draft(layout: Layout) -> TabDraft {
        TabDraft {
            id: Some(new_tab_id()),
            layout: Some(layout),
            ..TabDraft::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.window.state == WindowState::Open
    }
}

/// Generate a unique, time-ordered tab id.
pub fn new_tab_id() -> String {
    format!("tab-{}", uuid::Uuid::now_v7())
}

// ─────────────────────────────────────────────────────────────────────────────
// Journals
// ─────────────────────────────────────────────────────────────────────────────

/// Legacy mood-journal entry, preserved verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalEntry {
    pub timestamp: String,
    pub journal: String,
    pub mood: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Document Root
// ─────────────────────────────────────────────────────────────────────────────

/// The single persisted root document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDocument {
    pub version: u32,
    pub global_settings: GlobalSettings,
    pub tabs: Vec<Tab>,
    pub journals: Vec<JournalEntry>,
}

impl AppDocument {
    /// An empty document for a first launch.
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            version: SCHEMA_VERSION,
            global_settings: GlobalSettings::new(now),
            tabs: Vec::new(),
            journals: Vec::new(),
        }
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn tab_index(&self, id: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Drafts (possibly incomplete records)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowDraft {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub is_maximized: Option<bool>,
    pub state: Option<WindowState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppearanceDraft {
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub is_dark_mode: Option<bool>,
    pub color_theme: Option<String>,
    pub color_level: Option<ColorLevel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoteMetadataDraft {
    #[serde(with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteDraft {
    pub id: Option<String>,
    pub content: Option<String>,
    pub metadata: Option<NoteMetadataDraft>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabMetadataDraft {
    #[serde(with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub modified: Option<OffsetDateTime>,
}

/// A tab record that may be missing any field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TabDraft {
    pub id: Option<String>,
    pub layout: Option<Layout>,
    pub name: Option<String>,
    pub name_is_custom: Option<bool>,
    pub window: Option<WindowDraft>,
    pub appearance: Option<AppearanceDraft>,
    pub notes: Option<Vec<NoteDraft>>,
    pub metadata: Option<TabMetadataDraft>,
}

/// A document as found on disk, after migrations but before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentDraft {
    pub version: Option<u32>,
    pub global_settings: Option<SettingsPatch>,
    pub tabs: Vec<TabDraft>,
    pub journals: Vec<JournalEntry>,
}

impl WindowDraft {
    fn or(self, base: WindowDraft) -> WindowDraft {
        WindowDraft {
            x: self.x.or(base.x),
            y: self.y.or(base.y),
            width: self.width.or(base.width),
            height: self.height.or(base.height),
            is_maximized: self.is_maximized.or(base.is_maximized),
            state: self.state.or(base.state),
        }
    }
}

impl AppearanceDraft {
    fn or(self, base: AppearanceDraft) -> AppearanceDraft {
        AppearanceDraft {
            background_color: self.background_color.or(base.background_color),
            text_color: self.text_color.or(base.text_color),
            font_family: self.font_family.or(base.font_family),
            font_size: self.font_size.or(base.font_size),
            is_dark_mode: self.is_dark_mode.or(base.is_dark_mode),
            color_theme: self.color_theme.or(base.color_theme),
            color_level: self.color_level.or(base.color_level),
        }
    }
}

impl TabDraft {
    /// Complete this draft with the stored record it updates.
    ///
    /// Fields the draft leaves out keep their stored values. The layout is
    /// fixed at creation, so the stored one always wins.
    pub fn over(self, existing: Tab) -> TabDraft {
        let base = TabDraft::from(existing);
        TabDraft {
            id: self.id.or(base.id),
            layout: base.layout,
            name: self.name.or(base.name),
            name_is_custom: self.name_is_custom.or(base.name_is_custom),
            window: merge_nested(self.window, base.window, WindowDraft::or),
            appearance: merge_nested(self.appearance, base.appearance, AppearanceDraft::or),
            notes: self.notes.or(base.notes),
            metadata: self.metadata.or(base.metadata),
        }
    }
}

fn merge_nested<T>(draft: Option<T>, base: Option<T>, merge: fn(T, T) -> T) -> Option<T> {
    match (draft, base) {
        (Some(draft), Some(base)) => Some(merge(draft, base)),
        (draft, base) => draft.or(base),
    }
}

impl From<Note> for NoteDraft {
    fn from(note: Note) -> Self {
        Self {
            id: Some(note.id),
            content: Some(note.content),
            metadata: Some(NoteMetadataDraft {
                created: Some(note.metadata.created),
                last_modified: Some(note.metadata.last_modified),
            }),
        }
    }
}

impl From<Tab> for TabDraft {
    fn from(tab: Tab) -> Self {
        let w = tab.window;
        let a = tab.appearance;
        Self {
            id: Some(tab.id),
            layout: Some(tab.layout),
            name: Some(tab.name),
            name_is_custom: Some(tab.name_is_custom),
            window: Some(WindowDraft {
                x: Some(w.x),
                y: Some(w.y),
                width: Some(w.width),
                height: Some(w.height),
                is_maximized: Some(w.is_maximized),
                state: Some(w.state),
            }),
            appearance: Some(AppearanceDraft {
                background_color: Some(a.background_color),
                text_color: Some(a.text_color),
                font_family: Some(a.font_family),
                font_size: Some(a.font_size),
                is_dark_mode: Some(a.is_dark_mode),
                color_theme: Some(a.color_theme),
                color_level: Some(a.color_level),
            }),
            notes: Some(tab.notes.into_iter().map(NoteDraft::from).collect()),
            metadata: Some(TabMetadataDraft {
                created: Some(tab.metadata.created),
                modified: Some(tab.metadata.modified),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
