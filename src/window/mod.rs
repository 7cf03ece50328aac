//! Window management for GD Notes
//!
//! Every tab is shown in at most one top-level window. This module defines
//! the boundary to whatever actually draws those windows ([`WindowSystem`]),
//! the messages windows receive, and the [`WindowRegistry`] that maps tab ids
//! to live windows.

mod headless;
mod registry;

pub use headless::{HeadlessWindow, HeadlessWindows};
pub use registry::{OpenedWindow, WindowRegistry};

use crate::error::Result;
use crate::store::{Tab, WindowPlacement};
use crate::sync::TabEvent;
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers & Geometry
// ─────────────────────────────────────────────────────────────────────────────

/// Handle of one top-level window, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// Position, size and maximized state of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_maximized: bool,
}

impl Geometry {
    /// The geometry recorded in a tab's placement.
    pub fn of(placement: &WindowPlacement) -> Self {
        Self {
            x: placement.x,
            y: placement.y,
            width: placement.width,
            height: placement.height,
            is_maximized: placement.is_maximized,
        }
    }

    /// Overwrite the geometry part of `placement`, leaving its state alone.
    pub fn apply_to(self, placement: &mut WindowPlacement) {
        placement.x = self.x;
        placement.y = self.y;
        placement.width = self.width;
        placement.height = self.height;
        placement.is_maximized = self.is_maximized;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// Messages delivered to a window's content.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowMessage {
    /// The tab a freshly created window should display; sent once.
    Initialize(Box<Tab>),
    /// A metadata change made in another window.
    Tab(TabEvent),
}

// ─────────────────────────────────────────────────────────────────────────────
// Window System Boundary
// ─────────────────────────────────────────────────────────────────────────────

/// The platform side of window management.
///
/// Implementations create and manipulate real windows; the registry only
/// ever talks to windows through this trait. A window that was destroyed
/// must report `is_alive == false` and reject further calls with an error
/// instead of panicking.
pub trait WindowSystem {
    /// Create a window placed according to `placement` for the given tab.
    fn create(&mut self, tab_id: &str, placement: &WindowPlacement) -> Result<WindowId>;

    /// Whether `window` still exists.
    fn is_alive(&self, window: WindowId) -> bool;

    /// Bring `window` to the foreground, restoring it if minimized.
    fn focus(&mut self, window: WindowId) -> Result<()>;

    fn minimize(&mut self, window: WindowId) -> Result<()>;

    /// Current geometry, or `None` once the window is gone.
    fn geometry(&self, window: WindowId) -> Option<Geometry>;

    /// Destroy `window`.
    fn close(&mut self, window: WindowId) -> Result<()>;

    /// Deliver `message` to the window's content. Fire-and-forget.
    fn send(&mut self, window: WindowId, message: WindowMessage) -> Result<()>;
}
