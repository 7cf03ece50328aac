//! Debounced save scheduling.
//!
//! `SaveController` decides *when* a window should write its tab; it never
//! performs I/O itself. Time is passed in explicitly, so the state machine
//! is driven by whatever clock the caller uses:
//!
//! ```text
//! clean --edit--> dirty --(quiet period | autosave | blur | unload)--> saving
//! saving --confirmed--> clean      (or dirty, if edits arrived meanwhile)
//! saving --failed-----> dirty      (retried after another quiet period)
//! ```
//!
//! Every edit bumps a generation counter. A save carries the generation it
//! covers, and only a confirmed save of the latest generation makes the
//! controller clean again.

use crate::config::AppConfig;
use log::{debug, warn};
use std::time::{Duration, Instant};

/// Externally visible save state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Clean,
    Dirty,
    Saving,
}

/// Why a save was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// The quiet period after the last edit elapsed.
    Debounce,
    /// The periodic autosave timer fired while dirty.
    Autosave,
    /// The window lost input focus.
    Blur,
    /// The window is about to be destroyed.
    Unload,
}

/// A save the caller must perform and then report back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a started save must be reported with `finish`"]
pub struct SaveTicket {
    generation: u64,
    pub trigger: SaveTrigger,
}

/// Per-tab save scheduler.
#[derive(Debug, Clone)]
pub struct SaveController {
    debounce: Duration,
    autosave_interval: Duration,
    /// Bumped on every edit.
    generation: u64,
    /// Latest generation the store confirmed.
    saved: u64,
    /// Generation of the save currently in flight.
    in_flight: Option<u64>,
    last_edit: Option<Instant>,
    autosave_due: Instant,
}

impl SaveController {
    pub fn new(debounce: Duration, autosave_interval: Duration, now: Instant) -> Self {
        Self {
            debounce,
            autosave_interval,
            generation: 0,
            saved: 0,
            in_flight: None,
            last_edit: None,
            autosave_due: now + autosave_interval,
        }
    }

    pub fn from_config(config: &AppConfig, now: Instant) -> Self {
        Self::new(config.debounce(), config.autosave_interval(), now)
    }

    pub fn state(&self) -> SaveState {
        if self.in_flight.is_some() {
            SaveState::Saving
        } else if self.is_dirty() {
            SaveState::Dirty
        } else {
            SaveState::Clean
        }
    }

    /// Whether edits exist that the store has not confirmed.
    pub fn is_dirty(&self) -> bool {
        self.generation > self.saved
    }

    /// Whether edits exist that no save (finished or in flight) covers.
    fn has_unsaved(&self) -> bool {
        self.generation > self.in_flight.unwrap_or(self.saved)
    }

    /// Record a content change and restart the quiet period.
    pub fn edit(&mut self, now: Instant) {
        self.generation += 1;
        self.last_edit = Some(now);
    }

    /// Check the timers. Returns a ticket when a save should start now.
    ///
    /// At most one timer-driven save is in flight at a time.
    pub fn poll(&mut self, now: Instant) -> Option<SaveTicket> {
        let autosave_fired = now >= self.autosave_due;
        if autosave_fired {
            self.autosave_due = now + self.autosave_interval;
        }

        if self.in_flight.is_some() || !self.has_unsaved() {
            return None;
        }

        let quiet = self
            .last_edit
            .map_or(true, |edited| now.duration_since(edited) >= self.debounce);
        if quiet {
            Some(self.start(SaveTrigger::Debounce))
        } else if autosave_fired {
            Some(self.start(SaveTrigger::Autosave))
        } else {
            None
        }
    }

    /// Start a save immediately if anything is unsaved (blur, unload).
    pub fn force(&mut self, trigger: SaveTrigger) -> Option<SaveTicket> {
        if self.has_unsaved() {
            Some(self.start(trigger))
        } else {
            None
        }
    }

    fn start(&mut self, trigger: SaveTrigger) -> SaveTicket {
        debug!("Save started ({:?}) at generation {}", trigger, self.generation);
        self.in_flight = Some(self.generation);
        SaveTicket {
            generation: self.generation,
            trigger,
        }
    }

    /// Report the outcome of a save started by `ticket`.
    ///
    /// Success marks everything up to the ticket's generation as saved. A
    /// failure keeps the controller dirty and restarts the quiet period so
    /// the save is retried later rather than in a tight loop.
    pub fn finish(&mut self, ticket: SaveTicket, succeeded: bool, now: Instant) {
        if self.in_flight == Some(ticket.generation) {
            self.in_flight = None;
        }
        if succeeded {
            self.saved = self.saved.max(ticket.generation);
        } else {
            warn!(
                "Save ({:?}) failed; {} edit(s) remain unsaved",
                ticket.trigger,
                self.generation - self.saved
            );
            self.last_edit = Some(now);
        }
    }

    /// The next instant at which [`poll`](Self::poll) may start a save.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.in_flight.is_some() || !self.has_unsaved() {
            return None;
        }
        let debounce_due = self.last_edit.map(|edited| edited + self.debounce);
        Some(debounce_due.map_or(self.autosave_due, |d| d.min(self.autosave_due)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(1000);
    const AUTOSAVE: Duration = Duration::from_secs(10);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn controller(t0: Instant) -> SaveController {
        SaveController::new(DEBOUNCE, AUTOSAVE, t0)
    }

    #[test]
    fn test_starts_clean() {
        let t0 = Instant::now();
        let mut save = controller(t0);
        assert_eq!(save.state(), SaveState::Clean);
        assert!(save.poll(t0 + ms(60_000)).is_none());
        assert!(save.force(SaveTrigger::Blur).is_none());
    }

    #[test]
    fn test_edit_marks_dirty_immediately() {
        let t0 = Instant::now();
        let mut save = controller(t0);
        save.edit(t0);
        assert_eq!(save.state(), SaveState::Dirty);
        assert!(save.is_dirty());
    }

    #[test]
    fn test_trailing_edge_debounce() {
        let t0 = Instant::now();
        let mut save = controller(t0);

        // Typing every 300ms keeps pushing the save back.
        for i in 0..5 {
            save.edit(t0 + ms(300 * i));
            assert!(save.poll(t0 + ms(300 * i + 100)).is_none());
        }
        let last_edit = t0 + ms(1200);
        assert!(save.poll(last_edit + ms(999)).is_none());

        let ticket = save.poll(last_edit + DEBOUNCE).unwrap();
        assert_eq!(ticket.trigger, SaveTrigger::Debounce);
        assert_eq!(save.state(), SaveState::Saving);

        save.finish(ticket, true, last_edit + DEBOUNCE);
        assert_eq!(save.state(), SaveState::Clean);
    }

    #[test]
    fn test_autosave_fires_during_continuous_typing() {
        let t0 = Instant::now();
        let mut save = controller(t0);
        let mut fired = None;
        for i in 0..60 {
            let now = t0 + ms(200 * i);
            save.edit(now);
            if let Some(ticket) = save.poll(now) {
                fired = Some((ticket, now));
                break;
            }
        }
        let (ticket, when) = fired.expect("autosave should fire");
        assert_eq!(ticket.trigger, SaveTrigger::Autosave);
        assert!(when >= t0 + AUTOSAVE);
    }

    #[test]
    fn test_autosave_only_when_dirty() {
        let t0 = Instant::now();
        let mut save = controller(t0);
        assert!(save.poll(t0 + AUTOSAVE).is_none());
        assert!(save.poll(t0 + AUTOSAVE * 2).is_none());
    }

    #[test]
    fn test_blur_and_unload_force_a_save() {
        let t0 = Instant::now();
        let mut save = controller(t0);
        save.edit(t0);

        let ticket = save.force(SaveTrigger::Blur).unwrap();
        assert_eq!(ticket.trigger, SaveTrigger::Blur);
        save.finish(ticket, true, t0);
        assert!(save.force(SaveTrigger::Unload).is_none());
    }

    #[test]
    fn test_failed_save_stays_dirty_and_retries() {
        let t0 = Instant::now();
        let mut save = controller(t0);
        save.edit(t0);
        let ticket = save.poll(t0 + DEBOUNCE).unwrap();

        let failed_at = t0 + DEBOUNCE + ms(5);
        save.finish(ticket, false, failed_at);
        assert_eq!(save.state(), SaveState::Dirty);

        // Not immediately: the quiet period restarts.
        assert!(save.poll(failed_at + ms(1)).is_none());
        let retry = save.poll(failed_at + DEBOUNCE).unwrap();
        save.finish(retry, true, failed_at + DEBOUNCE);
        assert_eq!(save.state(), SaveState::Clean);
    }

    #[test]
    fn test_edit_during_save_keeps_dirty() {
        let t0 = Instant::now();
        let mut save = controller(t0);
        save.edit(t0);
        let ticket = save.poll(t0 + DEBOUNCE).unwrap();

        save.edit(t0 + DEBOUNCE + ms(10));
        // Timer-driven saves wait for the in-flight one.
        assert!(save.poll(t0 + DEBOUNCE * 3).is_none());

        save.finish(ticket, true, t0 + DEBOUNCE * 3);
        assert_eq!(save.state(), SaveState::Dirty);
        assert!(save.poll(t0 + DEBOUNCE * 3).is_some());
    }

    #[test]
    fn test_unload_during_save_covers_newer_edits() {
        let t0 = Instant::now();
        let mut save = controller(t0);
        save.edit(t0);
        let first = save.poll(t0 + DEBOUNCE).unwrap();
        save.edit(t0 + DEBOUNCE + ms(1));

        let last = save.force(SaveTrigger::Unload).unwrap();
        save.finish(first, true, t0 + DEBOUNCE * 2);
        assert!(save.is_dirty());
        save.finish(last, true, t0 + DEBOUNCE * 2);
        assert_eq!(save.state(), SaveState::Clean);
    }

    #[test]
    fn test_next_deadline() {
        let t0 = Instant::now();
        let mut save = controller(t0);
        assert!(save.next_deadline().is_none());

        save.edit(t0 + ms(100));
        assert_eq!(save.next_deadline(), Some(t0 + ms(100) + DEBOUNCE));
    }

    #[test]
    fn test_from_config() {
        let config = AppConfig {
            debounce_ms: 250,
            ..AppConfig::default()
        };
        let t0 = Instant::now();
        let mut save = SaveController::from_config(&config, t0);
        save.edit(t0);
        assert!(save.poll(t0 + ms(249)).is_none());
        assert!(save.poll(t0 + ms(250)).is_some());
    }
}
