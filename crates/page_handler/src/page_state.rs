//! C9 — `PageStateMachine`: per-page load state, navigation kind, and
//! history with snapshot/restore.

use crate::error::{illegal_transition, ScheduleError};
use std::collections::HashMap;
use std::time::SystemTime;

/// Coarse page lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LoadState {
    Initial,
    Loading,
    Interactive,
    Complete,
    Failed,
}

/// How a navigation was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Navigate,
    Reload,
    BackForward,
}

/// A page's full, serializable state: scroll position, form contents,
/// selection, and opaque script VM state.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub epoch: u64,
    pub url: String,
    pub state: LoadState,
    pub nav_kind: NavigationKind,
    pub scroll: (f64, f64),
    pub form_snapshot: HashMap<String, String>,
    pub selected: Vec<String>,
    pub script_state: Vec<u8>,
}

impl PageState {
    #[must_use]
    pub fn new(epoch: u64, url: &str, nav_kind: NavigationKind) -> Self {
        Self {
            epoch,
            url: url.to_owned(),
            state: LoadState::Initial,
            nav_kind,
            scroll: (0.0, 0.0),
            form_snapshot: HashMap::new(),
            selected: Vec::new(),
            script_state: Vec::new(),
        }
    }
}

/// A snapshot taken at a point in time, for history navigation.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub url: String,
    pub state: PageState,
    pub recorded_at: SystemTime,
}

/// An ordered sequence of visited pages with a cursor; navigating to a new
/// URL truncates any forward entries.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new entry, truncating any forward (redo) entries.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.cursor);
        self.entries.push(entry);
        self.cursor = self.entries.len();
    }

    #[must_use]
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.cursor.checked_sub(1).and_then(|idx| self.entries.get(idx))
    }

    /// Move the cursor back one entry and return it, if possible.
    pub fn go_back(&mut self) -> Option<&HistoryEntry> {
        let idx = self.cursor.checked_sub(2)?;
        self.cursor = idx + 1;
        self.entries.get(idx)
    }

    pub fn go_forward(&mut self) -> Option<&HistoryEntry> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        let entry = self.entries.get(self.cursor);
        self.cursor += 1;
        entry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// C9: drives a single page's `LoadState` through the transition table,
/// recording history on `Navigate` but not on `Reload`.
#[derive(Debug)]
pub struct PageStateMachine {
    current: PageState,
    history: History,
}

impl PageStateMachine {
    #[must_use]
    pub fn new(epoch: u64, url: &str) -> Self {
        Self {
            current: PageState::new(epoch, url, NavigationKind::Navigate),
            history: History::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> LoadState {
        self.current.state
    }

    #[must_use]
    pub const fn current_page(&self) -> &PageState {
        &self.current
    }

    /// Begin a new navigation. `Navigate` appends the previous page to
    /// history (if any); `Reload` leaves history untouched; `BackForward`
    /// repositions the cursor and restores the stored `PageState`.
    ///
    /// # Errors
    /// Returns `IllegalTransition` if `BackForward` is requested but there
    /// is nothing to go back or forward to.
    pub fn start_navigation(&mut self, epoch: u64, url: &str, kind: NavigationKind) -> Result<(), ScheduleError> {
        match kind {
            NavigationKind::Navigate => {
                self.history.push(HistoryEntry {
                    url: self.current.url.clone(),
                    state: self.current.clone(),
                    recorded_at: SystemTime::now(),
                });
                self.current = PageState::new(epoch, url, kind);
            }
            NavigationKind::Reload => {
                self.current = PageState::new(epoch, &self.current.url, kind);
            }
            NavigationKind::BackForward => {
                let restored = self
                    .history
                    .go_back()
                    .ok_or_else(|| illegal_transition("back/forward with empty history"))?
                    .clone();
                self.current = restored.state;
                self.current.epoch = epoch;
            }
        }
        self.current.state = LoadState::Loading;
        Ok(())
    }

    /// # Errors
    /// Returns `IllegalTransition` if the event is not valid from the
    /// current state.
    pub fn on_dom_content_loaded(&mut self) -> Result<(), ScheduleError> {
        self.transition_to(LoadState::Interactive, &[LoadState::Loading])
    }

    /// # Errors
    /// Returns `IllegalTransition` if the event is not valid from the
    /// current state.
    pub fn on_load_dispatched(&mut self) -> Result<(), ScheduleError> {
        self.transition_to(LoadState::Complete, &[LoadState::Interactive])
    }

    /// # Errors
    /// Returns `IllegalTransition` from a terminal state; `Failed` is
    /// reachable from any non-terminal state.
    pub fn on_fatal_error(&mut self) -> Result<(), ScheduleError> {
        self.transition_to(LoadState::Failed, &[LoadState::Initial, LoadState::Loading, LoadState::Interactive])
    }

    /// Restore a snapshot. Only valid once the page has reached `Interactive`
    /// or later, matching the source's restriction on when script/DOM state
    /// is coherent enough to receive a restore.
    ///
    /// # Errors
    /// Returns `IllegalTransition` if the page has not yet reached
    /// `Interactive`.
    pub fn restore_state(&mut self, snapshot: PageState) -> Result<(), ScheduleError> {
        if matches!(self.current.state, LoadState::Initial | LoadState::Loading) {
            return Err(illegal_transition("restore_state before Interactive"));
        }
        self.current = snapshot;
        Ok(())
    }

    fn transition_to(&mut self, to: LoadState, allowed_from: &[LoadState]) -> Result<(), ScheduleError> {
        if !allowed_from.contains(&self.current.state) {
            return Err(illegal_transition(format!("{:?} -> {:?}", self.current.state, to)));
        }
        self.current.state = to;
        Ok(())
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_reload_back_forward_follow_transition_table() -> Result<(), ScheduleError> {
        let mut machine = PageStateMachine::new(0, "http://ex/a");
        assert_eq!(machine.state(), LoadState::Initial);
        machine.start_navigation(0, "http://ex/a", NavigationKind::Navigate)?;
        assert_eq!(machine.state(), LoadState::Loading);
        machine.on_dom_content_loaded()?;
        machine.on_load_dispatched()?;
        assert_eq!(machine.state(), LoadState::Complete);

        machine.start_navigation(1, "http://ex/b", NavigationKind::Navigate)?;
        assert_eq!(machine.history().len(), 1);

        machine.start_navigation(2, "http://ex/b", NavigationKind::BackForward)?;
        assert_eq!(machine.current_page().url, "http://ex/a");
        Ok(())
    }

    #[test]
    fn fatal_error_reachable_from_loading() -> Result<(), ScheduleError> {
        let mut machine = PageStateMachine::new(0, "http://ex/a");
        machine.start_navigation(0, "http://ex/a", NavigationKind::Navigate)?;
        machine.on_fatal_error()?;
        assert_eq!(machine.state(), LoadState::Failed);
        Ok(())
    }

    #[test]
    fn restore_state_rejected_before_interactive() {
        let mut machine = PageStateMachine::new(0, "http://ex/a");
        let snapshot = PageState::new(0, "http://ex/a", NavigationKind::Navigate);
        assert!(machine.restore_state(snapshot).is_err());
    }

    #[test]
    fn reload_does_not_touch_history() -> Result<(), ScheduleError> {
        let mut machine = PageStateMachine::new(0, "http://ex/a");
        machine.start_navigation(0, "http://ex/a", NavigationKind::Navigate)?;
        machine.start_navigation(1, "http://ex/a", NavigationKind::Reload)?;
        assert!(machine.history().is_empty());
        Ok(())
    }
}
