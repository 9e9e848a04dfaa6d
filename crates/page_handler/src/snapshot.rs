//! Persisted `PageState` snapshot format: versioned, UTF-8 JSON, with
//! base64-encoded opaque script state.

use crate::error::ScheduleError;
use crate::page_state::{LoadState, NavigationKind, PageState};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Scroll {
    x: f64,
    y: f64,
}

/// The on-the-wire snapshot format described in the external interfaces
/// section: a versioned JSON object with scroll, form, selection, and
/// base64-encoded opaque script state.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PageStateSnapshot {
    v: u32,
    epoch: u64,
    url: String,
    state: LoadState,
    scroll: Scroll,
    form: HashMap<String, String>,
    selected: Vec<String>,
    script_state: String,
    timestamp: String,
}

fn iso8601_now() -> String {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}", since_epoch.as_secs())
}

impl PageStateSnapshot {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn from_page_state(state: &PageState) -> Self {
        Self {
            v: SNAPSHOT_VERSION,
            epoch: state.epoch,
            url: state.url.clone(),
            state: state.state,
            scroll: Scroll {
                x: state.scroll.0,
                y: state.scroll.1,
            },
            form: state.form_snapshot.clone(),
            selected: state.selected.clone(),
            script_state: BASE64.encode(&state.script_state),
            timestamp: iso8601_now(),
        }
    }

    /// # Errors
    /// Returns `IncompatibleSnapshot` if the `v` field does not match the
    /// version this build understands.
    pub fn into_page_state(self, nav_kind: NavigationKind) -> Result<PageState, ScheduleError> {
        if self.v != SNAPSHOT_VERSION {
            return Err(ScheduleError::IncompatibleSnapshot {
                found: self.v,
                expected: SNAPSHOT_VERSION,
            });
        }
        let script_state = BASE64.decode(self.script_state.as_bytes()).unwrap_or_default();
        Ok(PageState {
            epoch: self.epoch,
            url: self.url,
            state: self.state,
            nav_kind,
            scroll: (self.scroll.x, self.scroll.y),
            form_snapshot: self.form,
            selected: self.selected,
            script_state,
        })
    }

    /// # Errors
    /// Returns an error if the snapshot cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// # Errors
    /// Returns an error if `json` is not valid snapshot JSON, or
    /// `IncompatibleSnapshot` is raised downstream by `into_page_state`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_state::NavigationKind;

    #[test]
    fn round_trips_through_json() -> Result<(), anyhow::Error> {
        let mut original = PageState::new(3, "http://ex/a", NavigationKind::Navigate);
        original.scroll = (12.5, 40.0);
        original.form_snapshot.insert("q".to_owned(), "x".to_owned());
        original.script_state = vec![1, 2, 3, 4];

        let snapshot = PageStateSnapshot::from_page_state(&original);
        let json = snapshot.to_json()?;
        let restored_snapshot = PageStateSnapshot::from_json(&json)?;
        let restored = restored_snapshot.into_page_state(NavigationKind::Navigate)?;

        assert_eq!(restored.url, original.url);
        assert_eq!(restored.scroll, original.scroll);
        assert_eq!(restored.script_state, original.script_state);
        Ok(())
    }

    #[test]
    fn unknown_version_is_rejected() -> Result<(), anyhow::Error> {
        let original = PageState::new(0, "http://ex/a", NavigationKind::Navigate);
        let mut snapshot = PageStateSnapshot::from_page_state(&original);
        snapshot.v = 99;
        let result = snapshot.into_page_state(NavigationKind::Navigate);
        assert!(matches!(result, Err(ScheduleError::IncompatibleSnapshot { found: 99, .. })));
        Ok(())
    }
}
