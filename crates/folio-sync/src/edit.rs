//! Edit-mode session
//!
//! UI-only toggle state for the owner's in-place editor. Editing and
//! previewing are variants of one [`EditMode`], so they can never both be
//! active. No role check happens here: callers only expose these actions to
//! the owner.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// Current editor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Plain page
    #[default]
    Viewing,
    /// Fields are editable in place
    Editing,
    /// Page rendered as viewers will see it
    Previewing,
}

/// Snapshot of the edit session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EditState {
    /// Active mode
    pub mode: EditMode,
    /// An accepted write happened since the last save
    pub has_unsaved_changes: bool,
    /// When changes were last marked saved
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl EditState {
    /// Check if editing
    #[inline]
    #[must_use]
    pub fn editing(&self) -> bool {
        self.mode == EditMode::Editing
    }

    /// Check if previewing
    #[inline]
    #[must_use]
    pub fn previewing(&self) -> bool {
        self.mode == EditMode::Previewing
    }
}

/// Edit session state machine
#[derive(Debug)]
pub struct EditSession {
    state: watch::Sender<EditState>,
}

impl EditSession {
    /// Session in viewing mode with nothing unsaved
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(EditState::default());
        Self { state }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> EditState {
        *self.state.borrow()
    }

    /// Observe state changes
    #[inline]
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<EditState> {
        self.state.subscribe()
    }

    /// Flip editing; leaves preview if it was active
    pub fn toggle_edit(&self) -> EditState {
        self.update(|s| {
            s.mode = match s.mode {
                EditMode::Editing => EditMode::Viewing,
                EditMode::Viewing | EditMode::Previewing => EditMode::Editing,
            };
        })
    }

    /// Flip previewing; leaves editing if it was active
    pub fn toggle_preview(&self) -> EditState {
        self.update(|s| {
            s.mode = match s.mode {
                EditMode::Previewing => EditMode::Viewing,
                EditMode::Viewing | EditMode::Editing => EditMode::Previewing,
            };
        })
    }

    /// Record that an accepted write happened
    pub fn mark_unsaved(&self) {
        self.state.send_if_modified(|s| {
            let changed = !s.has_unsaved_changes;
            s.has_unsaved_changes = true;
            changed
        });
    }

    /// Clear the unsaved marker
    ///
    /// Writes were already sent when they were made; nothing is written here.
    pub fn save(&self) -> EditState {
        let state = self.update(|s| {
            s.has_unsaved_changes = false;
            s.last_saved_at = Some(Utc::now());
        });
        tracing::debug!("edit session saved");
        state
    }

    fn update(&self, f: impl FnOnce(&mut EditState)) -> EditState {
        self.state.send_modify(f);
        self.state()
    }
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_and_preview_are_exclusive() {
        let session = EditSession::new();

        let s = session.toggle_edit();
        assert!(s.editing() && !s.previewing());

        let s = session.toggle_preview();
        assert!(s.previewing() && !s.editing());

        let s = session.toggle_edit();
        assert!(s.editing() && !s.previewing());

        let s = session.toggle_edit();
        assert_eq!(s.mode, EditMode::Viewing);

        session.toggle_preview();
        assert_eq!(session.toggle_preview().mode, EditMode::Viewing);
    }

    #[test]
    fn unsaved_cleared_only_by_save() {
        let session = EditSession::new();
        session.toggle_edit();
        session.mark_unsaved();
        session.toggle_edit();
        session.toggle_preview();
        assert!(session.state().has_unsaved_changes);

        let saved = session.save();
        assert!(!saved.has_unsaved_changes);
        assert!(saved.last_saved_at.is_some());
    }

    #[test]
    fn save_without_changes_is_harmless() {
        let session = EditSession::new();
        let s = session.save();
        assert_eq!(s.mode, EditMode::Viewing);
        assert!(!s.has_unsaved_changes);
    }

    #[tokio::test]
    async fn watchers_observe_transitions() {
        let session = EditSession::new();
        let mut rx = session.watch();

        session.mark_unsaved();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().has_unsaved_changes);

        // Repeated marks do not wake watchers
        session.mark_unsaved();
        assert!(!rx.has_changed().unwrap());
    }
}
