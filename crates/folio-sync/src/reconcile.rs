//! Push reconciliation
//!
//! Decides, per remote push, whether subscribers hear about it. Content is
//! always merged by the engine; only notification is gated here.
//!
//! The first push after start initializes the applied revision silently.
//! After that a push notifies exactly once when its revision is strictly
//! newer than the last applied one. Repeats and stale pushes are
//! suppressed, which also absorbs the echo cascade of a client hearing its
//! own writes.

use folio_content::Revision;

/// What to do with a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushDecision {
    /// First push: state recorded, nobody notified
    Initialized,
    /// Newer revision: notify subscribers
    Notify,
    /// Already applied or older: stay quiet
    Suppressed,
}

impl PushDecision {
    /// Check if subscribers should be notified
    #[inline]
    #[must_use]
    pub fn should_notify(self) -> bool {
        matches!(self, Self::Notify)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Uninitialized,
    Applied(Option<Revision>),
}

/// Revision tracker for one subscription lifetime
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    phase: Phase,
}

impl Reconciler {
    /// Tracker awaiting its initialization push
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a push carrying `revision`
    pub fn observe(&mut self, revision: Option<Revision>) -> PushDecision {
        match self.phase {
            Phase::Uninitialized => {
                self.phase = Phase::Applied(revision);
                PushDecision::Initialized
            }
            Phase::Applied(applied) if revision > applied => {
                self.phase = Phase::Applied(revision);
                PushDecision::Notify
            }
            Phase::Applied(_) => PushDecision::Suppressed,
        }
    }

    /// Check if the initialization push has been seen
    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !matches!(self.phase, Phase::Uninitialized)
    }

    /// Last revision that was applied
    #[must_use]
    pub fn applied(&self) -> Option<Revision> {
        match self.phase {
            Phase::Uninitialized => None,
            Phase::Applied(rev) => rev,
        }
    }

    /// Forget everything; the next push initializes again
    pub fn reset(&mut self) {
        self.phase = Phase::Uninitialized;
    }
}
