use std::time::Duration;

use tokio::time::Instant;

use crate::config::SyncConfig;

/// User-facing save indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// Internal state of the save machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    /// A save is scheduled and waiting for its debounce deadline.
    PendingSave,
    Saving,
    /// A transient failure occurred; `attempt` is the attempt about to run.
    Retrying { attempt: u32 },
    /// The last save failed for good. Cleared by the next scheduled save.
    Error,
}

/// How soon a change needs to reach the store. Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    /// Preferences, weights, summaries, evaluation header: cheap to redo.
    Routine,
    /// Bullet list edits: losing one is costly.
    Critical,
    /// Explicit "save now".
    Immediate,
}

impl Urgency {
    pub fn debounce(self, config: &SyncConfig) -> Duration {
        match self {
            Urgency::Routine => config.routine_debounce,
            Urgency::Critical => config.critical_debounce,
            Urgency::Immediate => config.immediate_debounce,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSave {
    pub deadline: Instant,
    pub urgency: Urgency,
}

impl PendingSave {
    /// Debounces a new save request into the existing one.
    ///
    /// Every request restarts the window for its urgency, but a pending save
    /// of higher urgency is never pushed later by a less urgent request.
    pub fn schedule(
        existing: Option<PendingSave>,
        urgency: Urgency,
        now: Instant,
        config: &SyncConfig,
    ) -> PendingSave {
        let deadline = now + urgency.debounce(config);
        match existing {
            Some(prev) if prev.urgency > urgency => PendingSave {
                deadline: deadline.min(prev.deadline),
                urgency: prev.urgency,
            },
            _ => PendingSave { deadline, urgency },
        }
    }
}

/// Earliest instant the next save may start, if the minimum interval since
/// the last successful save has not yet elapsed.
pub fn throttled_until(
    last_saved_at: Option<Instant>,
    min_interval: Duration,
    now: Instant,
) -> Option<Instant> {
    last_saved_at
        .map(|t| t + min_interval)
        .filter(|ready_at| *ready_at > now)
}
