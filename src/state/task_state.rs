/// Task state definitions for tracking crawl progress
///
/// This module defines all states a crawl task can be in and which transitions
/// between them are legal.
use std::fmt;

/// Represents the current state of a task in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task sits in the frontier waiting for a concurrency permit
    Pending,

    /// Task is being fetched, extracted and persisted
    InFlight,

    /// Task failed transiently and waits out its backoff delay
    RetryScheduled,

    // ===== Terminal States =====
    /// Resource was fetched and its artifact persisted
    Succeeded,

    /// Task gave up (permanent failure, retry exhaustion, or persistence failure)
    Abandoned,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Abandoned)
    }

    /// Returns true if the lifecycle allows moving from `self` to `next`
    ///
    /// ```text
    /// Pending -> InFlight -> { Succeeded | RetryScheduled -> Pending | Abandoned }
    /// ```
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InFlight)
                | (Self::InFlight, Self::Succeeded)
                | (Self::InFlight, Self::RetryScheduled)
                | (Self::InFlight, Self::Abandoned)
                | (Self::RetryScheduled, Self::Pending)
        )
    }

    /// Short lowercase name used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::RetryScheduled => "retry_scheduled",
            Self::Succeeded => "succeeded",
            Self::Abandoned => "abandoned",
        }
    }

    /// Returns all possible task states
    pub fn all_states() -> [Self; 5] {
        [
            Self::Pending,
            Self::InFlight,
            Self::RetryScheduled,
            Self::Succeeded,
            Self::Abandoned,
        ]
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::InFlight.is_terminal());
        assert!(!TaskState::RetryScheduled.is_terminal());

        assert!(TaskState::Succeeded.is_terminal());
        assert!(TaskState::Abandoned.is_terminal());
    }

    #[test]
    fn test_legal_transitions() {
        assert!(TaskState::Pending.can_transition_to(TaskState::InFlight));
        assert!(TaskState::InFlight.can_transition_to(TaskState::Succeeded));
        assert!(TaskState::InFlight.can_transition_to(TaskState::RetryScheduled));
        assert!(TaskState::RetryScheduled.can_transition_to(TaskState::Pending));
        assert!(TaskState::InFlight.can_transition_to(TaskState::Abandoned));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!TaskState::Pending.can_transition_to(TaskState::Succeeded));
        assert!(!TaskState::RetryScheduled.can_transition_to(TaskState::InFlight));
        assert!(!TaskState::Succeeded.can_transition_to(TaskState::Pending));
        assert!(!TaskState::Abandoned.can_transition_to(TaskState::Pending));
        assert!(!TaskState::InFlight.can_transition_to(TaskState::InFlight));
        assert!(!TaskState::Pending.can_transition_to(TaskState::Abandoned));
    }

    #[test]
    fn test_terminal_states_have_no_exit() {
        for terminal in [TaskState::Succeeded, TaskState::Abandoned] {
            for next in TaskState::all_states() {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", TaskState::InFlight), "in_flight");
        assert_eq!(format!("{}", TaskState::Abandoned), "abandoned");
    }
}
