/// Worker lifecycle definitions
///
/// A fetch worker moves through these states while it works through its
/// page range.
use std::fmt;

/// Represents the current state of a fetch worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    // ===== Active States =====
    /// Selecting an endpoint and opening the fetch session
    Starting,

    /// Fetching and extracting the assigned pages
    Running,

    /// Releasing the fetch session
    Draining,

    // ===== Terminal States =====
    /// All assigned pages were attempted
    Done,

    /// The session could not be set up; no pages were attempted
    Aborted,
}

impl WorkerState {
    /// Returns true if the worker has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true if the worker may still make progress
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// `Aborted` is reachable from every active state; the normal path is
    /// `Starting -> Running -> Draining -> Done`.
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        match (self, next) {
            (Self::Starting, Self::Running)
            | (Self::Running, Self::Draining)
            | (Self::Draining, Self::Done) => true,
            (current, Self::Aborted) => current.is_active(),
            _ => false,
        }
    }

    /// Converts the worker state to its storage representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Parses a worker state from its storage representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "starting" => Some(Self::Starting),
            "running" => Some(Self::Running),
            "draining" => Some(Self::Draining),
            "done" => Some(Self::Done),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }

    /// Returns all possible worker states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Starting,
            Self::Running,
            Self::Draining,
            Self::Done,
            Self::Aborted,
        ]
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
