/// Job state definitions for the crawl orchestrator
use crate::CrawlError;
use std::fmt;

/// Represents the current state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    // ===== Active States =====
    /// Acquiring the first session through the browser
    Bootstrapping,

    /// Fetching pages with the current session
    Paginating,

    /// The session expired mid-crawl and a new one is being acquired
    AwaitingRebootstrap,

    // ===== Terminal States =====
    /// The job stopped normally (target reached, no more pages, empty page or cancellation)
    Completed,

    /// The job stopped on an unrecoverable error
    Failed,
}

impl JobState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the job is allowed to move from `self` to `next`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Bootstrapping, Paginating)
                | (Bootstrapping, Failed)
                | (Bootstrapping, Completed)
                | (Paginating, AwaitingRebootstrap)
                | (Paginating, Completed)
                | (Paginating, Failed)
                | (AwaitingRebootstrap, Paginating)
                | (AwaitingRebootstrap, Failed)
                | (AwaitingRebootstrap, Completed)
        )
    }

    /// Moves to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, next: JobState) -> Result<(), CrawlError> {
        if !self.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrapping => "bootstrapping",
            Self::Paginating => "paginating",
            Self::AwaitingRebootstrap => "awaiting_rebootstrap",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
