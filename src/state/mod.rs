//! State module for tracking job progress
//!
//! A crawl job moves through a small state machine: it bootstraps a session, paginates,
//! may pause to re-acquire an expired session, and ends completed or failed.

mod job_state;

pub use job_state::JobState;
