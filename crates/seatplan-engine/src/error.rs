//! Engine error types.

use std::time::Duration;

use thiserror::Error;

use seatplan_state::SchoolId;

/// Failures of the roster collaborator.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("roster unavailable: {0}")]
    Unavailable(String),

    #[error("roster lookup failed for school {school_id}: {message}")]
    Lookup {
        school_id: SchoolId,
        message: String,
    },
}

/// Errors that abort a whole assignment run. Nothing is committed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state store error: {0}")]
    State(#[from] seatplan_state::StateError),

    #[error("roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("assignment run cancelled")]
    Cancelled,

    #[error("assignment run timed out after {0:?}")]
    TimedOut(Duration),

    #[error("assignment task failed: {0}")]
    Join(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
