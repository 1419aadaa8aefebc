use thiserror::Error;

use crate::model::{ClockTime, ConflictRecord, ReservationId, ReservationStatus};
use crate::policy::{Action, Role};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid time {0:?}: expected HH:MM (24h)")]
    InvalidTime(String),
    #[error("invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("date is required")]
    MissingDate,
    #[error("start {start} must be before end {end}")]
    EmptyWindow { start: ClockTime, end: ClockTime },
    #[error("slot width must be positive, got {0} minutes")]
    InvalidSlotWidth(u16),
    #[error("reservation not found: {0}")]
    NotFound(ReservationId),
    #[error("{} conflicting reservation(s)", .0.len())]
    Conflict(Vec<ConflictRecord>),
    #[error("{role} may not {action}")]
    Forbidden { role: Role, action: Action },
    #[error("reservation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    },
    #[error("reservation {id} is {status} and can no longer be changed")]
    NotEditable {
        id: ReservationId,
        status: ReservationStatus,
    },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("reservation store failed: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// The conflicts that blocked a booking, if that is what this error is.
    pub fn conflicts(&self) -> Option<&[ConflictRecord]> {
        match self {
            Self::Conflict(records) => Some(records),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reservation already exists: {0}")]
    AlreadyExists(ReservationId),
    #[error("reservation not found: {0}")]
    NotFound(ReservationId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed reservation rows: {0}")]
    Fixture(#[from] serde_json::Error),
    #[error("WAL error: {0}")]
    Wal(#[from] std::io::Error),
}
