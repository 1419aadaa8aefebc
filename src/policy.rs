use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Instructor => "instructor",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateReservation,
    RescheduleReservation,
    ApproveReservation,
    RejectReservation,
    CompleteReservation,
    CancelReservation,
    /// Commit a booking despite detected conflicts.
    OverrideConflict,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateReservation => "create reservation",
            Self::RescheduleReservation => "reschedule reservation",
            Self::ApproveReservation => "approve reservation",
            Self::RejectReservation => "reject reservation",
            Self::CompleteReservation => "complete reservation",
            Self::CancelReservation => "cancel reservation",
            Self::OverrideConflict => "override conflict",
        })
    }
}

const ADMIN: &[Action] = &[
    Action::CreateReservation,
    Action::RescheduleReservation,
    Action::ApproveReservation,
    Action::RejectReservation,
    Action::CompleteReservation,
    Action::CancelReservation,
    Action::OverrideConflict,
];

const INSTRUCTOR: &[Action] = &[
    Action::CreateReservation,
    Action::RescheduleReservation,
    Action::ApproveReservation,
    Action::RejectReservation,
    Action::CompleteReservation,
    Action::CancelReservation,
];

const STUDENT: &[Action] = &[Action::CreateReservation, Action::CancelReservation];

pub fn allowed_actions(role: Role) -> &'static [Action] {
    match role {
        Role::Admin => ADMIN,
        Role::Instructor => INSTRUCTOR,
        Role::Student => STUDENT,
    }
}

pub fn allows(role: Role, action: Action) -> bool {
    allowed_actions(role).contains(&action)
}

/// The acting user, supplied by whoever authenticated the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn can(&self, action: Action) -> bool {
        allows(self.role, action)
    }
}

/// Caller's answer to "book anyway?" after being shown the conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictOverride {
    #[default]
    None,
    Confirmed,
}
