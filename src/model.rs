use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// Minutes since midnight — the only time-of-day type.
pub type Minutes = u16;

pub const MINUTES_PER_DAY: Minutes = 24 * 60;

/// Wall-clock time of day, parsed strictly from `HH:MM` (24h).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(Minutes);

impl ClockTime {
    pub fn from_hm(hours: u8, minutes: u8) -> Option<Self> {
        if hours > 23 || minutes > 59 {
            return None;
        }
        Some(Self(hours as Minutes * 60 + minutes as Minutes))
    }

    pub fn from_minutes(minutes: Minutes) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let invalid = || EngineError::InvalidTime(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digit = |b: u8| -> Result<u8, EngineError> {
            if b.is_ascii_digit() { Ok(b - b'0') } else { Err(invalid()) }
        };
        let hours = digit(bytes[0])? * 10 + digit(bytes[1])?;
        let minutes = digit(bytes[3])? * 10 + digit(bytes[4])?;
        Self::from_hm(hours, minutes).ok_or_else(invalid)
    }

    pub fn minutes(self) -> Minutes {
        self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ClockTime> for String {
    fn from(t: ClockTime) -> Self {
        t.to_string()
    }
}

/// Half-open window `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeWindow {
    pub fn new(start: ClockTime, end: ClockTime) -> Result<Self, EngineError> {
        if start >= end {
            return Err(EngineError::EmptyWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, EngineError> {
        Self::new(ClockTime::parse(start)?, ClockTime::parse(end)?)
    }

    pub fn duration_minutes(&self) -> Minutes {
        self.end.minutes() - self.start.minutes()
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}–{}", self.start, self.end)
    }
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, EngineError> {
    if s.trim().is_empty() {
        return Err(EngineError::MissingDate);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| EngineError::InvalidDate(s.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub String);

impl ReservationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Canceled,
}

impl ReservationStatus {
    /// Whether a reservation in this status still occupies its instructor and aircraft.
    pub fn holds_resources(self) -> bool {
        !matches!(self, Self::Canceled | Self::Rejected)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Canceled)
    }

    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Completed)
                | (Pending, Canceled)
                | (Approved, Canceled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booked block of time. Field names follow the data store's camelCase rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: ReservationId,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    #[serde(default)]
    pub instructor_id: Option<String>,
    #[serde(default)]
    pub aircraft_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    pub status: ReservationStatus,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub instructor_name: Option<String>,
    #[serde(default)]
    pub aircraft_label: Option<String>,
}

impl Reservation {
    /// Fails if the stored times do not form a non-empty same-day window.
    pub fn window(&self) -> Result<TimeWindow, EngineError> {
        TimeWindow::new(self.start_time, self.end_time)
    }

    pub fn instructor(&self) -> Option<&str> {
        non_empty(&self.instructor_id)
    }

    pub fn aircraft(&self) -> Option<&str> {
        non_empty(&self.aircraft_id)
    }
}

/// Treat `Some("")` the same as an absent identifier.
pub(crate) fn non_empty(id: &Option<String>) -> Option<&str> {
    id.as_deref().filter(|s| !s.is_empty())
}

/// A candidate reservation being checked, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub date: NaiveDate,
    pub window: TimeWindow,
    pub instructor_id: Option<String>,
    pub aircraft_id: Option<String>,
    /// Set when checking an edit; that reservation is never compared against itself.
    pub exclude_reservation_id: Option<ReservationId>,
}

impl Proposal {
    pub fn new(date: NaiveDate, window: TimeWindow) -> Self {
        Self {
            date,
            window,
            instructor_id: None,
            aircraft_id: None,
            exclude_reservation_id: None,
        }
    }

    /// Build from raw `YYYY-MM-DD` / `HH:MM` strings, failing fast on malformed input.
    pub fn parse(date: &str, start: &str, end: &str) -> Result<Self, EngineError> {
        Ok(Self::new(parse_date(date)?, TimeWindow::parse(start, end)?))
    }

    pub fn with_instructor(mut self, id: impl Into<String>) -> Self {
        self.instructor_id = Some(id.into());
        self
    }

    pub fn with_aircraft(mut self, id: impl Into<String>) -> Self {
        self.aircraft_id = Some(id.into());
        self
    }

    pub fn excluding(mut self, id: ReservationId) -> Self {
        self.exclude_reservation_id = Some(id);
        self
    }

    pub fn instructor(&self) -> Option<&str> {
        non_empty(&self.instructor_id)
    }

    pub fn aircraft(&self) -> Option<&str> {
        non_empty(&self.aircraft_id)
    }
}

/// A booking request: the proposal plus who it is for and how to label it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub proposal: Proposal,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub instructor_name: Option<String>,
    pub aircraft_label: Option<String>,
}

impl NewReservation {
    pub fn new(proposal: Proposal) -> Self {
        Self {
            proposal,
            student_id: None,
            student_name: None,
            instructor_name: None,
            aircraft_label: None,
        }
    }

    pub fn for_student(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.student_id = Some(id.into());
        self.student_name = Some(name.into());
        self
    }

    pub fn with_instructor_name(mut self, name: impl Into<String>) -> Self {
        self.instructor_name = Some(name.into());
        self
    }

    pub fn with_aircraft_label(mut self, label: impl Into<String>) -> Self {
        self.aircraft_label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Instructor,
    Aircraft,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Instructor => "instructor",
            Self::Aircraft => "aircraft",
        }
    }
}

/// One double-booking: the existing reservation and which resource it shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    pub reservation_id: ReservationId,
    pub window: TimeWindow,
    pub instructor_id: Option<String>,
    pub instructor_name: Option<String>,
    pub aircraft_id: Option<String>,
    pub aircraft_label: Option<String>,
    pub student_name: Option<String>,
}

impl ConflictRecord {
    pub(crate) fn from_reservation(kind: ConflictKind, r: &Reservation, window: TimeWindow) -> Self {
        Self {
            kind,
            reservation_id: r.id.clone(),
            window,
            instructor_id: r.instructor_id.clone(),
            instructor_name: r.instructor_name.clone(),
            aircraft_id: r.aircraft_id.clone(),
            aircraft_label: r.aircraft_label.clone(),
            student_name: r.student_name.clone(),
        }
    }
}

/// A free fixed-width slot returned by slot enumeration.
pub type Slot = TimeWindow;

/// The daily window in which slots are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub open: ClockTime,
    pub close: ClockTime,
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self {
            open: ClockTime(8 * 60),
            close: ClockTime(18 * 60),
        }
    }
}

impl OperatingHours {
    pub fn window(&self) -> Result<TimeWindow, EngineError> {
        TimeWindow::new(self.open, self.close)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationCreated { reservation: Reservation },
    ReservationUpdated { reservation: Reservation },
    StatusChanged { id: ReservationId, status: ReservationStatus },
}
