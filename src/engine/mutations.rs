use tracing::{info, warn};

use crate::limits::*;
use crate::model::*;
use crate::observability::BOOKINGS_TOTAL;
use crate::policy::{Action, ConflictOverride, Principal, Role};

use super::{require, Engine, EngineError};

fn validate_request(request: &NewReservation) -> Result<(), EngineError> {
    if request.student_id.as_ref().is_some_and(|id| id.len() > MAX_ID_LEN) {
        return Err(EngineError::LimitExceeded("student id too long"));
    }
    let labels = [&request.student_name, &request.instructor_name, &request.aircraft_label];
    if labels.into_iter().flatten().any(|l| l.len() > MAX_LABEL_LEN) {
        return Err(EngineError::LimitExceeded("label too long"));
    }
    Ok(())
}

impl Engine {
    /// Decide whether a booking with `conflicts` may be committed.
    fn admit(
        &self,
        principal: &Principal,
        conflicts: Vec<ConflictRecord>,
        confirm: ConflictOverride,
    ) -> Result<(), EngineError> {
        if conflicts.is_empty() {
            return Ok(());
        }
        if confirm == ConflictOverride::Confirmed && principal.can(Action::OverrideConflict) {
            warn!(
                user = %principal.user_id,
                conflicts = conflicts.len(),
                "booking committed over conflicts"
            );
            metrics::counter!(BOOKINGS_TOTAL, "outcome" => "overridden").increment(1);
            return Ok(());
        }
        metrics::counter!(BOOKINGS_TOTAL, "outcome" => "blocked").increment(1);
        Err(EngineError::Conflict(conflicts))
    }

    /// Check and commit a new reservation.
    ///
    /// Students book for themselves and their reservations start `pending`;
    /// instructor and admin bookings start `approved`. Conflicts block the
    /// booking unless an admin passes `ConflictOverride::Confirmed`.
    pub async fn book(
        &self,
        principal: &Principal,
        mut request: NewReservation,
        confirm: ConflictOverride,
    ) -> Result<Reservation, EngineError> {
        require(principal, Action::CreateReservation)?;
        validate_request(&request)?;
        request.proposal.exclude_reservation_id = None;
        if principal.role == Role::Student {
            request.student_id = Some(principal.user_id.clone());
        }

        let proposal = &request.proposal;
        let _guards = self.lock_days(&[proposal.date]).await;
        let (candidates, conflicts) = self.collect_conflicts(proposal).await?;
        if candidates.len() >= MAX_RESERVATIONS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many reservations on date"));
        }
        self.admit(principal, conflicts, confirm)?;

        let status = match principal.role {
            Role::Student => ReservationStatus::Pending,
            Role::Instructor | Role::Admin => ReservationStatus::Approved,
        };
        let reservation = Reservation {
            id: ReservationId::generate(),
            date: proposal.date,
            start_time: proposal.window.start,
            end_time: proposal.window.end,
            instructor_id: proposal.instructor().map(str::to_string),
            aircraft_id: proposal.aircraft().map(str::to_string),
            student_id: request.student_id,
            status,
            student_name: request.student_name,
            instructor_name: request.instructor_name,
            aircraft_label: request.aircraft_label,
        };
        self.store.insert_reservation(reservation.clone()).await?;

        metrics::counter!(BOOKINGS_TOTAL, "outcome" => "created").increment(1);
        info!(
            id = %reservation.id,
            date = %reservation.date,
            window = %proposal.window,
            status = %reservation.status,
            by = %principal.user_id,
            "reservation created"
        );
        Ok(reservation)
    }

    /// Move an open reservation to a new date, window, instructor or aircraft.
    /// The reservation is never checked against itself.
    pub async fn reschedule(
        &self,
        principal: &Principal,
        id: &ReservationId,
        proposal: Proposal,
        confirm: ConflictOverride,
    ) -> Result<Reservation, EngineError> {
        require(principal, Action::RescheduleReservation)?;
        let current = self.get_reservation(id).await?;
        let _guards = self.lock_days(&[current.date, proposal.date]).await;

        // Re-read under the lock; a concurrent transition may have landed.
        let current = self.get_reservation(id).await?;
        if current.status.is_terminal() {
            return Err(EngineError::NotEditable {
                id: id.clone(),
                status: current.status,
            });
        }

        let proposal = proposal.excluding(id.clone());
        let (_, conflicts) = self.collect_conflicts(&proposal).await?;
        self.admit(principal, conflicts, confirm)?;

        let updated = Reservation {
            date: proposal.date,
            start_time: proposal.window.start,
            end_time: proposal.window.end,
            instructor_id: proposal.instructor().map(str::to_string),
            aircraft_id: proposal.aircraft().map(str::to_string),
            ..current
        };
        self.store.update_reservation(updated.clone()).await?;
        info!(
            id = %id,
            date = %updated.date,
            window = %proposal.window,
            by = %principal.user_id,
            "reservation rescheduled"
        );
        Ok(updated)
    }

    pub async fn approve(&self, principal: &Principal, id: &ReservationId) -> Result<Reservation, EngineError> {
        self.transition(principal, id, ReservationStatus::Approved, Action::ApproveReservation)
            .await
    }

    pub async fn reject(&self, principal: &Principal, id: &ReservationId) -> Result<Reservation, EngineError> {
        self.transition(principal, id, ReservationStatus::Rejected, Action::RejectReservation)
            .await
    }

    pub async fn complete(&self, principal: &Principal, id: &ReservationId) -> Result<Reservation, EngineError> {
        self.transition(principal, id, ReservationStatus::Completed, Action::CompleteReservation)
            .await
    }

    /// Students may cancel only reservations made for them.
    pub async fn cancel(&self, principal: &Principal, id: &ReservationId) -> Result<Reservation, EngineError> {
        self.transition(principal, id, ReservationStatus::Canceled, Action::CancelReservation)
            .await
    }

    async fn transition(
        &self,
        principal: &Principal,
        id: &ReservationId,
        to: ReservationStatus,
        action: Action,
    ) -> Result<Reservation, EngineError> {
        require(principal, action)?;
        let date = self.get_reservation(id).await?.date;
        let _guards = self.lock_days(&[date]).await;

        let current = self.get_reservation(id).await?;
        if principal.role == Role::Student
            && current.student_id.as_deref() != Some(principal.user_id.as_str())
        {
            return Err(EngineError::Forbidden {
                role: principal.role,
                action,
            });
        }
        if !current.status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                id: id.clone(),
                from: current.status,
                to,
            });
        }

        let updated = self.store.update_status(id, to).await?;
        info!(id = %id, from = %current.status, to = %to, by = %principal.user_id, "reservation status changed");
        Ok(updated)
    }
}
