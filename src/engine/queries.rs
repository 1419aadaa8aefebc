use std::time::Instant;

use chrono::NaiveDate;
use tracing::debug;

use crate::model::*;
use crate::observability::{CONFLICTS_FOUND_TOTAL, CONFLICT_CHECKS_TOTAL, CONFLICT_CHECK_DURATION_SECONDS};

use super::availability::available_slots;
use super::conflict::{detect_conflicts, validate_proposal};
use super::{Engine, EngineError};

impl Engine {
    /// Existing reservations the proposal would double-book; empty means clear.
    ///
    /// A store failure is returned as an error, never as "no conflicts".
    pub async fn check_conflicts(&self, proposal: &Proposal) -> Result<Vec<ConflictRecord>, EngineError> {
        self.collect_conflicts(proposal).await.map(|(_, conflicts)| conflicts)
    }

    /// Same-day candidates along with the conflicts found among them.
    pub(super) async fn collect_conflicts(
        &self,
        proposal: &Proposal,
    ) -> Result<(Vec<Reservation>, Vec<ConflictRecord>), EngineError> {
        let started = Instant::now();
        let result = self.run_check(proposal).await;
        metrics::histogram!(CONFLICT_CHECK_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok((_, conflicts)) if conflicts.is_empty() => "clear",
            Ok(_) => "conflict",
            Err(_) => "error",
        };
        metrics::counter!(CONFLICT_CHECKS_TOTAL, "outcome" => outcome).increment(1);
        if let Ok((_, conflicts)) = &result {
            for c in conflicts {
                metrics::counter!(CONFLICTS_FOUND_TOTAL, "kind" => c.kind.as_str()).increment(1);
            }
        }
        result
    }

    async fn run_check(
        &self,
        proposal: &Proposal,
    ) -> Result<(Vec<Reservation>, Vec<ConflictRecord>), EngineError> {
        validate_proposal(proposal)?;
        let candidates = self
            .store
            .fetch_same_day_reservations(proposal.date, proposal.exclude_reservation_id.as_ref())
            .await?;
        let conflicts = detect_conflicts(proposal, &candidates)?;
        debug!(
            date = %proposal.date,
            window = %proposal.window,
            candidates = candidates.len(),
            conflicts = conflicts.len(),
            "conflict check"
        );
        Ok((candidates, conflicts))
    }

    /// Free slots for the pair on `date` inside operating hours.
    /// `slot_minutes` defaults to the configured width.
    pub async fn available_slots(
        &self,
        date: NaiveDate,
        instructor_id: Option<&str>,
        aircraft_id: Option<&str>,
        slot_minutes: Option<Minutes>,
    ) -> Result<Vec<Slot>, EngineError> {
        let existing = self.store.fetch_same_day_reservations(date, None).await?;
        available_slots(
            date,
            instructor_id,
            aircraft_id,
            &existing,
            &self.hours,
            slot_minutes.unwrap_or(self.slot_minutes),
        )
    }

    /// Every reservation on `date`, including canceled and rejected ones.
    pub async fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>, EngineError> {
        Ok(self.store.reservations_on(date).await?)
    }

    pub async fn get_reservation(&self, id: &ReservationId) -> Result<Reservation, EngineError> {
        self.store
            .get_reservation(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(id.clone()))
    }
}
