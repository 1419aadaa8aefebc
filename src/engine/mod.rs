mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod store;
mod wal_store;

pub use availability::{available_slots, merge_overlapping};
pub use conflict::{detect_conflicts, format_conflict_message};
pub use error::{EngineError, StoreError};
pub use store::{InMemoryStore, ReservationStore};
pub use wal_store::WalStore;

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::Config;
use crate::limits::DEFAULT_SLOT_MINUTES;
use crate::model::*;
use crate::policy::{Action, Principal};

/// Books reservations against a store, checking for double-bookings first.
///
/// Check and commit for a date run under that date's lock, so two bookings
/// through the same engine cannot both pass the check for one slot.
pub struct Engine {
    store: Arc<dyn ReservationStore>,
    hours: OperatingHours,
    slot_minutes: Minutes,
    day_locks: DashMap<NaiveDate, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self {
            store,
            hours: OperatingHours::default(),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            day_locks: DashMap::new(),
        }
    }

    pub fn from_config(store: Arc<dyn ReservationStore>, config: &Config) -> Self {
        Self {
            hours: config.hours,
            slot_minutes: config.slot_minutes,
            ..Self::new(store)
        }
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }

    pub fn operating_hours(&self) -> OperatingHours {
        self.hours
    }

    /// Lock each distinct date in ascending order.
    pub(super) async fn lock_days(&self, dates: &[NaiveDate]) -> Vec<OwnedMutexGuard<()>> {
        let mut dates = dates.to_vec();
        dates.sort();
        dates.dedup();
        let mut guards = Vec::with_capacity(dates.len());
        for date in dates {
            let lock = self.day_locks.entry(date).or_default().clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

pub(super) fn require(principal: &Principal, action: Action) -> Result<(), EngineError> {
    if principal.can(action) {
        Ok(())
    } else {
        Err(EngineError::Forbidden {
            role: principal.role,
            action,
        })
    }
}
