use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::*;

use super::StoreError;

/// The persistence collaborator the engine books against.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Reservations on `date` that still hold their resources, minus `exclude`.
    async fn fetch_same_day_reservations(
        &self,
        date: NaiveDate,
        exclude: Option<&ReservationId>,
    ) -> Result<Vec<Reservation>, StoreError>;

    /// Every reservation on `date`, whatever its status.
    async fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>, StoreError>;

    async fn get_reservation(&self, id: &ReservationId) -> Result<Option<Reservation>, StoreError>;

    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError>;

    /// Replace a stored reservation (same id), possibly moving it to another date.
    async fn update_reservation(&self, reservation: Reservation) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        id: &ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError>;
}

/// Reservations partitioned by date, each day sorted by start time.
pub struct InMemoryStore {
    days: DashMap<NaiveDate, Vec<Reservation>>,
    /// Reverse lookup: reservation id → date
    index: DashMap<ReservationId, NaiveDate>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            days: DashMap::new(),
            index: DashMap::new(),
        }
    }

    pub fn with_reservations(
        reservations: impl IntoIterator<Item = Reservation>,
    ) -> Result<Self, StoreError> {
        let store = Self::new();
        for r in reservations {
            store.insert(r)?;
        }
        Ok(store)
    }

    /// Load a JSON array of reservation rows.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let rows: Vec<Reservation> = serde_json::from_str(json)?;
        Self::with_reservations(rows)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, id: &ReservationId) -> Option<Reservation> {
        let date = *self.index.get(id)?;
        self.days
            .get(&date)
            .and_then(|day| day.iter().find(|r| &r.id == id).cloned())
    }

    pub fn day(&self, date: NaiveDate) -> Vec<Reservation> {
        self.days
            .get(&date)
            .map(|day| day.value().clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: &ReservationId) -> bool {
        self.index.contains_key(id)
    }

    pub fn insert(&self, reservation: Reservation) -> Result<(), StoreError> {
        match self.index.entry(reservation.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(reservation.id)),
            Entry::Vacant(slot) => {
                slot.insert(reservation.date);
                insert_sorted(&mut self.days.entry(reservation.date).or_default(), reservation);
                Ok(())
            }
        }
    }

    pub fn replace(&self, reservation: Reservation) -> Result<(), StoreError> {
        let old_date = self
            .index
            .get(&reservation.id)
            .map(|d| *d)
            .ok_or_else(|| StoreError::NotFound(reservation.id.clone()))?;
        if let Some(mut day) = self.days.get_mut(&old_date) {
            day.retain(|r| r.id != reservation.id);
        }
        self.index.insert(reservation.id.clone(), reservation.date);
        insert_sorted(&mut self.days.entry(reservation.date).or_default(), reservation);
        Ok(())
    }

    pub fn set_status(
        &self,
        id: &ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        let date = self
            .index
            .get(id)
            .map(|d| *d)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let mut day = self
            .days
            .get_mut(&date)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let r = day
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        r.status = status;
        Ok(r.clone())
    }

    // ── Event application ────────────────────────────────────

    pub fn apply_event(&self, event: &Event) -> Result<(), StoreError> {
        match event {
            Event::ReservationCreated { reservation } => self.insert(reservation.clone()),
            Event::ReservationUpdated { reservation } => self.replace(reservation.clone()),
            Event::StatusChanged { id, status } => self.set_status(id, *status).map(|_| ()),
        }
    }

    /// The minimal event list that recreates the current state.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut dates: Vec<NaiveDate> = self.days.iter().map(|e| *e.key()).collect();
        dates.sort();
        dates
            .into_iter()
            .flat_map(|date| self.day(date))
            .map(|reservation| Event::ReservationCreated { reservation })
            .collect()
    }
}

/// Insert maintaining sort order by start time.
fn insert_sorted(day: &mut Vec<Reservation>, reservation: Reservation) {
    let pos = day.partition_point(|r| r.start_time <= reservation.start_time);
    day.insert(pos, reservation);
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn fetch_same_day_reservations(
        &self,
        date: NaiveDate,
        exclude: Option<&ReservationId>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let Some(day) = self.days.get(&date) else {
            return Ok(Vec::new());
        };
        Ok(day
            .iter()
            .filter(|r| r.status.holds_resources() && Some(&r.id) != exclude)
            .cloned()
            .collect())
    }

    async fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.day(date))
    }

    async fn get_reservation(&self, id: &ReservationId) -> Result<Option<Reservation>, StoreError> {
        Ok(self.get(id))
    }

    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        self.insert(reservation)
    }

    async fn update_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        self.replace(reservation)
    }

    async fn update_status(
        &self,
        id: &ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        self.set_status(id, status)
    }
}
