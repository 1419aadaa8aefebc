use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::limits::WAL_CHANNEL_CAPACITY;
use crate::model::*;

use super::store::{InMemoryStore, ReservationStore};
use super::StoreError;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = Vec<(Event, oneshot::Sender<io::Result<()>>)>;

/// Background task that owns the WAL and batches appends for group commit:
/// take the first append, drain whatever else is already queued, then fsync
/// once and answer every sender with the shared result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit_batch(&mut wal, &mut batch);
        if let Some(other) = deferred {
            handle_non_append(&mut wal, other);
        }
    }
    debug!("WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, batch: &mut Pending) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &Pending) -> io::Result<()> {
    let result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
        .and_then(|()| wal.flush_sync());
    if result.is_err()
        && let Err(e) = wal.discard_uncommitted()
    {
        warn!("could not discard failed WAL batch: {e}");
    }
    result
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
}

/// Durable store: an in-memory projection rebuilt from, and written through, a WAL.
///
/// Each write validates, logs and applies its event while holding the lock
/// for its reservation id and a shared hold on `commit_gate`. Compaction takes
/// `commit_gate` exclusively, so its snapshot covers every acknowledged write
/// and no append can land between the snapshot and the file swap.
///
/// Must be opened inside a tokio runtime; the WAL writer runs as a spawned task.
pub struct WalStore {
    state: InMemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    commit_gate: RwLock<()>,
    id_locks: DashMap<ReservationId, Arc<Mutex<()>>>,
}

impl WalStore {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let events = Wal::recover(path)?;
        let state = InMemoryStore::new();
        let mut skipped = 0usize;
        for event in &events {
            if let Err(e) = state.apply_event(event) {
                skipped += 1;
                warn!("replay: skipping event: {e}");
            }
        }
        info!(
            path = %path.display(),
            events = events.len(),
            skipped,
            reservations = state.len(),
            "reservation log replayed"
        );

        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(wal_writer_loop(wal, wal_rx));
        Ok(Self {
            state,
            wal_tx,
            commit_gate: RwLock::new(()),
            id_locks: DashMap::new(),
        })
    }

    async fn lock_id(&self, id: &ReservationId) -> OwnedMutexGuard<()> {
        let lock = self.id_locks.entry(id.clone()).or_default().clone();
        lock.lock_owned().await
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))??;
        Ok(())
    }

    /// WAL-append then apply. The caller holds the gate and id lock and has validated the event.
    async fn persist_and_apply(&self, event: Event) -> Result<(), StoreError> {
        self.wal_append(&event).await?;
        self.state.apply_event(&event)
    }

    /// Rewrite the log with only the events needed to recreate the current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _gate = self.commit_gate.write().await;
        let events = self.state.snapshot_events();
        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))??;
        info!(events = count, "reservation log compacted");
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

#[async_trait]
impl ReservationStore for WalStore {
    async fn fetch_same_day_reservations(
        &self,
        date: NaiveDate,
        exclude: Option<&ReservationId>,
    ) -> Result<Vec<Reservation>, StoreError> {
        self.state.fetch_same_day_reservations(date, exclude).await
    }

    async fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.state.day(date))
    }

    async fn get_reservation(&self, id: &ReservationId) -> Result<Option<Reservation>, StoreError> {
        Ok(self.state.get(id))
    }

    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        let _gate = self.commit_gate.read().await;
        let _id = self.lock_id(&reservation.id).await;
        if self.state.contains(&reservation.id) {
            return Err(StoreError::AlreadyExists(reservation.id));
        }
        self.persist_and_apply(Event::ReservationCreated { reservation }).await
    }

    async fn update_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        let _gate = self.commit_gate.read().await;
        let _id = self.lock_id(&reservation.id).await;
        if !self.state.contains(&reservation.id) {
            return Err(StoreError::NotFound(reservation.id));
        }
        self.persist_and_apply(Event::ReservationUpdated { reservation }).await
    }

    async fn update_status(
        &self,
        id: &ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        let _gate = self.commit_gate.read().await;
        let _id = self.lock_id(id).await;
        if !self.state.contains(id) {
            return Err(StoreError::NotFound(id.clone()));
        }
        self.persist_and_apply(Event::StatusChanged {
            id: id.clone(),
            status,
        })
        .await?;
        self.state
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}
