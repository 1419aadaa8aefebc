use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::WalStore;
use crate::observability::WAL_COMPACTIONS_TOTAL;

pub const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact once at least `threshold` events were appended since the last compaction.
/// Returns whether a compaction ran.
pub async fn compact_if_needed(store: &WalStore, threshold: u64) -> bool {
    let appended = store.appends_since_compact().await;
    if appended < threshold {
        return false;
    }
    match store.compact().await {
        Ok(()) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL).increment(1);
            true
        }
        Err(e) => {
            warn!("compaction after {appended} appends failed: {e}");
            false
        }
    }
}

/// Background task that periodically compacts the reservation log.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if !compact_if_needed(&store, threshold).await {
            debug!("compactor: nothing to do");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReservationStore;
    use crate::model::*;
    use crate::wal::Wal;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("flightline_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    async fn seed(store: &WalStore) {
        let r = Reservation {
            id: ReservationId::new("r1"),
            date: parse_date("2024-01-15").unwrap(),
            start_time: ClockTime::parse("09:00").unwrap(),
            end_time: ClockTime::parse("10:00").unwrap(),
            instructor_id: Some("cfi1".into()),
            aircraft_id: None,
            student_id: None,
            status: ReservationStatus::Pending,
            student_name: None,
            instructor_name: None,
            aircraft_label: None,
        };
        store.insert_reservation(r).await.unwrap();
        store
            .update_status(&ReservationId::new("r1"), ReservationStatus::Approved)
            .await
            .unwrap();
        store
            .update_status(&ReservationId::new("r1"), ReservationStatus::Completed)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn below_threshold_skips() {
        let path = test_wal_path("below.wal");
        let store = WalStore::open(&path).unwrap();
        seed(&store).await;
        assert!(!compact_if_needed(&store, 10).await);
        assert_eq!(Wal::replay(&path).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn at_threshold_compacts() {
        let path = test_wal_path("at.wal");
        let store = WalStore::open(&path).unwrap();
        seed(&store).await;
        assert!(compact_if_needed(&store, 3).await);
        assert_eq!(store.appends_since_compact().await, 0);
        assert_eq!(Wal::replay(&path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn background_task_compacts() {
        let path = test_wal_path("background.wal");
        let store = Arc::new(WalStore::open(&path).unwrap());
        seed(&store).await;
        let task = tokio::spawn(run_compactor(store.clone(), 1, Duration::from_millis(10)));
        for _ in 0..200 {
            if store.appends_since_compact().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert_eq!(store.appends_since_compact().await, 0);
    }
}
