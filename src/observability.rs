use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing_subscriber::EnvFilter;

// ── Conflict detection ──────────────────────────────────────────

/// Counter: conflict checks run. Labels: outcome (clear, conflict, error).
pub const CONFLICT_CHECKS_TOTAL: &str = "flightline_conflict_checks_total";

/// Counter: conflict records reported. Labels: kind (instructor, aircraft).
pub const CONFLICTS_FOUND_TOTAL: &str = "flightline_conflicts_found_total";

/// Histogram: conflict check latency in seconds, store fetch included.
pub const CONFLICT_CHECK_DURATION_SECONDS: &str = "flightline_conflict_check_duration_seconds";

// ── Bookings ────────────────────────────────────────────────────

/// Counter: booking attempts. Labels: outcome (created, blocked, overridden).
pub const BOOKINGS_TOTAL: &str = "flightline_bookings_total";

// ── Reservation log ─────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "flightline_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "flightline_wal_flush_batch_size";

/// Counter: completed log compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "flightline_wal_compactions_total";

/// Install the tracing subscriber. `RUST_LOG` wins over the default `flightline=info`.
/// Does nothing if a subscriber is already installed.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flightline=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
