use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::limits::{DEFAULT_COMPACT_THRESHOLD, DEFAULT_SLOT_MINUTES};
use crate::model::{ClockTime, Minutes, OperatingHours};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("operating hours {open}–{close} are empty")]
    EmptyHours { open: ClockTime, close: ClockTime },
    #[error("FLIGHTLINE_SLOT_MINUTES must be positive")]
    ZeroSlot,
}

/// Runtime settings, read from `FLIGHTLINE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the reservation log.
    pub data_dir: PathBuf,
    pub hours: OperatingHours,
    pub slot_minutes: Minutes,
    /// Log appends after which the compactor rewrites the log.
    pub compact_threshold: u64,
    /// Prometheus exporter port; no exporter when unset.
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            hours: OperatingHours::default(),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let data_dir = lookup("FLIGHTLINE_DATA_DIR").map_or(defaults.data_dir, PathBuf::from);
        let open = lookup_time(&lookup, "FLIGHTLINE_OPEN")?.unwrap_or(defaults.hours.open);
        let close = lookup_time(&lookup, "FLIGHTLINE_CLOSE")?.unwrap_or(defaults.hours.close);
        if open >= close {
            return Err(ConfigError::EmptyHours { open, close });
        }
        let slot_minutes =
            lookup_parsed(&lookup, "FLIGHTLINE_SLOT_MINUTES")?.unwrap_or(defaults.slot_minutes);
        if slot_minutes == 0 {
            return Err(ConfigError::ZeroSlot);
        }
        let compact_threshold = lookup_parsed(&lookup, "FLIGHTLINE_COMPACT_THRESHOLD")?
            .unwrap_or(defaults.compact_threshold);
        let metrics_port = lookup_parsed(&lookup, "FLIGHTLINE_METRICS_PORT")?;

        Ok(Self {
            data_dir,
            hours: OperatingHours { open, close },
            slot_minutes,
            compact_threshold,
            metrics_port,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("reservations.wal")
    }
}

fn lookup_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|value| value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }))
        .transpose()
}

fn lookup_time(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<ClockTime>, ConfigError> {
    lookup(var)
        .map(|value| ClockTime::parse(value.trim()).map_err(|_| ConfigError::Invalid { var, value }))
        .transpose()
}
