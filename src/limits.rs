/// Upper bound on reservations held for a single date.
pub const MAX_RESERVATIONS_PER_DAY: usize = 10_000;

/// Max byte length of any identifier (reservation, instructor, aircraft, student).
pub const MAX_ID_LEN: usize = 128;

/// Max byte length of a display label (names, tail numbers).
pub const MAX_LABEL_LEN: usize = 256;

pub const DEFAULT_SLOT_MINUTES: u16 = 60;

pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1000;

/// Pending WAL commands before senders start waiting.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;

/// Largest encoded event accepted in the reservation log. A longer length
/// prefix is treated as corruption.
pub const MAX_WAL_ENTRY_BYTES: usize = 1 << 20;
