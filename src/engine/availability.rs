use chrono::NaiveDate;

use crate::model::*;

use super::EngineError;

// ── Slot enumeration ──────────────────────────────────────────────

/// Fixed-width slots inside `hours` that overlap no reservation holding the
/// given instructor or aircraft on `date`.
///
/// Slots start at `hours.open` and step by `slot_minutes`; a slot that would run
/// past `hours.close` is not offered.
pub fn available_slots(
    date: NaiveDate,
    instructor_id: Option<&str>,
    aircraft_id: Option<&str>,
    existing: &[Reservation],
    hours: &OperatingHours,
    slot_minutes: Minutes,
) -> Result<Vec<Slot>, EngineError> {
    if slot_minutes == 0 {
        return Err(EngineError::InvalidSlotWidth(slot_minutes));
    }
    let day = hours.window()?;
    let instructor_id = instructor_id.filter(|s| !s.is_empty());
    let aircraft_id = aircraft_id.filter(|s| !s.is_empty());

    let mut busy = Vec::new();
    for r in existing {
        if r.date != date || !r.status.holds_resources() {
            continue;
        }
        let same_instructor = instructor_id.is_some() && r.instructor() == instructor_id;
        let same_aircraft = aircraft_id.is_some() && r.aircraft() == aircraft_id;
        if same_instructor || same_aircraft {
            busy.push(r.window()?);
        }
    }
    busy.sort_by_key(|w| w.start);
    let busy = merge_overlapping(&busy);

    let mut slots = Vec::new();
    let mut bi = 0;
    let mut start = day.start.minutes();
    while let Some(end) = start
        .checked_add(slot_minutes)
        .filter(|&end| end <= day.end.minutes())
    {
        let (Some(s), Some(e)) = (ClockTime::from_minutes(start), ClockTime::from_minutes(end)) else {
            break;
        };
        let slot = TimeWindow::new(s, e)?;

        while bi < busy.len() && busy[bi].end <= slot.start {
            bi += 1;
        }
        if busy.get(bi).is_none_or(|b| !b.overlaps(&slot)) {
            slots.push(slot);
        }
        start = end;
    }
    Ok(slots)
}

/// Merge sorted overlapping/adjacent windows into disjoint windows.
pub fn merge_overlapping(sorted: &[TimeWindow]) -> Vec<TimeWindow> {
    let mut merged: Vec<TimeWindow> = Vec::new();
    for &w in sorted {
        if let Some(last) = merged.last_mut()
            && w.start <= last.end
        {
            last.end = last.end.max(w.end);
            continue;
        }
        merged.push(w);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(start: &str, end: &str) -> TimeWindow {
        TimeWindow::parse(start, end).unwrap()
    }

    fn date() -> NaiveDate {
        parse_date("2024-01-15").unwrap()
    }

    fn booking(start: &str, end: &str, instructor: &str, aircraft: &str) -> Reservation {
        let window = w(start, end);
        Reservation {
            id: ReservationId::generate(),
            date: date(),
            start_time: window.start,
            end_time: window.end,
            instructor_id: Some(instructor.into()),
            aircraft_id: Some(aircraft.into()),
            student_id: None,
            status: ReservationStatus::Approved,
            student_name: None,
            instructor_name: None,
            aircraft_label: None,
        }
    }

    fn slot_strings(slots: &[Slot]) -> Vec<String> {
        slots.iter().map(ToString::to_string).collect()
    }

    // ── merge_overlapping ────────────────────────────────

    #[test]
    fn merge_overlapping_basic() {
        let merged = merge_overlapping(&[w("09:00", "10:00"), w("09:30", "11:00"), w("12:00", "13:00")]);
        assert_eq!(merged, vec![w("09:00", "11:00"), w("12:00", "13:00")]);
    }

    #[test]
    fn merge_overlapping_adjacent() {
        let merged = merge_overlapping(&[w("09:00", "10:00"), w("10:00", "11:00")]);
        assert_eq!(merged, vec![w("09:00", "11:00")]);
    }

    #[test]
    fn merge_empty() {
        assert!(merge_overlapping(&[]).is_empty());
    }

    // ── available_slots ──────────────────────────────────

    #[test]
    fn empty_day_yields_all_hourly_slots() {
        let slots = available_slots(date(), Some("cfi1"), Some("ac1"), &[], &OperatingHours::default(), 60).unwrap();
        assert_eq!(slots.len(), 10);
        assert_eq!(slots[0], w("08:00", "09:00"));
        assert_eq!(slots[9], w("17:00", "18:00"));
    }

    #[test]
    fn instructor_booking_removes_its_hour() {
        let existing = vec![booking("09:00", "10:00", "cfi1", "ac9")];
        let slots = available_slots(date(), Some("cfi1"), Some("ac1"), &existing, &OperatingHours::default(), 60).unwrap();
        assert_eq!(slots.len(), 9);
        assert!(!slots.contains(&w("09:00", "10:00")));
        assert!(slots.contains(&w("08:00", "09:00")));
        assert!(slots.contains(&w("10:00", "11:00")));
    }

    #[test]
    fn aircraft_booking_straddling_slots_removes_both() {
        let existing = vec![booking("10:30", "11:30", "cfi9", "ac1")];
        let slots = available_slots(date(), Some("cfi1"), Some("ac1"), &existing, &OperatingHours::default(), 60).unwrap();
        assert!(!slots.contains(&w("10:00", "11:00")));
        assert!(!slots.contains(&w("11:00", "12:00")));
        assert_eq!(slots.len(), 8);
    }

    #[test]
    fn unrelated_and_canceled_bookings_ignored() {
        let mut canceled = booking("08:00", "18:00", "cfi1", "ac1");
        canceled.status = ReservationStatus::Canceled;
        let existing = vec![booking("08:00", "18:00", "cfi2", "ac2"), canceled];
        let slots = available_slots(date(), Some("cfi1"), Some("ac1"), &existing, &OperatingHours::default(), 60).unwrap();
        assert_eq!(slots.len(), 10);
    }

    #[test]
    fn slot_width_and_trailing_partial() {
        let hours = OperatingHours {
            open: ClockTime::parse("08:00").unwrap(),
            close: ClockTime::parse("10:00").unwrap(),
        };
        let slots = available_slots(date(), Some("cfi1"), None, &[], &hours, 45).unwrap();
        assert_eq!(slot_strings(&slots), vec!["08:00–08:45", "08:45–09:30"]);
    }

    #[test]
    fn zero_width_rejected() {
        let result = available_slots(date(), Some("cfi1"), None, &[], &OperatingHours::default(), 0);
        assert!(matches!(result, Err(EngineError::InvalidSlotWidth(0))));
    }

    #[test]
    fn late_window_reaches_midnight_boundary() {
        let hours = OperatingHours {
            open: ClockTime::parse("22:00").unwrap(),
            close: ClockTime::parse("23:59").unwrap(),
        };
        let slots = available_slots(date(), Some("cfi1"), None, &[], &hours, 60).unwrap();
        assert_eq!(slot_strings(&slots), vec!["22:00–23:00"]);
    }

    #[test]
    fn no_resources_means_nothing_is_busy() {
        let existing = vec![booking("09:00", "10:00", "cfi1", "ac1")];
        let slots = available_slots(date(), None, None, &existing, &OperatingHours::default(), 60).unwrap();
        assert_eq!(slots.len(), 10);
    }
}
