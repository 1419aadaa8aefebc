//! Property tests for the conflict detector.
//!
//! Windows are half-open: two windows on one resource conflict exactly when
//! `s1 < e2 && s2 < e1`, so back-to-back bookings never conflict.

use chrono::NaiveDate;
use flightline::engine::detect_conflicts;
use flightline::model::*;
use proptest::prelude::*;

fn day() -> NaiveDate {
    parse_date("2024-01-15").unwrap()
}

fn window(start: Minutes, len: Minutes) -> TimeWindow {
    TimeWindow::new(
        ClockTime::from_minutes(start).unwrap(),
        ClockTime::from_minutes(start + len).unwrap(),
    )
    .unwrap()
}

fn reservation(id: &str, w: TimeWindow, instructor: &str, aircraft: &str, status: ReservationStatus) -> Reservation {
    Reservation {
        id: ReservationId::new(id),
        date: day(),
        start_time: w.start,
        end_time: w.end,
        instructor_id: Some(instructor.into()),
        aircraft_id: Some(aircraft.into()),
        student_id: None,
        status,
        student_name: None,
        instructor_name: None,
        aircraft_label: None,
    }
}

fn proposal(w: TimeWindow, instructor: &str, aircraft: &str) -> Proposal {
    Proposal::new(day(), w).with_instructor(instructor).with_aircraft(aircraft)
}

// ============================================================================
// STRATEGIES
// ============================================================================

/// Windows of 1..=180 minutes that end before midnight.
fn arb_window() -> impl Strategy<Value = TimeWindow> {
    (0..1200u16, 1..=180u16).prop_map(|(start, len)| window(start, len))
}

fn arb_status() -> impl Strategy<Value = ReservationStatus> {
    prop_oneof![
        Just(ReservationStatus::Pending),
        Just(ReservationStatus::Approved),
        Just(ReservationStatus::Rejected),
        Just(ReservationStatus::Completed),
        Just(ReservationStatus::Canceled),
    ]
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn instructor_conflict_iff_windows_overlap(a in arb_window(), b in arb_window()) {
        let existing = [reservation("r1", b, "cfi1", "ac2", ReservationStatus::Approved)];
        let conflicts = detect_conflicts(&proposal(a, "cfi1", "ac1"), &existing).unwrap();
        let overlap = a.start < b.end && b.start < a.end;
        prop_assert_eq!(!conflicts.is_empty(), overlap);
        if overlap {
            prop_assert_eq!(conflicts.len(), 1);
            prop_assert_eq!(conflicts[0].kind, ConflictKind::Instructor);
            prop_assert_eq!(conflicts[0].window, b);
        }
    }

    #[test]
    fn overlap_is_symmetric(
        a in arb_window(),
        b in arb_window(),
        same_instructor in any::<bool>(),
        same_aircraft in any::<bool>(),
    ) {
        let (ia, ib) = ("cfi1", if same_instructor { "cfi1" } else { "cfi2" });
        let (aa, ab) = ("ac1", if same_aircraft { "ac1" } else { "ac2" });

        let forward = detect_conflicts(
            &proposal(a, ia, aa),
            &[reservation("rb", b, ib, ab, ReservationStatus::Approved)],
        ).unwrap();
        let backward = detect_conflicts(
            &proposal(b, ib, ab),
            &[reservation("ra", a, ia, aa, ReservationStatus::Approved)],
        ).unwrap();

        let kinds = |records: &[ConflictRecord]| records.iter().map(|c| c.kind).collect::<Vec<_>>();
        prop_assert_eq!(kinds(&forward[..]), kinds(&backward[..]));
        for c in &forward {
            prop_assert_eq!(c.reservation_id.as_str(), "rb");
            prop_assert_eq!(c.window, b);
        }
        for c in &backward {
            prop_assert_eq!(c.reservation_id.as_str(), "ra");
            prop_assert_eq!(c.window, a);
        }
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        prop_assert_eq!(
            !forward.is_empty(),
            a.overlaps(&b) && (same_instructor || same_aircraft)
        );
    }

    #[test]
    fn back_to_back_never_conflicts(start in 0..1000u16, first in 1..=120u16, second in 1..=120u16) {
        let earlier = window(start, first);
        let later = window(start + first, second);
        let existing = [reservation("r1", earlier, "cfi1", "ac1", ReservationStatus::Approved)];
        prop_assert!(detect_conflicts(&proposal(later, "cfi1", "ac1"), &existing).unwrap().is_empty());
        let existing = [reservation("r1", later, "cfi1", "ac1", ReservationStatus::Approved)];
        prop_assert!(detect_conflicts(&proposal(earlier, "cfi1", "ac1"), &existing).unwrap().is_empty());
    }

    #[test]
    fn only_live_reservations_conflict(a in arb_window(), status in arb_status()) {
        let existing = [reservation("r1", a, "cfi1", "ac1", status)];
        let conflicts = detect_conflicts(&proposal(a, "cfi1", "ac1"), &existing).unwrap();
        if status.holds_resources() {
            let kinds: Vec<ConflictKind> = conflicts.iter().map(|c| c.kind).collect();
            prop_assert_eq!(kinds, vec![ConflictKind::Instructor, ConflictKind::Aircraft]);
        } else {
            prop_assert!(conflicts.is_empty());
        }
    }

    #[test]
    fn exclusion_removes_only_that_reservation(a in arb_window(), n in 1..6usize, skip in 0..6usize) {
        let skip = skip % n;
        let existing: Vec<Reservation> = (0..n)
            .map(|i| reservation(&format!("r{i}"), a, "cfi1", &format!("ac{i}"), ReservationStatus::Pending))
            .collect();
        let p = proposal(a, "cfi1", "ac-free").excluding(ReservationId::new(format!("r{skip}")));
        let conflicts = detect_conflicts(&p, &existing).unwrap();
        prop_assert_eq!(conflicts.len(), n - 1);
        let skipped_id = format!("r{skip}");
        prop_assert!(conflicts.iter().all(|c| c.reservation_id.as_str() != skipped_id));
    }

    #[test]
    fn unrelated_resources_never_conflict(a in arb_window(), b in arb_window()) {
        let existing = [reservation("r1", b, "cfi2", "ac2", ReservationStatus::Approved)];
        prop_assert!(detect_conflicts(&proposal(a, "cfi1", "ac1"), &existing).unwrap().is_empty());
    }
}
