use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn validate_proposal(proposal: &Proposal) -> Result<(), EngineError> {
    for id in [&proposal.instructor_id, &proposal.aircraft_id].into_iter().flatten() {
        if id.len() > MAX_ID_LEN {
            return Err(EngineError::LimitExceeded("resource id too long"));
        }
    }
    Ok(())
}

fn shares(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Find every existing reservation the proposal would double-book.
///
/// Candidates on another date, the excluded reservation, and reservations that
/// no longer hold their resources are skipped, so callers may pass an unfiltered
/// day. Each candidate yields at most one `Instructor` and one `Aircraft` record,
/// in candidate order. A candidate with a malformed window is an error.
pub fn detect_conflicts(
    proposal: &Proposal,
    candidates: &[Reservation],
) -> Result<Vec<ConflictRecord>, EngineError> {
    let mut conflicts = Vec::new();
    for candidate in candidates {
        if candidate.date != proposal.date || !candidate.status.holds_resources() {
            continue;
        }
        if proposal.exclude_reservation_id.as_ref() == Some(&candidate.id) {
            continue;
        }
        let window = candidate.window()?;
        if !window.overlaps(&proposal.window) {
            continue;
        }
        if shares(candidate.instructor(), proposal.instructor()) {
            conflicts.push(ConflictRecord::from_reservation(ConflictKind::Instructor, candidate, window));
        }
        if shares(candidate.aircraft(), proposal.aircraft()) {
            conflicts.push(ConflictRecord::from_reservation(ConflictKind::Aircraft, candidate, window));
        }
    }
    Ok(conflicts)
}

/// Render one line per conflict.
pub fn format_conflict_message(conflicts: &[ConflictRecord]) -> String {
    conflicts
        .iter()
        .map(describe_conflict)
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_conflict(c: &ConflictRecord) -> String {
    match c.kind {
        ConflictKind::Instructor => {
            let instructor = label_or(&c.instructor_name, "Instructor", &c.instructor_id);
            let party = non_empty(&c.student_name).unwrap_or("another student");
            format!(
                "{instructor} is already scheduled with {party} from {}–{}",
                c.window.start, c.window.end
            )
        }
        ConflictKind::Aircraft => {
            let aircraft = label_or(&c.aircraft_label, "Aircraft", &c.aircraft_id);
            format!(
                "{aircraft} is already scheduled from {}–{}",
                c.window.start, c.window.end
            )
        }
    }
}

fn label_or(label: &Option<String>, noun: &str, id: &Option<String>) -> String {
    match (non_empty(label), non_empty(id)) {
        (Some(label), _) => label.to_string(),
        (None, Some(id)) => format!("{noun} {id}"),
        (None, None) => noun.to_string(),
    }
}
