//! Call leg selection.
//!
//! A forking proxy may ring several phones; the dialog with each phone is a
//! separate call leg, identified by its to-tag. The billable outcome is
//! whichever leg produced the most recent definitive signal, so selection
//! scans the whole call's events newest-first rather than ranking legs
//! individually.

use crate::events::{CallStateEvent, EventType};

/// Pick the call leg that decides the call's outcome. Returns its to-tag.
///
/// The call failed overall iff no call-end event exists on any leg. The
/// target is then the newest call-end (or, for failed calls, the newest
/// call-failure) across all legs; an earlier-ending leg never beats a
/// later-ending one. With no end or failure anywhere, the newest call-setup
/// leg is used. Returns None when no leg was ever set up; such a call
/// yields no CDR.
///
/// `events` must be in ascending (event_time, seq) order.
pub fn select_leg(events: &[CallStateEvent]) -> Option<&str> {
    let call_failed = !events.iter().any(|e| e.is_call_end());

    let final_type = if call_failed {
        EventType::CallFailure
    } else {
        EventType::CallEnd
    };

    if let Some(event) = events.iter().rev().find(|e| e.event_type == final_type) {
        return Some(&event.to_tag);
    }

    // No final event on any leg; fall back to the most recently set-up leg.
    events
        .iter()
        .rev()
        .find(|e| e.is_call_setup())
        .map(|e| e.to_tag.as_str())
}
