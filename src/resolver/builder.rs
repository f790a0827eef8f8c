//! CDR construction from a selected call leg.

use crate::cdr::{Cdr, CdrData, Party, Termination};
use crate::events::CallStateEvent;

/// Find the earliest call-request event of the call.
///
/// `events` must be in ascending (event_time, seq) order.
pub fn first_call_request(events: &[CallStateEvent]) -> Option<&CallStateEvent> {
    events.iter().find(|e| e.is_call_request())
}

/// Seed a CDR under construction from the initial call request: caller and
/// callee identities, dialog from-tag, start time, termination Requested.
pub fn read_call_request(call_req: &CallStateEvent) -> CdrData {
    let caller = Party::new(&call_req.caller_aor, &call_req.contact);
    let callee = Party::new(&call_req.callee_aor, "");
    let cdr = Cdr::requested(&call_req.call_id, &call_req.from_tag, call_req.event_time);
    CdrData::new(cdr, caller, callee)
}

/// Fill the CDR from the leg with the given to-tag. Returns false if the
/// leg has no call-setup event; a leg that never set up cannot yield a
/// billable record, whatever else it contains.
pub fn fill_from_leg(cdr_data: &mut CdrData, events: &[CallStateEvent], to_tag: &str) -> bool {
    let leg: Vec<&CallStateEvent> = events.iter().filter(|e| e.to_tag == to_tag).collect();

    let Some(setup) = leg.iter().find(|e| e.is_call_setup()) else {
        return false;
    };

    let cdr = &mut cdr_data.cdr;

    // The call was set up, so mark it provisionally as in progress.
    cdr.termination = Termination::InProgress;
    cdr.to_tag = setup.to_tag.clone();
    cdr.connect_time = Some(setup.event_time);
    cdr_data.callee.contact = setup.contact.clone();

    if let Some(end) = leg.iter().find(|e| e.is_call_end()) {
        cdr.termination = Termination::Completed;
        cdr.end_time = Some(end.event_time);
    } else if let Some(failure) = leg.iter().find(|e| e.is_call_failure()) {
        cdr.termination = Termination::Failed;
        cdr.end_time = Some(failure.event_time);
        cdr.failure_status = failure.failure_status;
        cdr.failure_reason = failure.failure_reason.clone();
    }
    // Neither end nor failure: stays InProgress and persists provisionally.

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, secs).unwrap()
    }

    fn event(event_type: EventType, to_tag: &str, time: DateTime<Utc>) -> CallStateEvent {
        CallStateEvent {
            call_id: "c1@host".to_string(),
            from_tag: "f1".to_string(),
            to_tag: to_tag.to_string(),
            event_time: time,
            event_type,
            caller_aor: "sip:alice@example.com".to_string(),
            callee_aor: "sip:bob@example.com".to_string(),
            contact: "sip:gw@10.0.0.9".to_string(),
            failure_status: None,
            failure_reason: None,
            seq: 0,
        }
    }

    #[test]
    fn test_read_call_request_seeds_cdr() {
        let req = event(EventType::CallRequest, "", ts(1));
        let data = read_call_request(&req);

        assert_eq!(data.cdr.call_id, "c1@host");
        assert_eq!(data.cdr.from_tag, "f1");
        assert_eq!(data.cdr.start_time, ts(1));
        assert_eq!(data.cdr.termination, Termination::Requested);
        assert_eq!(data.caller.aor, "sip:alice@example.com");
        assert_eq!(data.caller.contact, "sip:gw@10.0.0.9");
        assert_eq!(data.callee.aor, "sip:bob@example.com");
        assert_eq!(data.callee.contact, "");
    }

    #[test]
    fn test_completed_leg() {
        let req = event(EventType::CallRequest, "", ts(1));
        let mut setup = event(EventType::CallSetup, "t1", ts(2));
        setup.contact = "sip:bob@10.0.0.2".to_string();
        let events = vec![
            req.clone(),
            setup,
            event(EventType::CallEnd, "t1", ts(30)),
        ];

        let mut data = read_call_request(&req);
        assert!(fill_from_leg(&mut data, &events, "t1"));

        assert_eq!(data.cdr.termination, Termination::Completed);
        assert_eq!(data.cdr.to_tag, "t1");
        assert_eq!(data.cdr.connect_time, Some(ts(2)));
        assert_eq!(data.cdr.end_time, Some(ts(30)));
        assert_eq!(data.callee.contact, "sip:bob@10.0.0.2");
    }

    #[test]
    fn test_failed_leg_copies_failure_fields() {
        let req = event(EventType::CallRequest, "", ts(1));
        let mut failure = event(EventType::CallFailure, "t1", ts(4));
        failure.failure_status = Some(486);
        failure.failure_reason = Some("Busy Here".to_string());
        let events = vec![
            req.clone(),
            event(EventType::CallSetup, "t1", ts(2)),
            failure,
        ];

        let mut data = read_call_request(&req);
        assert!(fill_from_leg(&mut data, &events, "t1"));

        assert_eq!(data.cdr.termination, Termination::Failed);
        assert_eq!(data.cdr.end_time, Some(ts(4)));
        assert_eq!(data.cdr.failure_status, Some(486));
        assert_eq!(data.cdr.failure_reason.as_deref(), Some("Busy Here"));
    }

    #[test]
    fn test_leg_without_setup_fails() {
        let req = event(EventType::CallRequest, "", ts(1));
        let events = vec![req.clone(), event(EventType::CallEnd, "t1", ts(5))];

        let mut data = read_call_request(&req);
        assert!(!fill_from_leg(&mut data, &events, "t1"));
        assert_eq!(data.cdr.termination, Termination::Requested);
    }

    #[test]
    fn test_open_leg_stays_in_progress() {
        let req = event(EventType::CallRequest, "", ts(1));
        let events = vec![req.clone(), event(EventType::CallSetup, "t1", ts(2))];

        let mut data = read_call_request(&req);
        assert!(fill_from_leg(&mut data, &events, "t1"));
        assert_eq!(data.cdr.termination, Termination::InProgress);
        assert!(data.cdr.end_time.is_none());
    }

    #[test]
    fn test_other_leg_events_ignored() {
        let req = event(EventType::CallRequest, "", ts(1));
        let mut failure = event(EventType::CallFailure, "t2", ts(3));
        failure.failure_status = Some(487);
        let events = vec![
            req.clone(),
            event(EventType::CallSetup, "t1", ts(2)),
            failure,
            event(EventType::CallEnd, "t1", ts(9)),
        ];

        let mut data = read_call_request(&req);
        assert!(fill_from_leg(&mut data, &events, "t1"));
        assert_eq!(data.cdr.termination, Termination::Completed);
        assert!(data.cdr.failure_status.is_none());
    }
}
