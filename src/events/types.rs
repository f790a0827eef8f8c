//! CSE type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type of call state event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Initial INVITE observed (call requested)
    CallRequest,
    /// Dialog confirmed (200 OK / ACK)
    CallSetup,
    /// Dialog terminated normally (BYE)
    CallEnd,
    /// Dialog terminated with a failure response
    CallFailure,
    /// Anything else the proxy recorded
    Other,
}

/// One call state event.
///
/// Events for a single call are totally ordered by (`event_time`, `seq`).
/// `seq` is assigned by the store at ingest time, so ties on `event_time`
/// break deterministically on stable ingest order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStateEvent {
    /// SIP Call-ID
    pub call_id: String,

    /// Dialog from-tag (constant across forked legs)
    pub from_tag: String,

    /// Dialog to-tag (identifies the leg)
    #[serde(default)]
    pub to_tag: String,

    /// When the proxy observed the event
    pub event_time: DateTime<Utc>,

    /// Event type
    pub event_type: EventType,

    /// Caller address-of-record
    #[serde(default)]
    pub caller_aor: String,

    /// Callee address-of-record
    #[serde(default)]
    pub callee_aor: String,

    /// Contact URI carried by the event
    #[serde(default)]
    pub contact: String,

    /// SIP status code, set on failure events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_status: Option<u16>,

    /// SIP reason phrase, set on failure events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Store-assigned ingest sequence number (tie-break for equal timestamps)
    #[serde(default)]
    pub seq: u64,
}

impl CallStateEvent {
    pub fn is_call_request(&self) -> bool {
        self.event_type == EventType::CallRequest
    }

    pub fn is_call_setup(&self) -> bool {
        self.event_type == EventType::CallSetup
    }

    pub fn is_call_end(&self) -> bool {
        self.event_type == EventType::CallEnd
    }

    pub fn is_call_failure(&self) -> bool {
        self.event_type == EventType::CallFailure
    }
}
