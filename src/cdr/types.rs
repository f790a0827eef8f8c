//! CDR type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal/provisional disposition of a CDR.
///
/// Requested and InProgress are provisional; Completed and Failed are
/// terminal. InProgress is a valid resting state for a call whose outcome
/// never made it into the event window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Call request seen, no confirmed dialog yet
    Requested,
    /// Dialog set up, no end or failure recorded yet
    InProgress,
    /// Dialog ended normally
    Completed,
    /// Dialog ended with a failure response
    Failed,
}

impl Termination {
    /// A CDR is complete iff its termination is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Termination::Completed | Termination::Failed)
    }
}

/// The (call_id, from_tag, to_tag) triple identifying one SIP dialog.
///
/// At most one CDR exists per dialog identity; the store enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId {
    pub call_id: String,
    pub from_tag: String,
    pub to_tag: String,
}

impl DialogId {
    pub fn new(call_id: &str, from_tag: &str, to_tag: &str) -> Self {
        Self {
            call_id: call_id.to_string(),
            from_tag: from_tag.to_string(),
            to_tag: to_tag.to_string(),
        }
    }

    /// All three components must be non-empty to identify a dialog.
    pub fn is_complete(&self) -> bool {
        !self.call_id.is_empty() && !self.from_tag.is_empty() && !self.to_tag.is_empty()
    }
}

/// One call party: a logical identity (AOR) plus the network contact it
/// answered from. At most one stored Party exists per (aor, contact) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Store-assigned identifier, None until persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Address-of-record
    pub aor: String,

    /// Contact URI
    #[serde(default)]
    pub contact: String,
}

impl Party {
    pub fn new(aor: &str, contact: &str) -> Self {
        Self {
            id: None,
            aor: aor.to_string(),
            contact: contact.to_string(),
        }
    }
}

/// Call detail record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cdr {
    /// SIP Call-ID
    pub call_id: String,

    /// Dialog from-tag
    pub from_tag: String,

    /// Dialog to-tag of the selected leg (empty until a leg is chosen)
    #[serde(default)]
    pub to_tag: String,

    /// Time of the initial call request
    pub start_time: DateTime<Utc>,

    /// Time the dialog was confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_time: Option<DateTime<Utc>>,

    /// Time the dialog ended (normally or in failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Disposition
    pub termination: Termination,

    /// SIP status code, set when termination is Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_status: Option<u16>,

    /// SIP reason phrase, set when termination is Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Stored caller Party id, set at commit time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<u64>,

    /// Stored callee Party id, set at commit time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee_id: Option<u64>,
}

impl Cdr {
    /// Start a CDR from the initial call request.
    pub fn requested(call_id: &str, from_tag: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            call_id: call_id.to_string(),
            from_tag: from_tag.to_string(),
            to_tag: String::new(),
            start_time,
            connect_time: None,
            end_time: None,
            termination: Termination::Requested,
            failure_status: None,
            failure_reason: None,
            caller_id: None,
            callee_id: None,
        }
    }

    /// A CDR is complete iff it reached a terminal disposition.
    pub fn is_complete(&self) -> bool {
        self.termination.is_terminal()
    }

    pub fn dialog_id(&self) -> DialogId {
        DialogId::new(&self.call_id, &self.from_tag, &self.to_tag)
    }
}

/// A CDR under construction together with its caller and callee.
///
/// Held as one owned value because the foreign-key linkage from CDR to
/// parties does not exist until the Party rows are saved. Never persisted
/// as a unit; discarded after commit.
#[derive(Debug, Clone)]
pub struct CdrData {
    pub cdr: Cdr,
    pub caller: Party,
    pub callee: Party,
}

impl CdrData {
    pub fn new(cdr: Cdr, caller: Party, callee: Party) -> Self {
        Self { cdr, caller, callee }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_termination_terminality() {
        assert!(!Termination::Requested.is_terminal());
        assert!(!Termination::InProgress.is_terminal());
        assert!(Termination::Completed.is_terminal());
        assert!(Termination::Failed.is_terminal());
    }

    #[test]
    fn test_requested_cdr_is_incomplete() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let cdr = Cdr::requested("c1@host", "f1", start);
        assert!(!cdr.is_complete());
        assert_eq!(cdr.termination, Termination::Requested);
        assert!(cdr.connect_time.is_none());
        assert!(!cdr.dialog_id().is_complete());
    }

    #[test]
    fn test_dialog_id_completeness() {
        assert!(DialogId::new("c", "f", "t").is_complete());
        assert!(!DialogId::new("c", "f", "").is_complete());
        assert!(!DialogId::new("", "f", "t").is_complete());
    }

    #[test]
    fn test_cdr_serde_skips_unset_fields() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let cdr = Cdr::requested("c1", "f1", start);
        let json = serde_json::to_string(&cdr).unwrap();
        assert!(!json.contains("failure_status"));
        assert!(!json.contains("caller_id"));
    }
}
