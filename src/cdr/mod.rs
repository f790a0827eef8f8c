//! Call detail records (CDRs).
//!
//! A CDR is the canonical, billable summary of one call's outcome, keyed by
//! its SIP dialog identity (call_id, from_tag, to_tag). Parties are the
//! deduplicated caller/callee identities a CDR points at.

mod types;

pub use types::{Cdr, CdrData, DialogId, Party, Termination};
