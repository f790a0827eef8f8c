//! Call state events (CSEs).
//!
//! A CSE is a timestamped signaling fact about a call: request, setup, end,
//! or failure. The SIP proxy records one row per fact; cdrd only ever reads
//! them back. Events sharing a `to_tag` form one call leg.

mod import;
mod types;

pub use import::{read_events_file, ImportError};
pub use types::{CallStateEvent, EventType};
