//! cdrd — correlates call state events (CSEs) into call detail records (CDRs).
//!
//! A call that forks rings several phones; each dialog with a phone is a
//! separate call leg. cdrd loads all events for a call, picks the leg whose
//! outcome represents the call's true disposition, derives the billable
//! record from that leg, and commits it exactly once.

pub mod bootstrap;
pub mod cdr;
pub mod config;
pub mod events;
pub mod resolver;
pub mod store;
pub mod telemetry;
