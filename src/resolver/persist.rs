//! Idempotent CDR persistence.
//!
//! Commit rules:
//! - a complete CDR already stored for the dialog makes the commit a no-op,
//!   so reprocessing a window never disturbs a finished record;
//! - parties are deduplicated by (aor, contact) with an optimistic insert:
//!   on a uniqueness collision the winning row is re-read and used;
//! - an existing incomplete CDR is superseded (deleted and replaced), never
//!   merged field-by-field.

use thiserror::Error;
use tracing::{debug, error};

use crate::cdr::{CdrData, Party};
use crate::store::{CdrStore, StoreError};

/// Call-scoped resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The post-race re-read found no Party row. Indicates store corruption
    /// or a logic defect; never swallowed.
    #[error("party missing after racing insert: aor={aor} contact={contact}")]
    PartyInconsistency { aor: String, contact: String },

    /// Commit attempted without a full dialog identity. A
    /// programming-contract error.
    #[error("dialog identity incomplete for call {0}")]
    IncompleteDialog(String),
}

/// What a commit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The CDR (and any new parties) were written
    Written,
    /// A complete CDR already existed; nothing was touched
    AlreadyComplete,
}

/// How a party was resolved against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyOutcome {
    /// Found by (aor, contact) lookup
    Existing(Party),
    /// Inserted by us
    Inserted(Party),
    /// Our insert collided; the concurrent winner's row is used
    Raced(Party),
}

impl PartyOutcome {
    pub fn into_party(self) -> Party {
        match self {
            PartyOutcome::Existing(p) | PartyOutcome::Inserted(p) | PartyOutcome::Raced(p) => p,
        }
    }
}

/// Commit a resolved call: dedup parties, wire up the id references, save
/// the CDR. No-op if a complete CDR already exists for the dialog.
pub fn commit(store: &dyn CdrStore, mut data: CdrData) -> Result<CommitOutcome, ResolveError> {
    let dialog = data.cdr.dialog_id();
    if !dialog.is_complete() {
        return Err(ResolveError::IncompleteDialog(data.cdr.call_id));
    }

    let existing = store.find_cdr_by_dialog(&dialog)?;
    if let Some(ref stored) = existing {
        if stored.is_complete() {
            debug!(
                call_id = %dialog.call_id,
                "complete CDR already stored, skipping commit"
            );
            return Ok(CommitOutcome::AlreadyComplete);
        }
    }

    let caller = resolve_party(store, &data.caller)?.into_party();
    let callee = resolve_party(store, &data.callee)?.into_party();
    data.cdr.caller_id = caller.id;
    data.cdr.callee_id = callee.id;

    store.save_cdr(&data.cdr, existing.is_some())?;

    Ok(CommitOutcome::Written)
}

/// Resolve a party against the store: reuse an existing row, insert a new
/// one, or recover from a concurrent insert by re-reading the winner.
pub fn resolve_party(store: &dyn CdrStore, party: &Party) -> Result<PartyOutcome, ResolveError> {
    if let Some(found) = store.find_party(&party.aor, &party.contact)? {
        return Ok(PartyOutcome::Existing(found));
    }

    match store.insert_party(party) {
        Ok(stored) => Ok(PartyOutcome::Inserted(stored)),
        Err(StoreError::PartyExists { .. }) => {
            // A concurrent writer saved the same pair between our lookup and
            // insert. The winner's row must exist now.
            debug!(aor = %party.aor, "party insert raced, re-reading");
            match store.find_party(&party.aor, &party.contact)? {
                Some(found) => Ok(PartyOutcome::Raced(found)),
                None => {
                    error!(
                        aor = %party.aor,
                        contact = %party.contact,
                        "party should be stored but is missing"
                    );
                    Err(ResolveError::PartyInconsistency {
                        aor: party.aor.clone(),
                        contact: party.contact.clone(),
                    })
                }
            }
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdr::{Cdr, Termination};
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn sample_data(termination: Termination) -> CdrData {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let mut cdr = Cdr::requested("c1@host", "f1", start);
        cdr.to_tag = "t1".to_string();
        cdr.termination = termination;
        CdrData::new(
            cdr,
            Party::new("sip:alice@example.com", "sip:alice@10.0.0.1"),
            Party::new("sip:bob@example.com", "sip:bob@10.0.0.2"),
        )
    }

    #[test]
    fn test_commit_writes_cdr_and_parties() {
        let store = MemoryStore::new();
        let data = sample_data(Termination::Completed);
        let dialog = data.cdr.dialog_id();

        let outcome = commit(&store, data).unwrap();
        assert_eq!(outcome, CommitOutcome::Written);
        assert_eq!(store.party_count().unwrap(), 2);

        let stored = store.find_cdr_by_dialog(&dialog).unwrap().unwrap();
        assert!(stored.caller_id.is_some());
        assert!(stored.callee_id.is_some());
        assert_ne!(stored.caller_id, stored.callee_id);
    }

    #[test]
    fn test_commit_is_noop_on_complete_cdr() {
        let store = MemoryStore::new();
        commit(&store, sample_data(Termination::Completed)).unwrap();

        // Second run over the same window: no writes, no duplicates.
        let outcome = commit(&store, sample_data(Termination::Completed)).unwrap();
        assert_eq!(outcome, CommitOutcome::AlreadyComplete);
        assert_eq!(store.cdr_count().unwrap(), 1);
        assert_eq!(store.party_count().unwrap(), 2);
    }

    #[test]
    fn test_commit_supersedes_incomplete_cdr() {
        let store = MemoryStore::new();
        commit(&store, sample_data(Termination::InProgress)).unwrap();

        let mut data = sample_data(Termination::Completed);
        let end = Utc.with_ymd_and_hms(2026, 1, 5, 10, 5, 0).unwrap();
        data.cdr.end_time = Some(end);
        let dialog = data.cdr.dialog_id();
        let outcome = commit(&store, data).unwrap();

        assert_eq!(outcome, CommitOutcome::Written);
        assert_eq!(store.cdr_count().unwrap(), 1);
        let stored = store.find_cdr_by_dialog(&dialog).unwrap().unwrap();
        assert_eq!(stored.termination, Termination::Completed);
        assert_eq!(stored.end_time, Some(end));
        // Parties were deduplicated across the two commits.
        assert_eq!(store.party_count().unwrap(), 2);
    }

    #[test]
    fn test_commit_rejects_incomplete_dialog() {
        let store = MemoryStore::new();
        let mut data = sample_data(Termination::Completed);
        data.cdr.to_tag.clear();

        let err = commit(&store, data).unwrap_err();
        assert!(matches!(err, ResolveError::IncompleteDialog(_)));
        assert_eq!(store.cdr_count().unwrap(), 0);
    }

    /// Store double that simulates a concurrent writer: the first lookup
    /// misses, then the "other process" inserts the row before our insert
    /// lands.
    struct RacingStore {
        inner: MemoryStore,
        raced: std::sync::atomic::AtomicBool,
    }

    impl RacingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                raced: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    impl CdrStore for RacingStore {
        fn insert_events(
            &self,
            events: &[crate::events::CallStateEvent],
        ) -> Result<usize, StoreError> {
            self.inner.insert_events(events)
        }

        fn call_ids_in_window(
            &self,
            start: chrono::DateTime<Utc>,
            end: chrono::DateTime<Utc>,
        ) -> Result<Vec<String>, StoreError> {
            self.inner.call_ids_in_window(start, end)
        }

        fn events_for_call(
            &self,
            call_id: &str,
        ) -> Result<Vec<crate::events::CallStateEvent>, StoreError> {
            self.inner.events_for_call(call_id)
        }

        fn find_cdr_by_dialog(
            &self,
            dialog: &crate::cdr::DialogId,
        ) -> Result<Option<Cdr>, StoreError> {
            self.inner.find_cdr_by_dialog(dialog)
        }

        fn save_cdr(&self, cdr: &Cdr, supersede: bool) -> Result<(), StoreError> {
            self.inner.save_cdr(cdr, supersede)
        }

        fn cdr_count(&self) -> Result<usize, StoreError> {
            self.inner.cdr_count()
        }

        fn find_party(&self, aor: &str, contact: &str) -> Result<Option<Party>, StoreError> {
            // First lookup misses even though the row is about to exist.
            if !self.raced.load(std::sync::atomic::Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_party(aor, contact)
        }

        fn insert_party(&self, party: &Party) -> Result<Party, StoreError> {
            // The concurrent writer wins just before our insert.
            if !self.raced.swap(true, std::sync::atomic::Ordering::SeqCst) {
                self.inner.insert_party(party)?;
                return Err(StoreError::PartyExists {
                    aor: party.aor.clone(),
                    contact: party.contact.clone(),
                });
            }
            self.inner.insert_party(party)
        }

        fn party_count(&self) -> Result<usize, StoreError> {
            self.inner.party_count()
        }
    }

    #[test]
    fn test_resolve_party_recovers_from_race() {
        let store = RacingStore::new();
        let party = Party::new("sip:alice@example.com", "sip:alice@10.0.0.1");

        let outcome = resolve_party(&store, &party).unwrap();
        assert!(matches!(outcome, PartyOutcome::Raced(_)));
        assert_eq!(outcome.into_party().id, Some(0));
        assert_eq!(store.party_count().unwrap(), 1);
    }
}
