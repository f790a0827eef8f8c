//! In-memory store implementation.
//!
//! Volatile storage for development and testing. All data is lost on
//! restart. Thread-safe using a single RwLock; every write section holds
//! the write guard for its whole check-then-write span, which is what makes
//! each operation atomic.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cdr::{Cdr, DialogId, Party};
use crate::events::CallStateEvent;

use super::{CdrStore, StoreError};

/// In-memory store implementation.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Events per call id, kept sorted by (event_time, seq)
    events: HashMap<String, Vec<CallStateEvent>>,
    next_seq: u64,

    parties: HashMap<(String, String), Party>,
    next_party_id: u64,

    cdrs: HashMap<DialogId, Cdr>,
}

impl MemoryStore {
    pub fn new() -> Self {
        debug!("creating in-memory store");
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CdrStore for MemoryStore {
    fn insert_events(&self, events: &[CallStateEvent]) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().unwrap();

        for event in events {
            let mut event = event.clone();
            event.seq = inner.next_seq;
            inner.next_seq += 1;

            let per_call = inner.events.entry(event.call_id.clone()).or_default();
            per_call.push(event);
            per_call.sort_by_key(|e| (e.event_time, e.seq));
        }

        Ok(events.len())
    }

    fn call_ids_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().unwrap();

        let mut call_ids: Vec<String> = inner
            .events
            .iter()
            .filter(|(_, events)| {
                events
                    .iter()
                    .any(|e| e.event_time >= start && e.event_time <= end)
            })
            .map(|(call_id, _)| call_id.clone())
            .collect();
        call_ids.sort();

        Ok(call_ids)
    }

    fn events_for_call(&self, call_id: &str) -> Result<Vec<CallStateEvent>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.events.get(call_id).cloned().unwrap_or_default())
    }

    fn find_cdr_by_dialog(&self, dialog: &DialogId) -> Result<Option<Cdr>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.cdrs.get(dialog).cloned())
    }

    fn save_cdr(&self, cdr: &Cdr, supersede: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let dialog = cdr.dialog_id();

        if inner.cdrs.contains_key(&dialog) && !supersede {
            return Err(StoreError::CdrExists(dialog));
        }

        // Remove-then-insert under one write guard.
        inner.cdrs.remove(&dialog);
        inner.cdrs.insert(dialog, cdr.clone());
        Ok(())
    }

    fn cdr_count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().unwrap().cdrs.len())
    }

    fn find_party(&self, aor: &str, contact: &str) -> Result<Option<Party>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .parties
            .get(&(aor.to_string(), contact.to_string()))
            .cloned())
    }

    fn insert_party(&self, party: &Party) -> Result<Party, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let key = (party.aor.clone(), party.contact.clone());

        if inner.parties.contains_key(&key) {
            return Err(StoreError::PartyExists {
                aor: party.aor.clone(),
                contact: party.contact.clone(),
            });
        }

        let mut stored = party.clone();
        stored.id = Some(inner.next_party_id);
        inner.next_party_id += 1;
        inner.parties.insert(key, stored.clone());

        Ok(stored)
    }

    fn party_count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().unwrap().parties.len())
    }
}
