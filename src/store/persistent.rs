//! Persistent store using fjall (pure Rust LSM-tree).
//!
//! Durable storage for production use. All data survives restarts.
//!
//! Layout:
//! - `events`: call_id ++ 0x00 ++ time-key ++ seq, value = event JSON
//! - `events_by_time`: time-key ++ seq ++ 0x00 ++ call_id, value = call_id
//! - `cdrs`: call_id ++ 0x00 ++ from_tag ++ 0x00 ++ to_tag, value = CDR JSON
//! - `parties`: aor ++ 0x00 ++ contact, value = Party JSON
//! - `meta`: sequence counters
//!
//! Check-then-write sections run under `write_lock`; the writes themselves
//! go through a single fjall batch, so supersession of a CDR row commits
//! all-or-nothing.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::info;

use crate::cdr::{Cdr, DialogId, Party};
use crate::events::CallStateEvent;

use super::{CdrStore, StoreError};

const META_EVENT_SEQ: &[u8] = b"event_seq";
const META_PARTY_SEQ: &[u8] = b"party_seq";

/// Persistent store backed by a fjall keyspace.
pub struct PersistentStore {
    keyspace: Keyspace,
    events: PartitionHandle,
    events_by_time: PartitionHandle,
    cdrs: PartitionHandle,
    parties: PartitionHandle,
    meta: PartitionHandle,

    event_seq: AtomicU64,
    party_seq: AtomicU64,

    /// Serializes check-then-write sections across threads.
    write_lock: Mutex<()>,
}

/// Order-preserving 8-byte encoding of a timestamp (millisecond precision).
fn time_key(t: DateTime<Utc>) -> [u8; 8] {
    // Sign flip maps i64 ordering onto unsigned byte ordering.
    ((t.timestamp_millis() as u64) ^ (1 << 63)).to_be_bytes()
}

fn event_key(event: &CallStateEvent) -> Vec<u8> {
    let mut key = Vec::with_capacity(event.call_id.len() + 17);
    key.extend_from_slice(event.call_id.as_bytes());
    key.push(0);
    key.extend_from_slice(&time_key(event.event_time));
    key.extend_from_slice(&event.seq.to_be_bytes());
    key
}

fn time_index_key(event: &CallStateEvent) -> Vec<u8> {
    let mut key = Vec::with_capacity(event.call_id.len() + 17);
    key.extend_from_slice(&time_key(event.event_time));
    key.extend_from_slice(&event.seq.to_be_bytes());
    key.push(0);
    key.extend_from_slice(event.call_id.as_bytes());
    key
}

fn cdr_key(dialog: &DialogId) -> Vec<u8> {
    let mut key =
        Vec::with_capacity(dialog.call_id.len() + dialog.from_tag.len() + dialog.to_tag.len() + 2);
    key.extend_from_slice(dialog.call_id.as_bytes());
    key.push(0);
    key.extend_from_slice(dialog.from_tag.as_bytes());
    key.push(0);
    key.extend_from_slice(dialog.to_tag.as_bytes());
    key
}

fn party_key(aor: &str, contact: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(aor.len() + contact.len() + 1);
    key.extend_from_slice(aor.as_bytes());
    key.push(0);
    key.extend_from_slice(contact.as_bytes());
    key
}

impl PersistentStore {
    /// Open or create persistent storage at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Arc<Self>> {
        std::fs::create_dir_all(path)?;

        let keyspace = Config::new(path).open()?;

        let events = keyspace.open_partition("events", PartitionCreateOptions::default())?;
        let events_by_time =
            keyspace.open_partition("events_by_time", PartitionCreateOptions::default())?;
        let cdrs = keyspace.open_partition("cdrs", PartitionCreateOptions::default())?;
        let parties = keyspace.open_partition("parties", PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition("meta", PartitionCreateOptions::default())?;

        let store = Arc::new(Self {
            keyspace,
            events,
            events_by_time,
            cdrs,
            parties,
            meta,
            event_seq: AtomicU64::new(0),
            party_seq: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        });

        store.recover_counters()?;

        info!(path = %path.display(), "persistent store opened");
        Ok(store)
    }

    fn recover_counters(&self) -> anyhow::Result<()> {
        if let Some(value) = self.meta.get(META_EVENT_SEQ)? {
            if value.len() == 8 {
                let seq = u64::from_be_bytes(value[..8].try_into().unwrap());
                self.event_seq.store(seq, Ordering::SeqCst);
            }
        }
        if let Some(value) = self.meta.get(META_PARTY_SEQ)? {
            if value.len() == 8 {
                let seq = u64::from_be_bytes(value[..8].try_into().unwrap());
                self.party_seq.store(seq, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn count(partition: &PartitionHandle) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in partition.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

impl CdrStore for PersistentStore {
    fn insert_events(&self, events: &[CallStateEvent]) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().unwrap();

        let mut seq = self.event_seq.load(Ordering::SeqCst);
        let mut batch = self.keyspace.batch();

        for event in events {
            let mut event = event.clone();
            event.seq = seq;
            seq += 1;

            let value = serde_json::to_vec(&event)?;
            batch.insert(&self.events, event_key(&event), value);
            batch.insert(
                &self.events_by_time,
                time_index_key(&event),
                event.call_id.as_bytes(),
            );
        }
        batch.insert(&self.meta, META_EVENT_SEQ, seq.to_be_bytes().to_vec());

        batch.commit()?;
        self.event_seq.store(seq, Ordering::SeqCst);
        self.flush()?;

        Ok(events.len())
    }

    fn call_ids_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let start_key = time_key(start);
        let end_key = time_key(end);

        let mut call_ids = std::collections::BTreeSet::new();
        for item in self.events_by_time.range(start_key.to_vec()..) {
            let (key, value) = item?;
            if key.len() < 8 || key[..8] > end_key[..] {
                break;
            }
            call_ids.insert(String::from_utf8_lossy(&value).into_owned());
        }

        Ok(call_ids.into_iter().collect())
    }

    fn events_for_call(&self, call_id: &str) -> Result<Vec<CallStateEvent>, StoreError> {
        let mut prefix = Vec::with_capacity(call_id.len() + 1);
        prefix.extend_from_slice(call_id.as_bytes());
        prefix.push(0);

        let mut events = Vec::new();
        for item in self.events.prefix(prefix) {
            let (_, value) = item?;
            events.push(serde_json::from_slice::<CallStateEvent>(&value)?);
        }

        Ok(events)
    }

    fn find_cdr_by_dialog(&self, dialog: &DialogId) -> Result<Option<Cdr>, StoreError> {
        match self.cdrs.get(cdr_key(dialog))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn save_cdr(&self, cdr: &Cdr, supersede: bool) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap();

        let dialog = cdr.dialog_id();
        let key = cdr_key(&dialog);
        let exists = self.cdrs.get(&key)?.is_some();

        if exists && !supersede {
            return Err(StoreError::CdrExists(dialog));
        }

        // Delete and insert commit as one batch.
        let mut batch = self.keyspace.batch();
        if exists {
            batch.remove(&self.cdrs, key.clone());
        }
        batch.insert(&self.cdrs, key, serde_json::to_vec(cdr)?);
        batch.commit()?;
        self.flush()?;

        Ok(())
    }

    fn cdr_count(&self) -> Result<usize, StoreError> {
        Self::count(&self.cdrs)
    }

    fn find_party(&self, aor: &str, contact: &str) -> Result<Option<Party>, StoreError> {
        match self.parties.get(party_key(aor, contact))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn insert_party(&self, party: &Party) -> Result<Party, StoreError> {
        let _guard = self.write_lock.lock().unwrap();

        let key = party_key(&party.aor, &party.contact);
        if self.parties.get(&key)?.is_some() {
            return Err(StoreError::PartyExists {
                aor: party.aor.clone(),
                contact: party.contact.clone(),
            });
        }

        let id = self.party_seq.load(Ordering::SeqCst);
        let mut stored = party.clone();
        stored.id = Some(id);

        let mut batch = self.keyspace.batch();
        batch.insert(&self.parties, key, serde_json::to_vec(&stored)?);
        batch.insert(&self.meta, META_PARTY_SEQ, (id + 1).to_be_bytes().to_vec());
        batch.commit()?;
        self.party_seq.store(id + 1, Ordering::SeqCst);
        self.flush()?;

        Ok(stored)
    }

    fn party_count(&self) -> Result<usize, StoreError> {
        Self::count(&self.parties)
    }
}
