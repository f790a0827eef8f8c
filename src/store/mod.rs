//! Event and CDR storage.
//!
//! All durable state goes through the [`CdrStore`] trait:
//! - **Events**: call state events written by the proxy, read-only inputs
//! - **CDRs**: one row per dialog identity (call_id, from_tag, to_tag)
//! - **Parties**: deduplicated (aor, contact) identities
//!
//! # Implementations
//!
//! - [`MemoryStore`]: in-memory, volatile - for development/testing
//! - [`PersistentStore`]: fjall-backed, durable - for production
//!
//! The store enforces two uniqueness invariants: at most one Party per
//! (aor, contact) pair, and at most one CDR per dialog identity.

mod factory;
mod memory;
mod persistent;

pub use factory::create_store;
pub use memory::MemoryStore;
pub use persistent::PersistentStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cdr::{Cdr, DialogId, Party};
use crate::events::CallStateEvent;

/// Shared store handle.
pub type SharedStore = Arc<dyn CdrStore>;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation on the (aor, contact) pair. A concurrent
    /// writer created the same Party first; the caller re-reads.
    #[error("party already exists: aor={aor} contact={contact}")]
    PartyExists { aor: String, contact: String },

    /// Insert of a CDR whose dialog identity already has a row, without
    /// supersession requested. A programming-contract error.
    #[error("cdr already exists for dialog {0:?}")]
    CdrExists(DialogId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(#[from] fjall::Error),
}

/// Unified storage trait.
///
/// All implementations must be thread-safe (Send + Sync). Each write
/// operation is individually atomic; `save_cdr` with supersession commits
/// the delete and the insert as one unit, so a crash can never leave the
/// dialog with a half-replaced row.
pub trait CdrStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Event Operations
    // -------------------------------------------------------------------------

    /// Ingest events, assigning monotonically increasing sequence numbers
    /// in input order. Returns the number of events stored.
    fn insert_events(&self, events: &[CallStateEvent]) -> Result<usize, StoreError>;

    /// Distinct call ids with at least one event in [start, end] inclusive.
    fn call_ids_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError>;

    /// All events for a call, ascending by (event_time, seq), unconstrained
    /// by any window.
    fn events_for_call(&self, call_id: &str) -> Result<Vec<CallStateEvent>, StoreError>;

    // -------------------------------------------------------------------------
    // CDR Operations
    // -------------------------------------------------------------------------

    /// Look up the CDR for a dialog identity.
    fn find_cdr_by_dialog(&self, dialog: &DialogId) -> Result<Option<Cdr>, StoreError>;

    /// Save a CDR. With `supersede`, any existing row for the dialog is
    /// deleted and replaced in one atomic unit; without it, an existing row
    /// fails with [`StoreError::CdrExists`].
    fn save_cdr(&self, cdr: &Cdr, supersede: bool) -> Result<(), StoreError>;

    /// Number of stored CDRs.
    fn cdr_count(&self) -> Result<usize, StoreError>;

    // -------------------------------------------------------------------------
    // Party Operations
    // -------------------------------------------------------------------------

    /// Look up a Party by its (aor, contact) pair.
    fn find_party(&self, aor: &str, contact: &str) -> Result<Option<Party>, StoreError>;

    /// Insert a Party, assigning its id. Fails with
    /// [`StoreError::PartyExists`] if the (aor, contact) pair is taken.
    fn insert_party(&self, party: &Party) -> Result<Party, StoreError>;

    /// Number of stored Parties.
    fn party_count(&self) -> Result<usize, StoreError>;
}
