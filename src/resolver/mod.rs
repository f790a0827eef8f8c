//! Call resolution: correlate call state events into CDRs.
//!
//! The driver enumerates calls with activity in a time window, loads each
//! call's full event history (a call may span window edges), selects the
//! authoritative leg, builds the CDR, and commits it. One malformed call
//! never aborts the batch: per-call errors are logged and the run
//! continues.

pub mod builder;
pub mod leg;
pub mod persist;

pub use persist::{CommitOutcome, PartyOutcome, ResolveError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::store::{CdrStore, SharedStore, StoreError};

/// Outcome of resolving one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// A CDR was written (new or superseding an incomplete one)
    Written,
    /// A complete CDR was already stored; nothing touched
    AlreadyComplete,
    /// No call request, no selectable leg, or no setup event. Expected for
    /// calls with no connected leg; not a fault.
    Skipped,
}

/// Counters for one resolution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Distinct calls seen in the window
    pub calls: usize,
    /// CDRs written
    pub written: usize,
    /// Calls whose complete CDR was already stored
    pub already_complete: usize,
    /// Calls that yielded no CDR
    pub skipped: usize,
    /// Calls that failed with a call-scoped error
    pub failed: usize,
}

/// The resolution driver.
pub struct Resolver {
    store: SharedStore,
}

impl Resolver {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Resolve all calls with activity in [start, end]. When `end` is None
    /// it defaults to one day after `start`. `redo` is accepted for
    /// interface compatibility; recomputation is not implemented.
    ///
    /// Only a store-level fault while enumerating the window aborts the
    /// run; per-call failures are logged and counted.
    pub fn resolve(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        redo: bool,
    ) -> Result<ResolveStats, StoreError> {
        let end = end.unwrap_or(start + Duration::days(1));

        if redo {
            warn!("redo requested but recomputation is not implemented, ignoring");
        }

        info!(%start, %end, "resolving window");

        let call_ids = self.store.call_ids_in_window(start, end)?;

        let mut stats = ResolveStats {
            calls: call_ids.len(),
            ..Default::default()
        };

        for call_id in &call_ids {
            match self.resolve_call(call_id) {
                Ok(CallOutcome::Written) => stats.written += 1,
                Ok(CallOutcome::AlreadyComplete) => stats.already_complete += 1,
                Ok(CallOutcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    // Fault isolation: one bad call must not abort the batch.
                    error!(call_id = %call_id, error = %e, "call resolution failed, no CDR created");
                    stats.failed += 1;
                }
            }
        }

        info!(
            calls = stats.calls,
            written = stats.written,
            already_complete = stats.already_complete,
            skipped = stats.skipped,
            failed = stats.failed,
            "window resolved"
        );

        Ok(stats)
    }

    /// Resolve one call to 0-1 CDRs and persist the result.
    pub fn resolve_call(&self, call_id: &str) -> Result<CallOutcome, ResolveError> {
        debug!(call_id = %call_id, "resolving call");

        // All events for this call, unconstrained by any window, so calls
        // spanning window edges resolve from their full history.
        let events = self.store.events_for_call(call_id)?;
        debug!(call_id = %call_id, count = events.len(), "loaded events");

        let Some(call_req) = builder::first_call_request(&events) else {
            debug!(call_id = %call_id, "no call request found, skipping");
            return Ok(CallOutcome::Skipped);
        };

        let mut cdr_data = builder::read_call_request(call_req);

        let Some(to_tag) = leg::select_leg(&events) else {
            debug!(call_id = %call_id, "no selectable call leg, skipping");
            return Ok(CallOutcome::Skipped);
        };

        if !builder::fill_from_leg(&mut cdr_data, &events, to_tag) {
            debug!(call_id = %call_id, to_tag = %to_tag, "selected leg has no setup event, skipping");
            return Ok(CallOutcome::Skipped);
        }

        debug!(
            caller = %cdr_data.caller.aor,
            callee = %cdr_data.callee.aor,
            start_time = %cdr_data.cdr.start_time,
            termination = ?cdr_data.cdr.termination,
            "resolved a call"
        );

        match persist::commit(self.store.as_ref(), cdr_data)? {
            CommitOutcome::Written => Ok(CallOutcome::Written),
            CommitOutcome::AlreadyComplete => Ok(CallOutcome::AlreadyComplete),
        }
    }
}
