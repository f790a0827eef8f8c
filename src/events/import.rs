//! JSON-lines CSE import.
//!
//! The proxy exports call state events as one JSON object per line. The
//! `import` command reads such a file and hands the events to the store,
//! which assigns ingest sequence numbers.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use super::CallStateEvent;

/// CSE import errors.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Read a JSON-lines event file. Blank lines are skipped; any malformed
/// line aborts the import with its line number.
pub fn read_events_file<P: AsRef<Path>>(path: P) -> Result<Vec<CallStateEvent>, ImportError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: CallStateEvent = serde_json::from_str(&line)
            .map_err(|source| ImportError::Parse { line: idx + 1, source })?;
        events.push(event);
    }

    debug!(path = %path.display(), count = events.len(), "read event file");
    Ok(events)
}
