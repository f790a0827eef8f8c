//! Store factory for creating storage backends.

use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};

use super::{MemoryStore, PersistentStore, SharedStore};

/// Create a store backend based on configuration.
pub fn create_store(config: &StoreConfig) -> anyhow::Result<SharedStore> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory store (volatile)");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Fjall => {
            tracing::info!(path = %config.path.display(), "using persistent store");
            Ok(PersistentStore::open(&config.path)? as SharedStore)
        }
    }
}
