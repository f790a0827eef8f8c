//! Configuration loading and validation.

mod loader;
mod types;

pub use types::{Config, ResolverConfig, StoreBackend, StoreConfig, TelemetryConfig};
