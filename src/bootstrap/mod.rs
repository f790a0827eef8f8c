//! Daemon bootstrap.

mod daemon;

pub use daemon::Daemon;
