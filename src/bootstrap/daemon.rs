//! Periodic resolution loop.
//!
//! In daemon mode cdrd resolves the trailing window on a fixed interval
//! until it receives SIGINT. Resolution itself is synchronous and
//! idempotent, so overlapping windows across ticks are harmless.

use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{Duration, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::resolver::Resolver;

/// Periodic resolution daemon.
pub struct Daemon {
    resolver: Resolver,
    interval: StdDuration,
    window: Duration,
}

impl Daemon {
    pub fn new(resolver: Resolver, interval: StdDuration, window: StdDuration) -> Self {
        let window = Duration::from_std(window).unwrap_or_else(|_| Duration::days(1));
        Self {
            resolver,
            interval,
            window,
        }
    }

    /// Run until SIGINT.
    pub async fn run(self) -> Result<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            window_secs = self.window.num_seconds(),
            "daemon started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let end = Utc::now();
                    let start = end - self.window;
                    if let Err(e) = self.resolver.resolve(start, Some(end), false) {
                        // Store-level fault; the next tick retries.
                        error!(error = %e, "resolution pass failed");
                    }
                }
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        info!("daemon stopped");
        Ok(())
    }
}
