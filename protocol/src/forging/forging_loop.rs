//! The periodic forging tick loop.
//!
//! A thin async driver around [`ForgingEngine::tick`]: wake at a fixed
//! interval, run one tick over the roster, sleep, repeat. Shutdown rides a
//! `tokio::sync::watch` channel and is honored at every iteration
//! boundary, including mid-sleep.
//!
//! The loop deliberately does no error handling of its own. Per-identity
//! failures are already contained inside `tick`; anything that escapes is
//! a logic fault and panics the task — crash over corrupt consensus state.

use std::sync::Arc;

use tracing::info;

use super::ForgingEngine;
use crate::config;

/// Tunable parameters for the forging loop.
#[derive(Debug, Clone)]
pub struct ForgingLoopConfig {
    /// Milliseconds between ticks. Eligibility is second-granular, so the
    /// default of one tick per second loses nothing.
    pub tick_interval_ms: u64,
}

impl Default for ForgingLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: config::FORGING_TICK_INTERVAL_MS,
        }
    }
}

/// Drives the forging engine at a fixed cadence until shut down.
pub struct ForgingLoop {
    engine: Arc<ForgingEngine>,
    config: ForgingLoopConfig,
}

impl ForgingLoop {
    pub fn new(engine: Arc<ForgingEngine>, config: ForgingLoopConfig) -> Self {
        Self { engine, config }
    }

    /// Runs until the shutdown channel observes `true` (or the sender is
    /// dropped). Returns cleanly in both cases.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            tick_interval_ms = self.config.tick_interval_ms,
            "forging loop starting"
        );

        loop {
            if *shutdown.borrow() {
                info!("forging loop received shutdown signal, exiting cleanly");
                return;
            }

            self.engine.tick();

            tokio::select! {
                _ = tokio::time::sleep(tokio::time::Duration::from_millis(
                    self.config.tick_interval_ms,
                )) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("forging loop shutting down during sleep");
                        return;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
