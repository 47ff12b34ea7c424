//! Conduit stall detection
//!
//! A periodic task compares the FIFO's last-modified time with the wall clock
//! while a writer is believed alive. A pipe idle beyond the threshold means
//! the writer is wedged, died silently, or is blocked downstream, and the
//! engine is reset under its usual lock.

use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::EngineInner;

/// A missing pipe counts as stalled; no live writer never does.
pub fn is_stalled(writer_alive: bool, idle: Option<Duration>, threshold: Duration) -> bool {
    if !writer_alive {
        return false;
    }
    match idle {
        Some(idle) => idle > threshold,
        None => true,
    }
}

pub(super) fn spawn(
    engine: Weak<EngineInner>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(?period, "FIFO watchdog started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(engine) = engine.upgrade() else {
                break;
            };
            engine.check_conduit().await;
        }

        tracing::debug!("FIFO watchdog stopped");
    })
}
