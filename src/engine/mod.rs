//! Source switching engine
//!
//! The engine keeps one output process encoding whatever arrives on the FIFO
//! for its whole lifetime, and swaps the writer feeding that FIFO:
//!
//! ```text
//! [writer: passthrough or crossfade] --s16le--> FIFO --> [output: encode] --> sink
//! ```
//!
//! All mutations (inject, crossfade, reset, shutdown, watchdog ticks) run
//! under one async mutex, so the writer handle and the active locator always
//! change together. Every switch validates the candidate first; a source that
//! fails its probe never tears down a healthy stream.

mod state;
mod watchdog;

pub use state::{EngineStatus, PlaybackState};
pub use watchdog::is_stalled;

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::conduit::FifoConduit;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::ffmpeg::{ArgBuilder, CrossfadePlan, ProcessLog, ProcessRole, ProcessSupervisor};
use crate::locator::{self, LocatorKind};

use state::ActiveState;

/// Extra time past the fade window before a crossfade is confirmed
const SETTLE_MARGIN: Duration = Duration::from_millis(250);

fn settle_delay(fade: Duration) -> Duration {
    fade.saturating_add(SETTLE_MARGIN)
}

/// Result of a switch request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// A passthrough writer for the locator is now running
    Switched,
    /// A crossfade writer was launched
    Crossfading,
    /// The locator was already active; nothing changed
    AlreadyActive,
}

/// Handle to the running engine. Cheap to clone.
#[derive(Clone)]
pub struct StreamEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    config: EngineConfig,
    supervisor: ProcessSupervisor,
    state: Mutex<ActiveState>,
    snapshot: RwLock<EngineStatus>,
    cancel: CancellationToken,
    watchdog: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl StreamEngine {
    /// Build the conduit, start the output process and the watchdog, then
    /// inject `default_locator` if one is given.
    pub async fn start(config: EngineConfig, default_locator: Option<&str>) -> Result<Self> {
        let supervisor = ProcessSupervisor::new(&config);
        if let Err(e) = supervisor.log().banner("STREAM RESTARTED") {
            tracing::warn!(error = %e, "could not write process log banner");
        }

        let mut conduit = FifoConduit::create(&config.fifo_path)?;
        let output_args = ArgBuilder::new(&config).output(conduit.path());
        let output = match supervisor.spawn(ProcessRole::Output, &config.output.sink, &output_args)
        {
            Ok(output) => output,
            Err(e) => {
                let _ = conduit.remove();
                return Err(e);
            }
        };
        tracing::info!(pid = ?output.pid(), sink = %config.output.sink, "output process started");

        let state = ActiveState::new(conduit, Some(output));
        let snapshot = state.snapshot(&config.fifo_path);
        let inner = Arc::new(EngineInner {
            config,
            supervisor,
            state: Mutex::new(state),
            snapshot: RwLock::new(snapshot),
            cancel: CancellationToken::new(),
            watchdog: parking_lot::Mutex::new(None),
        });

        let period = inner.config.watchdog_interval();
        if period.is_zero() {
            tracing::warn!("FIFO watchdog disabled");
        } else {
            let handle = watchdog::spawn(Arc::downgrade(&inner), period, inner.cancel.clone());
            *inner.watchdog.lock() = Some(handle);
        }

        let engine = Self { inner };
        if let Some(locator) = default_locator {
            if let Err(e) = engine.inject(locator).await {
                tracing::error!(locator, error = %e, "default source could not be started");
            }
        }
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn process_log(&self) -> &ProcessLog {
        self.inner.supervisor.log()
    }

    /// Latest committed state; never waits on an in-flight switch
    pub fn status(&self) -> EngineStatus {
        self.inner.snapshot.read().clone()
    }

    /// Probe `locator` without touching engine state
    pub async fn validate(&self, locator: &str) -> Result<()> {
        self.inner.validate(locator).await
    }

    /// Hard switch to `locator`
    pub async fn inject(&self, locator: &str) -> Result<SwitchOutcome> {
        let mut state = self.inner.state.lock().await;
        self.inner.inject_locked(&mut state, locator).await
    }

    /// Soft switch: fade the active source out and `locator` in over `fade`
    pub async fn crossfade(&self, locator: &str, fade: Duration) -> Result<SwitchOutcome> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        if state.shut_down {
            return Err(EngineError::ShutDown);
        }

        let active = state.playback.active_locator().map(String::from);
        let from = match active {
            Some(active) if active != locator => active,
            _ => return inner.inject_locked(&mut state, locator).await,
        };

        inner.validate(locator).await?;

        let elapsed = state
            .play_started
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let from_kind = LocatorKind::classify(&from, &inner.config);
        let to_kind = LocatorKind::classify(locator, &inner.config);
        let seek = (inner.config.seek_alignment && from_kind.is_seekable()).then_some(elapsed);

        tracing::info!(
            from = %from,
            to = locator,
            elapsed_secs = elapsed.as_secs_f64(),
            fade_secs = fade.as_secs_f64(),
            "Crossfading"
        );

        let plan = CrossfadePlan {
            from: &from,
            from_kind,
            to: locator,
            to_kind,
            fade,
            seek,
        };
        let args = ArgBuilder::new(&inner.config).crossfade(&plan, &inner.config.fifo_path);
        let label = format!("{} -> {}", from, locator);
        inner
            .replace_writer(&mut state, ProcessRole::Crossfade, &label, &args)
            .await?;

        state.commit(PlaybackState::Crossfading {
            from,
            to: locator.to_string(),
        });
        inner.publish(&state);

        let generation = state.generation;
        drop(state);
        self.schedule_settle(generation, fade);

        Ok(SwitchOutcome::Crossfading)
    }

    /// Tear down and rebuild the conduit, output and writer
    pub async fn reset(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.shut_down {
            return Err(EngineError::ShutDown);
        }
        self.inner.reset_locked(&mut state).await
    }

    /// One watchdog tick. Returns true if a stall was found and a reset ran.
    pub async fn check_conduit(&self) -> bool {
        self.inner.check_conduit().await
    }

    /// Stop everything and remove the conduit. Idempotent and infallible.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.cancel.cancel();

        let watchdog = inner.watchdog.lock().take();
        if let Some(handle) = watchdog {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "FIFO watchdog ended abnormally");
            }
        }

        let mut state = inner.state.lock().await;
        if state.shut_down {
            tracing::debug!("engine already shut down");
            return;
        }
        tracing::info!("Shutting down");
        state.shut_down = true;

        if let Some(writer) = state.writer.take() {
            inner.supervisor.terminate(writer).await;
        }
        if let Some(output) = state.output.take() {
            inner.supervisor.terminate(output).await;
        }
        if let Some(mut conduit) = state.conduit.take() {
            if let Err(e) = conduit.remove() {
                tracing::error!(path = %conduit.path().display(), error = %e, "could not remove FIFO");
            }
        }
        state.clear();
        inner.publish(&state);
        tracing::info!("Shutdown complete");
    }

    fn schedule_settle(&self, generation: u64, fade: Duration) {
        let engine = Arc::downgrade(&self.inner);
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(settle_delay(fade)) => {}
            }
            if let Some(engine) = engine.upgrade() {
                engine.settle_crossfade(generation).await;
            }
        });
    }
}

impl EngineInner {
    async fn validate(&self, locator: &str) -> Result<()> {
        if locator::is_trusted_device(locator, &self.config) {
            tracing::info!(locator, "Skipping validation for trusted device");
            return Ok(());
        }

        let kind = LocatorKind::classify(locator, &self.config);
        let timeout = locator::probe_timeout(locator, &self.config);
        let args = ArgBuilder::new(&self.config).probe(locator, kind);

        tracing::info!(locator, ?kind, ?timeout, "Validating stream");
        self.supervisor
            .probe(locator, &args, timeout)
            .await
            .map_err(|reason| {
                tracing::error!(locator, %reason, "Validation failed");
                EngineError::ValidationFailed {
                    locator: locator.to_string(),
                    reason,
                }
            })
    }

    async fn inject_locked(&self, state: &mut ActiveState, locator: &str) -> Result<SwitchOutcome> {
        if state.shut_down {
            return Err(EngineError::ShutDown);
        }
        if state.playback.active_locator() == Some(locator) {
            tracing::debug!(locator, "source already active");
            return Ok(SwitchOutcome::AlreadyActive);
        }

        self.validate(locator).await?;

        let args = self.passthrough_args(locator);
        self.replace_writer(state, ProcessRole::Writer, locator, &args)
            .await?;
        state.commit(PlaybackState::Playing {
            locator: locator.to_string(),
        });
        self.publish(state);

        tracing::info!(locator, pid = ?state.writer.as_ref().and_then(|w| w.pid()), "Source injected");
        Ok(SwitchOutcome::Switched)
    }

    /// Stop the current writer and start a new one. If the new one cannot be
    /// spawned, the previous locator is restored as a passthrough.
    async fn replace_writer(
        &self,
        state: &mut ActiveState,
        role: ProcessRole,
        label: &str,
        args: &[String],
    ) -> Result<()> {
        if let Some(old) = state.writer.take() {
            self.supervisor.terminate(old).await;
        }

        match self.supervisor.spawn(role, label, args) {
            Ok(process) => {
                state.writer = Some(process);
                state.generation += 1;
                Ok(())
            }
            Err(e) => {
                tracing::error!(label, error = %e, "writer spawn failed");
                self.restore_writer(state);
                Err(e)
            }
        }
    }

    fn restore_writer(&self, state: &mut ActiveState) {
        let Some(previous) = state.playback.active_locator().map(String::from) else {
            return;
        };
        let args = self.passthrough_args(&previous);
        match self.supervisor.spawn(ProcessRole::Writer, &previous, &args) {
            Ok(process) => {
                state.writer = Some(process);
                state.generation += 1;
                state.commit(PlaybackState::Playing { locator: previous });
            }
            Err(e) => {
                tracing::error!(locator = %previous, error = %e, "could not restore previous source");
            }
        }
        self.publish(state);
    }

    /// Nothing is respawned unless the pipe could be rebuilt; a writer or
    /// encoder pointed at a plain path would create a regular file there.
    async fn reset_locked(&self, state: &mut ActiveState) -> Result<()> {
        tracing::info!("Resetting FIFO and restarting writer");

        if let Some(writer) = state.writer.take() {
            self.supervisor.terminate(writer).await;
        }
        if let Some(output) = state.output.take() {
            self.supervisor.terminate(output).await;
        }

        let rebuilt = if let Some(conduit) = state.conduit.as_mut() {
            conduit.recreate()
        } else {
            FifoConduit::create(&self.config.fifo_path).map(|c| state.conduit = Some(c))
        };
        if let Err(e) = rebuilt {
            tracing::error!(path = %self.config.fifo_path.display(), error = %e, "FIFO could not be rebuilt");
            self.publish(state);
            return Err(EngineError::Conduit(e));
        }

        let output_args = ArgBuilder::new(&self.config).output(&self.config.fifo_path);
        match self
            .supervisor
            .spawn(ProcessRole::Output, &self.config.output.sink, &output_args)
        {
            Ok(output) => state.output = Some(output),
            Err(e) => tracing::error!(error = %e, "output process could not be restarted"),
        }

        match state.playback.active_locator().map(String::from) {
            Some(locator) => {
                let args = self.passthrough_args(&locator);
                match self.supervisor.spawn(ProcessRole::Writer, &locator, &args) {
                    Ok(writer) => {
                        state.writer = Some(writer);
                        state.generation += 1;
                        state.commit(PlaybackState::Playing { locator });
                    }
                    Err(e) => {
                        tracing::error!(locator = %locator, error = %e, "writer could not be respawned")
                    }
                }
            }
            None => state.clear(),
        }

        state.resets += 1;
        self.publish(state);
        Ok(())
    }

    async fn check_conduit(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.shut_down {
            return false;
        }

        if let Err(e) = self.supervisor.log().maintain() {
            tracing::warn!(error = %e, "process log rotation failed");
        }

        let writer_alive = state.writer_alive();
        let idle = state.conduit.as_ref().and_then(|c| c.idle_for());
        let threshold = self.config.fifo_idle_timeout();
        if !is_stalled(writer_alive, idle, threshold) {
            return false;
        }

        tracing::warn!(
            idle_secs = idle.map(|d| d.as_secs_f64()),
            threshold_secs = threshold.as_secs_f64(),
            "FIFO idle, triggering reset"
        );
        if let Err(e) = self.reset_locked(&mut state).await {
            tracing::error!(error = %e, "watchdog reset failed");
        }
        true
    }

    async fn settle_crossfade(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.shut_down || state.generation != generation {
            return;
        }
        let PlaybackState::Crossfading { to, .. } = &state.playback else {
            return;
        };
        let to = to.clone();

        if state.writer_alive() {
            tracing::debug!(locator = %to, "crossfade complete");
            state.playback = PlaybackState::Playing { locator: to };
            self.publish(&state);
            return;
        }

        tracing::error!(locator = %to, "crossfade writer exited during fade, resuming passthrough");
        let args = self.passthrough_args(&to);
        match self.supervisor.spawn(ProcessRole::Writer, &to, &args) {
            Ok(writer) => {
                state.writer = Some(writer);
                state.generation += 1;
                state.commit(PlaybackState::Playing { locator: to });
            }
            Err(e) => {
                tracing::error!(locator = %to, error = %e, "passthrough after failed crossfade could not be spawned");
                state.writer = None;
                state.playback = PlaybackState::Playing { locator: to };
            }
        }
        self.publish(&state);
    }

    fn passthrough_args(&self, locator: &str) -> Vec<String> {
        let kind = LocatorKind::classify(locator, &self.config);
        ArgBuilder::new(&self.config).passthrough(locator, kind, &self.config.fifo_path)
    }

    fn publish(&self, state: &ActiveState) {
        *self.snapshot.write() = state.snapshot(&self.config.fifo_path);
    }
}
