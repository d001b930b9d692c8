//! Async tick loop around a [`WorldSession`].
//!
//! The runner is the session's only writer while it runs: held commands,
//! pause state and viewport size arrive over `watch` channels and are
//! applied between ticks, so a tick's resolution is never interleaved with
//! another mutation.
//!
//! ## Inputs ([`RunnerHandle`])
//!
//! | Method      | Effect                                              |
//! |-------------|-----------------------------------------------------|
//! | `hold`      | replace the held command set                        |
//! | `pause`     | ticks still count, but `delta_allowed` is false     |
//! | `resize`    | debounced, then `resize_viewport`                   |
//! | `shutdown`  | stop after the current tick                         |
//!
//! ## Output
//!
//! Every non-empty [`TickEvents`] is broadcast as a `WorldEvent<TickEvents>`.

use crate::protocol::{TickEvents, WorldEvent};
use crate::session::WorldSession;
use crate::types::CommandSet;
use anyhow::{ensure, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep_until, Instant};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub tick_rate_hz: f64,
    pub resize_debounce: Duration,
    /// Stop after this many ticks; run until shutdown when `None`.
    pub max_ticks: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30.0,
            resize_debounce: Duration::from_millis(100),
            max_ticks: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Input side of a running [`WorldRunner`].
#[derive(Debug)]
pub struct RunnerHandle {
    commands: watch::Sender<CommandSet>,
    paused: watch::Sender<bool>,
    viewport: watch::Sender<(f64, f64)>,
    shutdown: watch::Sender<bool>,
}

impl RunnerHandle {
    pub fn hold(&self, commands: CommandSet) {
        self.commands.send_replace(commands);
    }

    pub fn pause(&self, paused: bool) {
        self.paused.send_replace(paused);
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.viewport.send_replace((width, height));
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct WorldRunner {
    config: RunnerConfig,
    session: Arc<Mutex<WorldSession>>,
    commands: watch::Receiver<CommandSet>,
    paused: watch::Receiver<bool>,
    viewport: watch::Receiver<(f64, f64)>,
    shutdown: watch::Receiver<bool>,
    events: broadcast::Sender<WorldEvent<TickEvents>>,
}

impl WorldRunner {
    pub fn new(config: RunnerConfig, session: Arc<Mutex<WorldSession>>) -> (Self, RunnerHandle) {
        let (commands_tx, commands) = watch::channel(CommandSet::new());
        let (paused_tx, paused) = watch::channel(false);
        let (viewport_tx, viewport) = watch::channel((0.0, 0.0));
        let (shutdown_tx, shutdown) = watch::channel(false);
        let (events, _) = broadcast::channel(256);

        let runner = Self {
            config,
            session,
            commands,
            paused,
            viewport,
            shutdown,
            events,
        };
        let handle = RunnerHandle {
            commands: commands_tx,
            paused: paused_tx,
            viewport: viewport_tx,
            shutdown: shutdown_tx,
        };
        (runner, handle)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorldEvent<TickEvents>> {
        self.events.subscribe()
    }

    /// Tick until shutdown, ctrl-c or `max_ticks`.  Returns the number of
    /// ticks run.
    pub async fn run(mut self) -> Result<u64> {
        ensure!(
            self.config.tick_rate_hz.is_finite() && self.config.tick_rate_hz > 0.0,
            "tick rate must be positive, got {}",
            self.config.tick_rate_hz
        );

        let period = Duration::from_secs_f64(1.0 / self.config.tick_rate_hz);
        let mut timer = tokio::time::interval(period);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut resize_at: Option<Instant> = None;
        let mut viewport_open = true;
        let mut shutdown_open = true;
        let mut ticks = 0_u64;

        info!(
            "WorldRunner active – ticking at {:.0}Hz",
            self.config.tick_rate_hz
        );

        loop {
            if self.config.max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }

            tokio::select! {
                _ = timer.tick() => {
                    ticks += 1;
                    self.tick();
                }
                changed = self.viewport.changed(), if viewport_open => {
                    match changed {
                        Ok(()) => resize_at = Some(Instant::now() + self.config.resize_debounce),
                        Err(_) => viewport_open = false,
                    }
                }
                _ = sleep_until(resize_at.unwrap_or_else(Instant::now)), if resize_at.is_some() => {
                    resize_at = None;
                    self.apply_resize();
                }
                changed = self.shutdown.changed(), if shutdown_open => {
                    match changed {
                        Ok(()) if *self.shutdown.borrow() => {
                            info!("WorldRunner shutting down (requested)");
                            break;
                        }
                        Ok(()) => {}
                        Err(_) => shutdown_open = false,
                    }
                }
                _ = &mut ctrl_c => {
                    info!("WorldRunner shutting down (SIGINT)");
                    break;
                }
            }
        }

        Ok(ticks)
    }

    fn tick(&self) {
        let commands = self.commands.borrow().clone();
        let delta_allowed = !*self.paused.borrow();

        // Hold the lock only long enough to step, then release before publishing.
        let result = {
            let mut session = self.session.lock();
            session.step(&commands, delta_allowed).map(|ev| (session.id(), ev))
        };

        match result {
            Ok((id, events)) => {
                let span = tracing::debug_span!("tick", frame = events.tick);
                let _enter = span.enter();
                if events.is_empty() {
                    return;
                }
                debug!(
                    "frame {}: moved={:?} rejected={:?} visibility={} occlusion={}",
                    events.tick,
                    events.moved,
                    events.rejected,
                    events.visibility.len(),
                    events.occlusion.len()
                );
                let frame = events.tick;
                // No subscribers is fine.
                let _ = self.events.send(WorldEvent::new(id, frame, events));
            }
            Err(e) => warn!("World tick error: {}", e),
        }
    }

    fn apply_resize(&self) {
        let (width, height) = *self.viewport.borrow();
        let mut session = self.session.lock();
        match session.resize_viewport(width, height) {
            Ok(changes) => {
                debug!("Viewport {}x{}: {} visibility change(s)", width, height, changes.len());
                if changes.is_empty() {
                    return;
                }
                let frame = session.tick_count();
                let events = TickEvents {
                    visibility: changes,
                    ..TickEvents::new(frame)
                };
                let _ = self.events.send(WorldEvent::new(session.id(), frame, events));
            }
            Err(e) => warn!("Viewport resize to {}x{} failed: {}", width, height, e),
        }
    }
}
