//! Discovery Scheduler
//!
//! Two independent timer loops: the probe loop broadcasts Who-Is on a fixed
//! grid, the status loop hands a registry summary to a [`StatusSink`]. Both
//! stop on a shared broadcast shutdown signal.
//!
//! The first tick of each loop fires one full interval after `start()`.
//! A failed send is logged and the grid carries on; ticks missed while a send
//! was slow are skipped rather than bunched.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::registry::DeviceRegistry;
use super::report::{StatusReport, StatusSink};
use crate::bacnet::{OutgoingMessage, WhoIsRequest};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::transport::Transport;

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler State
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    /// Constructed, timers not started
    Created = 0,
    /// Timers running
    Running = 1,
    /// Stopped for good
    Stopped = 2,
}

impl SchedulerState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        *self == SchedulerState::Running
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Created => write!(f, "created"),
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Stopped => write!(f, "stopped"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler Config
// ─────────────────────────────────────────────────────────────────────────────

/// Timer periods and probe shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub discovery_interval: Duration,
    pub report_interval: Duration,
    pub who_is: WhoIsRequest,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            discovery_interval: Duration::from_secs(30),
            report_interval: Duration::from_secs(60),
            who_is: WhoIsRequest::global(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Discovery Scheduler
// ─────────────────────────────────────────────────────────────────────────────

pub struct DiscoveryScheduler {
    config: SchedulerConfig,
    transport: Arc<dyn Transport>,
    registry: Arc<DeviceRegistry>,
    sink: Arc<dyn StatusSink>,
    state: AtomicU8,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DiscoveryScheduler {
    pub fn new(
        config: SchedulerConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<DeviceRegistry>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            transport,
            registry,
            sink,
            state: AtomicU8::new(SchedulerState::Created as u8),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start both timer loops
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> DiscoveryResult<()> {
        if self.config.discovery_interval.is_zero() || self.config.report_interval.is_zero() {
            return Err(DiscoveryError::Config("scheduler periods must be non-zero".to_string()));
        }

        // Subscribed before the state flips so a concurrent stop() is never missed
        let probe_shutdown = self.shutdown_tx.subscribe();
        let report_shutdown = self.shutdown_tx.subscribe();

        self.state
            .compare_exchange(
                SchedulerState::Created as u8,
                SchedulerState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|current| match SchedulerState::from_u8(current) {
                SchedulerState::Running => DiscoveryError::AlreadyRunning,
                _ => DiscoveryError::SchedulerStopped,
            })?;

        let started = Instant::now();
        let probe = tokio::spawn(probe_loop(
            Arc::clone(&self.transport),
            self.config.who_is,
            started,
            self.config.discovery_interval,
            probe_shutdown,
        ));
        let report = tokio::spawn(report_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.sink),
            started,
            self.config.report_interval,
            report_shutdown,
        ));
        self.tasks.lock().extend([probe, report]);

        info!(
            discovery_interval = ?self.config.discovery_interval,
            report_interval = ?self.config.report_interval,
            "Discovery scheduler started"
        );
        Ok(())
    }

    /// Stop both loops; safe to call at any time, any number of times
    pub fn stop(&self) {
        let previous = SchedulerState::from_u8(self.state.swap(SchedulerState::Stopped as u8, Ordering::SeqCst));
        if previous == SchedulerState::Stopped {
            return;
        }
        // No receivers when stopped before start
        let _ = self.shutdown_tx.send(());
        info!(previous = %previous, "Discovery scheduler stopped");
    }

    /// Wait for both loops to exit after `stop()`
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }

    /// Broadcast a Who-Is immediately, outside the timer grid
    pub async fn trigger_probe_now(&self) -> DiscoveryResult<()> {
        if self.state() == SchedulerState::Stopped {
            return Err(DiscoveryError::SchedulerStopped);
        }
        send_probe(self.transport.as_ref(), self.config.who_is).await
    }
}

impl Drop for DiscoveryScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn send_probe(transport: &dyn Transport, who_is: WhoIsRequest) -> DiscoveryResult<()> {
    debug!(low = ?who_is.low_limit, high = ?who_is.high_limit, "Broadcasting Who-Is");
    transport.send_broadcast(OutgoingMessage::WhoIs(who_is)).await
}

async fn probe_loop(
    transport: Arc<dyn Transport>,
    who_is: WhoIsRequest,
    started: Instant,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match send_probe(transport.as_ref(), who_is).await {
                    Ok(()) => {}
                    Err(e) if e.is_transient() => warn!(error = %e, "Who-Is broadcast failed"),
                    Err(e) => error!(error = %e, "Who-Is broadcast failed"),
                }
            }
            _ = shutdown.recv() => {
                debug!("Probe loop shutting down");
                break;
            }
        }
    }
}

async fn report_loop(
    registry: Arc<DeviceRegistry>,
    sink: Arc<dyn StatusSink>,
    started: Instant,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = StatusReport::from_devices(&registry.snapshot(), Utc::now());
                sink.report(&report);
            }
            _ = shutdown.recv() => {
                debug!("Status loop shutting down");
                break;
            }
        }
    }
}
