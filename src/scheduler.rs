//! Periodic sync scheduling.
//!
//! `Idle --start--> Running --stop--> Idle`. While running, a reconcile cycle
//! is spawned every interval, the first one interval after `start`. Each cycle
//! runs in its own task, so `stop` only prevents future ticks and never
//! interrupts a cycle already in flight. `trigger_now` runs a cycle
//! immediately without moving the next tick.
//!
//! A tick or trigger that arrives while a cycle is in flight is dropped
//! (`SyncOutcome::Skipped`), not queued.
//!
//! All methods that spawn must be called from within a Tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::Config;
use crate::error::{QuoteError, QuoteResult};
use crate::sync_client::{SyncClient, SyncOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running { interval: Duration },
}

struct RunningTask {
    interval: Duration,
    shutdown: oneshot::Sender<()>,
    _task: JoinHandle<()>,
}

/// Runs sync cycles on a fixed interval and on demand
pub struct Scheduler {
    client: Arc<SyncClient>,
    running: Option<RunningTask>,
}

impl Scheduler {
    pub fn new(client: Arc<SyncClient>) -> Self {
        Self {
            client,
            running: None,
        }
    }

    pub fn client(&self) -> &Arc<SyncClient> {
        &self.client
    }

    pub fn state(&self) -> SchedulerState {
        match &self.running {
            Some(running) => SchedulerState::Running {
                interval: running.interval,
            },
            None => SchedulerState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start ticking every `interval`. Restarts the timer if already running.
    pub fn start(&mut self, interval: Duration) -> QuoteResult<()> {
        if interval.is_zero() {
            return Err(QuoteError::validation("interval", "must be greater than zero"));
        }
        self.stop();

        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let client = self.client.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        spawn_cycle(client.clone());
                    }
                }
            }

            tracing::debug!("Sync scheduler stopped");
        });

        tracing::info!("Sync scheduler started (every {:?})", interval);
        self.running = Some(RunningTask {
            interval,
            shutdown,
            _task: task,
        });
        Ok(())
    }

    /// Start with the configured interval when sync is enabled.
    ///
    /// Returns whether the scheduler is running afterwards. A disabled config
    /// stops any running schedule.
    pub fn start_from_config(&mut self, config: &Config) -> QuoteResult<bool> {
        if !config.is_sync_enabled() {
            tracing::debug!("Sync disabled in config, scheduler idle");
            self.stop();
            return Ok(false);
        }
        self.start(config.sync_interval())?;
        Ok(true)
    }

    /// Stop scheduling. An in-flight cycle runs to completion.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            tracing::debug!("Sync scheduler stopping");
        }
    }

    /// Run a cycle now. Does not affect the next scheduled tick.
    pub fn trigger_now(&self) -> JoinHandle<SyncOutcome> {
        spawn_cycle(self.client.clone())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_cycle(client: Arc<SyncClient>) -> JoinHandle<SyncOutcome> {
    tokio::spawn(async move {
        let outcome = client.sync_now().await;
        if outcome.is_skipped() {
            tracing::debug!("Sync cycle skipped; previous cycle still running");
        }
        outcome
    })
}
