//! Periodic driver for a [`NudgeSelector`].
//!
//! One tokio task owns the tick loop, so evaluations never overlap. Each
//! selection is surfaced from a detached task after its `delay_ms`; those
//! tasks are fire-and-forget and survive [`NudgeRunner::stop`].
//!
//! ```text
//! Idle --start()--> Running --stop()--> Idle
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::selector::{NudgeSelector, Selection};
use crate::storage::EngineConfig;

/// Selector handle shared between the runner and the host.
pub type SharedSelector = Arc<Mutex<NudgeSelector>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
}

pub struct NudgeRunner {
    selector: SharedSelector,
    tick_interval: Duration,
    initial_delay: Duration,
    task: Option<JoinHandle<()>>,
}

impl NudgeRunner {
    pub fn new(selector: NudgeSelector, engine: &EngineConfig) -> Self {
        Self::with_timing(selector, engine.tick_interval(), engine.initial_delay())
    }

    pub fn with_timing(
        selector: NudgeSelector,
        tick_interval: Duration,
        initial_delay: Duration,
    ) -> Self {
        Self {
            selector: Arc::new(Mutex::new(selector)),
            tick_interval,
            initial_delay,
            task: None,
        }
    }

    /// Handle for tracking calls, dismissals and actions.
    pub fn selector(&self) -> SharedSelector {
        Arc::clone(&self.selector)
    }

    pub fn state(&self) -> RunnerState {
        if self.is_running() {
            RunnerState::Running
        } else {
            RunnerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start periodic evaluation. No-op if already running.
    ///
    /// Evaluates once after the initial grace delay and then every tick
    /// interval measured from the call to `start`.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let selector = Arc::clone(&self.selector);
        let tick_interval = self.tick_interval;
        let initial_delay = self.initial_delay;

        self.task = Some(tokio::spawn(async move {
            let grace = tokio::time::sleep(initial_delay);
            tokio::pin!(grace);
            let mut grace_done = false;

            let mut interval = tokio::time::interval_at(Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut grace, if !grace_done => grace_done = true,
                    _ = interval.tick() => {}
                }
                run_tick(&selector);
            }
        }));
        debug!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            initial_delay_ms = self.initial_delay.as_millis() as u64,
            "Nudge runner started"
        );
    }

    /// Stop periodic evaluation. Delayed surfacing already in flight still
    /// completes. No-op if not running.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Nudge runner stopped");
        }
    }
}

impl Drop for NudgeRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Lock the selector, recovering from a poisoned lock.
pub fn lock_selector(selector: &SharedSelector) -> MutexGuard<'_, NudgeSelector> {
    selector.lock().unwrap_or_else(|poisoned| {
        warn!("Nudge selector lock was poisoned; continuing with inner state");
        poisoned.into_inner()
    })
}

fn run_tick(selector: &SharedSelector) {
    let selection = lock_selector(selector).check_nudges();
    if let Some(selection) = selection {
        schedule_surface(Arc::clone(selector), selection);
    }
}

fn schedule_surface(selector: SharedSelector, selection: Selection) {
    tokio::spawn(async move {
        if selection.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(selection.delay_ms)).await;
        }
        lock_selector(&selector).surface(&selection);
    });
}
