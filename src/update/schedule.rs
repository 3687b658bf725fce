//! Drift-correcting timer for automatic update sweeps.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Result, UpdateError};
use crate::options::OptionsStore;
use crate::update::batch::{CheckTarget, Updater};

/// Delay between a sweep coming due and it actually starting, giving
/// the host time to finish initializing networking.
const SETTLING_DELAY: Duration = Duration::from_secs(20);

/// Longest span a single timer arm may cover; longer waits recompute at
/// the cap (the classic 2^31 - 1 ms timer limit).
const MAX_TIMER_SPAN_MS: u64 = i32::MAX as u64;

/// Milliseconds per day, the unit of the auto-update interval option.
const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Handle for nudging the scheduler from outside.
#[derive(Clone)]
pub struct SchedulerHandle {
    trigger: mpsc::UnboundedSender<()>,
}

impl SchedulerHandle {
    /// Recompute the timer now.
    ///
    /// # Errors
    ///
    /// Returns an error when the scheduler task has stopped.
    pub fn recompute(&self) -> Result<()> {
        self.trigger
            .send(())
            .map_err(|_| UpdateError::Schedule("scheduler task stopped".to_owned()))
    }
}

/// Periodic sweep timer.
///
/// Keeps at most one pending timer, recomputing it from the interval
/// option and the last-sweep timestamp on every pass. Option changes
/// and [`SchedulerHandle::recompute`] both force a recomputation, so
/// interval edits take effect immediately.
pub struct AutoUpdateScheduler {
    updater: Arc<Updater>,
    options: Arc<OptionsStore>,
    settling_delay: Duration,
    trigger_tx: mpsc::UnboundedSender<()>,
    trigger_rx: mpsc::UnboundedReceiver<()>,
}

impl AutoUpdateScheduler {
    pub fn new(updater: Arc<Updater>, options: Arc<OptionsStore>) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        Self {
            updater,
            options,
            settling_delay: SETTLING_DELAY,
            trigger_tx,
            trigger_rx,
        }
    }

    /// Override the settling delay before a due sweep starts.
    pub fn with_settling_delay(mut self, delay: Duration) -> Self {
        self.settling_delay = delay;
        self
    }

    /// Handle for forcing recomputation from outside the task.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            trigger: self.trigger_tx.clone(),
        }
    }

    /// Start the timer loop. Stop it by aborting the returned handle.
    pub fn run(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut option_changes = self.options.subscribe().await;
            // Holds off a second sweep until the previous one has
            // advanced the last-sweep timestamp.
            let mut fired_at: u64 = 0;
            info!("auto-update scheduler started");

            loop {
                let options = self.options.snapshot().await;
                let interval_ms = u64::from(options.auto_update) * DAY_MS;
                if interval_ms == 0 {
                    debug!("auto-update disabled, timer unarmed");
                    tokio::select! {
                        changed = option_changes.recv() => {
                            if changed.is_none() {
                                break;
                            }
                        }
                        triggered = self.trigger_rx.recv() => {
                            if triggered.is_none() {
                                break;
                            }
                        }
                    }
                    continue;
                }

                let now = now_epoch_millis();
                let last = options.last_update.max(fired_at);
                let mut elapsed = now.saturating_sub(last);
                if elapsed >= interval_ms {
                    fired_at = now;
                    elapsed = 0;
                    info!("automatic update sweep due");
                    let updater = Arc::clone(&self.updater);
                    let delay = self.settling_delay;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        updater.check_update(CheckTarget::Auto).await;
                    });
                }

                let arm = rearm_delay(interval_ms, elapsed);
                debug!("next auto-update recompute in {arm:?}");
                tokio::select! {
                    () = tokio::time::sleep(arm) => {}
                    changed = option_changes.recv() => {
                        if changed.is_none() {
                            break;
                        }
                    }
                    triggered = self.trigger_rx.recv() => {
                        if triggered.is_none() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

/// Sleep span until the next recomputation, capped at the platform
/// maximum.
fn rearm_delay(interval_ms: u64, elapsed_ms: u64) -> Duration {
    Duration::from_millis(interval_ms.saturating_sub(elapsed_ms).min(MAX_TIMER_SPAN_MS))
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_epoch_millis() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}
